use crate::config::LlmConfig;
use crate::stream::{ChunkDecoder, Fragments, OllamaChunks, OpenAiChunks};
use crate::types::Message;
use serde::{Deserialize, Serialize};
use std::io::BufReader;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("request timed out")]
    Timeout,
    #[error("backend returned HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("stream failed: {0}")]
    Stream(String),
    #[error("no usable backend configured")]
    NoBackend,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if let Some(status) = e.status() {
            LlmError::Status(status.as_u16())
        } else if e.is_decode() {
            LlmError::Malformed(e.to_string())
        } else {
            LlmError::Unavailable(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub num_ctx: u32,
    pub num_predict: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            num_ctx: 4096,
            num_predict: 512,
        }
    }
}

impl From<&LlmConfig> for GenerationOptions {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            num_ctx: config.num_ctx,
            num_predict: config.num_predict,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub options: GenerationOptions,
}

pub type FragmentStream<'a> = Box<dyn Iterator<Item = Result<String, LlmError>> + 'a>;

/// The two capabilities the rest of the program needs from a model.
pub trait ModelBackend {
    fn generate(&self, request: &ChatRequest) -> Result<String, LlmError>;
    fn stream(&self, request: &ChatRequest) -> Result<FragmentStream<'_>, LlmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Ollama,
    LmStudio,
    LlamaCpp,
}

impl BackendKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "ollama" => Some(BackendKind::Ollama),
            "lmstudio" => Some(BackendKind::LmStudio),
            "llamacpp" => Some(BackendKind::LlamaCpp),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Ollama => "ollama",
            BackendKind::LmStudio => "lmstudio",
            BackendKind::LlamaCpp => "llamacpp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub kind: BackendKind,
    pub url: String,
}

impl Backend {
    pub fn new(kind: BackendKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }

    fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn chat_endpoint(&self) -> String {
        match self.kind {
            BackendKind::Ollama => format!("{}/api/chat", self.base()),
            BackendKind::LmStudio | BackendKind::LlamaCpp => {
                format!("{}/v1/chat/completions", self.base())
            }
        }
    }

    fn decoder(&self) -> Box<dyn ChunkDecoder> {
        match self.kind {
            BackendKind::Ollama => Box::new(OllamaChunks),
            BackendKind::LmStudio | BackendKind::LlamaCpp => Box::new(OpenAiChunks),
        }
    }
}

// Ollama API

#[derive(Serialize)]
struct OllamaChat<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    repeat_penalty: f32,
    num_ctx: u32,
    num_predict: u32,
}

#[derive(Deserialize, Default)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

// OpenAI-compatible API

#[derive(Serialize)]
struct OpenAiChat<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: Option<ReplyMessage>,
}

pub struct LlmClient {
    backends: Vec<Backend>,
    client: reqwest::blocking::Client,
    probe_timeout: Duration,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Self {
        let backends = config
            .backends
            .iter()
            .filter_map(|name| match BackendKind::parse(name) {
                Some(kind) => Some(kind),
                None => {
                    tracing::warn!("unknown backend '{}' ignored", name);
                    None
                }
            })
            .map(|kind| {
                let url = match kind {
                    BackendKind::Ollama => &config.ollama_url,
                    BackendKind::LmStudio => &config.lmstudio_url,
                    BackendKind::LlamaCpp => &config.llamacpp_url,
                };
                Backend::new(kind, url.clone())
            })
            .collect();

        Self::with_backends(
            backends,
            Duration::from_secs(config.timeout_secs),
            Duration::from_millis(config.probe_timeout_ms),
        )
    }

    pub fn with_backends(backends: Vec<Backend>, timeout: Duration, probe_timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            backends,
            client,
            probe_timeout,
        }
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    fn send(
        &self,
        backend: &Backend,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::blocking::Response, LlmError> {
        let url = backend.chat_endpoint();
        let builder = self.client.post(&url);
        let builder = match backend.kind {
            BackendKind::Ollama => builder.json(&OllamaChat {
                model: &request.model,
                messages: &request.messages,
                stream,
                options: OllamaOptions {
                    temperature: request.options.temperature,
                    top_p: 0.9,
                    repeat_penalty: 1.05,
                    num_ctx: request.options.num_ctx,
                    num_predict: request.options.num_predict,
                },
            }),
            BackendKind::LmStudio | BackendKind::LlamaCpp => builder.json(&OpenAiChat {
                model: &request.model,
                messages: &request.messages,
                stream,
                temperature: request.options.temperature,
                max_tokens: request.options.num_predict,
            }),
        };

        let resp = builder.send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LlmError::Status(status.as_u16()));
        }
        Ok(resp)
    }

    fn chat_once(&self, backend: &Backend, request: &ChatRequest) -> Result<String, LlmError> {
        let resp = self.send(backend, request, false)?;
        let content = match backend.kind {
            BackendKind::Ollama => {
                let body: OllamaChatResponse = resp.json()?;
                body.message.unwrap_or_default().content
            }
            BackendKind::LmStudio | BackendKind::LlamaCpp => {
                let body: OpenAiChatResponse = resp.json()?;
                body.choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message)
                    .unwrap_or_default()
                    .content
            }
        };
        Ok(content.trim().to_string())
    }

    /// TCP liveness check against a backend's host and port.
    pub fn is_reachable(&self, backend: &Backend) -> bool {
        let Ok(url) = reqwest::Url::parse(&backend.url) else {
            return false;
        };
        let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
            return false;
        };
        let Ok(addrs) = (host, port).to_socket_addrs() else {
            return false;
        };
        addrs
            .into_iter()
            .any(|addr| TcpStream::connect_timeout(&addr, self.probe_timeout).is_ok())
    }

    /// Installed model names from the first Ollama backend.
    pub fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let backend = self
            .backends
            .iter()
            .find(|b| b.kind == BackendKind::Ollama)
            .ok_or(LlmError::NoBackend)?;
        let url = format!("{}/api/tags", backend.base());
        let resp = self.client.get(&url).send()?;
        if !resp.status().is_success() {
            return Err(LlmError::Status(resp.status().as_u16()));
        }
        let tags: OllamaTags = resp.json()?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

impl ModelBackend for LlmClient {
    fn generate(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let mut last_err = None;

        for (idx, backend) in self.backends.iter().enumerate() {
            match self.chat_once(backend, request) {
                Ok(text) => {
                    if idx > 0 {
                        tracing::info!("backend {} succeeded after {} failures", backend.kind.name(), idx);
                    }
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!("backend {} failed: {}", backend.kind.name(), e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(LlmError::NoBackend))
    }

    fn stream(&self, request: &ChatRequest) -> Result<FragmentStream<'_>, LlmError> {
        let mut last_err = None;

        for backend in &self.backends {
            match self.send(backend, request, true) {
                Ok(resp) => {
                    let fragments = Fragments::new(BufReader::new(resp), backend.decoder());
                    return Ok(Box::new(fragments));
                }
                Err(e) => {
                    tracing::warn!("backend {} stream failed: {}", backend.kind.name(), e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(LlmError::NoBackend))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Fragments were delivered as they arrived.
    Streamed(String),
    /// Streaming failed; this is the full text of a non-streaming retry.
    Retried(String),
}

/// Consume a streamed reply fragment by fragment, retrying once without
/// streaming if the stream cannot be opened or breaks mid-way.
pub fn stream_with_retry<F>(
    backend: &dyn ModelBackend,
    request: &ChatRequest,
    mut on_fragment: F,
) -> Result<StreamOutcome, LlmError>
where
    F: FnMut(&str),
{
    let failure = match backend.stream(request) {
        Ok(fragments) => {
            let mut text = String::new();
            let mut failure = None;
            for fragment in fragments {
                match fragment {
                    Ok(piece) => {
                        on_fragment(&piece);
                        text.push_str(&piece);
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            match failure {
                None => return Ok(StreamOutcome::Streamed(text)),
                Some(e) => e,
            }
        }
        Err(e) => e,
    };

    tracing::warn!("streaming failed ({}), retrying without streaming", failure);
    backend.generate(request).map(StreamOutcome::Retried)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Scripted {
        fragments: Vec<Result<&'static str, &'static str>>,
        open_fails: bool,
        full: &'static str,
        generate_calls: Cell<usize>,
    }

    impl ModelBackend for Scripted {
        fn generate(&self, _request: &ChatRequest) -> Result<String, LlmError> {
            self.generate_calls.set(self.generate_calls.get() + 1);
            Ok(self.full.to_string())
        }

        fn stream(&self, _request: &ChatRequest) -> Result<FragmentStream<'_>, LlmError> {
            if self.open_fails {
                return Err(LlmError::Unavailable("refused".into()));
            }
            let items: Vec<Result<String, LlmError>> = self
                .fragments
                .iter()
                .map(|f| match f {
                    Ok(t) => Ok(t.to_string()),
                    Err(e) => Err(LlmError::Stream(e.to_string())),
                })
                .collect();
            Ok(Box::new(items.into_iter()))
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "m".into(),
            messages: vec![Message::user("hi")],
            options: GenerationOptions::default(),
        }
    }

    #[test]
    fn complete_stream_is_accepted() {
        let backend = Scripted {
            fragments: vec![Ok("Hel"), Ok("lo")],
            open_fails: false,
            full: "unused",
            generate_calls: Cell::new(0),
        };
        let mut seen = Vec::new();
        let outcome = stream_with_retry(&backend, &request(), |f| seen.push(f.to_string())).unwrap();
        assert_eq!(outcome, StreamOutcome::Streamed("Hello".into()));
        assert_eq!(seen, vec!["Hel", "lo"]);
        assert_eq!(backend.generate_calls.get(), 0);
    }

    #[test]
    fn mid_stream_failure_retries_without_streaming() {
        let backend = Scripted {
            fragments: vec![Ok("Hel"), Err("reset"), Ok("never")],
            open_fails: false,
            full: "Hello there",
            generate_calls: Cell::new(0),
        };
        let outcome = stream_with_retry(&backend, &request(), |_| {}).unwrap();
        assert_eq!(outcome, StreamOutcome::Retried("Hello there".into()));
        assert_eq!(backend.generate_calls.get(), 1);
    }

    #[test]
    fn stream_open_failure_retries() {
        let backend = Scripted {
            fragments: vec![],
            open_fails: true,
            full: "full",
            generate_calls: Cell::new(0),
        };
        let outcome = stream_with_retry(&backend, &request(), |_| {}).unwrap();
        assert_eq!(outcome, StreamOutcome::Retried("full".into()));
    }

    #[test]
    fn endpoints_per_backend() {
        assert_eq!(
            Backend::new(BackendKind::Ollama, "http://localhost:11434/").chat_endpoint(),
            "http://localhost:11434/api/chat"
        );
        assert_eq!(
            Backend::new(BackendKind::LlamaCpp, "http://localhost:8080").chat_endpoint(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn client_from_config_skips_unknown_backends() {
        let mut config = LlmConfig::default();
        config.backends = vec!["lmstudio".into(), "bogus".into(), "ollama".into()];
        let client = LlmClient::new(&config);
        let kinds: Vec<_> = client.backends().iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![BackendKind::LmStudio, BackendKind::Ollama]);
    }

    #[test]
    fn closed_port_is_unreachable() {
        let client = LlmClient::with_backends(
            vec![Backend::new(BackendKind::Ollama, "http://127.0.0.1:1")],
            Duration::from_secs(1),
            Duration::from_millis(100),
        );
        assert!(!client.is_reachable(&client.backends()[0]));
    }

    #[test]
    fn no_backends_is_an_error() {
        let client = LlmClient::with_backends(vec![], Duration::from_secs(1), Duration::from_millis(100));
        assert!(matches!(client.generate(&request()), Err(LlmError::NoBackend)));
    }
}
