use crate::llm::LlmError;
use serde_json::Value;
use std::io::BufRead;

/// What one decoded line of a streaming body contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Fragment(String),
    /// End of stream, possibly carrying a last fragment.
    Done(Option<String>),
    Failed(String),
    Skip,
}

/// Provider-specific interpretation of one JSON payload.
pub trait ChunkDecoder: Send {
    fn decode(&self, payload: &Value) -> Chunk;
}

/// Ollama `/api/chat`: `{"message": {"content": ..}, "done": bool}`.
pub struct OllamaChunks;

impl ChunkDecoder for OllamaChunks {
    fn decode(&self, payload: &Value) -> Chunk {
        if let Some(err) = payload.get("error").and_then(Value::as_str) {
            return Chunk::Failed(err.to_string());
        }
        let token = payload
            .pointer("/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if payload.get("done").and_then(Value::as_bool).unwrap_or(false) {
            Chunk::Done(Some(token).filter(|t| !t.is_empty()))
        } else {
            Chunk::Fragment(token)
        }
    }
}

/// OpenAI-compatible servers: `{"choices": [{"delta": {"content": ..}}]}`.
pub struct OpenAiChunks;

impl ChunkDecoder for OpenAiChunks {
    fn decode(&self, payload: &Value) -> Chunk {
        if let Some(err) = payload.pointer("/error/message").and_then(Value::as_str) {
            return Chunk::Failed(err.to_string());
        }
        match payload.pointer("/choices/0/delta/content").and_then(Value::as_str) {
            Some(token) => Chunk::Fragment(token.to_string()),
            None => Chunk::Skip,
        }
    }
}

/// Line-oriented decoder over a streaming response body.
///
/// Ends quietly when the producer closes early; an I/O error mid-stream is
/// yielded once and then the iterator is exhausted.
pub struct Fragments<R> {
    reader: R,
    decoder: Box<dyn ChunkDecoder>,
    finished: bool,
}

impl<R: BufRead> Fragments<R> {
    pub fn new(reader: R, decoder: Box<dyn ChunkDecoder>) -> Self {
        Self {
            reader,
            decoder,
            finished: false,
        }
    }
}

impl<R: BufRead> Iterator for Fragments<R> {
    type Item = Result<String, LlmError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();

        while !self.finished {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.finished = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.finished = true;
                    return Some(Err(LlmError::Stream(e.to_string())));
                }
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let payload = trimmed
                .strip_prefix("data:")
                .map(str::trim)
                .unwrap_or(trimmed);
            if payload == "[DONE]" {
                self.finished = true;
                return None;
            }

            let value: Value = match serde_json::from_str(payload) {
                Ok(v) => v,
                Err(_) => {
                    tracing::debug!("skipping undecodable stream line");
                    continue;
                }
            };

            match self.decoder.decode(&value) {
                Chunk::Fragment(token) if !token.is_empty() => return Some(Ok(token)),
                Chunk::Fragment(_) | Chunk::Skip => continue,
                Chunk::Done(last) => {
                    self.finished = true;
                    return last.map(Ok);
                }
                Chunk::Failed(message) => {
                    self.finished = true;
                    return Some(Err(LlmError::Stream(message)));
                }
            }
        }

        None
    }
}
