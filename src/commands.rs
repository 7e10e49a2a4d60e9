use crate::config::{get_config_path, write_default_config, Config};
use crate::context::build_context;
use crate::db::{get_db_path, SqliteStore};
use crate::error::TermiError;
use crate::executor::SystemShell;
use crate::gate::{Gate, GateSettings};
use crate::llm::{stream_with_retry, GenerationOptions, LlmClient, ModelBackend, StreamOutcome};
use crate::lookup::looks_like_executable;
use crate::parser::parse;
use crate::planner::{command_request, explanation_request, plan_request, ChatHistory, SystemInfo};
use crate::types::{ParsedResponse, ResponseKind};
use crate::ui::{Console, TerminalPrompter, Tone};
use anyhow::{Context, Result};
use std::{fs, io::Write};

const RECENT_HISTORY: usize = 20;
const SEARCH_RESULTS: usize = 10;

pub struct Session {
    pub config: Config,
    pub console: Console,
    pub client: LlmClient,
    pub store: SqliteStore,
    pub prompter: TerminalPrompter,
    pub shell: SystemShell,
    pub chat: ChatHistory,
    pub dry_run: bool,
}

impl Session {
    pub fn open(config: Config, dry_run: bool) -> Result<Self> {
        let db_path = get_db_path();
        let store = SqliteStore::open(&db_path, config.behavior.history_limit)
            .with_context(|| format!("opening history store {}", db_path.display()))?;

        Ok(Self {
            console: Console::new(&config.output.theme),
            client: LlmClient::new(&config.llm),
            shell: SystemShell::new(config.behavior.shell.clone()),
            prompter: TerminalPrompter,
            chat: ChatHistory::new(),
            store,
            config,
            dry_run,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.llm.model
    }

    fn options(&self) -> GenerationOptions {
        GenerationOptions::from(&self.config.llm)
    }

    fn system_info(&self) -> SystemInfo {
        SystemInfo::current(&self.config.behavior.shell)
    }

    fn with_gate<T>(
        &mut self,
        auto: bool,
        f: impl FnOnce(&mut Gate, &LlmClient) -> crate::error::Result<T>,
    ) -> Result<T> {
        let settings = GateSettings {
            safety: self.config.behavior.safety_confirm,
            dry_run: self.dry_run,
            auto,
        };
        let Session {
            config,
            console,
            client,
            store,
            prompter,
            shell,
            ..
        } = self;
        let mut gate = Gate::new(console, prompter, shell, store, &config.llm.model, settings);
        Ok(f(&mut gate, client)?)
    }
}

pub fn is_interrupt(err: &anyhow::Error) -> bool {
    err.downcast_ref::<TermiError>()
        .is_some_and(TermiError::is_interrupt)
}

pub fn cmd_query(session: &mut Session, query: &str) -> Result<i32> {
    let query = query.trim();
    if looks_like_executable(query) {
        let outcome = session.with_gate(false, |gate, _| gate.run_direct(query))?;
        return Ok(outcome.exit_code());
    }
    cmd_oneshot(session, query)
}

pub fn cmd_oneshot(session: &mut Session, query: &str) -> Result<i32> {
    let context = build_context(session.config.behavior.context_lines);
    let request = command_request(
        query,
        session.model(),
        session.options(),
        &session.system_info(),
        Some(context.as_str()),
    );
    let outcome = session.with_gate(false, |gate, client| {
        gate.execute_oneshot(client, &request, query)
    })?;
    Ok(outcome.exit_code())
}

pub fn cmd_plan(session: &mut Session, task: &str, auto: bool) -> Result<i32> {
    let request = plan_request(task, session.model(), session.options());
    let outcome = session.with_gate(auto, |gate, client| gate.execute_plan(client, &request, task))?;
    Ok(outcome.exit_code())
}

pub fn cmd_explain(session: &mut Session, text: &str) -> Result<()> {
    let request = explanation_request(text, session.model(), session.options(), &session.system_info());

    session.console.status("thinking...");
    let reply = session.client.generate(&request);
    session.console.clear_status();

    match reply.map(|raw| parse(&raw, ResponseKind::Explanation)) {
        Ok(ParsedResponse::Explanation(explanation)) => {
            session.console.blank();
            session.console.say(Tone::Header, "Explanation");
            session.console.line(&format!("  {}", explanation));
            session.console.blank();
        }
        Ok(_) => session.console.say(Tone::Warning, "The model returned no explanation."),
        Err(e) => {
            tracing::warn!("explain failed: {}", e);
            session.console.say(Tone::Warning, "LLM unavailable, cannot explain.");
        }
    }
    Ok(())
}

pub fn cmd_chat(session: &mut Session, message: &str) -> Result<()> {
    let request = session.chat.request(message, session.model(), session.options());

    let reply = if session.config.behavior.stream {
        let Session { client, console, .. } = &mut *session;
        let result = stream_with_retry(&*client, &request, |piece| console.fragment(piece));
        match result {
            Ok(StreamOutcome::Streamed(text)) => {
                console.blank();
                Ok(text)
            }
            Ok(StreamOutcome::Retried(text)) => {
                console.blank();
                console.line(&text);
                Ok(text)
            }
            Err(e) => Err(e),
        }
    } else {
        session.console.status("thinking...");
        let result = session.client.generate(&request);
        session.console.clear_status();
        if let Ok(text) = &result {
            session.console.line(text);
        }
        result
    };

    match reply {
        Ok(text) => session.chat.record(message, &text),
        Err(e) => {
            tracing::warn!("chat failed: {}", e);
            session.console.say(Tone::Warning, "LLM unavailable, no reply.");
        }
    }
    Ok(())
}

pub fn cmd_history(session: &mut Session, query: Option<&str>) -> Result<()> {
    let entries = match query {
        Some(q) => {
            let mut hits = session.store.search(q)?;
            hits.truncate(SEARCH_RESULTS);
            hits
        }
        None => session.store.recent(RECENT_HISTORY)?,
    };

    if entries.is_empty() {
        match query {
            Some(q) => session.console.say(Tone::Muted, &format!("No matches for '{}'", q)),
            None => session.console.say(Tone::Muted, "No history yet"),
        }
        return Ok(());
    }

    for entry in entries {
        let status = match entry.exit_code {
            Some(0) => "+".to_string(),
            Some(rc) => format!("x{}", rc),
            None => "-".to_string(),
        };
        let query: String = entry.query.chars().take(40).collect();
        session.console.line(&format!("{:>4} {}", status, query));
        session.console.say(Tone::Command, &format!("       {}", entry.command));
    }
    Ok(())
}

pub fn cmd_clear_history(session: &mut Session) -> Result<()> {
    session.store.clear()?;
    session.console.say(Tone::Success, "History cleared");
    Ok(())
}

pub fn cmd_bookmark(session: &mut Session, name: &str, command: Option<&str>) -> Result<()> {
    let command = match command.map(str::trim).filter(|c| !c.is_empty()) {
        Some(cmd) => cmd.to_string(),
        None => match session.store.last_command()? {
            Some(cmd) => cmd,
            None => {
                session.console.say(Tone::Muted, "No command to bookmark");
                return Ok(());
            }
        },
    };
    session.store.add_bookmark(name, &command, "")?;
    session
        .console
        .say(Tone::Success, &format!("Bookmarked '{}': {}", name, command));
    Ok(())
}

pub fn cmd_bookmarks(session: &mut Session) -> Result<()> {
    let bookmarks = session.store.bookmarks()?;
    if bookmarks.is_empty() {
        session.console.say(Tone::Muted, "No bookmarks");
        return Ok(());
    }
    for bm in bookmarks {
        session.console.line(&format!("  {}: {}", bm.name, bm.command));
    }
    Ok(())
}

pub fn cmd_unbookmark(session: &mut Session, name: &str) -> Result<()> {
    if session.store.remove_bookmark(name)? {
        session
            .console
            .say(Tone::Success, &format!("Removed bookmark '{}'", name));
    } else {
        session
            .console
            .say(Tone::Muted, &format!("Bookmark '{}' not found", name));
    }
    Ok(())
}

pub fn cmd_run_bookmark(session: &mut Session, name: &str) -> Result<Option<i32>> {
    let Some(bookmark) = session.store.bookmark(name)? else {
        return Ok(None);
    };
    let outcome = session.with_gate(false, |gate, _| gate.run_bookmark(&bookmark.name, &bookmark.command))?;
    Ok(Some(outcome.exit_code()))
}

pub fn cmd_context(session: &mut Session) -> Result<()> {
    let context = build_context(session.config.behavior.context_lines);
    session.console.say(Tone::Header, "Current context");
    session.console.line(&context);
    Ok(())
}

pub fn cmd_config(session: &mut Session) -> Result<()> {
    let rendered = toml::to_string_pretty(&session.config).context("rendering config")?;
    let info = session.system_info();

    session.console.say(Tone::Header, "Configuration");
    session.console.line(rendered.trim_end());
    session.console.blank();
    session.console.line(&format!("sys.os    = {}", info.os));
    session.console.line(&format!("sys.arch  = {}", info.arch));
    session.console.line(&format!("sys.shell = {}", info.shell));
    session.console.line(&format!("sys.cwd   = {}", info.cwd));
    session
        .console
        .say(Tone::Muted, &format!("file: {}", get_config_path().display()));
    Ok(())
}

pub fn cmd_models(session: &mut Session) -> Result<()> {
    match session.client.list_models() {
        Ok(models) if !models.is_empty() => {
            for m in models {
                let marker = if m == session.config.llm.model { " *" } else { "" };
                session.console.line(&format!("  {}{}", m, marker));
            }
        }
        Ok(_) => session.console.say(Tone::Muted, "No models found"),
        Err(e) => {
            tracing::warn!("listing models failed: {}", e);
            session
                .console
                .say(Tone::Muted, "No models found (is Ollama running?)");
        }
    }
    Ok(())
}

pub fn cmd_init_config(console: &mut Console) -> Result<()> {
    let path = write_default_config().context("writing default config")?;
    console.say(Tone::Success, &format!("Config written to {}", path.display()));
    Ok(())
}

pub fn cmd_doctor(session: &mut Session) -> Result<()> {
    println!("diagnostics:");
    println!();

    let backends = session.client.backends().to_vec();
    if backends.is_empty() {
        println!("  backends ... none configured");
    }
    for backend in &backends {
        print!("  {} ... ", backend.kind.name());
        std::io::stdout().flush().ok();
        if session.client.is_reachable(backend) {
            println!("ok");
        } else {
            println!("failed");
            println!("    url: {}", backend.url);
        }
    }

    print!("  model ({}) ... ", session.config.llm.model);
    std::io::stdout().flush().ok();
    let request = crate::llm::ChatRequest {
        model: session.config.llm.model.clone(),
        messages: vec![crate::types::Message::user("Say 'ok' and nothing else.")],
        options: session.options(),
    };
    match session.client.generate(&request) {
        Ok(_) => println!("ok"),
        Err(e) => {
            println!("failed");
            println!("    error: {}", e);
            println!("    try: ollama pull {}", session.config.llm.model);
        }
    }

    let config_path = get_config_path();
    print!("  config ... ");
    std::io::stdout().flush().ok();
    if config_path.exists() {
        println!("ok");
    } else {
        println!("using defaults");
        println!("    run: termi --init-config");
    }

    let db_path = get_db_path();
    print!("  history ... ");
    std::io::stdout().flush().ok();
    let size_kb = fs::metadata(&db_path).map(|m| m.len() / 1024).unwrap_or(0);
    println!("ok ({} entries, {} KB)", session.store.count()?, size_kb);
    println!("    path: {}", db_path.display());

    println!();
    Ok(())
}
