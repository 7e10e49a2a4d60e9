use crate::commands::{
    cmd_bookmark, cmd_bookmarks, cmd_chat, cmd_clear_history, cmd_config, cmd_context,
    cmd_explain, cmd_history, cmd_models, cmd_plan, cmd_query, cmd_run_bookmark, cmd_unbookmark,
    is_interrupt, Session,
};
use crate::config::get_prompt_history_path;
use crate::signal::INTERRUPTS;
use crate::ui::{Tone, THEMES};
use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs;

const PROMPT: &str = "termi> ";

const HELP: &[(&str, &str)] = &[
    (":help", "Show this help"),
    (":quit", "Exit interactive mode"),
    (":model <name>", "Switch LLM model"),
    (":models", "List available models"),
    (":theme <name>", "Switch theme (monokai, dracula, minimal)"),
    (":explain <cmd>", "Explain a command"),
    (":chat <msg>", "General chat (multi-turn)"),
    (":plan <task>", "Multi-step plan with confirmation"),
    (":plan-auto <task>", "Auto-run a planned sequence"),
    (":history", "Show recent commands"),
    (":history <query>", "Search history"),
    (":clear", "Clear history"),
    (":bookmark <n> [cmd]", "Bookmark a command (default: the last one)"),
    (":bookmarks", "List bookmarks"),
    (":unbookmark <n>", "Remove bookmark"),
    (":context", "Show current context (cwd, git, etc.)"),
    (":config", "Show configuration"),
    (":safety", "Toggle safety checks"),
    (":version", "Show version"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Quit,
    Help,
    Version,
    Model(Option<&'a str>),
    Models,
    Theme(Option<&'a str>),
    Safety,
    Explain(Option<&'a str>),
    Chat(Option<&'a str>),
    Plan { task: Option<&'a str>, auto: bool },
    History(Option<&'a str>),
    Clear,
    Bookmark { name: &'a str, command: Option<&'a str> },
    Bookmarks,
    Unbookmark(Option<&'a str>),
    Context,
    Config,
    /// Anything else: a bookmark name, a command, or a request.
    Text(&'a str),
}

fn split_word(text: &str) -> (&str, Option<&str>) {
    match text.split_once(char::is_whitespace) {
        Some((head, rest)) => {
            let rest = rest.trim();
            (head, if rest.is_empty() { None } else { Some(rest) })
        }
        None => (text, None),
    }
}

pub fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if !line.starts_with(':') {
        return Input::Text(line);
    }

    let (head, arg) = split_word(line);
    match head {
        ":q" | ":quit" | ":exit" => Input::Quit,
        ":h" | ":help" => Input::Help,
        ":v" | ":version" => Input::Version,
        ":model" => Input::Model(arg),
        ":models" => Input::Models,
        ":theme" => Input::Theme(arg),
        ":safety" => Input::Safety,
        ":explain" => Input::Explain(arg),
        ":chat" => Input::Chat(arg),
        ":plan" => Input::Plan { task: arg, auto: false },
        ":plan-auto" => Input::Plan { task: arg, auto: true },
        ":history" => Input::History(arg),
        ":clear" => Input::Clear,
        ":bookmark" => match arg.map(split_word) {
            Some((name, command)) => Input::Bookmark { name, command },
            None => Input::Text(line),
        },
        ":bookmarks" => Input::Bookmarks,
        ":unbookmark" => Input::Unbookmark(arg),
        ":context" => Input::Context,
        ":config" => Input::Config,
        _ => Input::Text(line),
    }
}

enum Flow {
    Continue,
    Quit,
}

fn usage(session: &mut Session, text: &str) {
    session.console.say(Tone::Muted, &format!("usage: {}", text));
}

fn show_help(session: &mut Session) {
    session.console.say(Tone::Header, "Termi commands");
    for (cmd, what) in HELP {
        session.console.line(&format!("  {:<22} {}", cmd, what));
    }
    session.console.blank();
    session.console.say(
        Tone::Muted,
        "Or type natural language to get a command, or a command to run it directly.",
    );
}

fn dispatch(session: &mut Session, line: &str) -> Result<Flow> {
    match parse_input(line) {
        Input::Quit => return Ok(Flow::Quit),
        Input::Help => show_help(session),
        Input::Version => session
            .console
            .line(&format!("termi {}", env!("CARGO_PKG_VERSION"))),
        Input::Model(Some(name)) => {
            session.config.llm.model = name.to_string();
            session
                .console
                .say(Tone::Success, &format!("Model set to {}", name));
        }
        Input::Model(None) => {
            let current = format!("Current model: {}", session.config.llm.model);
            session.console.line(&current);
        }
        Input::Models => cmd_models(session)?,
        Input::Theme(Some(name)) => {
            if session.console.set_theme(name) {
                session.config.output.theme = session.console.theme_name().to_string();
                session
                    .console
                    .say(Tone::Success, &format!("Theme set to {}", session.console.theme_name()));
            } else {
                session
                    .console
                    .say(Tone::Warning, &format!("Unknown theme '{}'", name));
            }
        }
        Input::Theme(None) => {
            let current = format!("Current theme: {}", session.console.theme_name());
            session.console.line(&current);
            session
                .console
                .line(&format!("Available: {}", THEMES.join(", ")));
        }
        Input::Safety => {
            let behavior = &mut session.config.behavior;
            behavior.safety_confirm = !behavior.safety_confirm;
            let state = if behavior.safety_confirm { "ON" } else { "OFF" };
            session
                .console
                .say(Tone::Info, &format!("Safety checks: {}", state));
        }
        Input::Explain(Some(cmd)) => cmd_explain(session, cmd)?,
        Input::Explain(None) => usage(session, ":explain <cmd>"),
        Input::Chat(Some(msg)) => cmd_chat(session, msg)?,
        Input::Chat(None) => usage(session, ":chat <msg>"),
        Input::Plan { task: Some(task), auto } => {
            cmd_plan(session, task, auto)?;
        }
        Input::Plan { task: None, auto } => {
            usage(session, if auto { ":plan-auto <task>" } else { ":plan <task>" })
        }
        Input::History(query) => cmd_history(session, query)?,
        Input::Clear => cmd_clear_history(session)?,
        Input::Bookmark { name, command } => cmd_bookmark(session, name, command)?,
        Input::Bookmarks => cmd_bookmarks(session)?,
        Input::Unbookmark(Some(name)) => cmd_unbookmark(session, name)?,
        Input::Unbookmark(None) => usage(session, ":unbookmark <name>"),
        Input::Context => cmd_context(session)?,
        Input::Config => cmd_config(session)?,
        Input::Text(text) => {
            let name = text.trim_start_matches(':');
            if cmd_run_bookmark(session, name)?.is_some() {
                return Ok(Flow::Continue);
            }
            if text.starts_with(':') {
                session
                    .console
                    .say(Tone::Warning, &format!("Unknown command {} (try :help)", text));
                return Ok(Flow::Continue);
            }
            cmd_query(session, text)?;
        }
    }
    Ok(Flow::Continue)
}

fn banner(session: &mut Session) {
    let title = format!("Termi v{} | local LLM copilot", env!("CARGO_PKG_VERSION"));
    session.console.say(Tone::Header, &title);
    let model = format!("Model: {} | Type :help for commands", session.config.llm.model);
    session.console.say(Tone::Info, &model);
}

pub fn run(session: &mut Session) -> Result<()> {
    let mut editor = DefaultEditor::new().context("starting line editor")?;
    let history_path = get_prompt_history_path();
    if editor.load_history(&history_path).is_err() {
        tracing::debug!("no prompt history at {}", history_path.display());
    }

    banner(session);

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("reading input"),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        editor.add_history_entry(line).ok();
        // a Ctrl-C left over from the previous request
        INTERRUPTS.take();

        match dispatch(session, line) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) if is_interrupt(&e) => session.console.say(Tone::Muted, "Interrupted"),
            Err(e) => session.console.say(Tone::Error, &format!("error: {:#}", e)),
        }
    }

    if let Some(parent) = history_path.parent() {
        fs::create_dir_all(parent).ok();
    }
    if let Err(e) = editor.save_history(&history_path) {
        tracing::warn!("could not save prompt history: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_text() {
        assert_eq!(parse_input("  list files "), Input::Text("list files"));
    }

    #[test]
    fn meta_commands() {
        assert_eq!(parse_input(":q"), Input::Quit);
        assert_eq!(parse_input(":exit"), Input::Quit);
        assert_eq!(parse_input(":model"), Input::Model(None));
        assert_eq!(parse_input(":model  llama3 "), Input::Model(Some("llama3")));
        assert_eq!(parse_input(":explain tar -xzf a.tgz"), Input::Explain(Some("tar -xzf a.tgz")));
        assert_eq!(
            parse_input(":plan-auto set up venv"),
            Input::Plan { task: Some("set up venv"), auto: true }
        );
        assert_eq!(parse_input(":plan"), Input::Plan { task: None, auto: false });
        assert_eq!(parse_input(":history git"), Input::History(Some("git")));
    }

    #[test]
    fn bookmark_arguments() {
        assert_eq!(
            parse_input(":bookmark logs tail -f /var/log/syslog"),
            Input::Bookmark { name: "logs", command: Some("tail -f /var/log/syslog") }
        );
        assert_eq!(
            parse_input(":bookmark logs"),
            Input::Bookmark { name: "logs", command: None }
        );
        assert_eq!(parse_input(":bookmark"), Input::Text(":bookmark"));
        assert_eq!(parse_input(":bookmarks"), Input::Bookmarks);
    }

    #[test]
    fn unknown_meta_falls_through() {
        assert_eq!(parse_input(":logs"), Input::Text(":logs"));
    }
}
