use crate::llm::{ChatRequest, GenerationOptions};
use crate::types::Message;
use std::env;

const CHAT_WINDOW: usize = 10;
const CHAT_KEEP: usize = 20;

const CHAT_PROMPT: &str = "You are Termi, a concise terminal copilot. Answer the user's question plainly. \
If they ask about commands, include a short example.";

const PLAN_PROMPT: &str = r#"You are Termi, a terminal copilot that plans multi-step tasks using shell commands. Given a high-level task, produce a short JSON plan. Each step has 'thought' and 'cmd'. Output STRICT JSON: {"plan": [{"thought": str, "cmd": str}, ...], "notes": str}. No code fences."#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub shell: String,
    pub cwd: String,
}

impl SystemInfo {
    pub fn current(shell: &str) -> Self {
        Self {
            os: env::consts::OS.to_string(),
            arch: env::consts::ARCH.to_string(),
            shell: shell.to_string(),
            cwd: env::current_dir()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| ".".to_string()),
        }
    }
}

fn build_system_prompt(info: &SystemInfo) -> String {
    format!(
        r#"You are Termi, a terminal copilot. Convert the user's natural-language request into ONE safe shell command.

System: {os} {arch} | Shell: {shell} | CWD: {cwd}

Output FORMAT (STRICT):
- Return a single-line JSON object, nothing else.
- For commands: {{"cmd": "<command>"}}
- For explanations: {{"explanation": "<2-3 sentences>"}}
- No code fences, no backticks, no extra keys.

Safety rules:
- Never output commands that delete the home directory or root filesystem.
- For destructive operations (rm -rf, mkfs, dd), add a confirmation flag or --dry-run when possible.
- Prefer non-destructive alternatives when the intent is ambiguous.

Examples:
User: list files
Assistant: {{"cmd": "ls -la"}}

User: show disk usage by folder
Assistant: {{"cmd": "du -sh * | sort -rh | head -20"}}

User: explain `find . -type f -size +100M`
Assistant: {{"explanation": "Searches the current directory recursively for regular files larger than 100 MB."}}
"#,
        os = info.os,
        arch = info.arch,
        shell = info.shell,
        cwd = info.cwd
    )
}

fn request(model: &str, options: GenerationOptions, messages: Vec<Message>) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages,
        options,
    }
}

pub fn command_request(
    query: &str,
    model: &str,
    options: GenerationOptions,
    info: &SystemInfo,
    context: Option<&str>,
) -> ChatRequest {
    let mut system = build_system_prompt(info);
    if let Some(ctx) = context.filter(|c| !c.trim().is_empty()) {
        system.push_str("\n\nAdditional context:\n");
        system.push_str(ctx);
    }
    request(
        model,
        options,
        vec![Message::system(system), Message::user(query.trim())],
    )
}

pub fn explanation_request(
    command: &str,
    model: &str,
    options: GenerationOptions,
    info: &SystemInfo,
) -> ChatRequest {
    let ask = format!(
        "Explain this command: {}\n\n(Return explanation only, no command.)",
        command.trim()
    );
    request(
        model,
        options,
        vec![Message::system(build_system_prompt(info)), Message::user(ask)],
    )
}

pub fn plan_request(task: &str, model: &str, options: GenerationOptions) -> ChatRequest {
    request(
        model,
        options,
        vec![Message::system(PLAN_PROMPT), Message::user(task.trim())],
    )
}

#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    messages: Vec<Message>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, message: &str, model: &str, options: GenerationOptions) -> ChatRequest {
        let start = self.messages.len().saturating_sub(CHAT_WINDOW);
        let mut messages = Vec::with_capacity(CHAT_WINDOW + 2);
        messages.push(Message::system(CHAT_PROMPT));
        messages.extend(self.messages[start..].iter().cloned());
        messages.push(Message::user(message.trim()));
        request(model, options, messages)
    }

    pub fn record(&mut self, message: &str, reply: &str) {
        self.messages.push(Message::user(message));
        self.messages.push(Message::assistant(reply));
        if self.messages.len() > CHAT_KEEP {
            let excess = self.messages.len() - CHAT_KEEP;
            self.messages.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn info() -> SystemInfo {
        SystemInfo {
            os: "linux".into(),
            arch: "x86_64".into(),
            shell: "/bin/zsh".into(),
            cwd: "/tmp/work".into(),
        }
    }

    #[test]
    fn command_prompt_carries_host_facts() {
        let req = command_request("  list files ", "gemma2:2b", GenerationOptions::default(), &info(), None);
        assert_eq!(req.model, "gemma2:2b");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert!(req.messages[0]
            .content
            .contains("System: linux x86_64 | Shell: /bin/zsh | CWD: /tmp/work"));
        assert!(req.messages[0].content.contains(r#"{"cmd": "ls -la"}"#));
        assert_eq!(req.messages[1].content, "list files");
    }

    #[test]
    fn context_is_appended_when_present() {
        let req = command_request("x", "m", GenerationOptions::default(), &info(), Some("CWD: /tmp"));
        assert!(req.messages[0].content.ends_with("Additional context:\nCWD: /tmp"));

        let req = command_request("x", "m", GenerationOptions::default(), &info(), Some("  "));
        assert!(!req.messages[0].content.contains("Additional context"));
    }

    #[test]
    fn explanation_asks_for_prose() {
        let req = explanation_request("tar -xzf a.tgz", "m", GenerationOptions::default(), &info());
        assert!(req.messages[1].content.starts_with("Explain this command: tar -xzf a.tgz"));
    }

    #[test]
    fn plan_prompt_describes_the_shape() {
        let req = plan_request("set up a venv", "m", GenerationOptions::default());
        assert!(req.messages[0].content.contains(r#"{"plan": [{"thought": str, "cmd": str}, ...], "notes": str}"#));
    }

    #[test]
    fn chat_sends_last_ten_and_keeps_twenty() {
        let mut history = ChatHistory::new();
        for i in 0..15 {
            history.record(&format!("q{i}"), &format!("a{i}"));
        }
        assert_eq!(history.messages.len(), 20);

        let req = history.request("next", "m", GenerationOptions::default());
        // system + 10 history + user
        assert_eq!(req.messages.len(), 12);
        assert_eq!(req.messages[1].content, "q10");
        assert_eq!(req.messages[10].content, "a14");
        assert_eq!(req.messages[11].content, "next");
    }
}
