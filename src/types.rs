use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Caution,
    Dangerous,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Caution => "caution",
            RiskLevel::Dangerous => "dangerous",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub level: RiskLevel,
    pub reasons: Vec<String>,
    pub suggestion: Option<&'static str>,
}

impl SafetyVerdict {
    pub fn safe() -> Self {
        Self {
            level: RiskLevel::Safe,
            reasons: Vec::new(),
            suggestion: None,
        }
    }

    pub fn is_safe(&self) -> bool {
        self.level == RiskLevel::Safe
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Command,
    Explanation,
    Plan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub thought: String,
    pub cmd: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    Command(String),
    Explanation(String),
    Plan { steps: Vec<Step>, notes: Option<String> },
    Empty,
}

impl ParsedResponse {
    pub fn is_empty(&self) -> bool {
        matches!(self, ParsedResponse::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Oneshot,
    DryRun,
    Plan,
    Direct,
    Bookmark,
    Skipped,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Oneshot => "oneshot",
            RunMode::DryRun => "dry-run",
            RunMode::Plan => "plan",
            RunMode::Direct => "direct",
            RunMode::Bookmark => "bookmark",
            RunMode::Skipped => "skipped",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: i64,
    pub query: String,
    pub command: String,
    pub mode: String,
    pub model: String,
    pub exit_code: Option<i32>,
    pub cwd: String,
}

impl HistoryEntry {
    pub fn new(query: &str, command: &str, mode: RunMode, model: &str, exit_code: Option<i32>) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        let cwd = std::env::current_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            timestamp,
            query: query.to_string(),
            command: command.to_string(),
            mode: mode.as_str().to_string(),
            model: model.to_string(),
            exit_code,
            cwd,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub name: String,
    pub command: String,
    pub description: String,
    pub created: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_levels_are_totally_ordered() {
        assert!(RiskLevel::Safe < RiskLevel::Caution);
        assert!(RiskLevel::Caution < RiskLevel::Dangerous);
        assert!(RiskLevel::Dangerous < RiskLevel::Critical);
        assert_eq!(
            [RiskLevel::Caution, RiskLevel::Critical, RiskLevel::Safe]
                .into_iter()
                .max(),
            Some(RiskLevel::Critical)
        );
    }

    #[test]
    fn message_roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::system("hi")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"hi"}"#);
    }
}
