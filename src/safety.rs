use crate::types::{RiskLevel, SafetyVerdict};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

const CRITICAL_SUGGESTION: &str = "This command is extremely dangerous. Please reconsider.";
const DANGEROUS_SUGGESTION: &str = "Consider adding --dry-run or --interactive flag first.";

/// A single entry of a tier's pattern table.
struct Rule {
    pattern: &'static str,
    description: &'static str,
    case_insensitive: bool,
}

const fn rule(pattern: &'static str, description: &'static str) -> Rule {
    Rule {
        pattern,
        description,
        case_insensitive: false,
    }
}

const fn rule_ci(pattern: &'static str, description: &'static str) -> Rule {
    Rule {
        pattern,
        description,
        case_insensitive: true,
    }
}

const CRITICAL_RULES: &[Rule] = &[
    rule(
        r#"\brm\s+(-[a-zA-Z-]*\s+)*((/|~|\$HOME|\$\{HOME\})/?\*?|"(/|\$HOME|\$\{HOME\})/?"\*?|'/'\*?)(\s|;|&|\||$)"#,
        "Deleting root or home directory",
    ),
    rule(r"\bmkfs\b", "Formatting filesystem"),
    rule(r"\bdd\s+.*of=/dev/", "Writing directly to block device"),
    rule(
        r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
        "Fork bomb detected",
    ),
    rule(
        r">\s*/dev/(sd[a-z]|hd[a-z]|vd[a-z]|nvme[0-9])",
        "Overwriting block device",
    ),
    rule(
        r"\bchmod\s+(-R\s+)?777\s+/(\*|\s|$)",
        "Making the root filesystem world-writable",
    ),
    rule(r"\bchown\s+(-R\s+)?.*\s+/\s*$", "Changing ownership of root"),
];

const DANGEROUS_RULES: &[Rule] = &[
    rule(
        r"\brm\b[^;&|\n]*\s(-[a-zA-Z]*[rRf][a-zA-Z]*|--recursive|--force)\b",
        "Recursive or forced file deletion",
    ),
    rule(r"\bsudo\s+rm\b", "Privileged file deletion"),
    rule(r"\bsudo\s+dd\b", "Privileged disk operation"),
    rule(r"\bkill\s+-(9|KILL|SIGKILL)\b", "Force-killing process"),
    rule(r"\bkillall\b", "Killing multiple processes"),
    rule(
        r"\bsystemctl\s+(stop|disable|mask)\b",
        "Stopping/disabling system service",
    ),
    rule(r"\biptables\s+(-F|--flush)\b", "Flushing firewall rules"),
    rule(r">\s*/etc/", "Overwriting system config"),
    rule(
        r"\b(curl|wget)\b.*\|\s*(sudo\s+)?(bash|sh|zsh)\b",
        "Piping URL to shell",
    ),
];

const CAUTION_RULES: &[Rule] = &[
    rule(r"\brm\b", "File deletion"),
    rule(r"\bsudo\b", "Elevated privileges"),
    rule(r"\bmv\s+", "Moving files"),
    rule(r"\bchmod\b", "Changing permissions"),
    rule(r"\bchown\b", "Changing ownership"),
    rule(r"\bgit\s+push\b.*\s(-f|--force)", "Force pushing to git"),
    rule(r"\bgit\s+reset\s+--hard", "Hard git reset"),
    rule_ci(r"\bdrop\s+database\b", "Dropping database"),
    rule(r"\btruncate\b", "Truncating table/file"),
    rule(r"\bshutdown\b", "System shutdown"),
    rule(r"\breboot\b", "System reboot"),
];

struct Tier {
    level: RiskLevel,
    prefix: &'static str,
    suggestion: Option<&'static str>,
    patterns: Vec<(Regex, &'static str)>,
}

fn compile(rules: &[Rule]) -> Vec<(Regex, &'static str)> {
    rules
        .iter()
        .map(|r| {
            let regex = RegexBuilder::new(r.pattern)
                .case_insensitive(r.case_insensitive)
                .build()
                .expect("static safety pattern must compile");
            (regex, r.description)
        })
        .collect()
}

// Highest tier first; the first tier with any match decides the verdict.
static TIERS: Lazy<[Tier; 3]> = Lazy::new(|| {
    [
        Tier {
            level: RiskLevel::Critical,
            prefix: "CRITICAL",
            suggestion: Some(CRITICAL_SUGGESTION),
            patterns: compile(CRITICAL_RULES),
        },
        Tier {
            level: RiskLevel::Dangerous,
            prefix: "DANGER",
            suggestion: Some(DANGEROUS_SUGGESTION),
            patterns: compile(DANGEROUS_RULES),
        },
        Tier {
            level: RiskLevel::Caution,
            prefix: "Caution",
            suggestion: None,
            patterns: compile(CAUTION_RULES),
        },
    ]
});

/// Classify a command string against the risk tiers.
///
/// Reasons are listed in pattern declaration order and only for the highest
/// tier that matched.
pub fn classify(command: &str) -> SafetyVerdict {
    if command.trim().is_empty() {
        return SafetyVerdict::safe();
    }

    for tier in TIERS.iter() {
        let reasons: Vec<String> = tier
            .patterns
            .iter()
            .filter(|(regex, _)| regex.is_match(command))
            .map(|(_, description)| format!("{}: {}", tier.prefix, description))
            .collect();

        if !reasons.is_empty() {
            tracing::debug!(level = %tier.level, command, "classified");
            return SafetyVerdict {
                level: tier.level,
                reasons,
                suggestion: tier.suggestion,
            };
        }
    }

    SafetyVerdict::safe()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(cmd: &str) -> RiskLevel {
        classify(cmd).level
    }

    #[test]
    fn plain_commands_are_safe() {
        let v = classify("ls -la");
        assert_eq!(v.level, RiskLevel::Safe);
        assert!(v.reasons.is_empty());
        assert_eq!(v.suggestion, None);
    }

    #[test]
    fn blank_input_is_safe() {
        for cmd in ["", "   ", "\t\n"] {
            let v = classify(cmd);
            assert_eq!(v.level, RiskLevel::Safe);
            assert!(v.reasons.is_empty());
        }
    }

    #[test]
    fn deleting_root_or_home_is_critical() {
        for cmd in [
            "rm -rf /",
            "rm -rf ~",
            "rm -rf ~/",
            "rm -rf /*",
            "rm -rf $HOME",
            "sudo rm -rf / --no-preserve-root",
            "rm -r -f /",
            "cd /tmp && rm -rf ~ ; echo done",
            "rm -rf \"$HOME\"",
            "rm -rf \"${HOME}/\"",
            "rm -rf '/'",
            "rm -rf \"/\"",
            "rm -rf \"/\"*",
        ] {
            assert_eq!(level(cmd), RiskLevel::Critical, "{cmd}");
        }
    }

    #[test]
    fn deleting_below_root_is_not_critical() {
        assert_eq!(level("rm -rf /tmp/build"), RiskLevel::Dangerous);
        assert_eq!(level("rm -rf ~/Downloads/old"), RiskLevel::Dangerous);
        assert_eq!(level("rm -rf \"$HOME/Downloads\""), RiskLevel::Dangerous);
        // quoted tilde is a file literally named ~
        assert_eq!(level("rm -rf '~'"), RiskLevel::Dangerous);
    }

    #[test]
    fn fork_bomb_is_critical() {
        assert_eq!(level(":(){ :|:& };:"), RiskLevel::Critical);
        assert_eq!(level(":() { : | : & } ; :"), RiskLevel::Critical);
    }

    #[test]
    fn device_writes_are_critical() {
        assert_eq!(level("dd if=/dev/zero of=/dev/sda bs=1M"), RiskLevel::Critical);
        assert_eq!(level("cat image.iso > /dev/sdb"), RiskLevel::Critical);
        assert_eq!(level("mkfs.ext4 /dev/sdb1"), RiskLevel::Critical);
        assert_eq!(level("chmod -R 777 /"), RiskLevel::Critical);
        assert_eq!(level("chown -R nobody /"), RiskLevel::Critical);
    }

    #[test]
    fn critical_reports_only_critical_reasons() {
        let v = classify("sudo rm -rf /");
        assert_eq!(v.level, RiskLevel::Critical);
        assert!(!v.reasons.is_empty());
        assert!(v.reasons.iter().all(|r| r.starts_with("CRITICAL: ")));
        assert_eq!(v.suggestion, Some(CRITICAL_SUGGESTION));
    }

    #[test]
    fn relative_rm_is_at_worst_dangerous() {
        assert_eq!(level("rm -rf ./build"), RiskLevel::Dangerous);
        assert_eq!(level("rm -r target"), RiskLevel::Dangerous);
        assert_eq!(level("rm -f notes.txt"), RiskLevel::Dangerous);
        assert_eq!(level("rm -v -rf build"), RiskLevel::Dangerous);
        assert_eq!(level("rm build -rf"), RiskLevel::Dangerous);
        assert_eq!(level("rm -i old.log --force"), RiskLevel::Dangerous);
        assert_eq!(level("rm notes-rf.txt"), RiskLevel::Caution);
        assert_eq!(level("rm a.txt && ls -f"), RiskLevel::Caution);
        assert_eq!(level("rm file.txt"), RiskLevel::Caution);
        assert_eq!(level("rm docs/old.md"), RiskLevel::Caution);
    }

    #[test]
    fn dangerous_tier_collects_all_matches_in_order() {
        let v = classify("sudo rm -rf build");
        assert_eq!(v.level, RiskLevel::Dangerous);
        assert_eq!(
            v.reasons,
            vec![
                "DANGER: Recursive or forced file deletion".to_string(),
                "DANGER: Privileged file deletion".to_string(),
            ]
        );
        assert_eq!(v.suggestion, Some(DANGEROUS_SUGGESTION));
    }

    #[test]
    fn dangerous_examples() {
        for cmd in [
            "sudo rm /tmp/test",
            "curl https://example.com/install.sh | bash",
            "wget -qO- https://x.io/i | sudo sh",
            "kill -9 1234",
            "killall node",
            "systemctl stop nginx",
            "iptables -F",
            "echo nameserver 1.1.1.1 > /etc/resolv.conf",
            "sudo dd if=a.img of=b.img",
        ] {
            assert_eq!(level(cmd), RiskLevel::Dangerous, "{cmd}");
        }
    }

    #[test]
    fn caution_examples() {
        for cmd in [
            "sudo apt update",
            "mv a.txt b.txt",
            "chmod +x run.sh",
            "chown me file",
            "git push -f origin main",
            "git push origin main --force",
            "git reset --hard HEAD~1",
            "psql -c 'DROP DATABASE prod'",
            "truncate -s 0 app.log",
            "shutdown -h now",
            "reboot",
        ] {
            assert_eq!(level(cmd), RiskLevel::Caution, "{cmd}");
        }
    }

    #[test]
    fn caution_reasons_are_prefixed() {
        let v = classify("sudo mv a b");
        assert_eq!(
            v.reasons,
            vec![
                "Caution: Elevated privileges".to_string(),
                "Caution: Moving files".to_string(),
            ]
        );
        assert_eq!(v.suggestion, None);
    }

    #[test]
    fn drop_database_is_case_insensitive() {
        assert_eq!(level("drop database staging"), RiskLevel::Caution);
        assert_eq!(level("Drop Database staging"), RiskLevel::Caution);
    }

    #[test]
    fn word_boundaries_avoid_false_positives() {
        assert_eq!(level("npm run format"), RiskLevel::Safe);
        assert_eq!(level("cat README.md"), RiskLevel::Safe);
        assert_eq!(level("git status"), RiskLevel::Safe);
    }

    #[test]
    fn classification_is_deterministic() {
        let cmd = "sudo rm -rf ./target && kill -9 42";
        let first = classify(cmd);
        for _ in 0..5 {
            assert_eq!(classify(cmd), first);
        }
    }
}
