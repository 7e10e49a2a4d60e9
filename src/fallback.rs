use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_COMMAND: &str = "ls -la";

const DEFAULT_TOP: u32 = 20;
const DEFAULT_THRESHOLD: &str = "+100M";

static TOP_N: Lazy<Regex> = Lazy::new(|| Regex::new(r"top\s+(\d+)").expect("top-n pattern"));
static SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(mb|gb|m|g)\b").expect("size pattern"));
static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)"|'([^']+)'"#).expect("quoted pattern"));
static FILE_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(\w+)$").expect("extension pattern"));
static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"name\s+([\w\-\.]+)").expect("name pattern"));

pub struct Request<'a> {
    original: &'a str,
    lower: String,
}

impl<'a> Request<'a> {
    pub fn new(text: &'a str) -> Self {
        let original = text.trim();
        Self {
            original,
            lower: original.to_lowercase(),
        }
    }

    fn has(&self, needle: &str) -> bool {
        self.lower.contains(needle)
    }

    fn any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.lower.contains(n))
    }

    // Whole words only, so "zip" does not fire inside "unzip".
    fn any_word(&self, words: &[&str]) -> bool {
        self.lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|w| words.contains(&w))
    }

    fn top_n(&self) -> u32 {
        TOP_N
            .captures(&self.lower)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(DEFAULT_TOP)
    }

    fn size_threshold(&self) -> String {
        let Some(caps) = SIZE.captures(&self.lower) else {
            return DEFAULT_THRESHOLD.to_string();
        };
        let Ok(qty) = caps[1].parse::<u64>() else {
            return DEFAULT_THRESHOLD.to_string();
        };
        match &caps[2] {
            "m" | "mb" => format!("+{qty}M"),
            "g" | "gb" => format!("+{qty}G"),
            _ => DEFAULT_THRESHOLD.to_string(),
        }
    }

    // Taken from the original text so search terms keep their case.
    fn quoted_term(&self) -> Option<&'a str> {
        let caps = QUOTED.captures(self.original)?;
        caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
    }
}

/// One entry of the fallback table: first rule whose trigger holds wins.
pub struct Rule {
    pub name: &'static str,
    trigger: fn(&Request) -> bool,
    build: fn(&Request) -> String,
}

fn quote(value: &str) -> String {
    shell_words::quote(value).into_owned()
}

fn fixed(cmd: &str) -> String {
    cmd.to_string()
}

pub static RULES: &[Rule] = &[
    Rule {
        name: "large-files",
        trigger: |r| r.any(&["large", "largest", "big", "biggest", "huge"]) && r.has("file"),
        build: |r| {
            format!(
                "find . -type f -size {} -print0 | xargs -0 ls -lh | sort -k5 -h | tail -n {}",
                r.size_threshold(),
                r.top_n()
            )
        },
    },
    Rule {
        name: "free-space",
        trigger: |r| r.any(&["free space", "how much space"]),
        build: |_| fixed("df -h"),
    },
    Rule {
        name: "disk-usage",
        trigger: |r| (r.has("disk") && r.has("usage")) || (r.has("space") && r.has("used")),
        build: |_| fixed("du -sh * | sort -rh"),
    },
    Rule {
        name: "text-search",
        trigger: |r| r.any(&["search", "find"]) && r.any(&["text", "string", " for "]),
        build: |r| match r.quoted_term() {
            Some(term) => format!("grep -RIn {} .", quote(term)),
            None => fixed("grep -RIn ."),
        },
    },
    Rule {
        name: "find-files",
        trigger: |r| r.has("find") && r.any(&["file", "name"]),
        build: |r| {
            if let Some(caps) = FILE_EXT.captures(&r.lower) {
                return format!("find . -type f -iname {}", quote(&format!("*.{}", &caps[1])));
            }
            if let Some(caps) = NAME.captures(&r.lower) {
                return format!("find . -type f -iname {}", quote(&caps[1]));
            }
            fixed("find . -maxdepth 3 -type f -print")
        },
    },
    Rule {
        name: "processes",
        trigger: |r| r.any(&["process", "running apps"]),
        build: |_| fixed("ps aux | head -30"),
    },
    Rule {
        name: "listening-ports",
        trigger: |r| r.has("open ports") || (r.has("ports") && r.has("listen")),
        build: |_| fixed("lsof -i -P | grep LISTEN"),
    },
    Rule {
        name: "ip-address",
        trigger: |r| r.any(&["ip address", "my ip"]),
        build: |_| {
            fixed("ipconfig getifaddr en0 2>/dev/null || hostname -I 2>/dev/null || curl -s ifconfig.me")
        },
    },
    Rule {
        name: "system-info",
        trigger: |r| r.any(&["system info", "os version"]),
        build: |_| {
            fixed("uname -a && (sw_vers 2>/dev/null || cat /etc/os-release 2>/dev/null || echo 'Unknown OS')")
        },
    },
    Rule {
        name: "git-status",
        trigger: |r| r.has("git status"),
        build: |_| fixed("git status"),
    },
    Rule {
        name: "git-pull",
        trigger: |r| r.has("pull") && r.has("git"),
        build: |_| fixed("git pull --ff-only"),
    },
    Rule {
        name: "git-branches",
        trigger: |r| r.has("show branches") || (r.has("git") && r.has("branch")),
        build: |_| fixed("git branch -vv"),
    },
    Rule {
        name: "git-log",
        trigger: |r| r.any(&["git log", "commit history"]),
        build: |_| fixed("git log --oneline -20"),
    },
    Rule {
        name: "list-directory",
        trigger: |r| r.any(&["list", "show"]) && r.any(&["files", "dir", "directory"]),
        build: |_| fixed("ls -la"),
    },
    Rule {
        name: "cpu-usage",
        trigger: |r| r.has("cpu") && r.any(&["usage", "load"]),
        build: |_| fixed("top -l 1 -n 0 2>/dev/null || uptime"),
    },
    Rule {
        name: "memory-usage",
        trigger: |r| r.any(&["memory", "ram"]),
        build: |_| fixed("free -h 2>/dev/null || vm_stat 2>/dev/null || echo 'Use Activity Monitor'"),
    },
    Rule {
        name: "network-interfaces",
        trigger: |r| r.has("network") && r.any(&["connection", "interface"]),
        build: |_| fixed("ifconfig 2>/dev/null || ip addr show"),
    },
    Rule {
        name: "docker-containers",
        trigger: |r| r.has("docker") && r.any(&["container", "running"]),
        build: |_| fixed("docker ps"),
    },
    Rule {
        name: "env-vars",
        trigger: |r| r.has("env") && r.any(&["variable", "var"]),
        build: |_| fixed("env | sort | head -50"),
    },
    Rule {
        name: "count-files",
        trigger: |r| r.has("count") && r.any(&["file", "lines"]),
        build: |_| fixed("find . -type f | wc -l"),
    },
    // Ahead of compress: "unzip a.zip" also holds the word "zip".
    Rule {
        name: "extract",
        trigger: |r| r.has("extract") || r.any_word(&["unzip", "untar"]),
        build: |_| fixed("tar -xzvf archive.tar.gz"),
    },
    Rule {
        name: "compress",
        trigger: |r| r.has("compress") || r.any_word(&["zip", "tar"]),
        build: |_| fixed("tar -czvf archive.tar.gz ."),
    },
];

fn matching(request: &Request) -> Option<&'static Rule> {
    RULES.iter().find(|rule| (rule.trigger)(request))
}

/// Best-guess shell command for a request, without a model.
pub fn fallback(text: &str) -> String {
    let request = Request::new(text);
    match matching(&request) {
        Some(rule) => {
            tracing::debug!(rule = rule.name, "heuristic fallback matched");
            (rule.build)(&request)
        }
        None => DEFAULT_COMMAND.to_string(),
    }
}

#[cfg(test)]
fn rule_name(text: &str) -> Option<&'static str> {
    matching(&Request::new(text)).map(|rule| rule.name)
}
