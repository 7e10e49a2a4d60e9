use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn git_branch() -> Option<String> {
    git(&["rev-parse", "--abbrev-ref", "HEAD"]).filter(|b| !b.is_empty())
}

pub fn git_status() -> Option<String> {
    git(&["status", "--porcelain", "--branch"]).map(|s| {
        if s.is_empty() {
            "(clean)".to_string()
        } else {
            s
        }
    })
}

pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return if unit == "B" {
                format!("{:.0}{}", size, unit)
            } else {
                format!("{:.1}{}", size, unit)
            };
        }
        size /= 1024.0;
    }
    format!("{:.1}PB", size)
}

struct Entry {
    name: String,
    is_dir: bool,
    size: Option<u64>,
}

pub fn directory_listing(dir: &Path, max_entries: usize) -> String {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(_) => return "  (cannot read directory)".to_string(),
    };

    let mut entries: Vec<Entry> = read
        .filter_map(|e| e.ok())
        .map(|e| {
            let meta = e.metadata().ok();
            let is_dir = meta.as_ref().map(|m| m.is_dir()).unwrap_or(false);
            Entry {
                name: e.file_name().to_string_lossy().to_string(),
                is_dir,
                size: meta.filter(|m| m.is_file()).map(|m| m.len()),
            }
        })
        .collect();

    if entries.is_empty() {
        return "  (empty directory)".to_string();
    }

    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    let mut lines: Vec<String> = entries
        .iter()
        .take(max_entries)
        .map(|e| {
            let marker = if e.is_dir { "d" } else { "f" };
            let size = match e.size {
                Some(0) | None => "-".to_string(),
                Some(n) => human_size(n),
            };
            format!("  [{}] {:<40} {}", marker, e.name, size)
        })
        .collect();

    if entries.len() > max_entries {
        lines.push(format!("  ... and {} more", entries.len() - max_entries));
    }
    lines.join("\n")
}

pub fn build_context(max_entries: usize) -> String {
    let cwd = std::env::current_dir().unwrap_or_else(|_| ".".into());
    let mut parts = vec![format!("CWD: {}", cwd.display())];

    if let Some(branch) = git_branch() {
        parts.push(format!("Git branch: {}", branch));
    }
    if let Some(status) = git_status() {
        parts.push(format!("Git status:\n{}", status));
    }
    parts.push(format!(
        "Directory listing:\n{}",
        directory_listing(&cwd, max_entries)
    ));

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(human_size(0), "0B");
        assert_eq!(human_size(512), "512B");
        assert_eq!(human_size(1536), "1.5KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0MB");
    }

    #[test]
    fn listing_puts_directories_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "hello").unwrap();
        fs::write(dir.path().join("A.txt"), "").unwrap();
        fs::create_dir(dir.path().join("zeta")).unwrap();

        let listing = directory_listing(dir.path(), 50);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("  [d] zeta"));
        assert!(lines[1].starts_with("  [f] A.txt"));
        assert!(lines[1].ends_with(" -"));
        assert!(lines[2].starts_with("  [f] b.txt"));
        assert!(lines[2].ends_with("5B"));
    }

    #[test]
    fn listing_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("f{i}")), "x").unwrap();
        }
        let listing = directory_listing(dir.path(), 2);
        assert_eq!(listing.lines().count(), 3);
        assert!(listing.ends_with("... and 3 more"));
    }

    #[test]
    fn empty_and_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(directory_listing(dir.path(), 10), "  (empty directory)");
        assert_eq!(
            directory_listing(&dir.path().join("missing"), 10),
            "  (cannot read directory)"
        );
    }
}
