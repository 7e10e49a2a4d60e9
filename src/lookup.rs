/// True when the first shell word of `text` resolves to an executable on PATH.
///
/// Text that cannot be split into shell words (e.g. an unmatched quote) is
/// treated as natural language.
pub fn looks_like_executable(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }

    let words = match shell_words::split(text) {
        Ok(words) => words,
        Err(_) => return false,
    };

    match words.first() {
        Some(first) if !first.is_empty() => which::which(first).is_ok(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_not_a_command() {
        assert!(!looks_like_executable(""));
        assert!(!looks_like_executable("   "));
    }

    #[test]
    fn unmatched_quote_fails_closed() {
        assert!(!looks_like_executable("sh -c 'echo hi"));
    }

    #[test]
    fn shell_on_path_is_a_command() {
        assert!(looks_like_executable("sh -c 'echo hi'"));
    }

    #[test]
    fn prose_is_not_a_command() {
        assert!(!looks_like_executable("definitely-not-a-real-binary-xyz list my files"));
    }
}
