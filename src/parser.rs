use crate::types::{ParsedResponse, ResponseKind, Step};
use serde_json::Value;

/// Turn raw model output into a structured response.
///
/// Never fails: structured JSON is preferred, then a JSON object embedded in
/// surrounding chatter, then the first plain line of text, then `Empty`.
pub fn parse(raw: &str, kind: ResponseKind) -> ParsedResponse {
    let text = strip_fences(raw);
    if text.is_empty() {
        return ParsedResponse::Empty;
    }

    if let Some(parsed) = parse_json(&text, kind) {
        return parsed;
    }

    if let Some(inner) = embedded_object(&text) {
        if let Some(parsed) = parse_json(inner, kind) {
            return parsed;
        }
    }

    recover_raw(&text, kind)
}

fn strip_fences(raw: &str) -> String {
    let t = raw.trim();

    if t.starts_with("```") && t.contains('\n') {
        let lines: Vec<&str> = t.lines().collect();
        let body: Vec<&str> = if lines.len() > 2 {
            let end = if lines[lines.len() - 1].trim_start().starts_with("```") {
                lines.len() - 1
            } else {
                lines.len()
            };
            lines[1..end].to_vec()
        } else {
            lines
                .into_iter()
                .filter(|l| !l.trim_start().starts_with("```"))
                .collect()
        };
        // a closing fence glued to the last line
        return body.join("\n").trim().trim_end_matches('`').trim().to_string();
    }

    t.trim_matches('`').trim().to_string()
}

// Models often wrap the object in prose; take the outermost braces.
fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

fn parse_json(text: &str, kind: ResponseKind) -> Option<ParsedResponse> {
    let value: Value = serde_json::from_str(text).ok()?;
    let obj = value.as_object()?;

    match kind {
        ResponseKind::Command => obj
            .get("cmd")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
            .map(|cmd| ParsedResponse::Command(cmd.to_string())),
        ResponseKind::Explanation => obj
            .get("explanation")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(|text| ParsedResponse::Explanation(text.to_string())),
        ResponseKind::Plan => {
            let items = obj.get("plan").and_then(Value::as_array)?;
            let steps = items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|item| {
                    let cmd = item.get("cmd")?;
                    Some(Step {
                        thought: coerce(item.get("thought")),
                        cmd: coerce(Some(cmd)),
                    })
                })
                .collect();
            let notes = obj
                .get("notes")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from);
            Some(ParsedResponse::Plan { steps, notes })
        }
    }
}

fn coerce(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

fn recover_raw(text: &str, kind: ResponseKind) -> ParsedResponse {
    let first_line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('{'));

    match (kind, first_line) {
        (ResponseKind::Plan, _) => ParsedResponse::Empty,
        (ResponseKind::Command, Some(line)) => ParsedResponse::Command(line.to_string()),
        (ResponseKind::Command, None) => ParsedResponse::Empty,
        (ResponseKind::Explanation, Some(line)) => ParsedResponse::Explanation(line.to_string()),
        (ResponseKind::Explanation, None) => ParsedResponse::Explanation(text.trim().to_string()),
    }
}
