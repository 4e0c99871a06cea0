//! Helpers for pulling structured answers out of free-form model output.

use serde::de::DeserializeOwned;

/// Strip markdown code blocks from a response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// The first balanced `{...}` in `text`, ignoring braces inside JSON strings.
pub fn extract_first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the model's JSON answer, tolerating fences and surrounding prose.
pub fn parse_json_response<T: DeserializeOwned>(response: &str) -> Option<T> {
    let stripped = strip_code_blocks(response);
    if let Ok(value) = serde_json::from_str(stripped) {
        return Some(value);
    }
    let object = extract_first_json_object(stripped)?;
    match serde_json::from_str(object) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Unparseable JSON in model response: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }

    #[test]
    fn finds_object_inside_prose() {
        let text = r#"Sure! Here you go: {"a": {"b": "}"}, "c": 1} Hope that helps {"d": 2}"#;
        assert_eq!(extract_first_json_object(text), Some(r#"{"a": {"b": "}"}, "c": 1}"#));
    }

    #[test]
    fn unbalanced_object_is_none() {
        assert_eq!(extract_first_json_object(r#"{"a": 1"#), None);
        assert_eq!(extract_first_json_object("no json"), None);
    }

    #[test]
    fn parse_handles_escaped_quotes() {
        let value: serde_json::Value =
            parse_json_response(r#"Result: {"reason": "says \"hi\" {x}", "ok": true}"#).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_json_response::<serde_json::Value>("I cannot help with that").is_none());
    }
}
