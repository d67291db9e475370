//! Recovering a JSON object from free-form model output.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::InterpretError;

lazy_static! {
    static ref TRAILING_COMMA: Regex = Regex::new(r",\s*([}\]])").unwrap();
    static ref SPACES: Regex = Regex::new(r"\s+").unwrap();
}

/// Parse the model's answer into a JSON object.
///
/// Tries the content as-is first. Otherwise the first balanced `{...}` span
/// is taken (which also covers fenced code blocks and chatter around the
/// object), parsed directly, then once more after replacing typographic
/// quotes, folding newlines and dropping trailing commas.
pub fn extract_json(content: &str) -> Result<Value, InterpretError> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(content.trim()) {
        return Ok(value);
    }

    let span = object_span(content).ok_or_else(|| {
        InterpretError::MalformedResponse("no JSON object found in response".to_string())
    })?;

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(span) {
        return Ok(value);
    }

    match serde_json::from_str::<Value>(&clean(span)) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(InterpretError::MalformedResponse(
            "response is not a JSON object".to_string(),
        )),
        Err(e) => Err(InterpretError::MalformedResponse(e.to_string())),
    }
}

/// First `{` through its matching `}`, ignoring braces inside strings.
/// An unbalanced object runs to the last `}` in the text.
fn object_span(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in content[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' | '\u{201C}' | '\u{201D}' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' | '\u{201C}' | '\u{201D}' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn clean(span: &str) -> String {
    let replaced: String = span
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect();
    let collapsed = SPACES.replace_all(&replaced, " ");
    TRAILING_COMMA.replace_all(collapsed.trim(), "$1").into_owned()
}
