//! Adapter for the tool server's `result.content[0].text` quirk.
//!
//! Several tools stringify their actual payload into a text block rather
//! than returning structured JSON directly. The stringified form is usually
//! valid JSON but occasionally looks like a Python `repr()` of a list of
//! dicts — single-quoted strings, `True`/`False`/`None` — so a fallback
//! literal parser is needed before giving up.

use serde_json::Value;

use crate::types::{ToolError, ToolErrorKind};

/// Decode a JSON-RPC `result` value into the payload the caller actually
/// wants, unwrapping the `content[0].text` shape when present.
pub fn decode_tool_payload(result: &Value) -> Result<Value, ToolError> {
    let text = result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get("text"))
        .and_then(Value::as_str);

    let Some(text) = text else {
        return Ok(result.clone());
    };

    if let Ok(parsed) = serde_json::from_str::<Value>(text) {
        return Ok(parsed);
    }

    if let Some(parsed) = parse_python_literal(text) {
        return Ok(parsed);
    }

    Err(ToolError {
        kind: ToolErrorKind::Parse,
        message: format!("content[0].text is neither valid JSON nor a recognizable Python literal: {text}"),
        code: None,
    })
}

/// Best-effort parse of a Python `repr()`-style literal (single-quoted
/// strings, `True`/`False`/`None`) as JSON.
fn parse_python_literal(text: &str) -> Option<Value> {
    serde_json::from_str(&python_literal_to_json_text(text)).ok()
}

fn python_literal_to_json_text(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    let mut in_string = false;
    let mut quote = '\'';

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            if c == '\\' && i + 1 < chars.len() {
                out.push(c);
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == quote {
                in_string = false;
                out.push('"');
                i += 1;
                continue;
            }
            if c == '"' {
                out.push('\\');
                out.push('"');
                i += 1;
                continue;
            }
            out.push(c);
            i += 1;
            continue;
        }

        if c == '\'' || c == '"' {
            in_string = true;
            quote = c;
            out.push('"');
            i += 1;
            continue;
        }

        if c.is_alphabetic() {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match word.as_str() {
                "True" => out.push_str("true"),
                "False" => out.push_str("false"),
                "None" => out.push_str("null"),
                other => out.push_str(other),
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passes_through_plain_result() {
        let result = json!({"person_id": 7});
        assert_eq!(decode_tool_payload(&result).unwrap(), result);
    }

    #[test]
    fn unwraps_stringified_json_content() {
        let result = json!({"content": [{"type": "text", "text": "[{\"person_id\": 7}]"}]});
        let decoded = decode_tool_payload(&result).unwrap();
        assert_eq!(decoded, json!([{"person_id": 7}]));
    }

    #[test]
    fn unwraps_python_literal_content() {
        let result = json!({
            "content": [{"type": "text", "text": "[{'person_id': 7, 'active': True, 'nickname': None}]"}]
        });
        let decoded = decode_tool_payload(&result).unwrap();
        assert_eq!(decoded, json!([{"person_id": 7, "active": true, "nickname": null}]));
    }

    #[test]
    fn unwraps_python_literal_with_escaped_quote() {
        let result = json!({
            "content": [{"type": "text", "text": "[{'name': 'O\\'Brien'}]"}]
        });
        let decoded = decode_tool_payload(&result).unwrap();
        assert_eq!(decoded, json!([{"name": "O'Brien"}]));
    }

    #[test]
    fn unparseable_text_is_a_parse_error() {
        let result = json!({"content": [{"type": "text", "text": "not json at all {{{"}]});
        let err = decode_tool_payload(&result).unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Parse);
    }
}
