use serde::de::DeserializeOwned;

use crate::error::{PipeSightError, Result};

/// Deserializes the JSON object embedded in a model reply.
///
/// Models often wrap JSON in a Markdown code fence or surround it with prose;
/// the fenced block wins, then the outermost `{...}` span, then the raw text.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let candidate = fenced_block(text)
        .or_else(|| outer_object(text))
        .unwrap_or_else(|| text.trim());

    serde_json::from_str(candidate).map_err(|e| {
        PipeSightError::ResponseParse(format!("{e} in response: {}", truncate(candidate, 200)))
    })
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        summary: String,
    }

    #[test]
    fn test_plain_json() {
        let reply: Reply = extract_json(r#"{"summary": "ok"}"#).unwrap();
        assert_eq!(reply.summary, "ok");
    }

    #[test]
    fn test_fenced_json() {
        let text = "Here you go:\n```json\n{\"summary\": \"fenced\"}\n```\nThanks";
        let reply: Reply = extract_json(text).unwrap();
        assert_eq!(reply.summary, "fenced");
    }

    #[test]
    fn test_unlabelled_fence() {
        let reply: Reply = extract_json("```\n{\"summary\": \"bare\"}\n```").unwrap();
        assert_eq!(reply.summary, "bare");
    }

    #[test]
    fn test_json_surrounded_by_prose() {
        let reply: Reply = extract_json("Analysis: {\"summary\": \"inline\"} done.").unwrap();
        assert_eq!(reply.summary, "inline");
    }

    #[test]
    fn test_not_json() {
        let err = extract_json::<Reply>("I cannot help with that.").unwrap_err();
        assert!(matches!(err, PipeSightError::ResponseParse(_)));
    }
}
