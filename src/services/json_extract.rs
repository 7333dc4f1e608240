use serde::de::DeserializeOwned;

/// Locate the first balanced `{...}` span in free-form model output.
///
/// Braces inside JSON string literals are ignored. Returns `None` when no
/// opening brace exists or the first one is never closed.
pub fn first_json_object(text: &str) -> Option<&str> {
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
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract and deserialize the first JSON object embedded in `text`.
pub fn extract_object<T: DeserializeOwned>(text: &str) -> Result<T, ExtractError> {
    let span = first_json_object(text).ok_or(ExtractError::NotFound)?;
    serde_json::from_str(span).map_err(ExtractError::Parse)
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("No JSON object found in model response")]
    NotFound,

    #[error("Failed to parse JSON object from model response: {0}")]
    Parse(#[from] serde_json::Error),
}
