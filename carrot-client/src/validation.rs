use crate::error::{ClientError, ClientResult};

/// Longest chat message body, in chars.
pub const MAX_MESSAGE_CHARS: usize = 1000;
/// Longest comment body, in chars.
pub const MAX_COMMENT_CHARS: usize = 500;

/// Checks a message or comment body before it is sent and returns the trimmed
/// text that should go over the wire.
///
/// # Errors
/// [`ClientError::Validation`] when the trimmed body is empty or longer than
/// `max_chars` characters.
pub fn validate_body(text: &str, max_chars: usize) -> ClientResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ClientError::validation("body is empty"));
    }
    let length = trimmed.chars().count();
    if length > max_chars {
        return Err(ClientError::validation(format!(
            "body has {length} characters, limit is {max_chars}"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(validate_body("  안녕하세요 \n", 10).unwrap(), "안녕하세요");
    }

    #[test]
    fn rejects_blank_bodies() {
        for body in ["", "   ", "\n\t"] {
            assert!(matches!(
                validate_body(body, MAX_MESSAGE_CHARS),
                Err(ClientError::Validation { .. })
            ));
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        let exact = "가".repeat(MAX_COMMENT_CHARS);
        assert!(validate_body(&exact, MAX_COMMENT_CHARS).is_ok());

        let over = "가".repeat(MAX_COMMENT_CHARS + 1);
        assert!(validate_body(&over, MAX_COMMENT_CHARS).is_err());
    }
}
