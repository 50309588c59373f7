//! Output parsing

use crate::core::models::ChatCompletion;

/// Extracts the plain text of a completion and drops its metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct StrOutputParser;

impl StrOutputParser {
    pub fn parse(&self, completion: ChatCompletion) -> String {
        completion.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::TokenUsage;

    #[test]
    fn test_parse_drops_metadata() {
        let completion = ChatCompletion {
            finish_reason: Some("stop".to_string()),
            usage: Some(TokenUsage {
                prompt_tokens: 1,
                completion_tokens: 2,
                total_tokens: 3,
            }),
            id: Some("req".to_string()),
            ..ChatCompletion::new("Bonjour", "glm-3-turbo")
        };
        assert_eq!(StrOutputParser.parse(completion), "Bonjour");
    }

    #[test]
    fn test_parse_is_lossless() {
        let text = "  leading space, trailing newline\n";
        let completion = ChatCompletion::new(text, "echo");
        assert_eq!(StrOutputParser.parse(completion), text);
    }
}
