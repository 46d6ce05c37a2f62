/// Default base URL for OpenAI transport requests.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Normalize a base URL to the chat-completions endpoint.
#[must_use]
pub fn chat_completions_url(base: &str) -> String {
    format!("{}/v1/chat/completions", normalize_base(base))
}

/// Normalize a base URL to the model-listing endpoint.
#[must_use]
pub fn models_url(base: &str) -> String {
    format!("{}/v1/models", normalize_base(base))
}

fn normalize_base(input: &str) -> &str {
    let base = if input.trim().is_empty() {
        DEFAULT_OPENAI_BASE_URL
    } else {
        input.trim()
    };
    base.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::{chat_completions_url, models_url};

    #[test]
    fn endpoints_join_without_duplicate_slashes() {
        assert_eq!(
            chat_completions_url("https://api.openai.com/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            models_url("https://proxy.example"),
            "https://proxy.example/v1/models"
        );
    }

    #[test]
    fn empty_base_falls_back_to_default() {
        assert_eq!(
            chat_completions_url("  "),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
