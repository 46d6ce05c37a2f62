/// Default base URL for Gemini transport requests.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Build the SSE streaming endpoint for a model.
#[must_use]
pub fn stream_generate_url(base: &str, model: &str) -> String {
    let base = if base.trim().is_empty() {
        DEFAULT_GEMINI_BASE_URL
    } else {
        base.trim()
    };
    format!(
        "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
        base.trim_end_matches('/'),
        model
    )
}

#[cfg(test)]
mod tests {
    use super::stream_generate_url;

    #[test]
    fn endpoint_addresses_the_model_with_sse_alt() {
        assert_eq!(
            stream_generate_url("https://generativelanguage.googleapis.com/", "gemini-2.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn empty_base_falls_back_to_default() {
        assert!(stream_generate_url("", "m").starts_with("https://generativelanguage.googleapis.com/"));
    }
}
