//! Minimal ANSI styling helpers for the chat transcript.

/// Build an SGR escape sequence, or nothing when `NO_COLOR` is set.
#[must_use]
pub fn esc(codes: &[u8]) -> String {
    if std::env::var_os("NO_COLOR").is_some() {
        return String::new();
    }

    let joined = codes
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(";");
    format!("\x1b[{joined}m")
}

/// Reset sequence paired with [`esc`].
#[must_use]
pub fn reset() -> String {
    esc(&[])
}

/// Dim a short marker string, e.g. a prompt prefix.
#[must_use]
pub fn dim(text: &str) -> String {
    format!("{}{text}{}", esc(&[90]), reset())
}

#[cfg(test)]
mod tests {
    use super::esc;

    #[test]
    fn esc_joins_codes_with_semicolons() {
        if std::env::var_os("NO_COLOR").is_some() {
            return;
        }
        assert_eq!(esc(&[1, 90]), "\x1b[1;90m");
        assert_eq!(esc(&[]), "\x1b[m");
    }
}
