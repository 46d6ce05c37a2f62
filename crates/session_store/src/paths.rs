use std::path::PathBuf;

use crate::error::SessionStoreError;

/// Environment override for the sessions directory.
pub const SESSIONS_DIR_ENV: &str = "SPOOL_SESSIONS_DIR";

/// Resolve the sessions directory: the env override when set, otherwise
/// `$XDG_CONFIG_HOME/spool/sessions` or `$HOME/.config/spool/sessions`.
pub fn default_root() -> Result<PathBuf, SessionStoreError> {
    if let Some(root) = std::env::var_os(SESSIONS_DIR_ENV) {
        return Ok(PathBuf::from(root));
    }

    if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(config).join("spool").join("sessions"));
    }

    match std::env::var_os("HOME") {
        Some(home) => Ok(PathBuf::from(home)
            .join(".config")
            .join("spool")
            .join("sessions")),
        None => Err(SessionStoreError::NoStoreRoot(
            "neither SPOOL_SESSIONS_DIR, XDG_CONFIG_HOME nor HOME is set".to_string(),
        )),
    }
}

/// File name for one stored session.
#[must_use]
pub fn session_file_name(session_id: &str) -> String {
    format!("{session_id}.jsonl")
}
