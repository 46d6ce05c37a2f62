use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use llm_provider::Message;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::SessionStoreError;
use crate::paths::session_file_name;
use crate::schema::{MessageRecord, SessionHeader, StoredSession};

pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SessionStoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|source| SessionStoreError::io("creating sessions directory", &root, source))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persists a transcript. A fresh uuid is generated when `session_id`
    /// is `None`; an existing session's `created_at` survives the rewrite,
    /// `updated_at` is always stamped with the current time.
    pub fn save(
        &self,
        session_id: Option<&str>,
        name: &str,
        messages: &[Message],
    ) -> Result<SessionHeader, SessionStoreError> {
        let now = now_rfc3339()?;
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let created_at = match self.load(&session_id) {
            Ok(existing) => existing.header.created_at,
            Err(SessionStoreError::UnknownSession { .. }) => now.clone(),
            Err(error) => return Err(error),
        };

        let header = SessionHeader::v1(session_id, name, created_at, now);
        let path = self.session_path(&header.session_id);

        let mut lines = Vec::with_capacity(messages.len() + 1);
        lines.push(
            serde_json::to_string(&header)
                .map_err(|source| SessionStoreError::json_serialize(&path, source))?,
        );
        for message in messages {
            let record = MessageRecord::from(message);
            lines.push(
                serde_json::to_string(&record)
                    .map_err(|source| SessionStoreError::json_serialize(&path, source))?,
            );
        }

        // Write to a sibling temp file, then rename into place.
        let tmp_path = path.with_extension("jsonl.tmp");
        {
            let mut file = fs::File::create(&tmp_path).map_err(|source| {
                SessionStoreError::io("creating session file", &tmp_path, source)
            })?;
            for line in &lines {
                writeln!(file, "{line}").map_err(|source| {
                    SessionStoreError::io("writing session line", &tmp_path, source)
                })?;
            }
        }
        fs::rename(&tmp_path, &path)
            .map_err(|source| SessionStoreError::io("renaming session file", &path, source))?;

        Ok(header)
    }

    /// Loads one session by id.
    pub fn load(&self, session_id: &str) -> Result<StoredSession, SessionStoreError> {
        let path = self.session_path(session_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionStoreError::UnknownSession {
                    root: self.root.clone(),
                    session_id: session_id.to_string(),
                });
            }
            Err(source) => return Err(SessionStoreError::io("opening session file", &path, source)),
        };

        read_session(&path, &contents)
    }

    /// Lists session headers, newest `updated_at` first.
    pub fn list(&self) -> Result<Vec<SessionHeader>, SessionStoreError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|source| SessionStoreError::io("reading sessions directory", &self.root, source))?;

        let mut headers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| {
                SessionStoreError::io("reading sessions directory", &self.root, source)
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }

            let contents = fs::read_to_string(&path)
                .map_err(|source| SessionStoreError::io("opening session file", &path, source))?;
            headers.push(read_session(&path, &contents)?.header);
        }

        headers.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(headers)
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.root.join(session_file_name(session_id))
    }
}

fn read_session(path: &Path, contents: &str) -> Result<StoredSession, SessionStoreError> {
    let mut header: Option<SessionHeader> = None;
    let mut messages = Vec::new();

    for (line_index, line) in contents.lines().enumerate() {
        let line_number = line_index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(line)
            .map_err(|source| SessionStoreError::json_line(path, line_number, source))?;
        let record_type = value.get("type").and_then(Value::as_str).unwrap_or("");

        if line_number == 1 {
            if record_type != "session" {
                return Err(SessionStoreError::InvalidHeaderRecord {
                    path: path.to_path_buf(),
                    line: line_number,
                });
            }

            let parsed: SessionHeader = serde_json::from_value(value)
                .map_err(|source| SessionStoreError::json_line(path, line_number, source))?;
            validate_header_line(path, line_number, &parsed)?;
            header = Some(parsed);
            continue;
        }

        if record_type != "message" {
            return Err(SessionStoreError::InvalidMessageRecord {
                path: path.to_path_buf(),
                line: line_number,
            });
        }
        let record: MessageRecord = serde_json::from_value(value)
            .map_err(|source| SessionStoreError::json_line(path, line_number, source))?;
        messages.push(record);
    }

    let header = header.ok_or_else(|| SessionStoreError::MissingHeader {
        path: path.to_path_buf(),
    })?;

    Ok(StoredSession { header, messages })
}

fn validate_header_line(
    path: &Path,
    line_number: usize,
    header: &SessionHeader,
) -> Result<(), SessionStoreError> {
    if header.version != 1 {
        return Err(SessionStoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            line: line_number,
            found: header.version,
        });
    }

    validate_rfc3339(path, line_number, "created_at", &header.created_at)?;
    validate_rfc3339(path, line_number, "updated_at", &header.updated_at)?;
    Ok(())
}

fn validate_rfc3339(
    path: &Path,
    line_number: usize,
    field: &'static str,
    value: &str,
) -> Result<(), SessionStoreError> {
    if OffsetDateTime::parse(value, &Rfc3339).is_err() {
        return Err(SessionStoreError::InvalidTimestamp {
            path: path.to_path_buf(),
            line: line_number,
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}

fn now_rfc3339() -> Result<String, SessionStoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(SessionStoreError::ClockFormat)
}
