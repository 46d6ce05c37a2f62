use llm_provider::{Message, Role};
use serde::{Deserialize, Serialize};

/// Request payload for `streamGenerateContent`.
///
/// System messages do not travel in `contents`; the last one becomes the
/// request-level system instruction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateRequest {
    #[must_use]
    pub fn from_messages(messages: &[Message]) -> Self {
        let mut contents = Vec::new();
        let mut system_instruction = None;

        for message in messages {
            match message.role {
                Role::System => {
                    system_instruction = Some(Content::text(None, &message.content));
                }
                Role::User => contents.push(Content::text(Some("user"), &message.content)),
                Role::Model => contents.push(Content::text(Some("model"), &message.content)),
            }
        }

        Self {
            contents,
            system_instruction,
            generation_config: GenerationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub candidate_count: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { candidate_count: 1 }
    }
}

/// One streamed response frame.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate's parts.
    #[must_use]
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: CandidateContent,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}
