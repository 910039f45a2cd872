use thiserror::Error;

/// Failures surfaced by the chat API client.
///
/// 202 and 429 are not errors: they come back as [`crate::api_client::ApiReply`]
/// variants and are absorbed by the backoff loop.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{}", status_message(.status, .message_id))]
    Status {
        status: u16,
        message_id: Option<String>,
    },

    #[error("Unable to decode API response: {0}")]
    Decode(String),

    #[error("Gave up after {attempts} throttled attempt(s)")]
    RetriesExhausted { attempts: u32 },
}

fn status_message(status: &u16, message_id: &Option<String>) -> String {
    match message_id {
        Some(id) => format!("API returned status {} for message {}", status, id),
        None => format!("API returned status {}", status),
    }
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
