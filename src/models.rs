/// Wire records returned by the chat API
use serde::Deserialize;

/// Type code of system messages (joins, pins, ...), which carry no user content
pub const SYSTEM_MESSAGE_TYPE: u8 = 3;

/// Fallback wait when a 202/429 body carries no usable `retry_after`
pub const DEFAULT_RETRY_AFTER_MS: u64 = 1000;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
}

impl Author {
    pub fn display_name(&self) -> &str {
        self.global_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub author: Author,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub hit: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn is_system(&self) -> bool {
        self.kind == SYSTEM_MESSAGE_TYPE
    }

    /// True when the message is a search hit authored by `author_id`.
    /// Search pages also carry surrounding context messages, which must be left alone.
    pub fn is_deletable_by(&self, author_id: &str) -> bool {
        !self.is_system() && self.hit && self.author.id == author_id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub total_results: u64,
    /// Groups of messages; each group is one hit plus its context
    #[serde(default)]
    pub messages: Vec<Vec<Message>>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.messages.iter().all(|group| group.is_empty())
    }

    /// Page-then-within-page iteration order
    pub fn iter_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().flatten()
    }
}

/// Body of 202 and 429 responses
#[derive(Debug, Clone, Deserialize)]
pub struct RetryAfter {
    /// Milliseconds to wait before re-issuing the request
    #[serde(default)]
    pub retry_after: Option<f64>,
}

impl RetryAfter {
    pub fn wait_ms(&self) -> u64 {
        match self.retry_after {
            Some(ms) if ms.is_finite() && ms >= 0.0 => ms.ceil() as u64,
            _ => DEFAULT_RETRY_AFTER_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_page() {
        let body = r#"{
            "total_results": 2,
            "messages": [
                [{"id": "m2", "type": 3, "author": {"id": "42"}, "hit": true}],
                [{"id": "m3", "type": 0, "author": {"id": "42", "username": "me"},
                  "hit": true, "content": "hello", "timestamp": "2024-01-02T03:04:05+00:00",
                  "attachments": [{"id": "a1", "filename": "cat.png", "url": "https://cdn.example/cat.png"}]}]
            ]
        }"#;

        let result: SearchResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.total_results, 2);

        let ids: Vec<&str> = result.iter_messages().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);

        let m2 = &result.messages[0][0];
        assert!(m2.is_system());
        assert!(!m2.is_deletable_by("42"));

        let m3 = &result.messages[1][0];
        assert!(m3.is_deletable_by("42"));
        assert!(!m3.is_deletable_by("43"));
        assert_eq!(m3.attachments[0].url, "https://cdn.example/cat.png");
        assert_eq!(m3.author.display_name(), "me");
    }

    #[test]
    fn test_context_message_is_not_deletable() {
        let message: Message =
            serde_json::from_str(r#"{"id": "m9", "author": {"id": "42"}}"#).unwrap();
        assert!(!message.hit);
        assert!(!message.is_deletable_by("42"));
    }

    #[test]
    fn test_retry_after_fallback() {
        let with_value: RetryAfter = serde_json::from_str(r#"{"retry_after": 1500}"#).unwrap();
        assert_eq!(with_value.wait_ms(), 1500);

        let missing: RetryAfter = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.wait_ms(), DEFAULT_RETRY_AFTER_MS);
    }

    #[test]
    fn test_empty_page() {
        let result: SearchResult =
            serde_json::from_str(r#"{"total_results": 0, "messages": [[]]}"#).unwrap();
        assert!(result.is_empty());
    }
}
