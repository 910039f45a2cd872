use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, Response, StatusCode};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::{RetryAfter, SearchResult};

/// Outcome of a single HTTP exchange, before any backoff is applied
#[derive(Debug, Clone, PartialEq)]
pub enum ApiReply<T> {
    Done(T),
    /// 202: the search index is still being built
    NotIndexed(Duration),
    /// 429: server-side rate limit
    RateLimited(Duration),
}

/// Search and delete operations against one chat service.
///
/// Implementations issue exactly one HTTP request per call; pacing and
/// retries are handled by the caller.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn search_messages(
        &self,
        channel_id: &str,
        author_id: &str,
        max_id: Option<&str>,
    ) -> Result<ApiReply<SearchResult>, ApiError>;

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<ApiReply<()>, ApiError>;
}

pub struct HttpChatApi {
    client: Client,
    base_url: String,
    auth_token: String,
}

impl HttpChatApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        info!("Preparing HTTP client for {}", config.base_url);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("msgpurge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpChatApi {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    async fn retry_after(response: Response) -> Duration {
        let wait_ms = match response.json::<RetryAfter>().await {
            Ok(body) => body.wait_ms(),
            Err(e) => {
                debug!("Unreadable retry_after body ({}), using default wait", e);
                RetryAfter { retry_after: None }.wait_ms()
            }
        };
        Duration::from_millis(wait_ms)
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn search_messages(
        &self,
        channel_id: &str,
        author_id: &str,
        max_id: Option<&str>,
    ) -> Result<ApiReply<SearchResult>, ApiError> {
        let url = format!("{}/channels/{}/messages/search", self.base_url, channel_id);

        let mut query = vec![("author_id", author_id)];
        if let Some(max_id) = max_id {
            query.push(("max_id", max_id));
        }
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, &self.auth_token)
            .query(&query)
            .send()
            .await?;

        match response.status() {
            StatusCode::ACCEPTED => Ok(ApiReply::NotIndexed(Self::retry_after(response).await)),
            StatusCode::TOO_MANY_REQUESTS => {
                Ok(ApiReply::RateLimited(Self::retry_after(response).await))
            }
            status if status.is_success() => {
                let page = response
                    .json::<SearchResult>()
                    .await
                    .map_err(|e| ApiError::Decode(e.to_string()))?;
                Ok(ApiReply::Done(page))
            }
            status => Err(ApiError::Status {
                status: status.as_u16(),
                message_id: None,
            }),
        }
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<ApiReply<()>, ApiError> {
        let url = format!("{}/channels/{}/messages/{}", self.base_url, channel_id, message_id);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .header(reqwest::header::AUTHORIZATION, &self.auth_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                Ok(ApiReply::RateLimited(Self::retry_after(response).await))
            }
            status if status.is_success() => Ok(ApiReply::Done(())),
            status => Err(ApiError::Status {
                status: status.as_u16(),
                message_id: Some(message_id.to_string()),
            }),
        }
    }
}
