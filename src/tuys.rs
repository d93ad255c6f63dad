use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub rank_color: String,
    #[serde(default)]
    pub is_owner: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoryItem {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub owner: Owner,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub comments: i64,
    #[serde(default)]
    pub liked_by_user: bool,
    #[serde(default)]
    pub followed_by_user: bool,
    #[serde(default)]
    pub channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub date: DateTime<Utc>,
    pub owner: Owner,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DenounceBody {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenounceParams {
    pub story_id: i64,
    pub body: DenounceBody,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoryUpdate {
    pub title: String,
    pub body: String,
}

/// Failure of a single API call, keeping whatever message the server sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("tuys: api error {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Api { status: u16, message: Option<String> },
    #[error("tuys: request failed: {0}")]
    Transport(String),
}

impl RequestError {
    pub fn user_message(&self) -> Option<&str> {
        match self {
            RequestError::Api {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => Some(message.as_str()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        RequestError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    pub user_agent: String,
    pub token: Option<String>,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    token: Option<String>,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("tuys client user agent required");
        }
        let base = config
            .base_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut base_url =
            Url::parse(&base).with_context(|| format!("parse api base url {base:?}"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            token: config.token.filter(|token| !token.trim().is_empty()),
            base_url,
        })
    }

    pub fn stories(&self, channel: Option<&str>) -> Result<Vec<StoryItem>, RequestError> {
        let params: Vec<(&str, &str)> = channel.map(|c| vec![("channel", c)]).unwrap_or_default();
        self.get_json("stories", &params)
    }

    pub fn story(&self, id: i64) -> Result<StoryItem, RequestError> {
        self.get_json(&format!("stories/{id}"), &[])
    }

    pub fn comments(&self, story_id: i64) -> Result<Vec<Comment>, RequestError> {
        self.get_json(&format!("stories/{story_id}/comments"), &[])
    }

    pub fn post_like(&self, id: i64) -> Result<(), RequestError> {
        let req = self.request(Method::POST, &format!("stories/{id}/like"))?;
        self.send(req).map(|_| ())
    }

    pub fn post_unlike(&self, id: i64) -> Result<(), RequestError> {
        let req = self.request(Method::POST, &format!("stories/{id}/unlike"))?;
        self.send(req).map(|_| ())
    }

    pub fn post_denounce(&self, params: &DenounceParams) -> Result<(), RequestError> {
        let req = self.request(Method::POST, &format!("stories/{}/denounce", params.story_id))?;
        self.send(req.json(&params.body)).map(|_| ())
    }

    pub fn delete_story(&self, id: i64) -> Result<(), RequestError> {
        let req = self.request(Method::DELETE, &format!("stories/{id}"))?;
        self.send(req).map(|_| ())
    }

    pub fn update_story(&self, id: i64, update: &StoryUpdate) -> Result<(), RequestError> {
        let req = self.request(Method::PUT, &format!("stories/{id}"))?;
        self.send(req.json(update)).map(|_| ())
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, RequestError> {
        let mut req = self.request(Method::GET, path)?;
        if !params.is_empty() {
            req = req.query(params);
        }
        let resp = self.send(req)?;
        Ok(resp.json()?)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, RequestError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| RequestError::Transport(format!("invalid path {path:?}: {err}")))?;
        tracing::debug!(%method, %url, "tuys request");
        let mut req = self
            .http
            .request(method, url)
            .header(USER_AGENT, self.user_agent.clone());
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(req)
    }

    fn send(&self, req: RequestBuilder) -> Result<Response, RequestError> {
        let resp = req.send()?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().unwrap_or_default();
        let message = error_message(&body);
        tracing::warn!(status, message = message.as_deref(), "tuys api error");
        Err(RequestError::Api { status, message })
    }
}

/// Pulls a human-readable message out of an error body: a JSON `message` or
/// `error` field, or a short plain-text body.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => ["message", "error"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|value| value.as_str().map(str::to_string)),
        Ok(Value::String(text)) => Some(text),
        Ok(_) => None,
        Err(_) if trimmed.len() <= 200 && !trimmed.starts_with('<') => Some(trimmed.to_string()),
        Err(_) => None,
    }
}
