//! Microsoft Graph connectors — mail, calendar and Teams chat.
//!
//! All three share the same shape: a bearer token, a `$select`-minimised
//! GET against the Graph REST API, and a pure mapping from the response
//! JSON to [`Snippet`]s. Only metadata and short previews are fetched.

use serde_json::Value;
use tracing::debug;

use crate::error::ConnectorError;
use crate::model::Snippet;
use crate::traits::Connector;

const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Settings shared by the Graph-backed connectors.
#[derive(Debug, Clone, Default)]
pub struct GraphSettings {
    /// OAuth access token. Without it every fetch fails with
    /// [`ConnectorError::NotConfigured`].
    pub access_token: Option<String>,

    /// Override for the API base URL (tests).
    pub api_base: Option<String>,
}

struct GraphClient {
    http: reqwest::Client,
    settings: GraphSettings,
}

impl GraphClient {
    fn new(settings: GraphSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    fn api_base(&self) -> &str {
        self.settings.api_base.as_deref().unwrap_or(GRAPH_API_BASE)
    }

    async fn get(
        &self,
        source: &'static str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ConnectorError> {
        let token = self.settings.access_token.as_deref().ok_or_else(|| {
            ConnectorError::NotConfigured(format!("{source}: no access token"))
        })?;

        let url = format!("{}{}", self.api_base(), path);
        debug!(source, %url, "graph request");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 401 {
            return Err(ConnectorError::AuthRequired(format!(
                "{source}: access token expired or invalid"
            )));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::Http {
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| ConnectorError::Decode(e.to_string()))
    }
}

fn str_field(record: &Value, key: &str) -> String {
    record[key].as_str().unwrap_or_default().to_string()
}

fn opt_str_field(record: &Value, key: &str) -> Option<String> {
    record[key].as_str().map(String::from)
}

// ── Mail ────────────────────────────────────────────────────────────

/// Outlook deep link for an email.
fn mail_deep_link(message_id: &str) -> String {
    format!("https://outlook.office.com/mail/item/{message_id}")
}

/// Map a Graph `/me/messages` response to snippets.
pub fn map_messages(body: &Value) -> Vec<Snippet> {
    let Some(records) = body["value"].as_array() else {
        return Vec::new();
    };
    records
        .iter()
        .filter_map(|r| {
            let id = r["id"].as_str()?.to_string();
            let mut metadata = std::collections::BTreeMap::new();
            if let Some(from) = r["from"]["emailAddress"]["address"].as_str() {
                metadata.insert("from".into(), from.to_string());
            }
            Some(Snippet {
                link: Some(
                    opt_str_field(r, "webLink").unwrap_or_else(|| mail_deep_link(&id)),
                ),
                id,
                source: GraphMailConnector::NAME.into(),
                subject: str_field(r, "subject"),
                timestamp: opt_str_field(r, "receivedDateTime"),
                snippet: str_field(r, "bodyPreview"),
                metadata,
            })
        })
        .collect()
}

/// Email search over Microsoft Graph (`Mail.Read`).
pub struct GraphMailConnector {
    client: GraphClient,
}

impl GraphMailConnector {
    pub const NAME: &'static str = "graph_mail";

    pub fn new(settings: GraphSettings) -> Self {
        Self { client: GraphClient::new(settings) }
    }
}

#[async_trait::async_trait]
impl Connector for GraphMailConnector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn fetch_snippets(&self, query: &str, limit: usize) -> Result<Vec<Snippet>, ConnectorError> {
        let params = [
            (
                "$select",
                "id,subject,receivedDateTime,bodyPreview,from,webLink".to_string(),
            ),
            ("$top", limit.to_string()),
            ("$search", format!("\"{query}\"")),
        ];
        let body = self.client.get(Self::NAME, "/me/messages", &params).await?;
        let snippets = map_messages(&body);
        debug!(count = snippets.len(), "graph_mail snippets fetched");
        Ok(snippets)
    }
}

// ── Calendar ────────────────────────────────────────────────────────

/// Outlook deep link for a calendar event.
fn event_deep_link(event_id: &str) -> String {
    format!("https://outlook.office.com/calendar/item/{event_id}")
}

/// Map a Graph `/me/events` response to snippets.
pub fn map_events(body: &Value) -> Vec<Snippet> {
    let Some(records) = body["value"].as_array() else {
        return Vec::new();
    };
    records
        .iter()
        .filter_map(|r| {
            let id = r["id"].as_str()?.to_string();
            let mut metadata = std::collections::BTreeMap::new();
            if let Some(attendees) = r["attendees"].as_array() {
                let list: Vec<&str> = attendees
                    .iter()
                    .filter_map(|a| a["emailAddress"]["address"].as_str())
                    .collect();
                if !list.is_empty() {
                    metadata.insert("attendees".into(), list.join(","));
                }
            }
            Some(Snippet {
                link: Some(event_deep_link(&id)),
                id,
                source: GraphCalendarConnector::NAME.into(),
                subject: str_field(r, "subject"),
                timestamp: r["start"]["dateTime"].as_str().map(String::from),
                snippet: str_field(r, "bodyPreview"),
                metadata,
            })
        })
        .collect()
}

/// Calendar events over Microsoft Graph (`Calendars.Read`).
pub struct GraphCalendarConnector {
    client: GraphClient,
}

impl GraphCalendarConnector {
    pub const NAME: &'static str = "graph_calendar";

    pub fn new(settings: GraphSettings) -> Self {
        Self { client: GraphClient::new(settings) }
    }
}

#[async_trait::async_trait]
impl Connector for GraphCalendarConnector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn fetch_snippets(&self, query: &str, limit: usize) -> Result<Vec<Snippet>, ConnectorError> {
        let params = [
            ("$select", "id,subject,start,bodyPreview,attendees".to_string()),
            ("$top", limit.to_string()),
            ("$filter", format!("contains(subject, '{query}')")),
            ("$orderby", "start/dateTime desc".to_string()),
        ];
        let body = self.client.get(Self::NAME, "/me/events", &params).await?;
        let snippets = map_events(&body);
        debug!(count = snippets.len(), "graph_calendar snippets fetched");
        Ok(snippets)
    }
}

// ── Teams chat ──────────────────────────────────────────────────────

/// Teams deep link for a chat message.
fn chat_deep_link(chat_id: &str, message_id: &str) -> String {
    format!("https://teams.microsoft.com/l/message/{chat_id}/{message_id}")
}

/// Map a Graph `getAllMessages` response to snippets, keeping only
/// messages whose body mentions `query`.
pub fn map_chat_messages(body: &Value, query: &str) -> Vec<Snippet> {
    let Some(records) = body["value"].as_array() else {
        return Vec::new();
    };
    let needle = query.to_lowercase();
    records
        .iter()
        .filter_map(|r| {
            let id = r["id"].as_str()?.to_string();
            let content = r["body"]["content"].as_str().unwrap_or_default();
            if !needle.is_empty() && !content.to_lowercase().contains(&needle) {
                return None;
            }
            let chat_id = str_field(r, "chatId");
            let mut metadata = std::collections::BTreeMap::new();
            if let Some(from) = r["from"]["user"]["displayName"].as_str() {
                metadata.insert("from".into(), from.to_string());
            }
            Some(Snippet {
                link: Some(chat_deep_link(&chat_id, &id)),
                id,
                source: TeamsChatConnector::NAME.into(),
                subject: str_field(r, "subject"),
                timestamp: opt_str_field(r, "createdDateTime"),
                snippet: content.chars().take(200).collect(),
                metadata,
            })
        })
        .collect()
}

/// Teams chat mentions over Microsoft Graph (`Chat.Read`).
pub struct TeamsChatConnector {
    client: GraphClient,
}

impl TeamsChatConnector {
    pub const NAME: &'static str = "teams_chat";

    pub fn new(settings: GraphSettings) -> Self {
        Self { client: GraphClient::new(settings) }
    }
}

#[async_trait::async_trait]
impl Connector for TeamsChatConnector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn fetch_snippets(&self, query: &str, limit: usize) -> Result<Vec<Snippet>, ConnectorError> {
        let params = [("$top", limit.to_string())];
        let body = self
            .client
            .get(Self::NAME, "/me/chats/getAllMessages", &params)
            .await?;
        let mut snippets = map_chat_messages(&body, query);
        snippets.truncate(limit);
        debug!(count = snippets.len(), "teams_chat snippets fetched");
        Ok(snippets)
    }
}
