// HTTP bridge to the messaging gateway that owns the actual chat session.
//
// Events are pulled by cursor, actions are posted as JSON. Group info is cached for a
// short time because every non-owner message in a group triggers an admin lookup.

use super::gateway_models::{
    ActionRequest, EventBatch, InviteLink, SessionInfo, WireGroupInfo,
};
use crate::core::messaging::{GroupInfo, MessagingError, Messenger};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use thiserror::Error;

const GROUP_CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid gateway configuration: {0}")]
    Config(String),
}

impl From<GatewayError> for MessagingError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Http(e) if e.is_timeout() => {
                MessagingError::Transport(format!("timed out: {}", e))
            }
            GatewayError::Status { status, body } if (400..500).contains(&status) => {
                MessagingError::Rejected(format!("{}: {}", status, body))
            }
            other => MessagingError::Transport(other.to_string()),
        }
    }
}

struct CachedGroup {
    info: GroupInfo,
    fetched_at: Instant,
}

pub struct HttpGateway {
    client: Client,
    base_url: String,
    self_id: OnceLock<String>,
    groups: DashMap<String, CachedGroup>,
    cache_ttl: Duration,
}

impl HttpGateway {
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        request_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert("User-Agent", HeaderValue::from_static("OdinBot/0.2"));
        if let Some(token) = token {
            headers.insert(
                "Authorization",
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| GatewayError::Config(e.to_string()))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            self_id: OnceLock::new(),
            groups: DashMap::new(),
            cache_ttl: GROUP_CACHE_TTL,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn check(resp: Response) -> Result<Response, GatewayError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Ask the gateway who we are. Must succeed before events are processed.
    pub async fn connect(&self) -> Result<String, GatewayError> {
        let resp = self.client.get(self.url("session")).send().await?;
        let session: SessionInfo = Self::check(resp).await?.json().await?;
        let id = self.self_id.get_or_init(|| session.self_id).clone();
        tracing::info!(self_id = %id, base_url = %self.base_url, "Connected to gateway");
        Ok(id)
    }

    /// Events after `cursor`. An empty batch keeps the cursor where it was.
    pub async fn poll_events(&self, cursor: u64) -> Result<EventBatch, GatewayError> {
        let resp = self
            .client
            .get(self.url("events"))
            .query(&[("after", cursor.to_string())])
            .send()
            .await?;
        let batch: EventBatch = Self::check(resp).await?.json().await?;
        Ok(batch)
    }

    async fn post_action(&self, action: &str, body: &ActionRequest<'_>) -> Result<Response, GatewayError> {
        let resp = self
            .client
            .post(self.url(&format!("actions/{}", action)))
            .json(body)
            .send()
            .await?;
        Self::check(resp).await
    }

    async fn act(&self, action: &str, body: ActionRequest<'_>) -> Result<(), MessagingError> {
        self.post_action(action, &body).await?;
        Ok(())
    }

    /// Membership changed, so the cached admin bits may be stale.
    fn invalidate(&self, chat_id: &str) {
        self.groups.remove(chat_id);
    }

    fn cached(&self, chat_id: &str) -> Option<GroupInfo> {
        let entry = self.groups.get(chat_id)?;
        if entry.fetched_at.elapsed() < self.cache_ttl {
            Some(entry.info.clone())
        } else {
            None
        }
    }
}

#[async_trait]
impl Messenger for HttpGateway {
    fn self_id(&self) -> Option<String> {
        self.self_id.get().cloned()
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), MessagingError> {
        self.act("send_text", ActionRequest::new(chat_id).text(text)).await
    }

    async fn send_mentions(
        &self,
        chat_id: &str,
        text: &str,
        mentions: &[String],
    ) -> Result<(), MessagingError> {
        self.act(
            "send_text",
            ActionRequest::new(chat_id).text(text).users(mentions),
        )
        .await
    }

    async fn remove_members(
        &self,
        chat_id: &str,
        user_ids: &[String],
    ) -> Result<(), MessagingError> {
        self.invalidate(chat_id);
        self.act("remove_members", ActionRequest::new(chat_id).users(user_ids))
            .await
    }

    async fn promote(&self, chat_id: &str, user_id: &str) -> Result<(), MessagingError> {
        self.invalidate(chat_id);
        let users = [user_id.to_string()];
        self.act("promote", ActionRequest::new(chat_id).users(&users)).await
    }

    async fn demote(&self, chat_id: &str, user_id: &str) -> Result<(), MessagingError> {
        self.invalidate(chat_id);
        let users = [user_id.to_string()];
        self.act("demote", ActionRequest::new(chat_id).users(&users)).await
    }

    async fn set_group_name(&self, chat_id: &str, name: &str) -> Result<(), MessagingError> {
        self.invalidate(chat_id);
        self.act("set_name", ActionRequest::new(chat_id).text(name)).await
    }

    async fn set_group_topic(&self, chat_id: &str, topic: &str) -> Result<(), MessagingError> {
        self.invalidate(chat_id);
        self.act("set_topic", ActionRequest::new(chat_id).text(topic)).await
    }

    async fn set_announce_mode(
        &self,
        chat_id: &str,
        admins_only: bool,
    ) -> Result<(), MessagingError> {
        self.act(
            "set_announce",
            ActionRequest::new(chat_id).enabled(admins_only),
        )
        .await
    }

    async fn invite_link(&self, chat_id: &str) -> Result<String, MessagingError> {
        let resp = self
            .post_action("invite_link", &ActionRequest::new(chat_id))
            .await?;
        let invite: InviteLink = resp.json().await.map_err(GatewayError::from)?;
        Ok(invite.link)
    }

    async fn group_info(&self, chat_id: &str) -> Result<GroupInfo, MessagingError> {
        if let Some(info) = self.cached(chat_id) {
            return Ok(info);
        }

        let resp = self
            .client
            .get(self.url(&format!("groups/{}", chat_id)))
            .send()
            .await
            .map_err(GatewayError::from)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(MessagingError::Rejected(format!("unknown group {}", chat_id)));
        }
        let wire: WireGroupInfo = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(GatewayError::from)?;

        let info = GroupInfo::from(wire);
        self.groups.insert(
            chat_id.to_string(),
            CachedGroup {
                info: info.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(info)
    }

    fn invalidate_group(&self, chat_id: &str) {
        self.invalidate(chat_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::messaging::{InboundEvent, Participant};

    fn gateway() -> HttpGateway {
        HttpGateway::new("http://localhost:8080/", Some("secret"), Duration::from_secs(1)).unwrap()
    }

    fn info(id: &str) -> GroupInfo {
        GroupInfo {
            group_id: id.to_string(),
            name: "G".into(),
            topic: String::new(),
            participants: vec![Participant {
                user_id: "5511".into(),
                is_admin: true,
                is_super_admin: false,
            }],
        }
    }

    #[test]
    fn urls_are_joined_without_double_slashes() {
        let gw = gateway();
        assert_eq!(gw.url("/events"), "http://localhost:8080/events");
        assert_eq!(gw.url("actions/send_text"), "http://localhost:8080/actions/send_text");
    }

    #[test]
    fn self_id_is_unknown_until_connected() {
        assert_eq!(gateway().self_id(), None);
    }

    #[test]
    fn cache_respects_ttl_and_invalidation() {
        let mut gw = gateway();
        gw.groups.insert(
            "g".into(),
            CachedGroup {
                info: info("g"),
                fetched_at: Instant::now(),
            },
        );
        assert!(gw.cached("g").is_some());

        gw.invalidate("g");
        assert!(gw.cached("g").is_none());

        gw.cache_ttl = Duration::ZERO;
        gw.groups.insert(
            "g".into(),
            CachedGroup {
                info: info("g"),
                fetched_at: Instant::now(),
            },
        );
        assert!(gw.cached("g").is_none());
    }

    #[test]
    fn membership_invalidation_reaches_the_cache_through_the_port() {
        let gw = gateway();
        for id in ["g", "h"] {
            gw.groups.insert(
                id.into(),
                CachedGroup {
                    info: info(id),
                    fetched_at: Instant::now(),
                },
            );
        }

        let messenger: &dyn Messenger = &gw;
        messenger.invalidate_group("g");

        assert!(gw.cached("g").is_none());
        assert!(gw.cached("h").is_some());
    }

    #[test]
    fn client_errors_map_to_rejections() {
        let rejected: MessagingError = GatewayError::Status {
            status: 403,
            body: "not admin".into(),
        }
        .into();
        assert!(matches!(rejected, MessagingError::Rejected(_)));

        let transport: MessagingError = GatewayError::Status {
            status: 502,
            body: String::new(),
        }
        .into();
        assert!(matches!(transport, MessagingError::Transport(_)));
    }

    #[test]
    fn decodes_event_batches_and_group_info() {
        let batch: EventBatch = serde_json::from_str(
            r#"{"cursor": 42, "events": [{"type": "bot_joined", "chat_id": "g@g.us"}]}"#,
        )
        .unwrap();
        assert_eq!(batch.cursor, 42);
        assert!(matches!(batch.events[0], InboundEvent::BotJoined { .. }));

        let empty: EventBatch = serde_json::from_str(r#"{"cursor": 7}"#).unwrap();
        assert!(empty.events.is_empty());

        let wire: WireGroupInfo = serde_json::from_str(
            r#"{"id": "g@g.us", "name": "G", "participants": [{"id": "5511", "is_super_admin": true}]}"#,
        )
        .unwrap();
        let info = GroupInfo::from(wire);
        assert!(info.participant("5511").unwrap().has_admin_bit());
    }

    #[test]
    fn action_bodies_skip_unused_fields() {
        let users = vec!["5511".to_string()];
        let body = serde_json::to_value(ActionRequest::new("g").users(&users)).unwrap();
        assert_eq!(body, serde_json::json!({"chat_id": "g", "users": ["5511"]}));

        let body = serde_json::to_value(ActionRequest::new("g").enabled(true)).unwrap();
        assert_eq!(body, serde_json::json!({"chat_id": "g", "enabled": true}));
    }
}
