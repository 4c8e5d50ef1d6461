// Wire shapes exchanged with the messaging gateway.

use crate::core::messaging::{GroupInfo, InboundEvent, Participant};
use serde::{Deserialize, Serialize};

/// Response of `GET /events?after=<cursor>`.
#[derive(Debug, Deserialize)]
pub struct EventBatch {
    #[serde(default)]
    pub events: Vec<InboundEvent>,
    /// Cursor to pass on the next poll.
    pub cursor: u64,
}

/// Response of `GET /session`.
#[derive(Debug, Deserialize)]
pub struct SessionInfo {
    pub self_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WireParticipant {
    pub id: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_super_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct WireGroupInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub participants: Vec<WireParticipant>,
}

impl From<WireGroupInfo> for GroupInfo {
    fn from(wire: WireGroupInfo) -> Self {
        GroupInfo {
            group_id: wire.id,
            name: wire.name,
            topic: wire.topic,
            participants: wire
                .participants
                .into_iter()
                .map(|p| Participant {
                    user_id: p.id,
                    is_admin: p.is_admin,
                    is_super_admin: p.is_super_admin,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InviteLink {
    pub link: String,
}

/// Body of every `POST /actions/*` call. Unused fields are left out of the JSON.
#[derive(Debug, Default, Serialize)]
pub struct ActionRequest<'a> {
    pub chat_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub users: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl<'a> ActionRequest<'a> {
    pub fn new(chat_id: &'a str) -> Self {
        Self {
            chat_id,
            ..Default::default()
        }
    }

    pub fn text(mut self, text: &'a str) -> Self {
        self.text = Some(text);
        self
    }

    pub fn users(mut self, users: &'a [String]) -> Self {
        self.users = users;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }
}
