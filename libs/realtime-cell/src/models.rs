use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelayEventKind {
    NewMessage,
    MessageDeleted,
    MessagesRead,
    ConsultationStatusUpdated,
    UserTyping,
    JoinedConsultation,
    LeftConsultation,
    Error,
}

/// Server frame. Relayed events carry no authority; the persisted records are the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayEvent {
    pub event: RelayEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultation_id: Option<Uuid>,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    /// User whose action produced the event; never sent to clients.
    #[serde(skip)]
    pub origin: Option<Uuid>,
}

impl RelayEvent {
    pub fn new(event: RelayEventKind, consultation_id: Uuid, data: Value) -> Self {
        Self {
            event,
            consultation_id: Some(consultation_id),
            data,
            timestamp: Utc::now(),
            origin: None,
        }
    }

    pub fn from_user(mut self, user_id: Uuid) -> Self {
        self.origin = Some(user_id);
        self
    }

    pub fn error(message: impl Into<String>, consultation_id: Option<Uuid>) -> Self {
        Self {
            event: RelayEventKind::Error,
            consultation_id,
            data: serde_json::json!({ "message": message.into() }),
            timestamp: Utc::now(),
            origin: None,
        }
    }
}

/// Client frame, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    JoinConsultations,
    #[serde(rename_all = "camelCase")]
    JoinConsultation { consultation_id: Uuid },
    #[serde(rename_all = "camelCase")]
    LeaveConsultation { consultation_id: Uuid },
    #[serde(rename_all = "camelCase")]
    Typing { consultation_id: Uuid, is_typing: bool },
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}
