use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::Database;
use shared_models::consultation::{Consultation, ConsultationStatus};
use shared_models::message::{Message, NewMessage};
use shared_models::payment::PaymentStatus;
use shared_models::response::Page;
use shared_models::user::UserSummary;
use shared_utils::AppContext;

use realtime_cell::{RelayEvent, RelayEventKind, RoomRelay};

use crate::models::{MessageView, MessagingError, SendMessageRequest};

/// Guards message exchange: only participants of an ACTIVE consultation
/// whose payment is PAID may post.
pub struct MessagingGate {
    db: Database,
    relay: Arc<dyn RoomRelay>,
}

impl MessagingGate {
    pub fn new(ctx: &AppContext, relay: Arc<dyn RoomRelay>) -> Self {
        Self {
            db: ctx.db.clone(),
            relay,
        }
    }

    pub async fn send(&self, sender_id: Uuid, request: SendMessageRequest) -> Result<MessageView, MessagingError> {
        let consultation = self.participant_consultation(request.consultation_id, sender_id).await?;

        if consultation.status != ConsultationStatus::Active {
            warn!(
                "Message to consultation {} rejected: status {}",
                consultation.id, consultation.status
            );
            return Err(MessagingError::NotActive(consultation.status));
        }

        let payment_status = self
            .db
            .payments
            .find_payment_by_consultation(consultation.id)
            .await?
            .map(|p| p.status);
        if payment_status != Some(PaymentStatus::Paid) {
            warn!(
                "Message to consultation {} rejected: payment {:?}",
                consultation.id, payment_status
            );
            return Err(MessagingError::PaymentRequired(payment_status));
        }

        let file_url = request.file_url.filter(|u| !u.trim().is_empty());
        if request.message_type.carries_file() && file_url.is_none() {
            return Err(MessagingError::MissingFile(request.message_type.as_str()));
        }

        let message = self
            .db
            .messages
            .insert_message(NewMessage {
                consultation_id: consultation.id,
                sender_id,
                content: request.content,
                message_type: request.message_type,
                file_url,
                file_name: request.file_name,
            })
            .await?;
        info!("Message {} persisted in consultation {}", message.id, consultation.id);

        let view = MessageView {
            sender: self.summary(sender_id).await?,
            message,
        };
        self.relay
            .publish(
                RelayEvent::new(
                    RelayEventKind::NewMessage,
                    consultation.id,
                    serde_json::to_value(&view).unwrap_or_default(),
                )
                    .from_user(sender_id),
            )
            .await;

        Ok(view)
    }

    /// One page, newest-first in storage, returned oldest-first. Messages from
    /// the other party are marked read as a side effect.
    pub async fn list(
        &self,
        consultation_id: Uuid,
        requester_id: Uuid,
        page: Page,
    ) -> Result<(Vec<MessageView>, u64), MessagingError> {
        let consultation = self.participant_consultation(consultation_id, requester_id).await?;

        let (mut messages, total) = self
            .db
            .messages
            .list_recent_messages(consultation_id, page)
            .await?;
        messages.reverse();

        self.mark_read_in(&consultation, requester_id).await?;

        let senders = self.participant_summaries(&consultation).await?;
        let views = messages
            .into_iter()
            .map(|message| MessageView {
                sender: senders.get(&message.sender_id).cloned(),
                message,
            })
            .collect();

        Ok((views, total))
    }

    pub async fn mark_read(&self, consultation_id: Uuid, reader_id: Uuid) -> Result<u64, MessagingError> {
        let consultation = self.participant_consultation(consultation_id, reader_id).await?;
        self.mark_read_in(&consultation, reader_id).await
    }

    /// Unread messages from others across every consultation the user is in.
    pub async fn unread_count(&self, user_id: Uuid) -> Result<u64, MessagingError> {
        let ids = self.db.consultations.consultation_ids_for(user_id).await?;
        Ok(self.db.messages.count_unread(&ids, user_id).await?)
    }

    /// Only the sender may delete, with no time limit.
    pub async fn delete(&self, message_id: Uuid, requester_id: Uuid) -> Result<(), MessagingError> {
        let message: Message = self
            .db
            .messages
            .find_message(message_id)
            .await?
            .filter(|m| m.sender_id == requester_id)
            .ok_or(MessagingError::MessageNotFound)?;

        self.db.messages.delete_message(message_id).await?;
        info!("Message {} deleted by sender", message_id);

        self.relay
            .publish(
                RelayEvent::new(
                    RelayEventKind::MessageDeleted,
                    message.consultation_id,
                    json!({ "messageId": message_id, "consultationId": message.consultation_id }),
                )
                .from_user(requester_id),
            )
            .await;
        Ok(())
    }

    async fn participant_consultation(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Consultation, MessagingError> {
        self.db
            .consultations
            .find_consultation(consultation_id)
            .await?
            .filter(|c| c.is_participant(user_id))
            .ok_or_else(|| {
                debug!("User {} is not a participant of {}", user_id, consultation_id);
                MessagingError::ConsultationNotFound
            })
    }

    async fn mark_read_in(&self, consultation: &Consultation, reader_id: Uuid) -> Result<u64, MessagingError> {
        let flipped = self
            .db
            .messages
            .mark_messages_read(consultation.id, reader_id)
            .await?;

        if flipped > 0 {
            debug!("Marked {} messages read in {}", flipped, consultation.id);
            self.relay
                .publish(
                    RelayEvent::new(
                        RelayEventKind::MessagesRead,
                        consultation.id,
                        json!({ "consultationId": consultation.id, "readerId": reader_id, "count": flipped }),
                    )
                    .from_user(reader_id),
                )
                .await;
        }
        Ok(flipped)
    }

    async fn summary(&self, user_id: Uuid) -> Result<Option<UserSummary>, MessagingError> {
        Ok(self.db.users.find_user(user_id).await?.map(|u| u.summary()))
    }

    async fn participant_summaries(
        &self,
        consultation: &Consultation,
    ) -> Result<HashMap<Uuid, UserSummary>, MessagingError> {
        let mut senders = HashMap::new();
        for id in [consultation.patient_id, consultation.doctor_id] {
            if let Some(summary) = self.summary(id).await? {
                senders.insert(id, summary);
            }
        }
        Ok(senders)
    }
}
