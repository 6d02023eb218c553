use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::Database;
use shared_models::auth::{AuthUser, Role};
use shared_models::consultation::{Consultation, ConsultationScope, ConsultationStatus, NewConsultation};
use shared_models::response::Page;
use shared_models::user::UserSummary;
use shared_utils::AppContext;

use doctor_cell::{DoctorError, DoctorService};
use realtime_cell::{RelayEvent, RelayEventKind, RoomRelay};

use crate::models::{
    ConsultationDetail, ConsultationError, ConsultationSummary, CreateConsultationRequest,
};
use crate::services::lifecycle;

/// Attempts at a compare-and-set status write before reporting contention.
const MAX_TRANSITION_ATTEMPTS: usize = 3;

pub struct ConsultationService {
    db: Database,
    doctors: DoctorService,
    relay: Arc<dyn RoomRelay>,
}

impl ConsultationService {
    pub fn new(ctx: &AppContext, relay: Arc<dyn RoomRelay>) -> Self {
        Self {
            db: ctx.db.clone(),
            doctors: DoctorService::new(ctx),
            relay,
        }
    }

    pub async fn create(
        &self,
        patient_id: Uuid,
        request: CreateConsultationRequest,
    ) -> Result<Consultation, ConsultationError> {
        debug!("Creating consultation for patient {} with doctor {}", patient_id, request.doctor_id);

        if patient_id == request.doctor_id {
            return Err(ConsultationError::SelfConsultation);
        }

        self.doctors
            .require_available(request.doctor_id)
            .await
            .map_err(|e| match e {
                DoctorError::Store(inner) => ConsultationError::Store(inner),
                _ => ConsultationError::DoctorUnavailable,
            })?;

        let consultation = self
            .db
            .consultations
            .insert_consultation(NewConsultation {
                patient_id,
                doctor_id: request.doctor_id,
                title: request.title.trim().to_string(),
                description: request.description.trim().to_string(),
            })
            .await?;

        info!("Consultation {} created in {}", consultation.id, consultation.status);
        Ok(consultation)
    }

    /// Applies a status change as the assigned doctor or an admin. The write is
    /// conditional on the status that was validated; a lost race re-reads and
    /// re-validates.
    pub async fn transition(
        &self,
        consultation_id: Uuid,
        actor: &AuthUser,
        requested: ConsultationStatus,
    ) -> Result<Consultation, ConsultationError> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let current = self
                .db
                .consultations
                .find_consultation(consultation_id)
                .await?
                .ok_or(ConsultationError::NotFound)?;

            if !(actor.is_admin() || current.doctor_id == actor.id) {
                warn!("User {} tried to change status of consultation {}", actor.id, consultation_id);
                return Err(ConsultationError::NotAssignedDoctor);
            }

            let change = lifecycle::plan_transition(&current, requested, Utc::now())?;

            match self
                .db
                .consultations
                .update_consultation_status(consultation_id, change)
                .await?
            {
                Some(updated) => {
                    info!(
                        "Consultation {} moved {} -> {} by {}",
                        consultation_id, current.status, updated.status, actor.id
                    );
                    self.announce(&updated, actor).await;
                    return Ok(updated);
                }
                None => debug!(
                    "Status of consultation {} changed underneath attempt {}",
                    consultation_id, attempt
                ),
            }
        }

        warn!("Giving up on status change for consultation {}", consultation_id);
        Err(ConsultationError::Contention)
    }

    pub async fn list(
        &self,
        user: &AuthUser,
        status: Option<ConsultationStatus>,
        page: Page,
    ) -> Result<(Vec<ConsultationSummary>, u64), ConsultationError> {
        let scope = match user.role {
            Role::Admin => ConsultationScope::All,
            Role::Doctor => ConsultationScope::Doctor(user.id),
            Role::Patient => ConsultationScope::Patient(user.id),
        };

        let (consultations, total) = self
            .db
            .consultations
            .list_consultations(scope, status, page)
            .await?;

        let mut items = Vec::with_capacity(consultations.len());
        for consultation in consultations {
            items.push(ConsultationSummary {
                patient: self.summary(consultation.patient_id).await?,
                doctor: self.summary(consultation.doctor_id).await?,
                message_count: self.db.messages.count_messages(consultation.id).await?,
                consultation,
            });
        }

        Ok((items, total))
    }

    /// Participants and admins only; anyone else gets `NotFound`.
    pub async fn detail(
        &self,
        consultation_id: Uuid,
        user: &AuthUser,
    ) -> Result<ConsultationDetail, ConsultationError> {
        let consultation = self
            .db
            .consultations
            .find_consultation(consultation_id)
            .await?
            .filter(|c| user.is_admin() || c.is_participant(user.id))
            .ok_or(ConsultationError::NotFound)?;

        Ok(ConsultationDetail {
            patient: self.summary(consultation.patient_id).await?,
            doctor: self.summary(consultation.doctor_id).await?,
            payment: self
                .db
                .payments
                .find_payment_by_consultation(consultation_id)
                .await?,
            messages: self.db.messages.list_all_messages(consultation_id).await?,
            consultation,
        })
    }

    async fn summary(&self, user_id: Uuid) -> Result<Option<UserSummary>, ConsultationError> {
        Ok(self.db.users.find_user(user_id).await?.map(|u| u.summary()))
    }

    async fn announce(&self, consultation: &Consultation, actor: &AuthUser) {
        let event = RelayEvent::new(
            RelayEventKind::ConsultationStatusUpdated,
            consultation.id,
            json!({
                "consultationId": consultation.id,
                "status": consultation.status,
                "startedAt": consultation.started_at,
                "endedAt": consultation.ended_at,
                "updatedBy": actor.id,
            }),
        )
        .from_user(actor.id);
        self.relay.publish(event).await;
    }
}
