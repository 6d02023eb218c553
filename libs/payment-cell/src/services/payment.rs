use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{Database, StoreError};
use shared_models::payment::{NewPayment, Payment, PaymentStatus};
use shared_models::response::Page;
use shared_utils::AppContext;

use crate::models::{InitiatedPayment, PaymentError, PaymentHistoryItem};
use crate::services::gateway::{Customer, PaymentGateway, SessionRequest, TransactionStatus};
use crate::services::reconcile::{generate_order_id, plan_update};

const MAX_RECONCILE_ATTEMPTS: usize = 3;

pub struct PaymentService {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    client_url: String,
}

impl PaymentService {
    pub fn new(ctx: &AppContext, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            db: ctx.db.clone(),
            gateway,
            client_url: ctx.config.client_url.trim_end_matches('/').to_string(),
        }
    }

    /// Opens a hosted checkout for the consultation's fee. One payment per
    /// consultation is enforced by storage; the early lookup only gives a
    /// friendlier answer in the common case.
    pub async fn initiate(
        &self,
        patient_id: Uuid,
        consultation_id: Uuid,
    ) -> Result<InitiatedPayment, PaymentError> {
        debug!("Initiating payment for consultation {}", consultation_id);

        let consultation = self
            .db
            .consultations
            .find_consultation(consultation_id)
            .await?
            .ok_or(PaymentError::ConsultationNotFound)?;
        if consultation.patient_id != patient_id {
            warn!("User {} tried to pay for consultation {}", patient_id, consultation_id);
            return Err(PaymentError::NotConsultationPatient);
        }

        if self
            .db
            .payments
            .find_payment_by_consultation(consultation_id)
            .await?
            .is_some()
        {
            return Err(PaymentError::AlreadyExists);
        }

        let profile = self
            .db
            .doctors
            .find_profile_by_user(consultation.doctor_id)
            .await?
            .ok_or(PaymentError::DoctorProfileNotFound)?;
        let doctor = self.db.users.find_user(consultation.doctor_id).await?;
        let patient = self
            .db
            .users
            .find_user(patient_id)
            .await?
            .ok_or(PaymentError::ConsultationNotFound)?;

        let order_id = generate_order_id();
        let request = SessionRequest {
            order_id: order_id.clone(),
            amount: profile.consultation_fee,
            customer: Customer {
                first_name: patient.full_name,
                email: patient.email,
                phone: patient.phone.unwrap_or_default(),
            },
            item_id: consultation_id.to_string(),
            item_name: format!(
                "Consultation with Dr. {}",
                doctor.map(|d| d.full_name).unwrap_or_default()
            ),
            finish_url: format!("{}/payment/finish", self.client_url),
            error_url: format!("{}/payment/error", self.client_url),
            pending_url: format!("{}/payment/pending", self.client_url),
        };

        let session = self.gateway.create_session(&request).await?;

        let payment = self
            .db
            .payments
            .insert_payment(NewPayment {
                consultation_id,
                payer_id: patient_id,
                amount: profile.consultation_fee,
                gateway_order_id: order_id,
                raw_gateway_payload: session.raw,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(c) if c.contains("consultation") => {
                    PaymentError::AlreadyExists
                }
                other => PaymentError::Store(other),
            })?;

        info!(
            "Payment {} created for consultation {} with order {}",
            payment.id, consultation_id, payment.gateway_order_id
        );

        Ok(InitiatedPayment {
            payment,
            snap_token: session.token,
            snap_redirect_url: session.redirect_url,
        })
    }

    /// Applies a pushed gateway notification. Safe to repeat: redelivery of
    /// the same or an older status never regresses the stored payment.
    pub async fn handle_notification(&self, payload: &Value) -> Result<Payment, PaymentError> {
        let reported = self.gateway.verify_notification(payload).await?;
        info!(
            "Gateway notification for order {}: {} (fraud: {:?})",
            reported.order_id, reported.transaction_status, reported.fraud_status
        );

        let payment = self
            .db
            .payments
            .find_payment_by_order_id(&reported.order_id)
            .await?
            .ok_or(PaymentError::NotFound)?;

        self.reconcile(payment, &reported).await
    }

    /// Returns the payer's payment, refreshing it from the gateway while it is
    /// still pending. Gateway failures fall back to the stored state.
    pub async fn poll_status(&self, payment_id: Uuid, requester_id: Uuid) -> Result<Payment, PaymentError> {
        let payment = self
            .db
            .payments
            .find_payment(payment_id)
            .await?
            .ok_or(PaymentError::NotFound)?;
        if payment.payer_id != requester_id {
            return Err(PaymentError::NotPayer);
        }

        if payment.status != PaymentStatus::Pending {
            return Ok(payment);
        }

        let reported = match self.gateway.query_status(&payment.gateway_order_id).await {
            Ok(reported) => reported,
            Err(e) => {
                warn!("Gateway status check failed for {}: {}", payment.gateway_order_id, e);
                return Ok(payment);
            }
        };

        match self.reconcile(payment.clone(), &reported).await {
            Ok(updated) => Ok(updated),
            Err(PaymentError::Contention) => Ok(payment),
            Err(e) => Err(e),
        }
    }

    pub async fn history(
        &self,
        payer_id: Uuid,
        status: Option<PaymentStatus>,
        page: Page,
    ) -> Result<(Vec<PaymentHistoryItem>, u64), PaymentError> {
        let (payments, total) = self
            .db
            .payments
            .list_payments_by_payer(payer_id, status, page)
            .await?;

        let mut items = Vec::with_capacity(payments.len());
        for payment in payments {
            let consultation = self
                .db
                .consultations
                .find_consultation(payment.consultation_id)
                .await?;
            let doctor = match &consultation {
                Some(c) => self.db.users.find_user(c.doctor_id).await?.map(|u| u.summary()),
                None => None,
            };
            items.push(PaymentHistoryItem {
                payment,
                consultation,
                doctor,
            });
        }

        Ok((items, total))
    }

    /// Compare-and-set loop: the write only lands while the stored status is
    /// the one the update was planned against.
    async fn reconcile(&self, mut current: Payment, reported: &TransactionStatus) -> Result<Payment, PaymentError> {
        for attempt in 1..=MAX_RECONCILE_ATTEMPTS {
            let update = plan_update(&current, reported, Utc::now());
            let target = update.status;

            if let Some(updated) = self
                .db
                .payments
                .update_payment_if(current.id, current.status, update)
                .await?
            {
                match target {
                    Some(status) => info!(
                        "Payment {} reconciled {} -> {}",
                        updated.id, current.status, status
                    ),
                    None => debug!(
                        "Payment {} stays {} after {}",
                        updated.id, updated.status, reported.transaction_status
                    ),
                }
                return Ok(updated);
            }

            debug!("Payment {} changed underneath attempt {}", current.id, attempt);
            current = self
                .db
                .payments
                .find_payment(current.id)
                .await?
                .ok_or(PaymentError::NotFound)?;
        }

        warn!("Giving up reconciling payment {}", current.id);
        Err(PaymentError::Contention)
    }
}
