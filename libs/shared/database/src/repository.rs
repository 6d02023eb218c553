use async_trait::async_trait;
use uuid::Uuid;

use shared_models::{
    Consultation, ConsultationScope, ConsultationStatus, DoctorListing, DoctorProfile,
    DoctorProfilePatch, Message, NewConsultation, NewDoctorProfile, NewMessage, NewPayment,
    NewUser, Page, Payment, PaymentStatus, PaymentUpdate, StatusChange, User, UserFilter,
    UserPatch,
};

use crate::error::StoreResult;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `UniqueViolation` when the email is taken.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<User>;
    /// Newest first.
    async fn list_users(&self, filter: &UserFilter, page: Page) -> StoreResult<(Vec<User>, u64)>;
}

#[async_trait]
pub trait DoctorProfileRepository: Send + Sync {
    /// One profile per user and one per license number.
    async fn insert_profile(&self, profile: NewDoctorProfile) -> StoreResult<DoctorProfile>;
    async fn find_profile_by_user(&self, user_id: Uuid) -> StoreResult<Option<DoctorProfile>>;
    async fn update_profile_by_user(
        &self,
        user_id: Uuid,
        patch: DoctorProfilePatch,
    ) -> StoreResult<DoctorProfile>;
    /// Active doctors whose profile is marked available.
    async fn list_available_doctors(
        &self,
        specialization: Option<&str>,
        page: Page,
    ) -> StoreResult<(Vec<DoctorListing>, u64)>;
}

#[async_trait]
pub trait ConsultationRepository: Send + Sync {
    async fn insert_consultation(&self, consultation: NewConsultation) -> StoreResult<Consultation>;
    async fn find_consultation(&self, id: Uuid) -> StoreResult<Option<Consultation>>;
    async fn list_consultations(
        &self,
        scope: ConsultationScope,
        status: Option<ConsultationStatus>,
        page: Page,
    ) -> StoreResult<(Vec<Consultation>, u64)>;
    /// Ids of every consultation the user is patient or doctor of.
    async fn consultation_ids_for(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>>;
    /// Compare-and-set on status. `Ok(None)` means the stored status no longer
    /// matched `change.expected`. Existing timestamps are never overwritten.
    async fn update_consultation_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> StoreResult<Option<Consultation>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Fails with `UniqueViolation` when the consultation already has a payment.
    async fn insert_payment(&self, payment: NewPayment) -> StoreResult<Payment>;
    async fn find_payment(&self, id: Uuid) -> StoreResult<Option<Payment>>;
    async fn find_payment_by_consultation(&self, consultation_id: Uuid) -> StoreResult<Option<Payment>>;
    async fn find_payment_by_order_id(&self, order_id: &str) -> StoreResult<Option<Payment>>;
    async fn list_payments_by_payer(
        &self,
        payer_id: Uuid,
        status: Option<PaymentStatus>,
        page: Page,
    ) -> StoreResult<(Vec<Payment>, u64)>;
    /// Compare-and-set on status, `Ok(None)` when `expected` is stale.
    async fn update_payment_if(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        update: PaymentUpdate,
    ) -> StoreResult<Option<Payment>>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert_message(&self, message: NewMessage) -> StoreResult<Message>;
    async fn find_message(&self, id: Uuid) -> StoreResult<Option<Message>>;
    /// Newest first, ties broken by insertion order then id.
    async fn list_recent_messages(
        &self,
        consultation_id: Uuid,
        page: Page,
    ) -> StoreResult<(Vec<Message>, u64)>;
    /// Oldest first.
    async fn list_all_messages(&self, consultation_id: Uuid) -> StoreResult<Vec<Message>>;
    async fn count_messages(&self, consultation_id: Uuid) -> StoreResult<u64>;
    /// Flips `is_read` on messages not sent by `reader_id`; returns how many changed.
    async fn mark_messages_read(&self, consultation_id: Uuid, reader_id: Uuid) -> StoreResult<u64>;
    async fn count_unread(&self, consultation_ids: &[Uuid], reader_id: Uuid) -> StoreResult<u64>;
    async fn delete_message(&self, id: Uuid) -> StoreResult<()>;
}
