use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_models::{
    Consultation, ConsultationScope, ConsultationStatus, DoctorListing, DoctorProfile,
    DoctorProfilePatch, Message, NewConsultation, NewDoctorProfile, NewMessage, NewPayment,
    NewUser, Page, Payment, PaymentStatus, PaymentUpdate, Role, StatusChange, User, UserFilter,
    UserPatch,
};

use crate::error::{StoreError, StoreResult};
use crate::repository::{
    ConsultationRepository, DoctorProfileRepository, MessageRepository, PaymentRepository,
    UserRepository,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    doctor_profiles: HashMap<Uuid, DoctorProfile>,
    consultations: HashMap<Uuid, Consultation>,
    payments: HashMap<Uuid, Payment>,
    // insertion order doubles as the tie-breaker for equal timestamps
    messages: Vec<Message>,
}

/// Single-node store. Every constraint and compare-and-set predicate is
/// evaluated while holding the write lock.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(items: Vec<T>, page: Page) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let window = items
        .into_iter()
        .skip(page.offset())
        .take(page.limit as usize)
        .collect();
    (window, total)
}

fn sort_newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, new: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            full_name: new.full_name,
            phone: new.phone,
            photo: None,
            role: new.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;

        if let Some(full_name) = patch.full_name {
            user.full_name = full_name;
        }
        if let Some(phone) = patch.phone {
            user.phone = Some(phone);
        }
        if let Some(photo) = patch.photo {
            user.photo = Some(photo);
        }
        if let Some(is_active) = patch.is_active {
            user.is_active = is_active;
        }
        if let Some(password_hash) = patch.password_hash {
            user.password_hash = password_hash;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn list_users(&self, filter: &UserFilter, page: Page) -> StoreResult<(Vec<User>, u64)> {
        let tables = self.tables.read().await;
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());

        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| filter.role.map_or(true, |role| u.role == role))
            .filter(|u| {
                needle.as_ref().map_or(true, |n| {
                    u.full_name.to_lowercase().contains(n) || u.email.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        sort_newest_first(&mut users, |u| (u.created_at, u.id));
        Ok(paginate(users, page))
    }
}

#[async_trait]
impl DoctorProfileRepository for InMemoryStore {
    async fn insert_profile(&self, new: NewDoctorProfile) -> StoreResult<DoctorProfile> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&new.user_id) {
            return Err(StoreError::CheckViolation(
                "doctor_profiles_user_id_fkey".to_string(),
            ));
        }
        if tables.doctor_profiles.values().any(|p| p.user_id == new.user_id) {
            return Err(StoreError::UniqueViolation(
                "doctor_profiles_user_id_key".to_string(),
            ));
        }
        if tables
            .doctor_profiles
            .values()
            .any(|p| p.license_number == new.license_number)
        {
            return Err(StoreError::UniqueViolation(
                "doctor_profiles_license_number_key".to_string(),
            ));
        }

        let now = Utc::now();
        let profile = DoctorProfile {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            specialization: new.specialization,
            license_number: new.license_number,
            experience_years: new.experience_years,
            education: new.education,
            consultation_fee: new.consultation_fee,
            is_available: true,
            bio: new.bio,
            created_at: now,
            updated_at: now,
        };
        tables.doctor_profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn find_profile_by_user(&self, user_id: Uuid) -> StoreResult<Option<DoctorProfile>> {
        let tables = self.tables.read().await;
        Ok(tables
            .doctor_profiles
            .values()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn update_profile_by_user(
        &self,
        user_id: Uuid,
        patch: DoctorProfilePatch,
    ) -> StoreResult<DoctorProfile> {
        let mut tables = self.tables.write().await;
        let profile = tables
            .doctor_profiles
            .values_mut()
            .find(|p| p.user_id == user_id)
            .ok_or(StoreError::NotFound)?;

        if let Some(specialization) = patch.specialization {
            profile.specialization = specialization;
        }
        if let Some(years) = patch.experience_years {
            profile.experience_years = years;
        }
        if let Some(education) = patch.education {
            profile.education = education;
        }
        if let Some(fee) = patch.consultation_fee {
            profile.consultation_fee = fee;
        }
        if let Some(available) = patch.is_available {
            profile.is_available = available;
        }
        if let Some(bio) = patch.bio {
            profile.bio = Some(bio);
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn list_available_doctors(
        &self,
        specialization: Option<&str>,
        page: Page,
    ) -> StoreResult<(Vec<DoctorListing>, u64)> {
        let tables = self.tables.read().await;
        let needle = specialization.map(|s| s.to_lowercase());

        let mut listings: Vec<(DateTime<Utc>, DoctorListing)> = tables
            .doctor_profiles
            .values()
            .filter(|p| p.is_available)
            .filter(|p| {
                needle
                    .as_ref()
                    .map_or(true, |n| p.specialization.to_lowercase().contains(n))
            })
            .filter_map(|p| {
                let user = tables.users.get(&p.user_id)?;
                (user.is_active && user.role == Role::Doctor).then(|| {
                    (
                        user.created_at,
                        DoctorListing {
                            user: user.summary(),
                            doctor_profile: p.clone(),
                        },
                    )
                })
            })
            .collect();
        sort_newest_first(&mut listings, |(created_at, l)| (*created_at, l.user.id));

        Ok(paginate(
            listings.into_iter().map(|(_, listing)| listing).collect(),
            page,
        ))
    }
}

#[async_trait]
impl ConsultationRepository for InMemoryStore {
    async fn insert_consultation(&self, new: NewConsultation) -> StoreResult<Consultation> {
        if new.patient_id == new.doctor_id {
            return Err(StoreError::CheckViolation(
                "Patient and doctor must be different users".to_string(),
            ));
        }

        let now = Utc::now();
        let consultation = Consultation {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            title: new.title,
            description: new.description,
            status: ConsultationStatus::Pending,
            started_at: None,
            ended_at: None,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .consultations
            .insert(consultation.id, consultation.clone());
        Ok(consultation)
    }

    async fn find_consultation(&self, id: Uuid) -> StoreResult<Option<Consultation>> {
        Ok(self.tables.read().await.consultations.get(&id).cloned())
    }

    async fn list_consultations(
        &self,
        scope: ConsultationScope,
        status: Option<ConsultationStatus>,
        page: Page,
    ) -> StoreResult<(Vec<Consultation>, u64)> {
        let tables = self.tables.read().await;
        let mut items: Vec<Consultation> = tables
            .consultations
            .values()
            .filter(|c| scope.includes(c))
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        sort_newest_first(&mut items, |c| (c.created_at, c.id));
        Ok(paginate(items, page))
    }

    async fn consultation_ids_for(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let tables = self.tables.read().await;
        Ok(tables
            .consultations
            .values()
            .filter(|c| c.is_participant(user_id))
            .map(|c| c.id)
            .collect())
    }

    async fn update_consultation_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> StoreResult<Option<Consultation>> {
        let mut tables = self.tables.write().await;
        let consultation = tables.consultations.get_mut(&id).ok_or(StoreError::NotFound)?;

        if consultation.status != change.expected {
            return Ok(None);
        }

        consultation.status = change.new_status;
        if consultation.started_at.is_none() {
            consultation.started_at = change.started_at;
        }
        if consultation.ended_at.is_none() {
            consultation.ended_at = change.ended_at;
        }
        consultation.updated_at = Utc::now();
        Ok(Some(consultation.clone()))
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert_payment(&self, new: NewPayment) -> StoreResult<Payment> {
        let mut tables = self.tables.write().await;
        if tables
            .payments
            .values()
            .any(|p| p.consultation_id == new.consultation_id)
        {
            return Err(StoreError::UniqueViolation(
                "payments_consultation_id_key".to_string(),
            ));
        }
        if tables
            .payments
            .values()
            .any(|p| p.gateway_order_id == new.gateway_order_id)
        {
            return Err(StoreError::UniqueViolation(
                "payments_gateway_order_id_key".to_string(),
            ));
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            consultation_id: new.consultation_id,
            payer_id: new.payer_id,
            amount: new.amount,
            status: PaymentStatus::Pending,
            gateway_order_id: new.gateway_order_id,
            gateway_transaction_id: None,
            payment_method: None,
            paid_at: None,
            raw_gateway_payload: new.raw_gateway_payload,
            created_at: now,
            updated_at: now,
        };
        tables.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn find_payment(&self, id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&id).cloned())
    }

    async fn find_payment_by_consultation(&self, consultation_id: Uuid) -> StoreResult<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .find(|p| p.consultation_id == consultation_id)
            .cloned())
    }

    async fn find_payment_by_order_id(&self, order_id: &str) -> StoreResult<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .find(|p| p.gateway_order_id == order_id)
            .cloned())
    }

    async fn list_payments_by_payer(
        &self,
        payer_id: Uuid,
        status: Option<PaymentStatus>,
        page: Page,
    ) -> StoreResult<(Vec<Payment>, u64)> {
        let tables = self.tables.read().await;
        let mut items: Vec<Payment> = tables
            .payments
            .values()
            .filter(|p| p.payer_id == payer_id)
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        sort_newest_first(&mut items, |p| (p.created_at, p.id));
        Ok(paginate(items, page))
    }

    async fn update_payment_if(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        update: PaymentUpdate,
    ) -> StoreResult<Option<Payment>> {
        let mut tables = self.tables.write().await;
        let payment = tables.payments.get_mut(&id).ok_or(StoreError::NotFound)?;

        if payment.status != expected {
            return Ok(None);
        }

        if let Some(status) = update.status {
            payment.status = status;
        }
        if payment.paid_at.is_none() {
            payment.paid_at = update.paid_at;
        }
        if update.gateway_transaction_id.is_some() {
            payment.gateway_transaction_id = update.gateway_transaction_id;
        }
        if update.payment_method.is_some() {
            payment.payment_method = update.payment_method;
        }
        payment.raw_gateway_payload = update.raw_gateway_payload;
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn insert_message(&self, new: NewMessage) -> StoreResult<Message> {
        let mut tables = self.tables.write().await;
        if !tables.consultations.contains_key(&new.consultation_id) {
            return Err(StoreError::CheckViolation(
                "messages_consultation_id_fkey".to_string(),
            ));
        }

        let message = Message {
            id: Uuid::new_v4(),
            consultation_id: new.consultation_id,
            sender_id: new.sender_id,
            content: new.content,
            message_type: new.message_type,
            file_url: new.file_url,
            file_name: new.file_name,
            is_read: false,
            created_at: Utc::now(),
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn find_message(&self, id: Uuid) -> StoreResult<Option<Message>> {
        let tables = self.tables.read().await;
        Ok(tables.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn list_recent_messages(
        &self,
        consultation_id: Uuid,
        page: Page,
    ) -> StoreResult<(Vec<Message>, u64)> {
        let mut items = self.list_all_messages(consultation_id).await?;
        items.reverse();
        Ok(paginate(items, page))
    }

    async fn list_all_messages(&self, consultation_id: Uuid) -> StoreResult<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut items: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.consultation_id == consultation_id)
            .cloned()
            .collect();
        // stable: equal timestamps keep insertion order
        items.sort_by_key(|m| m.created_at);
        Ok(items)
    }

    async fn count_messages(&self, consultation_id: Uuid) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.consultation_id == consultation_id)
            .count() as u64)
    }

    async fn mark_messages_read(&self, consultation_id: Uuid, reader_id: Uuid) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let mut flipped = 0;
        for message in tables.messages.iter_mut().filter(|m| {
            m.consultation_id == consultation_id && m.sender_id != reader_id && !m.is_read
        }) {
            message.is_read = true;
            flipped += 1;
        }
        Ok(flipped)
    }

    async fn count_unread(&self, consultation_ids: &[Uuid], reader_id: Uuid) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| {
                consultation_ids.contains(&m.consultation_id)
                    && m.sender_id != reader_id
                    && !m.is_read
            })
            .count() as u64)
    }

    async fn delete_message(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let index = tables
            .messages
            .iter()
            .position(|m| m.id == id)
            .ok_or(StoreError::NotFound)?;
        tables.messages.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use shared_models::MessageType;

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            full_name: "Test User".to_string(),
            phone: None,
            role,
        }
    }

    async fn consultation(store: &InMemoryStore) -> Consultation {
        let patient = store.insert_user(new_user("p@example.com", Role::Patient)).await.unwrap();
        let doctor = store.insert_user(new_user("d@example.com", Role::Doctor)).await.unwrap();
        store
            .insert_consultation(NewConsultation {
                patient_id: patient.id,
                doctor_id: doctor.id,
                title: "Headache".to_string(),
                description: "Three days".to_string(),
            })
            .await
            .unwrap()
    }

    fn new_payment(consultation_id: Uuid, payer_id: Uuid, order_id: &str) -> NewPayment {
        NewPayment {
            consultation_id,
            payer_id,
            amount: 75_000,
            gateway_order_id: order_id.to_string(),
            raw_gateway_payload: json!({}),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let store = InMemoryStore::new();
        store.insert_user(new_user("a@example.com", Role::Patient)).await.unwrap();

        let err = store
            .insert_user(new_user("a@example.com", Role::Doctor))
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::UniqueViolation(_));
    }

    #[tokio::test]
    async fn one_payment_per_consultation() {
        let store = InMemoryStore::new();
        let c = consultation(&store).await;

        store.insert_payment(new_payment(c.id, c.patient_id, "ORDER-1")).await.unwrap();
        let err = store
            .insert_payment(new_payment(c.id, c.patient_id, "ORDER-2"))
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::UniqueViolation(name) if name == "payments_consultation_id_key");
    }

    #[tokio::test]
    async fn consultation_status_is_compare_and_set() {
        let store = InMemoryStore::new();
        let c = consultation(&store).await;
        let started = Utc::now();

        let activated = store
            .update_consultation_status(
                c.id,
                StatusChange {
                    expected: ConsultationStatus::Pending,
                    new_status: ConsultationStatus::Active,
                    started_at: Some(started),
                    ended_at: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(activated.status, ConsultationStatus::Active);
        assert_eq!(activated.started_at, Some(started));

        let stale = store
            .update_consultation_status(
                c.id,
                StatusChange {
                    expected: ConsultationStatus::Pending,
                    new_status: ConsultationStatus::Cancelled,
                    started_at: None,
                    ended_at: None,
                },
            )
            .await
            .unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn stale_payment_update_is_rejected() {
        let store = InMemoryStore::new();
        let c = consultation(&store).await;
        let payment = store.insert_payment(new_payment(c.id, c.patient_id, "ORDER-1")).await.unwrap();

        let update = PaymentUpdate {
            status: Some(PaymentStatus::Paid),
            paid_at: Some(Utc::now()),
            gateway_transaction_id: Some("tx-1".to_string()),
            payment_method: Some("bank_transfer".to_string()),
            raw_gateway_payload: json!({"transaction_status": "settlement"}),
        };
        let paid = store
            .update_payment_if(payment.id, PaymentStatus::Pending, update.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);

        let again = store
            .update_payment_if(payment.id, PaymentStatus::Pending, update)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn unread_count_ignores_own_messages() {
        let store = InMemoryStore::new();
        let c = consultation(&store).await;

        for sender in [c.patient_id, c.doctor_id, c.doctor_id] {
            store
                .insert_message(NewMessage {
                    consultation_id: c.id,
                    sender_id: sender,
                    content: "hi".to_string(),
                    message_type: MessageType::Text,
                    file_url: None,
                    file_name: None,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.count_unread(&[c.id], c.patient_id).await.unwrap(), 2);
        assert_eq!(store.mark_messages_read(c.id, c.patient_id).await.unwrap(), 2);
        assert_eq!(store.count_unread(&[c.id], c.patient_id).await.unwrap(), 0);
        assert_eq!(store.count_unread(&[c.id], c.doctor_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn recent_messages_page_newest_first() {
        let store = InMemoryStore::new();
        let c = consultation(&store).await;

        for i in 0..5 {
            store
                .insert_message(NewMessage {
                    consultation_id: c.id,
                    sender_id: c.patient_id,
                    content: format!("m{}", i),
                    message_type: MessageType::Text,
                    file_url: None,
                    file_name: None,
                })
                .await
                .unwrap();
        }

        let (first, total) = store
            .list_recent_messages(c.id, Page::new(Some(1), Some(2), 50))
            .await
            .unwrap();
        assert_eq!(total, 5);
        let contents: Vec<_> = first.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m4", "m3"]);
    }
}
