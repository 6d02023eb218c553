use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{
    Consultation, ConsultationScope, ConsultationStatus, DoctorListing, DoctorProfile,
    DoctorProfilePatch, Message, MessageType, NewConsultation, NewDoctorProfile, NewMessage,
    NewPayment, NewUser, Page, Payment, PaymentStatus, PaymentUpdate, Role, StatusChange, User,
    UserFilter, UserPatch,
};

use crate::error::{StoreError, StoreResult};
use crate::repository::{
    ConsultationRepository, DoctorProfileRepository, MessageRepository, PaymentRepository,
    UserRepository,
};
use crate::supabase::SupabaseClient;

const USER_COLUMNS: &str =
    "id,email,password_hash,full_name,phone,photo,role,is_active,created_at,updated_at";

/// Repositories backed by Supabase PostgREST. Uniqueness and check
/// constraints live in `migrations/0001_init.sql`.
pub struct PostgrestStore {
    supabase: SupabaseClient,
}

impl PostgrestStore {
    pub fn new(config: &AppConfig) -> StoreResult<Self> {
        Ok(Self {
            supabase: SupabaseClient::new(config)?,
        })
    }

    pub fn with_client(supabase: SupabaseClient) -> Self {
        Self { supabase }
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(&self, path: &str) -> StoreResult<Vec<T>> {
        Ok(self.supabase.request(Method::GET, path, None).await?)
    }

    async fn fetch_one<T: for<'de> Deserialize<'de>>(&self, path: &str) -> StoreResult<Option<T>> {
        Ok(self.fetch(path).await?.into_iter().next())
    }

    async fn write<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> StoreResult<Vec<T>> {
        Ok(self
            .supabase
            .request_with_headers(method, path, body, Some(representation()))
            .await?)
    }

    async fn count(&self, path: &str) -> StoreResult<u64> {
        let (_, total) = self.supabase.request_with_count::<Vec<Value>>(path).await?;
        Ok(total)
    }
}

fn representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

fn first<T>(rows: Vec<T>) -> StoreResult<T> {
    rows.into_iter().next().ok_or(StoreError::NotFound)
}

fn window(page: Page) -> String {
    format!("offset={}&limit={}", page.offset(), page.limit)
}

fn ilike(value: &str) -> String {
    urlencoding::encode(&format!("*{}*", value)).into_owned()
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: Uuid,
    email: String,
    #[serde(default)]
    password_hash: String,
    full_name: String,
    phone: Option<String>,
    photo: Option<String>,
    role: Role,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            full_name: row.full_name,
            phone: row.phone,
            photo: row.photo,
            role: row.role,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DoctorProfileRow {
    id: Uuid,
    user_id: Uuid,
    specialization: String,
    license_number: String,
    experience_years: i32,
    education: String,
    consultation_fee: i64,
    is_available: bool,
    bio: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DoctorProfileRow> for DoctorProfile {
    fn from(row: DoctorProfileRow) -> Self {
        DoctorProfile {
            id: row.id,
            user_id: row.user_id,
            specialization: row.specialization,
            license_number: row.license_number,
            experience_years: row.experience_years,
            education: row.education,
            consultation_fee: row.consultation_fee,
            is_available: row.is_available,
            bio: row.bio,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// PostgREST embeds a one-to-one relation as an object, older versions as an array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Embedded<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Embedded<T> {
    fn into_first(self) -> Option<T> {
        match self {
            Embedded::One(item) => Some(item),
            Embedded::Many(items) => items.into_iter().next(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DoctorUserRow {
    #[serde(flatten)]
    user: UserRow,
    doctor_profiles: Embedded<DoctorProfileRow>,
}

#[derive(Debug, Deserialize)]
struct ConsultationRow {
    id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    title: String,
    description: String,
    status: ConsultationStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConsultationRow> for Consultation {
    fn from(row: ConsultationRow) -> Self {
        Consultation {
            id: row.id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            title: row.title,
            description: row.description,
            status: row.status,
            started_at: row.started_at,
            ended_at: row.ended_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PaymentRow {
    id: Uuid,
    consultation_id: Uuid,
    payer_id: Uuid,
    amount: i64,
    status: PaymentStatus,
    gateway_order_id: String,
    gateway_transaction_id: Option<String>,
    payment_method: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    raw_gateway_payload: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id,
            consultation_id: row.consultation_id,
            payer_id: row.payer_id,
            amount: row.amount,
            status: row.status,
            gateway_order_id: row.gateway_order_id,
            gateway_transaction_id: row.gateway_transaction_id,
            payment_method: row.payment_method,
            paid_at: row.paid_at,
            raw_gateway_payload: row.raw_gateway_payload,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageRow {
    id: Uuid,
    consultation_id: Uuid,
    sender_id: Uuid,
    content: String,
    message_type: MessageType,
    file_url: Option<String>,
    file_name: Option<String>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            consultation_id: row.consultation_id,
            sender_id: row.sender_id,
            content: row.content,
            message_type: row.message_type,
            file_url: row.file_url,
            file_name: row.file_name,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl UserRepository for PostgrestStore {
    async fn insert_user(&self, new: NewUser) -> StoreResult<User> {
        let body = json!({
            "email": new.email,
            "password_hash": new.password_hash,
            "full_name": new.full_name,
            "phone": new.phone,
            "role": new.role,
            "is_active": true,
        });
        let rows: Vec<UserRow> = self.write(Method::POST, "/rest/v1/users", Some(body)).await?;
        Ok(first(rows)?.into())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let path = format!("/rest/v1/users?select={}&id=eq.{}", USER_COLUMNS, id);
        Ok(self.fetch_one::<UserRow>(&path).await?.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let path = format!(
            "/rest/v1/users?select={}&email=eq.{}",
            USER_COLUMNS,
            urlencoding::encode(email)
        );
        Ok(self.fetch_one::<UserRow>(&path).await?.map(User::from))
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<User> {
        let mut body = Map::new();
        if let Some(full_name) = patch.full_name {
            body.insert("full_name".into(), json!(full_name));
        }
        if let Some(phone) = patch.phone {
            body.insert("phone".into(), json!(phone));
        }
        if let Some(photo) = patch.photo {
            body.insert("photo".into(), json!(photo));
        }
        if let Some(is_active) = patch.is_active {
            body.insert("is_active".into(), json!(is_active));
        }
        if let Some(password_hash) = patch.password_hash {
            body.insert("password_hash".into(), json!(password_hash));
        }
        body.insert("updated_at".into(), json!(Utc::now()));

        let path = format!("/rest/v1/users?id=eq.{}", id);
        let rows: Vec<UserRow> = self
            .write(Method::PATCH, &path, Some(Value::Object(body)))
            .await?;
        Ok(first(rows)?.into())
    }

    async fn list_users(&self, filter: &UserFilter, page: Page) -> StoreResult<(Vec<User>, u64)> {
        let mut path = format!(
            "/rest/v1/users?select={}&order=created_at.desc,id.desc&{}",
            USER_COLUMNS,
            window(page)
        );
        if let Some(role) = filter.role {
            path.push_str(&format!("&role=eq.{}", role));
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = ilike(search);
            path.push_str(&format!(
                "&or=(full_name.ilike.{},email.ilike.{})",
                pattern, pattern
            ));
        }

        let (rows, total): (Vec<UserRow>, u64) = self.supabase.request_with_count(&path).await?;
        Ok((rows.into_iter().map(User::from).collect(), total))
    }
}

#[async_trait]
impl DoctorProfileRepository for PostgrestStore {
    async fn insert_profile(&self, new: NewDoctorProfile) -> StoreResult<DoctorProfile> {
        let body = json!({
            "user_id": new.user_id,
            "specialization": new.specialization,
            "license_number": new.license_number,
            "experience_years": new.experience_years,
            "education": new.education,
            "consultation_fee": new.consultation_fee,
            "is_available": true,
            "bio": new.bio,
        });
        let rows: Vec<DoctorProfileRow> = self
            .write(Method::POST, "/rest/v1/doctor_profiles", Some(body))
            .await?;
        Ok(first(rows)?.into())
    }

    async fn find_profile_by_user(&self, user_id: Uuid) -> StoreResult<Option<DoctorProfile>> {
        let path = format!("/rest/v1/doctor_profiles?user_id=eq.{}", user_id);
        Ok(self
            .fetch_one::<DoctorProfileRow>(&path)
            .await?
            .map(DoctorProfile::from))
    }

    async fn update_profile_by_user(
        &self,
        user_id: Uuid,
        patch: DoctorProfilePatch,
    ) -> StoreResult<DoctorProfile> {
        let mut body = Map::new();
        if let Some(specialization) = patch.specialization {
            body.insert("specialization".into(), json!(specialization));
        }
        if let Some(years) = patch.experience_years {
            body.insert("experience_years".into(), json!(years));
        }
        if let Some(education) = patch.education {
            body.insert("education".into(), json!(education));
        }
        if let Some(fee) = patch.consultation_fee {
            body.insert("consultation_fee".into(), json!(fee));
        }
        if let Some(available) = patch.is_available {
            body.insert("is_available".into(), json!(available));
        }
        if let Some(bio) = patch.bio {
            body.insert("bio".into(), json!(bio));
        }
        body.insert("updated_at".into(), json!(Utc::now()));

        let path = format!("/rest/v1/doctor_profiles?user_id=eq.{}", user_id);
        let rows: Vec<DoctorProfileRow> = self
            .write(Method::PATCH, &path, Some(Value::Object(body)))
            .await?;
        Ok(first(rows)?.into())
    }

    async fn list_available_doctors(
        &self,
        specialization: Option<&str>,
        page: Page,
    ) -> StoreResult<(Vec<DoctorListing>, u64)> {
        let mut path = format!(
            "/rest/v1/users?select={},doctor_profiles!inner(*)&role=eq.DOCTOR&is_active=eq.true\
             &doctor_profiles.is_available=eq.true&order=created_at.desc,id.desc&{}",
            USER_COLUMNS,
            window(page)
        );
        if let Some(spec) = specialization.filter(|s| !s.is_empty()) {
            path.push_str(&format!("&doctor_profiles.specialization=ilike.{}", ilike(spec)));
        }

        let (rows, total): (Vec<DoctorUserRow>, u64) =
            self.supabase.request_with_count(&path).await?;
        let listings = rows
            .into_iter()
            .filter_map(|row| {
                let profile = row.doctor_profiles.into_first()?;
                let user = User::from(row.user);
                Some(DoctorListing {
                    user: user.summary(),
                    doctor_profile: profile.into(),
                })
            })
            .collect();
        Ok((listings, total))
    }
}

#[async_trait]
impl ConsultationRepository for PostgrestStore {
    async fn insert_consultation(&self, new: NewConsultation) -> StoreResult<Consultation> {
        let body = json!({
            "patient_id": new.patient_id,
            "doctor_id": new.doctor_id,
            "title": new.title,
            "description": new.description,
            "status": ConsultationStatus::Pending,
        });
        let rows: Vec<ConsultationRow> = self
            .write(Method::POST, "/rest/v1/consultations", Some(body))
            .await?;
        Ok(first(rows)?.into())
    }

    async fn find_consultation(&self, id: Uuid) -> StoreResult<Option<Consultation>> {
        let path = format!("/rest/v1/consultations?id=eq.{}", id);
        Ok(self
            .fetch_one::<ConsultationRow>(&path)
            .await?
            .map(Consultation::from))
    }

    async fn list_consultations(
        &self,
        scope: ConsultationScope,
        status: Option<ConsultationStatus>,
        page: Page,
    ) -> StoreResult<(Vec<Consultation>, u64)> {
        let mut path = format!(
            "/rest/v1/consultations?order=created_at.desc,id.desc&{}",
            window(page)
        );
        match scope {
            ConsultationScope::Patient(id) => path.push_str(&format!("&patient_id=eq.{}", id)),
            ConsultationScope::Doctor(id) => path.push_str(&format!("&doctor_id=eq.{}", id)),
            ConsultationScope::All => {}
        }
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let (rows, total): (Vec<ConsultationRow>, u64) =
            self.supabase.request_with_count(&path).await?;
        Ok((rows.into_iter().map(Consultation::from).collect(), total))
    }

    async fn consultation_ids_for(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let path = format!(
            "/rest/v1/consultations?select=id&or=(patient_id.eq.{},doctor_id.eq.{})",
            user_id, user_id
        );
        let rows: Vec<IdRow> = self.fetch(&path).await?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    async fn update_consultation_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> StoreResult<Option<Consultation>> {
        let mut body = Map::new();
        body.insert("status".into(), json!(change.new_status));
        body.insert("updated_at".into(), json!(Utc::now()));
        if let Some(started_at) = change.started_at {
            body.insert("started_at".into(), json!(started_at));
        }
        if let Some(ended_at) = change.ended_at {
            body.insert("ended_at".into(), json!(ended_at));
        }

        let path = format!(
            "/rest/v1/consultations?id=eq.{}&status=eq.{}",
            id, change.expected
        );
        let rows: Vec<ConsultationRow> = self
            .write(Method::PATCH, &path, Some(Value::Object(body)))
            .await?;

        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into())),
            None => {
                debug!("Conditional status update on consultation {} matched no row", id);
                match self.find_consultation(id).await? {
                    Some(_) => Ok(None),
                    None => Err(StoreError::NotFound),
                }
            }
        }
    }
}

#[async_trait]
impl PaymentRepository for PostgrestStore {
    async fn insert_payment(&self, new: NewPayment) -> StoreResult<Payment> {
        let body = json!({
            "consultation_id": new.consultation_id,
            "payer_id": new.payer_id,
            "amount": new.amount,
            "status": PaymentStatus::Pending,
            "gateway_order_id": new.gateway_order_id,
            "raw_gateway_payload": new.raw_gateway_payload,
        });
        let rows: Vec<PaymentRow> = self
            .write(Method::POST, "/rest/v1/payments", Some(body))
            .await?;
        Ok(first(rows)?.into())
    }

    async fn find_payment(&self, id: Uuid) -> StoreResult<Option<Payment>> {
        let path = format!("/rest/v1/payments?id=eq.{}", id);
        Ok(self.fetch_one::<PaymentRow>(&path).await?.map(Payment::from))
    }

    async fn find_payment_by_consultation(&self, consultation_id: Uuid) -> StoreResult<Option<Payment>> {
        let path = format!("/rest/v1/payments?consultation_id=eq.{}", consultation_id);
        Ok(self.fetch_one::<PaymentRow>(&path).await?.map(Payment::from))
    }

    async fn find_payment_by_order_id(&self, order_id: &str) -> StoreResult<Option<Payment>> {
        let path = format!(
            "/rest/v1/payments?gateway_order_id=eq.{}",
            urlencoding::encode(order_id)
        );
        Ok(self.fetch_one::<PaymentRow>(&path).await?.map(Payment::from))
    }

    async fn list_payments_by_payer(
        &self,
        payer_id: Uuid,
        status: Option<PaymentStatus>,
        page: Page,
    ) -> StoreResult<(Vec<Payment>, u64)> {
        let mut path = format!(
            "/rest/v1/payments?payer_id=eq.{}&order=created_at.desc,id.desc&{}",
            payer_id,
            window(page)
        );
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let (rows, total): (Vec<PaymentRow>, u64) = self.supabase.request_with_count(&path).await?;
        Ok((rows.into_iter().map(Payment::from).collect(), total))
    }

    async fn update_payment_if(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        update: PaymentUpdate,
    ) -> StoreResult<Option<Payment>> {
        let mut body = Map::new();
        if let Some(status) = update.status {
            body.insert("status".into(), json!(status));
        }
        if let Some(paid_at) = update.paid_at {
            body.insert("paid_at".into(), json!(paid_at));
        }
        if let Some(transaction_id) = update.gateway_transaction_id {
            body.insert("gateway_transaction_id".into(), json!(transaction_id));
        }
        if let Some(method) = update.payment_method {
            body.insert("payment_method".into(), json!(method));
        }
        body.insert("raw_gateway_payload".into(), update.raw_gateway_payload);
        body.insert("updated_at".into(), json!(Utc::now()));

        let path = format!("/rest/v1/payments?id=eq.{}&status=eq.{}", id, expected);
        let rows: Vec<PaymentRow> = self
            .write(Method::PATCH, &path, Some(Value::Object(body)))
            .await?;

        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into())),
            None => match self.find_payment(id).await? {
                Some(_) => Ok(None),
                None => Err(StoreError::NotFound),
            },
        }
    }
}

#[async_trait]
impl MessageRepository for PostgrestStore {
    async fn insert_message(&self, new: NewMessage) -> StoreResult<Message> {
        let body = json!({
            "consultation_id": new.consultation_id,
            "sender_id": new.sender_id,
            "content": new.content,
            "message_type": new.message_type,
            "file_url": new.file_url,
            "file_name": new.file_name,
            "is_read": false,
        });
        let rows: Vec<MessageRow> = self
            .write(Method::POST, "/rest/v1/messages", Some(body))
            .await?;
        Ok(first(rows)?.into())
    }

    async fn find_message(&self, id: Uuid) -> StoreResult<Option<Message>> {
        let path = format!("/rest/v1/messages?id=eq.{}", id);
        Ok(self.fetch_one::<MessageRow>(&path).await?.map(Message::from))
    }

    async fn list_recent_messages(
        &self,
        consultation_id: Uuid,
        page: Page,
    ) -> StoreResult<(Vec<Message>, u64)> {
        let path = format!(
            "/rest/v1/messages?consultation_id=eq.{}&order=created_at.desc,id.desc&{}",
            consultation_id,
            window(page)
        );
        let (rows, total): (Vec<MessageRow>, u64) = self.supabase.request_with_count(&path).await?;
        Ok((rows.into_iter().map(Message::from).collect(), total))
    }

    async fn list_all_messages(&self, consultation_id: Uuid) -> StoreResult<Vec<Message>> {
        let path = format!(
            "/rest/v1/messages?consultation_id=eq.{}&order=created_at.asc,id.asc",
            consultation_id
        );
        let rows: Vec<MessageRow> = self.fetch(&path).await?;
        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn count_messages(&self, consultation_id: Uuid) -> StoreResult<u64> {
        self.count(&format!(
            "/rest/v1/messages?select=id&consultation_id=eq.{}&limit=0",
            consultation_id
        ))
        .await
    }

    async fn mark_messages_read(&self, consultation_id: Uuid, reader_id: Uuid) -> StoreResult<u64> {
        let path = format!(
            "/rest/v1/messages?consultation_id=eq.{}&sender_id=neq.{}&is_read=eq.false&select=id",
            consultation_id, reader_id
        );
        let rows: Vec<IdRow> = self
            .write(Method::PATCH, &path, Some(json!({ "is_read": true })))
            .await?;
        Ok(rows.len() as u64)
    }

    async fn count_unread(&self, consultation_ids: &[Uuid], reader_id: Uuid) -> StoreResult<u64> {
        if consultation_ids.is_empty() {
            return Ok(0);
        }
        let ids = consultation_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.count(&format!(
            "/rest/v1/messages?select=id&consultation_id=in.({})&sender_id=neq.{}&is_read=eq.false&limit=0",
            ids, reader_id
        ))
        .await
    }

    async fn delete_message(&self, id: Uuid) -> StoreResult<()> {
        let path = format!("/rest/v1/messages?id=eq.{}&select=id", id);
        let rows: Vec<IdRow> = self.write(Method::DELETE, &path, None).await?;
        first(rows).map(|_| ())
    }
}
