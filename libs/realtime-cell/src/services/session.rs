use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::{
    broadcast::error::RecvError,
    mpsc::{self, error::TrySendError},
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::AuthUser;
use shared_utils::AppContext;

use crate::models::{ClientFrame, RelayEvent, RelayEventKind};
use crate::services::relay::RoomRelay;

/// Per-connection outbound queue depth. A full queue drops events instead of
/// stalling the room forwarders.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// One connected client. Each joined room gets a forwarder task that copies
/// room events into the connection's outbound queue.
pub struct RelaySession {
    ctx: AppContext,
    relay: Arc<dyn RoomRelay>,
    user: AuthUser,
    outbound: mpsc::Sender<RelayEvent>,
    rooms: HashMap<Uuid, JoinHandle<()>>,
}

impl RelaySession {
    pub fn new(
        ctx: AppContext,
        relay: Arc<dyn RoomRelay>,
        user: AuthUser,
        outbound: mpsc::Sender<RelayEvent>,
    ) -> Self {
        Self {
            ctx,
            relay,
            user,
            outbound,
            rooms: HashMap::new(),
        }
    }

    pub fn user(&self) -> &AuthUser {
        &self.user
    }

    pub fn joined_rooms(&self) -> Vec<Uuid> {
        self.rooms.keys().copied().collect()
    }

    pub async fn handle_frame(&mut self, frame: ClientFrame) {
        match frame {
            ClientFrame::JoinConsultations => self.join_all().await,
            ClientFrame::JoinConsultation { consultation_id } => self.join(consultation_id).await,
            ClientFrame::LeaveConsultation { consultation_id } => self.leave(consultation_id).await,
            ClientFrame::Typing {
                consultation_id,
                is_typing,
            } => self.typing(consultation_id, is_typing).await,
        }
    }

    /// Reports a frame the session could not act on.
    pub fn reject(&self, message: &str, consultation_id: Option<Uuid>) {
        deliver(&self.outbound, self.user.id, RelayEvent::error(message, consultation_id));
    }

    async fn join_all(&mut self) {
        let ids = match self.ctx.db.consultations.consultation_ids_for(self.user.id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not load consultations for {}: {}", self.user.id, e);
                self.reject("Failed to join consultations", None);
                return;
            }
        };

        for id in ids {
            self.subscribe(id).await;
        }
    }

    async fn join(&mut self, consultation_id: Uuid) {
        let consultation = match self.ctx.db.consultations.find_consultation(consultation_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Consultation lookup failed for {}: {}", consultation_id, e);
                self.reject("Failed to join consultation", Some(consultation_id));
                return;
            }
        };

        match consultation {
            Some(c) if c.is_participant(self.user.id) || self.user.is_admin() => {
                self.subscribe(consultation_id).await;
            }
            _ => {
                debug!("User {} denied room {}", self.user.id, consultation_id);
                self.reject("Consultation not found or access denied", Some(consultation_id));
            }
        }
    }

    async fn subscribe(&mut self, consultation_id: Uuid) {
        if self.rooms.contains_key(&consultation_id) {
            return;
        }

        let mut rx = self.relay.subscribe(consultation_id).await;
        let outbound = self.outbound.clone();
        let user_id = self.user.id;

        let forwarder = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if event.event == RelayEventKind::UserTyping && event.origin == Some(user_id) {
                            continue;
                        }
                        if !deliver(&outbound, user_id, event) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Connection of {} lagged, skipped {} events", user_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        self.rooms.insert(consultation_id, forwarder);
        info!("User {} joined consultation room {}", self.user.id, consultation_id);

        let joined = RelayEvent::new(
            RelayEventKind::JoinedConsultation,
            consultation_id,
            json!({ "consultationId": consultation_id }),
        );
        deliver(&self.outbound, self.user.id, joined);
    }

    async fn leave(&mut self, consultation_id: Uuid) {
        let Some(forwarder) = self.rooms.remove(&consultation_id) else {
            return;
        };
        forwarder.abort();
        let _ = forwarder.await;
        self.relay.release(consultation_id).await;

        debug!("User {} left consultation room {}", self.user.id, consultation_id);
        let left = RelayEvent::new(
            RelayEventKind::LeftConsultation,
            consultation_id,
            json!({ "consultationId": consultation_id }),
        );
        deliver(&self.outbound, self.user.id, left);
    }

    async fn typing(&mut self, consultation_id: Uuid, is_typing: bool) {
        if !self.rooms.contains_key(&consultation_id) {
            self.reject("Join the consultation before sending typing events", Some(consultation_id));
            return;
        }

        let event = RelayEvent::new(
            RelayEventKind::UserTyping,
            consultation_id,
            json!({
                "userId": self.user.id,
                "userName": self.user.full_name,
                "isTyping": is_typing,
            }),
        )
        .from_user(self.user.id);
        self.relay.publish(event).await;
    }

    /// Stops every forwarder and releases rooms that are now empty.
    pub async fn close(mut self) {
        for (room, forwarder) in self.rooms.drain() {
            forwarder.abort();
            let _ = forwarder.await;
            self.relay.release(room).await;
        }
        debug!("Relay session closed for {}", self.user.id);
    }
}

/// Queues an event without waiting. Returns `false` once the connection is gone.
fn deliver(outbound: &mpsc::Sender<RelayEvent>, user_id: Uuid, event: RelayEvent) -> bool {
    match outbound.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(dropped)) => {
            warn!("Outbound queue of {} is full, dropping {:?} event", user_id, dropped.event);
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::relay::BroadcastRelay;
    use shared_models::consultation::NewConsultation;
    use shared_models::user::User;
    use shared_utils::test_utils::{TestConfig, TestUser};
    use std::time::Duration;
    use tokio::time::timeout;

    fn auth_user(user: &User) -> AuthUser {
        AuthUser {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
        }
    }

    struct Fixture {
        ctx: AppContext,
        relay: Arc<BroadcastRelay>,
        patient: User,
        doctor: User,
        consultation_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let ctx = TestConfig::default().context();
        let (patient, _) = TestUser::patient("patient@example.com").seed(&ctx).await;
        let (doctor, _) = TestUser::doctor("doctor@example.com").seed(&ctx).await;
        let consultation = ctx
            .db
            .consultations
            .insert_consultation(NewConsultation {
                patient_id: patient.id,
                doctor_id: doctor.id,
                title: "Headache".to_string(),
                description: "Three days".to_string(),
            })
            .await
            .unwrap();

        Fixture {
            ctx,
            relay: Arc::new(BroadcastRelay::default()),
            patient,
            doctor,
            consultation_id: consultation.id,
        }
    }

    fn session_with_capacity(f: &Fixture, user: &User, capacity: usize) -> (RelaySession, mpsc::Receiver<RelayEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        let relay: Arc<dyn RoomRelay> = f.relay.clone();
        (RelaySession::new(f.ctx.clone(), relay, auth_user(user), tx), rx)
    }

    fn session(f: &Fixture, user: &User) -> (RelaySession, mpsc::Receiver<RelayEvent>) {
        session_with_capacity(f, user, OUTBOUND_QUEUE_CAPACITY)
    }

    async fn next(rx: &mut mpsc::Receiver<RelayEvent>) -> RelayEvent {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn participant_joins_and_receives_room_events() {
        let f = fixture().await;
        let (mut patient, mut rx) = session(&f, &f.patient);

        patient
            .handle_frame(ClientFrame::JoinConsultation {
                consultation_id: f.consultation_id,
            })
            .await;
        assert_eq!(next(&mut rx).await.event, RelayEventKind::JoinedConsultation);

        f.relay
            .publish(RelayEvent::new(
                RelayEventKind::NewMessage,
                f.consultation_id,
                json!({"content": "hello"}),
            ))
            .await;
        let event = next(&mut rx).await;
        assert_eq!(event.event, RelayEventKind::NewMessage);
        assert_eq!(event.data["content"], "hello");
    }

    #[tokio::test]
    async fn outsider_cannot_join() {
        let f = fixture().await;
        let (outsider, _) = TestUser::patient("other@example.com").seed(&f.ctx).await;
        let (mut session, mut rx) = session(&f, &outsider);

        session
            .handle_frame(ClientFrame::JoinConsultation {
                consultation_id: f.consultation_id,
            })
            .await;

        assert_eq!(next(&mut rx).await.event, RelayEventKind::Error);
        assert!(session.joined_rooms().is_empty());
    }

    #[tokio::test]
    async fn join_consultations_subscribes_to_every_own_room() {
        let f = fixture().await;
        let (mut doctor, mut rx) = session(&f, &f.doctor);

        doctor.handle_frame(ClientFrame::JoinConsultations).await;

        assert_eq!(next(&mut rx).await.event, RelayEventKind::JoinedConsultation);
        assert_eq!(doctor.joined_rooms(), vec![f.consultation_id]);
    }

    #[tokio::test]
    async fn typing_reaches_the_other_participant_only() {
        let f = fixture().await;
        let (mut patient, mut patient_rx) = session(&f, &f.patient);
        let (mut doctor, mut doctor_rx) = session(&f, &f.doctor);
        let join = ClientFrame::JoinConsultation {
            consultation_id: f.consultation_id,
        };

        patient.handle_frame(join.clone()).await;
        doctor.handle_frame(join).await;
        next(&mut patient_rx).await;
        next(&mut doctor_rx).await;

        patient
            .handle_frame(ClientFrame::Typing {
                consultation_id: f.consultation_id,
                is_typing: true,
            })
            .await;

        let event = next(&mut doctor_rx).await;
        assert_eq!(event.event, RelayEventKind::UserTyping);
        assert_eq!(event.data["isTyping"], true);
        assert!(timeout(Duration::from_millis(100), patient_rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn leaving_releases_the_room() {
        let f = fixture().await;
        let (mut patient, mut rx) = session(&f, &f.patient);

        patient
            .handle_frame(ClientFrame::JoinConsultation {
                consultation_id: f.consultation_id,
            })
            .await;
        next(&mut rx).await;
        assert_eq!(f.relay.subscriber_count(f.consultation_id).await, 1);

        patient
            .handle_frame(ClientFrame::LeaveConsultation {
                consultation_id: f.consultation_id,
            })
            .await;
        assert_eq!(next(&mut rx).await.event, RelayEventKind::LeftConsultation);
        assert_eq!(f.relay.room_count().await, 0);
    }

    #[tokio::test]
    async fn stalled_connection_drops_events_without_blocking_the_room() {
        let f = fixture().await;
        let (mut patient, mut rx) = session_with_capacity(&f, &f.patient, 1);

        // The join acknowledgement fills the queue.
        patient
            .handle_frame(ClientFrame::JoinConsultation {
                consultation_id: f.consultation_id,
            })
            .await;
        for n in 0..3 {
            f.relay
                .publish(RelayEvent::new(RelayEventKind::NewMessage, f.consultation_id, json!({ "n": n })))
                .await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(next(&mut rx).await.event, RelayEventKind::JoinedConsultation);
        assert!(rx.try_recv().is_err());

        f.relay
            .publish(RelayEvent::new(RelayEventKind::NewMessage, f.consultation_id, json!({ "n": 3 })))
            .await;
        let event = next(&mut rx).await;
        assert_eq!(event.data["n"], 3);
    }
}
