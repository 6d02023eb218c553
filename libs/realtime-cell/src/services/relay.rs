use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::models::RelayEvent;

const DEFAULT_CAPACITY: usize = 128;

/// Pass-through broadcaster for consultation rooms. Publishing never fails the
/// caller: an event for a room nobody is listening to is simply dropped.
#[async_trait]
pub trait RoomRelay: Send + Sync {
    async fn publish(&self, event: RelayEvent);
    async fn subscribe(&self, consultation_id: Uuid) -> broadcast::Receiver<RelayEvent>;
    /// Drops the room once its last subscriber is gone.
    async fn release(&self, consultation_id: Uuid);
}

pub struct BroadcastRelay {
    rooms: RwLock<HashMap<Uuid, broadcast::Sender<RelayEvent>>>,
    capacity: usize,
}

impl BroadcastRelay {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub async fn subscriber_count(&self, consultation_id: Uuid) -> usize {
        self.rooms
            .read()
            .await
            .get(&consultation_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for BroadcastRelay {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl RoomRelay for BroadcastRelay {
    async fn publish(&self, event: RelayEvent) {
        let Some(room) = event.consultation_id else {
            return;
        };

        let rooms = self.rooms.read().await;
        match rooms.get(&room) {
            Some(tx) => {
                // no receivers left is not an error
                let delivered = tx.send(event).unwrap_or(0);
                trace!("Relayed event to {} subscribers of {}", delivered, room);
            }
            None => trace!("No subscribers for consultation {}", room),
        }
    }

    async fn subscribe(&self, consultation_id: Uuid) -> broadcast::Receiver<RelayEvent> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(consultation_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    async fn release(&self, consultation_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        if rooms
            .get(&consultation_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            rooms.remove(&consultation_id);
            debug!("Closed empty room {}", consultation_id);
        }
    }
}
