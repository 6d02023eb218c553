pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{ClientFrame, RelayEvent, RelayEventKind};
pub use router::{realtime_routes, RealtimeState};
pub use services::relay::{BroadcastRelay, RoomRelay};
pub use services::session::RelaySession;
