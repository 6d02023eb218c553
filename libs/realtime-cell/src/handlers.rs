use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use shared_utils::extractor::authenticate;
use shared_utils::ApiQuery;

use crate::models::{ClientFrame, RelayEvent, WsQuery};
use crate::router::RealtimeState;
use crate::services::session::{RelaySession, OUTBOUND_QUEUE_CAPACITY};

/// `GET /ws?token=`. The credential is checked before the upgrade, so a bad
/// token is answered with a plain 401.
pub async fn ws_handler(
    State(state): State<RealtimeState>,
    ApiQuery(query): ApiQuery<WsQuery>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Auth("Access token required".to_string()))?;
    let user = authenticate(&state.ctx, &token).await?;

    let ws = upgrade.map_err(|_| AppError::BadRequest("WebSocket upgrade required".to_string()))?;

    info!("WebSocket connection accepted for {} ({})", user.id, user.role);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

async fn handle_socket(socket: WebSocket, state: RealtimeState, user: AuthUser) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<RelayEvent>(OUTBOUND_QUEUE_CAPACITY);

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode relay event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = RelaySession::new(state.ctx, state.relay, user, tx);

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => session.handle_frame(frame).await,
                    Err(e) => {
                        debug!("Unreadable client frame: {}", e);
                        session.reject("Invalid message format", None);
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("WebSocket receive error: {}", e);
                    break;
                }
            },
        }
    }

    let user_id = session.user().id;
    session.close().await;
    send_task.abort();
    info!("WebSocket connection closed for {}", user_id);
}
