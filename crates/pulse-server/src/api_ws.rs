//! WebSocket observer admission and session lifecycle.
//!
//! `GET /ws/realtime?token=<bearer>` admits an authenticated observer to the
//! broadcaster's fan-out. A missing, invalid, or expired token — or an
//! unknown/inactive account — closes the connection immediately with the
//! policy-violation close code. Inbound traffic on an admitted socket is
//! used only to detect liveness/disconnect; teardown always deregisters the
//! observer so the registry cannot leak entries.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket},
        ConnectInfo, Extension, Query, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use pulse_auth::{decode_token, get_user, User};
use pulse_realtime::{DeliveryError, ObserverConnection};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::AppState;

/// Per-session outbound queue depth. Bounded to prevent unbounded memory
/// growth from slow consumers; beyond this the client is too slow and
/// frames are dropped (at-most-once delivery).
const OBSERVER_QUEUE_DEPTH: usize = 256;

/// Query parameters for the WebSocket connection.
///
/// The bearer token travels as a query parameter for compatibility with
/// minimal clients that cannot set headers on an upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsConnectParams {
    pub token: Option<String>,
}

/// Observer handle delivering frames into a session's outbound queue.
///
/// `send` never blocks: a full queue drops the frame with a warning (the
/// consumer is alive but slow), while a closed queue means the forward task
/// is gone and the observer reports [`DeliveryError::Closed`] so the
/// broadcaster evicts it.
pub struct WsObserver {
    tx: Mutex<Option<mpsc::Sender<String>>>,
}

impl WsObserver {
    fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }
}

impl ObserverConnection for WsObserver {
    fn send(&self, frame: &str) -> Result<(), DeliveryError> {
        let guard = self.tx.lock().unwrap_or_else(|p| p.into_inner());
        let Some(tx) = guard.as_ref() else {
            return Err(DeliveryError::Closed);
        };
        match tx.try_send(frame.to_string()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("dropping realtime frame for slow observer");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    fn close(&self) {
        // Dropping the sender closes the queue; the forward task drains
        // whatever was already accepted and exits.
        self.tx.lock().unwrap_or_else(|p| p.into_inner()).take();
    }
}

/// Why an observer connection attempt was refused.
enum AdmissionError {
    MissingToken,
    InvalidToken,
    UnknownUser,
    InactiveAccount,
    Internal,
}

impl AdmissionError {
    fn reason(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing token",
            Self::InvalidToken => "invalid token",
            Self::UnknownUser => "unknown user",
            Self::InactiveAccount => "inactive account",
            Self::Internal => "internal error",
        }
    }
}

/// Validates the bearer token and resolves the subject account.
async fn admit(state: &Arc<AppState>, token: Option<&str>) -> Result<User, AdmissionError> {
    let token = token.ok_or(AdmissionError::MissingToken)?;
    let claims =
        decode_token(token, &state.token_secret).map_err(|_| AdmissionError::InvalidToken)?;

    let pool = state.pool.clone();
    let user = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|_| AdmissionError::Internal)?;
        get_user(&conn, claims.subject).map_err(|_| AdmissionError::UnknownUser)
    })
    .await
    .map_err(|_| AdmissionError::Internal)??;

    if !user.active {
        return Err(AdmissionError::InactiveAccount);
    }
    Ok(user)
}

/// WebSocket handler: `GET /ws/realtime?token=<bearer>`.
///
/// Admission is decided before the upgrade completes its side effects: a
/// rejected connection is upgraded only to be closed with code 1008
/// (policy violation), never registered. All attempts are logged with the
/// remote address for security monitoring.
pub async fn ws_realtime_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<WsConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    match admit(&state, params.token.as_deref()).await {
        Ok(user) => {
            tracing::info!(
                user_id = user.id,
                remote_addr = %addr,
                "websocket observer admitted"
            );
            ws.on_upgrade(move |socket| handle_socket(socket, state, user))
                .into_response()
        }
        Err(e) => {
            tracing::warn!(
                remote_addr = %addr,
                reason = e.reason(),
                "websocket observer rejected"
            );
            ws.on_upgrade(reject_socket).into_response()
        }
    }
}

/// Closes a rejected socket with the policy-violation code.
async fn reject_socket(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: Utf8Bytes::from_static("policy violation"),
        })))
        .await;
}

/// Runs an admitted observer session until disconnect.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: User) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::channel::<String>(OBSERVER_QUEUE_DEPTH);
    let observer = Arc::new(WsObserver::new(tx));
    let observer_id = state.broadcaster.register(observer.clone());

    // Forward frames from the session queue to the websocket sender.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Observers never send application data; the read loop exists to
    // notice close frames and transport errors.
    while let Some(Ok(msg)) = receiver.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    state.broadcaster.unregister(observer_id);
    observer.close();
    let _ = send_task.await;

    tracing::info!(user_id = user.id, "websocket observer disconnected");
}
