//! Shell channel lifecycle: admission, bridging, and close handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Notify, mpsc};
use tracing::{error, info, warn};

use super::channels::ChannelControl;
use crate::api::{AppState, ClientOrigin};
use crate::auth::{AUTH_COOKIE, FLAVOR_COOKIE};
use crate::container::{AttachedShell, Flavor};
use crate::session::ActiveSession;

/// Close code for capacity rejection (try again later).
const CLOSE_CAPACITY: u16 = 1013;
/// Close code for a missing or revoked session token.
const CLOSE_UNAUTHORIZED: u16 = 4401;
/// Close code when container provisioning fails mid-setup.
const CLOSE_PROVISIONING: u16 = 1011;
/// Close code for channels that stopped answering pings.
const CLOSE_HEARTBEAT: u16 = 4408;

/// Depth of the per-channel control queue.
const CONTROL_BUFFER_SIZE: usize = 8;

/// WebSocket upgrade handler.
///
/// GET /ws
pub async fn ws_handler(
    State(state): State<AppState>,
    origin: ClientOrigin,
    jar: CookieJar,
    ws: WebSocketUpgrade,
) -> Response {
    let token = jar.get(AUTH_COOKIE).map(|cookie| cookie.value().to_string());
    let flavor = jar
        .get(FLAVOR_COOKIE)
        .and_then(|cookie| cookie.value().parse::<Flavor>().ok())
        .unwrap_or_default();
    ws.on_upgrade(move |socket| handle_shell_channel(socket, state, origin.0, token, flavor))
}

/// Run one shell channel from admission to teardown.
async fn handle_shell_channel(
    socket: WebSocket,
    state: AppState,
    origin: String,
    token: Option<String>,
    flavor: Flavor,
) {
    // A missing or revoked token is answered as unauthorized regardless
    // of the counter's state.
    let Some(token) = token.filter(|token| state.tokens.is_authorized(token)) else {
        info!(%origin, "rejecting shell channel: invalid session token");
        close_with(socket, CLOSE_UNAUTHORIZED, "not authorized").await;
        return;
    };

    if !state.admission.try_admit() {
        info!(%origin, "rejecting shell channel: too many connections");
        close_with(socket, CLOSE_CAPACITY, "too many active sessions").await;
        return;
    }

    // A quick reconnect lands here before its grace timer fires.
    state.tokens.cancel_revocation(&token);

    info!(%origin, %flavor, "opening remote terminal");
    let spec = state.flavors.spec(flavor).clone();
    let shell = match state.runtime.spawn(&spec).await {
        Ok(shell) => shell,
        Err(err) => {
            error!(%origin, "provisioning shell container: {err}");
            state.admission.release();
            state.tokens.schedule_revocation(token);
            close_with(socket, CLOSE_PROVISIONING, "provisioning failed").await;
            return;
        }
    };
    let AttachedShell {
        container_id,
        output,
        mut input,
    } = shell;

    state.registry.register(
        &origin,
        ActiveSession {
            container_id: container_id.clone(),
            flavor,
        },
    );

    let (socket_tx, mut socket_rx) = socket.split();

    // The bridge is installed before any client byte is processed.
    let alive = Arc::new(AtomicBool::new(true));
    let (control_tx, control_rx) = mpsc::channel(CONTROL_BUFFER_SIZE);
    let channel_id = state.channels.register(alive.clone(), control_tx);
    let closed = Arc::new(Notify::new());
    let outbound = tokio::spawn(bridge_outbound(socket_tx, output, control_rx, closed.clone()));

    loop {
        tokio::select! {
            // The outbound half ended (terminated by liveness, container
            // exit, or a failed send); stop consuming client input.
            _ = closed.notified() => break,

            incoming = socket_rx.next() => {
                let Some(message) = incoming else { break };
                match message {
                    Ok(Message::Text(text)) => {
                        if write_to_shell(&mut input, text.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Binary(data)) => {
                        if write_to_shell(&mut input, &data).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Pong(_)) => {
                        alive.store(true, Ordering::Release);
                    }
                    Ok(Message::Ping(_)) => {
                        // Pong is produced by the protocol layer.
                    }
                    Ok(Message::Close(_)) => break,
                    Err(err) => {
                        warn!(%origin, "shell channel transport error: {err}");
                        break;
                    }
                }
            }
        }
    }

    // Close sequence: detach the bridge first, then release capacity and
    // the registry entry, then tear the container down, and only after
    // teardown is initiated start the reconnect grace timer.
    outbound.abort();
    state.channels.unregister(channel_id);
    state.registry.unregister(&origin);
    state.admission.release();

    let runtime = state.runtime.clone();
    let disposed_container = container_id.clone();
    let disposed_origin = origin.clone();
    tokio::spawn(async move {
        runtime.teardown(&disposed_container).await;
        info!(
            origin = %disposed_origin,
            container_id = %disposed_container,
            "session terminal disposed"
        );
    });
    state.tokens.schedule_revocation(token);
}

/// Forward container output and control commands to the client socket.
///
/// Returns when the container stream ends, a send fails, or the liveness
/// monitor orders termination; always wakes the inbound loop so close
/// handling runs even when the peer is gone.
async fn bridge_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut output: crate::container::ShellOutput,
    mut control_rx: mpsc::Receiver<ChannelControl>,
    closed: Arc<Notify>,
) {
    loop {
        tokio::select! {
            chunk = output.next() => match chunk {
                Some(Ok(data)) => {
                    if sink.send(Message::Binary(data)).await.is_err() {
                        break;
                    }
                }
                Some(Err(err)) => {
                    warn!("shell output stream error: {err}");
                    break;
                }
                None => {
                    // Container exited; close the channel cleanly.
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            command = control_rx.recv() => match command {
                Some(ChannelControl::Ping) => {
                    if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
                Some(ChannelControl::Terminate) | None => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: CLOSE_HEARTBEAT,
                            reason: "heartbeat timeout".into(),
                        })))
                        .await;
                    break;
                }
            },
        }
    }
    closed.notify_waiters();
}

async fn write_to_shell(
    input: &mut crate::container::ShellInput,
    data: &[u8],
) -> std::io::Result<()> {
    input.write_all(data).await?;
    input.flush().await
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}
