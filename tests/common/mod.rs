//! In-process echo peer for integration tests.
//!
//! Answers the handshake with a session id, echoes `test_fn` calls with a
//! defaulted second argument, acknowledges `test_action`, re-emits
//! `set_data` as a `data` signal and wraps calls carrying `__action_id` in
//! `"start"`/`"end"` action frames.

#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Upper bound for every wait in the integration tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// Session id the peer assigns to fresh handshakes.
pub const ASSIGNED_SESSION: &str = "abc123";

/// Installs a test-friendly tracing subscriber once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Returns a loopback URL nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("ws://{addr}/ws")
}

// ============================================================================
// EchoPeer
// ============================================================================

struct Shared {
    accepted: AtomicUsize,
    live: AtomicUsize,
    handshakes: mpsc::UnboundedSender<Value>,
    frames: mpsc::UnboundedSender<Value>,
}

pub struct EchoPeer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handshakes: mpsc::UnboundedReceiver<Value>,
    frames: mpsc::UnboundedReceiver<Value>,
    kick: watch::Sender<u64>,
    task: JoinHandle<()>,
}

impl EchoPeer {
    pub async fn start() -> Self {
        init_tracing();

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let (handshakes_tx, handshakes) = mpsc::unbounded_channel();
        let (frames_tx, frames) = mpsc::unbounded_channel();
        let (kick, kick_rx) = watch::channel(0u64);

        let shared = Arc::new(Shared {
            accepted: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
            handshakes: handshakes_tx,
            frames: frames_tx,
        });

        let task = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                while let Ok((stream, peer)) = listener.accept().await {
                    debug!(?peer, "Peer accepted TCP connection");
                    let mut kick = kick_rx.clone();
                    kick.borrow_and_update();
                    tokio::spawn(serve(stream, Arc::clone(&shared), kick));
                }
            })
        };

        info!(%addr, "Echo peer listening");

        Self {
            addr,
            shared,
            handshakes,
            frames,
            kick,
            task,
        }
    }

    /// Socket URL of the peer.
    pub fn url(&self) -> String {
        format!("ws://{}/app/ws", self.addr)
    }

    /// Page URL whose derived socket URL is [`url`](Self::url).
    pub fn page_url(&self) -> String {
        format!("http://{}/app/index.html", self.addr)
    }

    /// Number of completed WebSocket upgrades.
    pub fn accepted(&self) -> usize {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    /// Number of sockets currently open.
    pub fn live(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Closes every open socket from the peer side.
    pub fn drop_connections(&self) {
        self.kick.send_modify(|epoch| *epoch += 1);
    }

    /// Waits for the next handshake frame.
    pub async fn next_handshake(&mut self) -> Value {
        timeout(WAIT, self.handshakes.recv())
            .await
            .expect("handshake timed out")
            .expect("peer stopped")
    }

    /// Waits for the next non-handshake frame.
    pub async fn next_frame(&mut self) -> Value {
        timeout(WAIT, self.frames.recv())
            .await
            .expect("frame timed out")
            .expect("peer stopped")
    }
}

impl Drop for EchoPeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ============================================================================
// Connection Handling
// ============================================================================

async fn serve(stream: TcpStream, shared: Arc<Shared>, mut kick: watch::Receiver<u64>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    shared.accepted.fetch_add(1, Ordering::SeqCst);
    shared.live.fetch_add(1, Ordering::SeqCst);

    let (mut writer, mut reader) = ws.split();
    let mut connected = false;

    'conn: loop {
        tokio::select! {
            _ = kick.changed() => {
                let _ = writer.close().await;
                break 'conn;
            }

            message = reader.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break 'conn,
                    Some(Ok(_)) => continue 'conn,
                };

                for reply in respond(text.as_str(), &shared, &mut connected) {
                    if writer.send(Message::Text(reply.into())).await.is_err() {
                        break 'conn;
                    }
                }
            }
        }
    }

    shared.live.fetch_sub(1, Ordering::SeqCst);
}

fn respond(text: &str, shared: &Shared, connected: &mut bool) -> Vec<String> {
    let Ok(frame) = serde_json::from_str::<Value>(text) else {
        return Vec::new();
    };

    if let Some(requested) = frame.get("__connect") {
        let _ = shared.handshakes.send(frame.clone());
        *connected = true;

        let session = requested.as_str().unwrap_or(ASSIGNED_SESSION);
        return vec![emit("__connect", json!({ "analysis_id": session }))];
    }

    // Frames before the handshake have no session to run in.
    if !*connected {
        return Vec::new();
    }
    let _ = shared.frames.send(frame.clone());

    let Some(signal) = frame.get("signal").and_then(Value::as_str) else {
        return Vec::new();
    };
    let mut load = frame.get("load").cloned().unwrap_or(Value::Null);

    let action_id = load
        .as_object_mut()
        .and_then(|fields| fields.remove("__action_id"));

    let mut replies = Vec::new();
    if let Some(id) = &action_id {
        replies.push(emit("__action", json!({ "id": id, "status": "start" })));
    }

    match signal {
        "test_fn" => {
            let (first, second) = match &load {
                Value::Array(args) => (
                    args.first().cloned().unwrap_or(Value::Null),
                    args.get(1).cloned().unwrap_or(json!(100)),
                ),
                Value::Object(fields) => (
                    fields.get("first").cloned().unwrap_or(Value::Null),
                    fields.get("second").cloned().unwrap_or(json!(100)),
                ),
                other => (other.clone(), json!(100)),
            };
            replies.push(emit("test_fn", json!([first, second])));
        }
        "test_action" => replies.push(emit("test_action_ack", Value::Null)),
        "set_data" => replies.push(emit("data", load)),
        _ => {}
    }

    if let Some(id) = &action_id {
        replies.push(emit("__action", json!({ "id": id, "status": "end" })));
    }

    replies
}

fn emit(signal: &str, load: Value) -> String {
    json!({ "signal": signal, "load": load }).to_string()
}
