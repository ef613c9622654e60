//! Mock collaboration relay
//!
//! A minimal in-process WebSocket server speaking the `{event, data}`
//! protocol, enough to integration-test a client session: it answers
//! `getFiles` with its file map, acknowledges `run` with `runRan`
//! followed by streamed output and an exit, and echoes `input` back as
//! `output` the way the real execution backend mirrors stdin. Every
//! inbound frame is recorded for assertions.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

#[derive(Default)]
struct RelayState {
    files: BTreeMap<String, String>,
    received: Vec<Value>,
}

/// Handle to a running mock relay
pub struct MockRelay {
    addr: SocketAddr,
    state: Arc<Mutex<RelayState>>,
    accept_task: JoinHandle<()>,
}

impl MockRelay {
    /// Start a relay with an empty file map.
    pub async fn start() -> Self {
        Self::start_with_files(BTreeMap::new()).await
    }

    /// Start a relay pre-seeded with environment files.
    pub async fn start_with_files(files: BTreeMap<String, String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock relay");
        let addr = listener.local_addr().expect("relay local addr");

        let state = Arc::new(Mutex::new(RelayState {
            files,
            received: Vec::new(),
        }));

        let accept_state = state.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        tracing::debug!("relay: connection from {}", peer);
                        tokio::spawn(handle_connection(stream, accept_state.clone()));
                    }
                    Err(e) => {
                        tracing::warn!("relay accept error: {}", e);
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            state,
            accept_task,
        }
    }

    /// `ws://` URL clients should connect to.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// All frames received so far, as raw JSON values.
    pub fn received(&self) -> Vec<Value> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .received
            .clone()
    }

    /// Event tags of all frames received so far, in arrival order.
    pub fn received_events(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|v| v["event"].as_str().map(String::from))
            .collect()
    }

    /// Poll until a frame with the given event tag has arrived. Panics
    /// on timeout so failing tests report the missing event by name.
    pub async fn wait_for_event(&self, event: &str, timeout: Duration) -> Value {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(frame) = self
                .received()
                .into_iter()
                .find(|v| v["event"] == event)
            {
                return frame;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "relay never received {:?}; got {:?}",
                    event,
                    self.received_events()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stop accepting connections and drop the relay.
    pub fn shutdown(self) {
        self.accept_task.abort();
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<Mutex<RelayState>>) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!("relay handshake failed: {}", e);
            return;
        }
    };
    let (mut sink, mut source) = ws.split();

    while let Some(frame) = source.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let value: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("relay: unparseable frame ({}): {}", e, text);
                continue;
            }
        };

        let replies = {
            let mut st = state.lock().unwrap_or_else(|e| e.into_inner());
            st.received.push(value.clone());
            build_replies(&value, &mut st)
        };

        for reply in replies {
            if sink.send(Message::Text(reply.to_string())).await.is_err() {
                return;
            }
        }
    }
}

fn build_replies(frame: &Value, state: &mut RelayState) -> Vec<Value> {
    match frame["event"].as_str() {
        Some("getFiles") => {
            vec![json!({"event": "files", "data": {"files": state.files}})]
        }
        Some("updateFile") => {
            if let (Some(name), Some(content)) = (
                frame["data"]["fileName"].as_str(),
                frame["data"]["file"].as_str(),
            ) {
                state.files.insert(name.to_string(), content.to_string());
            }
            vec![]
        }
        Some("run") => vec![
            json!({"event": "runRan", "data": {}}),
            json!({"event": "runStatus", "data": {"status": "started"}}),
            json!({"event": "output", "data": {"output": "hello from relay"}}),
            json!({"event": "exit", "data": {"exitCode": 0}}),
        ],
        // The execution backend mirrors stdin back as output.
        Some("input") => {
            let input = frame["data"]["input"].as_str().unwrap_or_default();
            vec![json!({"event": "output", "data": {"output": input}})]
        }
        _ => vec![],
    }
}
