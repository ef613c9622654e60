//! Environment session orchestration
//!
//! One [`EditorSession`] task owns the WebSocket for one environment:
//! it connects with a debounce, reconnects with a bounded fixed-interval
//! policy, dispatches inbound events into the shared [`SessionState`],
//! and drains outbound commands from the [`SessionHandle`].
//!
//! The handle is the scoped acquisition of the session: creating it
//! spawns the loop, [`SessionHandle::close`] tears it down (handlers
//! detached, pending reconnect sleep cancelled). There is never more
//! than one live socket per session, by construction: the loop holds the
//! only socket and replaces it wholesale on reconnect.
//!
//! Sends while the link is not connected are best-effort no-ops, not
//! queued; file lifecycle intents (rename/delete/duplicate) and runs
//! additionally surface a local "not connected" console notice. This
//! mirrors the behavior of the collaboration service and is deliberate.

use crate::{
    config::SessionConfig,
    console::ConsoleLog,
    cursors::CursorTracker,
    files::FileStore,
    link::{LinkStatus, ReconnectPolicy},
    protocol::{ClientEvent, ServerEvent},
};
use futures_util::{SinkExt, StreamExt};
use lab_common::CursorPos;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SharedState = Arc<Mutex<SessionState>>;

/// Mutable session state shared between the event loop and consumers
///
/// Mutated only from non-async sections; no lock is ever held across an
/// await point.
#[derive(Debug)]
pub struct SessionState {
    pub status: LinkStatus,
    pub files: FileStore,
    pub cursors: CursorTracker,
    pub console: ConsoleLog,
    /// File currently open in the editor; scopes edits and cursor
    /// broadcasts.
    pub current_file: String,
    /// Live draft of the shared stdin box (remote participants' typing).
    pub input_draft: String,
    /// Most recently sent stdin line, for echo suppression.
    pub(crate) previous_input: Option<String>,
}

impl SessionState {
    fn new(config: &SessionConfig) -> Self {
        Self {
            status: LinkStatus::Disconnected,
            files: FileStore::new(),
            cursors: CursorTracker::new(),
            console: ConsoleLog::new(),
            current_file: config.initial_file.clone(),
            input_draft: String::new(),
            previous_input: None,
        }
    }
}

/// Outbound commands from the handle to the event loop
#[derive(Debug)]
enum Command {
    /// Best-effort send: dropped silently while not connected.
    Send(ClientEvent),
    /// Send, or append a "not connected" console notice when the
    /// precondition fails (file lifecycle intents).
    SendOrNotify(ClientEvent),
    /// Execution request; snapshot, hash, and banner are produced by the
    /// loop so the banner only resets when the request actually went out.
    Run,
    Shutdown,
}

enum Exit {
    /// Socket closed or errored; reconnect policy decides what happens.
    Closed,
    /// Explicit teardown; no further handler may fire.
    Shutdown,
}

/// Owned context for one live environment session
///
/// Dropping the handle ends the loop on its next poll; [`close`] tears
/// it down promptly.
///
/// [`close`]: SessionHandle::close
pub struct SessionHandle {
    state: SharedState,
    command_tx: mpsc::UnboundedSender<Command>,
    environment_id: String,
    task: JoinHandle<()>,
}

/// The per-session event loop
pub struct EditorSession {
    ctx: EngineCtx,
    commands: mpsc::UnboundedReceiver<Command>,
}

struct EngineCtx {
    config: SessionConfig,
    state: SharedState,
    policy: ReconnectPolicy,
}

impl EditorSession {
    /// Validate the config and spawn the session loop, returning the
    /// owned handle for it.
    pub fn spawn(config: SessionConfig) -> crate::Result<SessionHandle> {
        config
            .validate()
            .map_err(|e| crate::SyncError::ConfigError(e.to_string()))?;

        let state: SharedState = Arc::new(Mutex::new(SessionState::new(&config)));
        let (command_tx, commands) = mpsc::unbounded_channel();

        let policy = ReconnectPolicy::new(config.max_reconnect_attempts, config.reconnect_interval);
        let environment_id = config.environment_id.clone();
        let session = EditorSession {
            ctx: EngineCtx {
                config,
                state: state.clone(),
                policy,
            },
            commands,
        };
        let task = tokio::spawn(session.run());

        Ok(SessionHandle {
            state,
            command_tx,
            environment_id,
            task,
        })
    }

    async fn run(mut self) {
        // Debounce window: rapid re-entry into the environment replaces
        // the previous handle before this fires. Commands arriving in
        // the window get disconnected semantics, not a queue.
        let debounce = self.ctx.config.connect_debounce;
        if let Exit::Shutdown = self.wait_disconnected(debounce).await {
            return;
        }

        loop {
            self.ctx.set_status(LinkStatus::Connecting);

            let ws = match connect_async(&self.ctx.config.server_url).await {
                Ok((ws, _)) => Some(ws),
                Err(tungstenite::Error::Url(e)) => {
                    // The transport cannot exist at all: terminal, no retry.
                    tracing::error!("WebSocket unavailable: {}", e);
                    self.ctx.set_status(LinkStatus::Error);
                    self.ctx.console_status("❌ WebSocket not available");
                    self.idle_until_shutdown().await;
                    return;
                }
                Err(e) => {
                    tracing::warn!("Connect failed: {}", e);
                    None
                }
            };

            if let Some(ws) = ws {
                self.ctx.policy.on_connected();
                self.ctx.set_status(LinkStatus::Connected);
                self.ctx.console_status("🔌 Connected to server");
                tracing::info!(
                    environment = %self.ctx.config.environment_id,
                    "Connected to {}",
                    self.ctx.config.server_url
                );

                if let Exit::Shutdown = self.drive(ws).await {
                    return;
                }
            }

            self.ctx.set_status(LinkStatus::Disconnected);
            self.ctx.console_status("⚠️ Disconnected from server");

            match self.ctx.policy.on_close() {
                Some(delay) => {
                    self.ctx.console_status(&format!(
                        "Attempting to reconnect (attempt {}/{})...",
                        self.ctx.policy.attempts(),
                        self.ctx.policy.max_attempts()
                    ));
                    if let Exit::Shutdown = self.wait_disconnected(delay).await {
                        return;
                    }
                }
                None => {
                    self.ctx.set_status(LinkStatus::Error);
                    self.ctx.console_status(
                        "❌ Max reconnection attempts reached. Please rejoin the environment.",
                    );
                    tracing::error!(
                        environment = %self.ctx.config.environment_id,
                        "Reconnect budget exhausted"
                    );
                    self.idle_until_shutdown().await;
                    return;
                }
            }
        }
    }

    /// Connected phase: pump the socket and the command queue until one
    /// side ends.
    async fn drive(&mut self, ws: WsStream) -> Exit {
        let (mut sink, mut stream) = ws.split();

        // Hydrate immediately after every successful connect.
        let hydrate = ClientEvent::GetFiles {
            environment_id: self.ctx.config.environment_id.clone(),
        };
        if Self::send_event(&mut sink, &hydrate).await.is_err() {
            return Exit::Closed;
        }

        let ctx = &mut self.ctx;
        let commands = &mut self.commands;

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => ctx.on_frame(&text),
                    Some(Ok(Message::Close(_))) | None => return Exit::Closed,
                    Some(Ok(_)) => {} // ping/pong/binary: nothing to do
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error: {}", e);
                        return Exit::Closed;
                    }
                },
                cmd = commands.recv() => match cmd {
                    None | Some(Command::Shutdown) => {
                        let _ = sink.close().await;
                        return Exit::Shutdown;
                    }
                    Some(Command::Send(event)) | Some(Command::SendOrNotify(event)) => {
                        if Self::send_event(&mut sink, &event).await.is_err() {
                            return Exit::Closed;
                        }
                    }
                    Some(Command::Run) => {
                        let request = ctx.build_run_request();
                        if Self::send_event(&mut sink, &request).await.is_err() {
                            return Exit::Closed;
                        }
                        // Banner resets only once the request went out.
                        ctx.lock().console.reset_running_banner();
                    }
                },
            }
        }
    }

    async fn send_event(
        sink: &mut (impl futures_util::Sink<Message, Error = tungstenite::Error> + Unpin),
        event: &ClientEvent,
    ) -> crate::Result<()> {
        let json = event.to_json()?;
        sink.send(Message::Text(json)).await?;
        Ok(())
    }

    /// Sleep out a disconnected interval (debounce or reconnect delay)
    /// while answering commands with disconnected semantics; the sleep
    /// is cancelled by teardown.
    async fn wait_disconnected(&mut self, delay: std::time::Duration) -> Exit {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Exit::Closed,
                cmd = self.commands.recv() => {
                    if self.ctx.handle_disconnected(cmd) {
                        return Exit::Shutdown;
                    }
                }
            }
        }
    }

    /// Terminal states: keep answering commands with disconnected
    /// semantics until the handle is released.
    async fn idle_until_shutdown(&mut self) {
        loop {
            let cmd = self.commands.recv().await;
            if self.ctx.handle_disconnected(cmd) {
                return;
            }
        }
    }
}

impl EngineCtx {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: LinkStatus) {
        self.lock().status = status;
        tracing::debug!(%status, "link status");
    }

    fn console_status(&self, message: &str) {
        self.lock().console.status(message);
    }

    /// Commands arriving while the link is down. Returns true on
    /// teardown.
    fn handle_disconnected(&self, cmd: Option<Command>) -> bool {
        match cmd {
            None | Some(Command::Shutdown) => true,
            Some(Command::Send(_)) => false, // best-effort, dropped
            Some(Command::SendOrNotify(_)) | Some(Command::Run) => {
                self.console_status("❌ WebSocket not connected");
                false
            }
        }
    }

    fn build_run_request(&self) -> ClientEvent {
        let state = self.lock();
        ClientEvent::Run {
            file_names: state.files.file_names(),
            environment_id: self.config.environment_id.clone(),
            hash: state.files.content_hash(),
            files: state.files.snapshot(),
        }
    }

    /// Decode and dispatch one inbound frame. Unparseable frames land in
    /// the console verbatim; this branch is intentional, not a fallback
    /// artifact.
    fn on_frame(&self, text: &str) {
        match ServerEvent::from_json(text) {
            Ok(event) => self.apply_server_event(event),
            Err(e) => {
                tracing::debug!("Undecodable frame ({}): {}", e, text);
                self.lock().console.raw_frame(text);
            }
        }
    }

    fn apply_server_event(&self, event: ServerEvent) {
        let mut state = self.lock();
        match event {
            ServerEvent::Files { files } => {
                tracing::debug!("Full snapshot: {} files", files.len());
                state.files.replace_all(files);
            }
            ServerEvent::LineUpdated { file_name, delta } => {
                state.files.apply_delta(&file_name, &delta);
            }
            ServerEvent::Output { output } => {
                // Suppress the server echoing back the line we just typed.
                if state.previous_input.as_deref() != Some(output.as_str()) {
                    state.console.append(&output);
                }
            }
            ServerEvent::RunStatus { status } => {
                tracing::debug!(?status, "run status (advisory)");
            }
            ServerEvent::Exit { exit_code } => {
                state
                    .console
                    .status(&format!("🛑 Process exited with code {}", exit_code));
            }
            ServerEvent::Error(data) => {
                state.console.status(&format!("❌ Error: {}", data.message()));
            }
            ServerEvent::MovedCursor { id, pos, file } => {
                state.cursors.upsert(&id, &file, pos);
            }
            ServerEvent::DeleteCursor { session_id } => {
                state.cursors.remove(&session_id);
            }
            ServerEvent::InputChanged { input } => {
                state.input_draft = input;
            }
            ServerEvent::RunRan {} => {
                state.console.reset_running_banner();
            }
        }
    }
}

impl SessionHandle {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, cmd: Command) {
        // A closed channel means teardown already began; drop silently.
        let _ = self.command_tx.send(cmd);
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    /// Shared state for consumers that want to poll it directly.
    pub fn shared_state(&self) -> Arc<Mutex<SessionState>> {
        self.state.clone()
    }

    /// Run a closure against the locked session state.
    pub fn with_state<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&self.lock())
    }

    pub fn status(&self) -> LinkStatus {
        self.lock().status
    }

    pub fn console_text(&self) -> String {
        self.lock().console.contents().to_string()
    }

    pub fn current_file(&self) -> String {
        self.lock().current_file.clone()
    }

    /// Switch which file edits and cursor broadcasts apply to. Purely
    /// local.
    pub fn set_current_file(&self, name: &str) {
        self.lock().current_file = name.to_string();
    }

    /// Apply a new version of the current file: compute line deltas
    /// against the stored version, apply them optimistically, and send
    /// each one as a `diffLine`. Local state is never rolled back; the
    /// server's snapshot broadcasts arbitrate divergence across clients.
    pub fn apply_edit(&self, new_content: &str) {
        let mut state = self.lock();
        let file = state.current_file.clone();
        let old = state.files.get(&file).unwrap_or("").to_string();
        let deltas = FileStore::diff_lines(&old, new_content);

        for delta in deltas {
            state.files.apply_delta(&file, &delta);
            self.send(Command::Send(ClientEvent::DiffLine {
                environment_id: self.environment_id.clone(),
                file_name: file.clone(),
                delta,
            }));
        }
    }

    /// Full-content replace of the current file (`updateFile`), applied
    /// optimistically.
    pub fn replace_file(&self, content: &str) {
        let mut state = self.lock();
        let file = state.current_file.clone();
        state.files.set_file(&file, content);
        self.send(Command::Send(ClientEvent::UpdateFile {
            environment_id: self.environment_id.clone(),
            file_name: file,
            file: content.to_string(),
        }));
    }

    /// Create an empty file locally and switch to it. Returns false if
    /// the name is already taken.
    pub fn add_file(&self, name: &str) -> bool {
        let mut state = self.lock();
        if state.files.add_file(name) {
            state.current_file = name.to_string();
            true
        } else {
            false
        }
    }

    /// Send a rename intent. Local state changes only when the server
    /// confirms via a snapshot or dedicated event.
    pub fn rename_file(&self, old_name: &str, new_name: &str) {
        self.send(Command::SendOrNotify(ClientEvent::RenameFile {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            environment_id: self.environment_id.clone(),
        }));
    }

    /// Send a delete intent; not applied optimistically.
    pub fn delete_file(&self, name: &str) {
        self.send(Command::SendOrNotify(ClientEvent::DeleteFile {
            file_name: name.to_string(),
            environment_id: self.environment_id.clone(),
        }));
    }

    /// Send a duplicate intent; not applied optimistically.
    pub fn duplicate_file(&self, name: &str) {
        self.send(Command::SendOrNotify(ClientEvent::DuplicateFile {
            file_name: name.to_string(),
            environment_id: self.environment_id.clone(),
        }));
    }

    /// Submit a run request over the current file collection. When not
    /// connected this produces a console notice and no network action.
    pub fn run_code(&self) {
        self.send(Command::Run);
    }

    /// Send one line of stdin. Empty-after-trim input is ignored. The
    /// sent value is remembered for echo suppression and the shared
    /// draft is cleared for other participants.
    pub fn send_input(&self, input: &str) {
        if input.trim().is_empty() {
            return;
        }
        {
            let mut state = self.lock();
            if state.status != LinkStatus::Connected {
                return;
            }
            state.previous_input = Some(input.to_string());
        }
        self.send(Command::Send(ClientEvent::Input {
            input: input.to_string(),
        }));
        self.broadcast_input_draft("");
    }

    /// Advisory broadcast of the uncommitted stdin draft.
    pub fn broadcast_input_draft(&self, draft: &str) {
        self.send(Command::Send(ClientEvent::InputChange {
            input: draft.to_string(),
        }));
    }

    /// Broadcast the local cursor position, tagged with the open file.
    /// Skipped silently at the idle origin position while disconnected,
    /// so a freshly mounted editor does not spam warnings.
    pub fn move_cursor(&self, pos: CursorPos) {
        let (connected, file) = {
            let state = self.lock();
            (state.status == LinkStatus::Connected, state.current_file.clone())
        };
        if !connected {
            if !pos.is_origin() {
                tracing::warn!("Socket not connected; cursor broadcast dropped");
            }
            return;
        }
        self.send(Command::Send(ClientEvent::CursorMove {
            file,
            environment_id: self.environment_id.clone(),
            pos,
        }));
    }

    /// Tear the session down: the loop detaches from the socket, cancels
    /// any pending reconnect sleep, and stops before touching state
    /// again.
    pub async fn close(self) {
        let _ = self.command_tx.send(Command::Shutdown);
        let mut task = self.task;
        if tokio::time::timeout(std::time::Duration::from_secs(1), &mut task)
            .await
            .is_err()
        {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ctx_for_test() -> EngineCtx {
        let config = SessionConfig {
            environment_id: "env-test".to_string(),
            ..Default::default()
        };
        let state = Arc::new(Mutex::new(SessionState::new(&config)));
        let policy = ReconnectPolicy::new(config.max_reconnect_attempts, config.reconnect_interval);
        EngineCtx {
            config,
            state,
            policy,
        }
    }

    #[test]
    fn test_snapshot_event_replaces_state() {
        let ctx = ctx_for_test();
        ctx.lock().files.set_file("stale.py", "old");

        let mut files = BTreeMap::new();
        files.insert("main.py".to_string(), "print(1)".to_string());
        ctx.apply_server_event(ServerEvent::Files { files });

        let state = ctx.lock();
        assert_eq!(state.files.get("main.py"), Some("print(1)"));
        assert!(state.files.get("stale.py").is_none());
    }

    #[test]
    fn test_output_echo_suppression() {
        let ctx = ctx_for_test();
        ctx.lock().previous_input = Some("5\n".to_string());

        ctx.apply_server_event(ServerEvent::Output {
            output: "5\n".to_string(),
        });
        assert!(!ctx.lock().console.contents().contains('5'));

        ctx.apply_server_event(ServerEvent::Output {
            output: "result: 25".to_string(),
        });
        assert!(ctx.lock().console.contents().contains("result: 25"));
    }

    #[test]
    fn test_cursor_events_update_tracker() {
        let ctx = ctx_for_test();
        ctx.apply_server_event(ServerEvent::MovedCursor {
            id: "s-1".to_string(),
            pos: CursorPos::new(2, 4),
            file: "main.py".to_string(),
        });
        assert_eq!(ctx.lock().cursors.len(), 1);

        ctx.apply_server_event(ServerEvent::DeleteCursor {
            session_id: "s-1".to_string(),
        });
        assert!(ctx.lock().cursors.is_empty());

        // Duplicate delete is a no-op.
        ctx.apply_server_event(ServerEvent::DeleteCursor {
            session_id: "s-1".to_string(),
        });
        assert!(ctx.lock().cursors.is_empty());
    }

    #[test]
    fn test_run_ran_resets_console() {
        let ctx = ctx_for_test();
        ctx.lock().console.append("stale output");
        ctx.apply_server_event(ServerEvent::RunRan {});

        let console = ctx.lock().console.contents().to_string();
        assert!(!console.contains("stale output"));
        assert!(console.contains("🚀 Running code..."));
    }

    #[test]
    fn test_undecodable_frame_lands_in_console() {
        let ctx = ctx_for_test();
        ctx.on_frame("garbage {{{");
        assert!(ctx.lock().console.contents().contains("Received: garbage {{{"));
    }

    #[test]
    fn test_exit_and_error_events_append() {
        let ctx = ctx_for_test();
        ctx.apply_server_event(ServerEvent::Exit { exit_code: 1 });
        ctx.apply_server_event(ServerEvent::Error(crate::protocol::ErrorData::Text(
            "name 'x' is not defined".to_string(),
        )));

        let console = ctx.lock().console.contents().to_string();
        assert!(console.contains("🛑 Process exited with code 1"));
        assert!(console.contains("❌ Error: name 'x' is not defined"));
    }

    #[test]
    fn test_build_run_request_carries_hash() {
        let ctx = ctx_for_test();
        ctx.lock().files.set_file("main.py", "print(1)");

        match ctx.build_run_request() {
            ClientEvent::Run {
                file_names,
                environment_id,
                hash,
                files,
            } => {
                assert_eq!(file_names, vec!["main.py".to_string()]);
                assert_eq!(environment_id, "env-test");
                assert_eq!(hash.len(), 64);
                assert_eq!(files.get("main.py").map(|s| s.as_str()), Some("print(1)"));
            }
            other => panic!("expected Run, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_rejects_invalid_config() {
        let result = EditorSession::spawn(SessionConfig::default());
        assert!(matches!(result, Err(crate::SyncError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_handle_local_operations_without_server() {
        // Point at a closed port: the session stays disconnected but all
        // local state paths still work.
        let config = SessionConfig {
            environment_id: "env-test".to_string(),
            server_url: "ws://127.0.0.1:9".to_string(),
            connect_debounce: std::time::Duration::from_millis(5000),
            ..Default::default()
        };
        let handle = EditorSession::spawn(config).expect("spawn");

        assert!(handle.add_file("notes.py"));
        assert_eq!(handle.current_file(), "notes.py");

        handle.apply_edit("a\nb");
        handle.with_state(|s| assert_eq!(s.files.get("notes.py"), Some("a\nb")));

        handle.apply_edit("a\nx\nc");
        handle.with_state(|s| assert_eq!(s.files.get("notes.py"), Some("a\nx\nc")));

        // Origin cursor while disconnected: silent no-op.
        handle.move_cursor(CursorPos::default());
        // Empty stdin is ignored entirely.
        handle.send_input("   ");
        handle.with_state(|s| assert!(s.previous_input.is_none()));

        handle.close().await;
    }
}
