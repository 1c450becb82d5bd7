use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::{broadcast, mpsc};

use claudex_protocol::Status;

use crate::errors::{ClaudexError, Result};
use crate::oracle::AgentOracle;
use crate::tracker::StateTracker;

use super::cwd::process_cwd;
use super::read_loop::{self, PtyExitEvent};
use super::scrollback::PtyOutputBroadcaster;

/// Status monitor tick rate: a second task ticks at 1 Hz.
const MONITOR_TICK: std::time::Duration = std::time::Duration::from_secs(1);

const RESUME_FLAG: &str = "--resume";
const AGENT_CLI: &str = "claude";

/// One child process attached to one PTY. A pane that has never been
/// started, or that has been `reset()`, is `Inactive`. `Failed` is a pane
/// whose most recent `start`/`resume` could not spawn a child or open a
/// PTY: status becomes `error` and no loops are started; `reset()` is the
/// only way out.
pub enum PtyPane {
    Inactive { working_directory: PathBuf, cold_scrollback: Vec<u8> },
    Failed { working_directory: PathBuf },
    Running(RunningPane),
}

pub struct RunningPane {
    working_directory: PathBuf,
    master: Box<dyn MasterPty + Send>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    child: Box<dyn Child + Send + Sync>,
    pid: Option<u32>,
    done: Arc<AtomicBool>,
    read_loop: tokio::task::JoinHandle<()>,
    monitor: tokio::task::JoinHandle<()>,
    pub broadcaster: Arc<Mutex<PtyOutputBroadcaster>>,
    pub tracker: Arc<Mutex<StateTracker>>,
    last_input_at: Arc<Mutex<Option<std::time::Instant>>>,
}

/// A cloned, cheap-to-hold handle to a running pane's writer, tracker, and
/// last-input timestamp. Obtained under the session lock (`PtyPane::
/// write_handle`) and then used to perform the actual blocking PTY write
/// *after* that lock is released, so a stalled PTY never blocks every other
/// operation on the owning session.
#[derive(Clone)]
pub struct PaneWriteHandle {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    last_input_at: Arc<Mutex<Option<std::time::Instant>>>,
    tracker: Arc<Mutex<StateTracker>>,
}

impl PaneWriteHandle {
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        let n = {
            let mut w = self.writer.lock().unwrap();
            w.write(bytes)?
        };
        let now = std::time::Instant::now();
        *self.last_input_at.lock().unwrap() = Some(now);
        if let Ok(mut t) = self.tracker.lock() {
            t.record_input(now);
        }
        Ok(n)
    }
}

impl PtyPane {
    pub fn inactive(working_directory: PathBuf) -> Self {
        PtyPane::Inactive { working_directory, cold_scrollback: Vec::new() }
    }

    pub fn working_directory(&self) -> &Path {
        match self {
            PtyPane::Inactive { working_directory, .. } => working_directory,
            PtyPane::Failed { working_directory } => working_directory,
            PtyPane::Running(r) => &r.working_directory,
        }
    }

    /// Preload scrollback recovered from disk into a never-started pane, so
    /// a subscriber sees history immediately after a daemon restart even
    /// before the pane is started again. No-op once the pane has run.
    pub fn seed_scrollback(&mut self, bytes: Vec<u8>) {
        if let PtyPane::Inactive { cold_scrollback, .. } = self {
            *cold_scrollback = bytes;
        }
    }

    /// Spawn the user's default shell, attach a PTY, and start the read
    /// loop and status monitor. On any failure, the pane stays `Inactive`
    /// and the caller is expected to surface `error` status.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &mut self,
        rows: u16,
        cols: u16,
        pane_id: String,
        scrollback_cap: usize,
        channel_capacity: usize,
        pty_read_chunk_size: usize,
        oracle: Arc<dyn AgentOracle>,
        on_output: Arc<dyn Fn(&[u8]) + Send + Sync>,
        on_status: Arc<dyn Fn(Status) + Send + Sync>,
        exit_tx: mpsc::UnboundedSender<PtyExitEvent>,
    ) -> Result<()> {
        let working_directory = self.working_directory().to_path_buf();
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        let mut cmd = CommandBuilder::new(&shell);
        cmd.arg("-l");
        cmd.cwd(&working_directory);
        set_terminal_env(&mut cmd);

        let tracker = Arc::new(Mutex::new(StateTracker::starting_in(Status::Shell, false)));
        self.spawn(
            pane_id,
            rows,
            cols,
            cmd,
            tracker,
            scrollback_cap,
            channel_capacity,
            pty_read_chunk_size,
            oracle,
            on_output,
            on_status,
            exit_tx,
        )
        .map_err(|e| self.mark_failed(working_directory, e))
    }

    /// Same as `start`, but invokes the known agent CLI with `--resume
    /// <agent_session_id>`. Initial status is `waiting_input` and
    /// `agent_active` starts true.
    #[allow(clippy::too_many_arguments)]
    pub fn resume(
        &mut self,
        agent_session_id: &str,
        rows: u16,
        cols: u16,
        pane_id: String,
        scrollback_cap: usize,
        channel_capacity: usize,
        pty_read_chunk_size: usize,
        oracle: Arc<dyn AgentOracle>,
        on_output: Arc<dyn Fn(&[u8]) + Send + Sync>,
        on_status: Arc<dyn Fn(Status) + Send + Sync>,
        exit_tx: mpsc::UnboundedSender<PtyExitEvent>,
    ) -> Result<()> {
        let working_directory = self.working_directory().to_path_buf();
        let mut cmd = CommandBuilder::new(AGENT_CLI);
        cmd.arg(RESUME_FLAG);
        cmd.arg(agent_session_id);
        cmd.cwd(&working_directory);
        set_terminal_env(&mut cmd);

        let tracker = Arc::new(Mutex::new(StateTracker::starting_in(Status::WaitingInput, true)));
        self.spawn(
            pane_id,
            rows,
            cols,
            cmd,
            tracker,
            scrollback_cap,
            channel_capacity,
            pty_read_chunk_size,
            oracle,
            on_output,
            on_status,
            exit_tx,
        )
        .map_err(|e| self.mark_failed(working_directory, e))
    }

    /// Record a spawn failure so that `status()` reports `error` instead of
    /// silently staying `Idle`, then hand the original error back to the
    /// caller unchanged.
    fn mark_failed(&mut self, working_directory: PathBuf, err: ClaudexError) -> ClaudexError {
        *self = PtyPane::Failed { working_directory };
        err
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn(
        &mut self,
        pane_id: String,
        rows: u16,
        cols: u16,
        cmd: CommandBuilder,
        tracker: Arc<Mutex<StateTracker>>,
        scrollback_cap: usize,
        channel_capacity: usize,
        pty_read_chunk_size: usize,
        oracle: Arc<dyn AgentOracle>,
        on_output: Arc<dyn Fn(&[u8]) + Send + Sync>,
        on_status: Arc<dyn Fn(Status) + Send + Sync>,
        exit_tx: mpsc::UnboundedSender<PtyExitEvent>,
    ) -> Result<()> {
        let working_directory = self.working_directory().to_path_buf();
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| ClaudexError::SpawnFailure(e.to_string()))?;

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ClaudexError::SpawnFailure(e.to_string()))?;
        let pid = child.process_id();

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| ClaudexError::SpawnFailure(e.to_string()))?;
        let writer = Arc::new(Mutex::new(writer));

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| ClaudexError::SpawnFailure(e.to_string()))?;

        let broadcaster = Arc::new(Mutex::new(PtyOutputBroadcaster::new(scrollback_cap, channel_capacity)));
        let done = Arc::new(AtomicBool::new(false));

        let read_loop = {
            let pane_id = pane_id.clone();
            let broadcaster = broadcaster.clone();
            let tracker = tracker.clone();
            let on_status = on_status.clone();
            tokio::task::spawn_blocking(move || {
                read_loop::run(pane_id, reader, pty_read_chunk_size, broadcaster, tracker, on_output, on_status, exit_tx);
            })
        };

        let monitor = {
            let pane_id = pane_id.clone();
            let tracker = tracker.clone();
            let done = done.clone();
            let directory = working_directory.clone();
            tokio::spawn(monitor_loop(pane_id, tracker, oracle, directory, done, on_status))
        };

        *self = PtyPane::Running(RunningPane {
            working_directory,
            master: pair.master,
            writer,
            child,
            pid,
            done,
            read_loop,
            monitor,
            broadcaster,
            tracker,
            last_input_at: Arc::new(Mutex::new(None)),
        });

        Ok(())
    }

    /// Clone out a handle to the running pane's writer/tracker/last-input
    /// timestamp. Cheap (just `Arc::clone`s) — callers holding a coarser
    /// lock (e.g. the session lock) should grab this handle and release
    /// that lock *before* calling `PaneWriteHandle::write`, so the actual
    /// blocking PTY write never happens while the coarser lock is held.
    pub fn write_handle(&self) -> Result<PaneWriteHandle> {
        match self {
            PtyPane::Inactive { .. } | PtyPane::Failed { .. } => Err(ClaudexError::PtyClosed),
            PtyPane::Running(r) => Ok(PaneWriteHandle {
                writer: r.writer.clone(),
                last_input_at: r.last_input_at.clone(),
                tracker: r.tracker.clone(),
            }),
        }
    }

    /// Convenience wrapper for callers that already hold no outer lock
    /// (e.g. direct tests): get a handle and write through it immediately.
    pub fn write_input(&self, bytes: &[u8]) -> Result<usize> {
        self.write_handle()?.write(bytes)
    }

    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        match self {
            PtyPane::Inactive { .. } | PtyPane::Failed { .. } => Err(ClaudexError::PtyClosed),
            PtyPane::Running(r) => {
                r.master
                    .resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
                    .map_err(|e| ClaudexError::Io(std::io::Error::other(e)))?;
                Ok(())
            }
        }
    }

    /// Kill the child, close the PTY, and signal `done`. Idempotent: a
    /// second call on an already-stopped pane is a no-op. Returns
    /// `Some(Status::Stopped)` the first time it actually transitions the
    /// pane, so the caller can broadcast exactly one `stopped` status.
    pub fn stop(&mut self) -> Option<Status> {
        match self {
            PtyPane::Running(r) => {
                if r.done.swap(true, Ordering::SeqCst) {
                    return None;
                }
                let _ = r.child.kill();
                r.read_loop.abort();
                r.monitor.abort();
                r.tracker.lock().unwrap().force_status(Status::Stopped, std::time::Instant::now())
            }
            _ => None,
        }
    }

    /// Called by the manager when the read loop ends on its own (EOF or a
    /// read error) rather than via an explicit `stop()`. The child has
    /// already exited; this only needs to stop the monitor loop and force
    /// the `stopped` transition. Idempotent against a racing `stop()` via
    /// the same `done` flag.
    pub fn notify_exited(&mut self) -> Option<Status> {
        match self {
            PtyPane::Running(r) => {
                if r.done.swap(true, Ordering::SeqCst) {
                    return None;
                }
                r.monitor.abort();
                r.tracker.lock().unwrap().force_status(Status::Stopped, std::time::Instant::now())
            }
            _ => None,
        }
    }

    /// Stop (if running), drop scrollback and tracker, and return the pane
    /// to `Inactive`. After this, `start`/`resume` may be called again.
    pub fn reset(&mut self) {
        self.stop();
        let working_directory = self.working_directory().to_path_buf();
        *self = PtyPane::Inactive { working_directory, cold_scrollback: Vec::new() };
    }

    pub fn scrollback(&self) -> Vec<u8> {
        match self {
            PtyPane::Inactive { cold_scrollback, .. } => cold_scrollback.clone(),
            PtyPane::Failed { .. } => Vec::new(),
            PtyPane::Running(r) => r.broadcaster.lock().unwrap().scrollback_contents(),
        }
    }

    pub fn subscribe(&self) -> Option<broadcast::Receiver<Vec<u8>>> {
        match self {
            PtyPane::Inactive { .. } | PtyPane::Failed { .. } => None,
            PtyPane::Running(r) => Some(r.broadcaster.lock().unwrap().subscribe()),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            PtyPane::Inactive { .. } => Status::Idle,
            PtyPane::Failed { .. } => Status::Error,
            PtyPane::Running(r) => r.tracker.lock().unwrap().status(),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PtyPane::Running(_))
    }

    /// Best-effort lookup of the child's current working directory,
    /// falling back to the pane's configured directory.
    pub fn process_cwd(&self) -> PathBuf {
        match self {
            PtyPane::Inactive { working_directory, .. } => working_directory.clone(),
            PtyPane::Failed { working_directory } => working_directory.clone(),
            PtyPane::Running(r) => match r.pid {
                Some(pid) => process_cwd(pid, &r.working_directory),
                None => r.working_directory.clone(),
            },
        }
    }
}

fn set_terminal_env(cmd: &mut CommandBuilder) {
    cmd.env("TERM", "xterm-256color");
    cmd.env("LANG", "en_US.UTF-8");
    cmd.env("LC_ALL", "en_US.UTF-8");
    cmd.env("COLORTERM", "truecolor");
}

/// Status monitor: ticks at 1 Hz for the lifetime of the pane. When
/// `agent_active`, consults the external agent oracle for a high-confidence
/// override before falling back to the timeout rules. Ends when `done` is
/// signalled by `stop()`.
async fn monitor_loop(
    pane_id: String,
    tracker: Arc<Mutex<StateTracker>>,
    oracle: Arc<dyn AgentOracle>,
    directory: PathBuf,
    done: Arc<AtomicBool>,
    on_status: Arc<dyn Fn(Status) + Send + Sync>,
) {
    let mut interval = tokio::time::interval(MONITOR_TICK);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    while !done.load(Ordering::SeqCst) {
        interval.tick().await;
        if done.load(Ordering::SeqCst) {
            break;
        }

        let now = std::time::Instant::now();
        let agent_active = {
            let t = tracker.lock().unwrap();
            t.agent_active()
        };

        let changed = if agent_active {
            match oracle.get_state(&directory) {
                Some(state) => {
                    let mut t = tracker.lock().unwrap();
                    t.apply_oracle_status(state.status, now)
                }
                None => {
                    let mut t = tracker.lock().unwrap();
                    t.tick(now)
                }
            }
        } else {
            let mut t = tracker.lock().unwrap();
            t.tick(now)
        };

        if let Some(status) = changed {
            tracing::info!(event = "tracker.status_changed", pane_id = %pane_id, %status, "status monitor transition");
            on_status(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_pane_reports_idle_status() {
        let pane = PtyPane::inactive(PathBuf::from("/tmp"));
        assert_eq!(pane.status(), Status::Idle);
        assert!(!pane.is_running());
    }

    #[test]
    fn write_on_inactive_pane_fails_closed() {
        let pane = PtyPane::inactive(PathBuf::from("/tmp"));
        let result = pane.write_input(b"hello");
        assert!(matches!(result, Err(ClaudexError::PtyClosed)));
    }

    #[test]
    fn write_handle_on_inactive_pane_fails_closed() {
        let pane = PtyPane::inactive(PathBuf::from("/tmp"));
        assert!(matches!(pane.write_handle(), Err(ClaudexError::PtyClosed)));
    }

    #[test]
    fn resize_on_inactive_pane_fails_closed() {
        let pane = PtyPane::inactive(PathBuf::from("/tmp"));
        assert!(matches!(pane.resize(24, 80), Err(ClaudexError::PtyClosed)));
    }

    #[test]
    fn stop_on_inactive_pane_is_a_no_op() {
        let mut pane = PtyPane::inactive(PathBuf::from("/tmp"));
        pane.stop();
        assert!(!pane.is_running());
    }

    #[test]
    fn scrollback_on_inactive_pane_is_empty() {
        let pane = PtyPane::inactive(PathBuf::from("/tmp"));
        assert!(pane.scrollback().is_empty());
    }

    #[test]
    fn seed_scrollback_populates_an_inactive_pane() {
        let mut pane = PtyPane::inactive(PathBuf::from("/tmp"));
        pane.seed_scrollback(b"hello".to_vec());
        assert_eq!(pane.scrollback(), b"hello".to_vec());
    }

    #[test]
    fn failed_pane_reports_error_status_and_fails_closed() {
        let mut pane = PtyPane::inactive(PathBuf::from("/tmp"));
        let err = pane.mark_failed(PathBuf::from("/tmp"), ClaudexError::SpawnFailure("boom".to_string()));
        assert!(matches!(err, ClaudexError::SpawnFailure(_)));
        assert_eq!(pane.status(), Status::Error);
        assert!(!pane.is_running());
        assert!(pane.scrollback().is_empty());
        assert!(pane.subscribe().is_none());
        assert!(matches!(pane.write_input(b"x"), Err(ClaudexError::PtyClosed)));
        assert_eq!(pane.process_cwd(), PathBuf::from("/tmp"));
    }

    #[test]
    fn reset_recovers_a_failed_pane_to_inactive() {
        let mut pane = PtyPane::inactive(PathBuf::from("/tmp"));
        let _ = pane.mark_failed(PathBuf::from("/tmp"), ClaudexError::SpawnFailure("boom".to_string()));
        pane.reset();
        assert_eq!(pane.status(), Status::Idle);
        assert!(matches!(pane, PtyPane::Inactive { .. }));
    }
}
