use std::io::Read;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use claudex_protocol::Status;

use crate::tracker::StateTracker;

use super::scrollback::PtyOutputBroadcaster;

/// Emitted on the exit channel when the read loop ends, whether cleanly
/// (EOF, the child exited) or on a read error.
#[derive(Debug)]
pub struct PtyExitEvent {
    pub pane_id: String,
    pub error: Option<String>,
}

fn utf8_seq_len(byte: u8) -> usize {
    if byte & 0x80 == 0 {
        1
    } else if byte & 0xE0 == 0xC0 {
        2
    } else if byte & 0xF0 == 0xE0 {
        3
    } else if byte & 0xF8 == 0xF0 {
        4
    } else {
        0
    }
}

/// Index at which `buf` must be cut so the emitted prefix never ends in
/// the middle of a multi-byte UTF-8 sequence. Everything from the
/// returned index onward is carried forward to the next chunk.
pub fn utf8_boundary(buf: &[u8]) -> usize {
    let len = buf.len();
    let max_back = 3.min(len);
    for back in (1..=max_back).rev() {
        let idx = len - back;
        let seq_len = utf8_seq_len(buf[idx]);
        if seq_len > 0 && back < seq_len {
            return idx;
        }
    }
    len
}

/// Read loop body: reads up to `chunk_size` bytes per iteration, trims to
/// the last UTF-8 boundary (carrying the remainder forward), and for each
/// emitted chunk feeds the scrollback, the tracker, and `on_output` in
/// that order. Runs until EOF, a read error, or the reader is dropped by
/// `stop()` closing the PTY out from under it.
pub fn run(
    pane_id: String,
    mut reader: Box<dyn Read + Send>,
    chunk_size: usize,
    broadcaster: Arc<Mutex<PtyOutputBroadcaster>>,
    tracker: Arc<Mutex<StateTracker>>,
    on_output: Arc<dyn Fn(&[u8]) + Send + Sync>,
    on_status: Arc<dyn Fn(Status) + Send + Sync>,
    exit_tx: mpsc::UnboundedSender<PtyExitEvent>,
) {
    let mut carry: Vec<u8> = Vec::new();
    let mut read_buf = vec![0u8; chunk_size];

    let error = loop {
        let n = match reader.read(&mut read_buf) {
            Ok(0) => break None,
            Ok(n) => n,
            Err(e) => break Some(e.to_string()),
        };

        carry.extend_from_slice(&read_buf[..n]);
        let boundary = utf8_boundary(&carry);
        if boundary == 0 {
            continue;
        }

        let emit: Vec<u8> = carry.drain(..boundary).collect();

        {
            let mut bcast = broadcaster.lock().unwrap();
            bcast.feed(&emit);
        }

        let chunk_str = String::from_utf8_lossy(&emit);
        let now = std::time::Instant::now();
        let changed = {
            let mut t = tracker.lock().unwrap();
            t.ingest(&chunk_str, now)
        };

        on_output(&emit);

        if let Some(status) = changed {
            tracing::info!(event = "tracker.status_changed", pane_id = %pane_id, %status, "analyze_state transition");
            on_status(status);
        }
    };

    tracing::info!(event = "pty.read_loop_ended", pane_id = %pane_id, error = ?error, "read loop exiting");
    let _ = exit_tx.send(PtyExitEvent { pane_id, error });
}
