use std::collections::VecDeque;

use tokio::sync::broadcast;

/// Growable byte buffer with a hard ceiling. Appends are amortized O(n);
/// once the ceiling is exceeded the prefix is dropped so the most recent
/// bytes are retained — tail-biased, because scrollback is mostly read by
/// humans looking at the latest activity.
#[derive(Debug)]
pub struct ScrollbackBuffer {
    data: VecDeque<u8>,
    cap: usize,
}

impl ScrollbackBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(cap.min(64 * 1024)),
            cap,
        }
    }

    /// Append `bytes`, evicting from the front in one batch if the cap
    /// would otherwise be exceeded.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend(bytes.iter().copied());
        if self.data.len() > self.cap {
            let excess = self.data.len() - self.cap;
            self.data.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// An independent copy of the current contents; no caller ever gets a
    /// reference the producer could mutate afterward.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

/// Per-pane fan-out: appends every emitted chunk to the scrollback buffer
/// and broadcasts it to all live subscribers. Subscribers that fall behind
/// lose the oldest frames in their own channel without affecting others.
pub struct PtyOutputBroadcaster {
    sender: broadcast::Sender<Vec<u8>>,
    scrollback: ScrollbackBuffer,
}

impl PtyOutputBroadcaster {
    pub fn new(scrollback_cap: usize, channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity);
        Self {
            sender,
            scrollback: ScrollbackBuffer::new(scrollback_cap),
        }
    }

    /// Append to scrollback and broadcast. Lagging receivers are the
    /// caller's broadcast channel's problem, not ours; a send with zero
    /// receivers is not an error.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.scrollback.append(bytes);
        let _ = self.sender.send(bytes.to_vec());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
        self.sender.subscribe()
    }

    pub fn scrollback_contents(&self) -> Vec<u8> {
        self.scrollback.snapshot()
    }

    pub fn scrollback_len(&self) -> usize {
        self.scrollback.len()
    }

    pub fn clear_scrollback(&mut self) {
        self.scrollback.clear();
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
