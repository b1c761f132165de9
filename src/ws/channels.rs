//! Open-channel table consumed by the liveness monitor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// Control messages delivered to a channel's outbound task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelControl {
    /// Send a protocol-level ping.
    Ping,
    /// Close the channel; the peer stopped responding.
    Terminate,
}

struct ChannelHandle {
    alive: Arc<AtomicBool>,
    control: mpsc::Sender<ChannelControl>,
}

/// Registry of every open channel's liveness handle.
#[derive(Default)]
pub struct ChannelTable {
    channels: DashMap<u64, ChannelHandle>,
    next_id: AtomicU64,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel. `alive` is flipped true by the channel on every
    /// pong; `control` feeds its outbound task.
    pub fn register(&self, alive: Arc<AtomicBool>, control: mpsc::Sender<ChannelControl>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.channels.insert(id, ChannelHandle { alive, control });
        id
    }

    /// Remove a channel on close.
    pub fn unregister(&self, id: u64) {
        self.channels.remove(&id);
    }

    /// One liveness cycle: channels that never confirmed since the last
    /// sweep are terminated; the rest are marked unconfirmed and pinged.
    pub fn sweep(&self) {
        for entry in self.channels.iter() {
            let handle = entry.value();
            if !handle.alive.swap(false, Ordering::AcqRel) {
                debug!(channel = entry.key(), "terminating unresponsive channel");
                let _ = handle.control.try_send(ChannelControl::Terminate);
            } else if handle.control.try_send(ChannelControl::Ping).is_err() {
                debug!(channel = entry.key(), "channel control queue unavailable");
            }
        }
    }

    /// Number of currently open channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
