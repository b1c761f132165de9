//! Shell channel handling.
//!
//! One WebSocket channel per session, bridged byte-for-byte to the
//! container's attached pseudo-terminal. A single global heartbeat task
//! supervises every open channel.

mod channels;
mod handler;
mod heartbeat;

pub use channels::{ChannelControl, ChannelTable};
pub use handler::ws_handler;
pub use heartbeat::spawn_heartbeat;
