//! Client side of the scoreboard: keeps a local snapshot of the shared game
//! document, turns user commands into patches, and, on the controller,
//! drives the countdown.

pub mod buzzer;
pub mod dispatcher;
pub mod host;
pub mod memory;
pub mod session;
pub mod shared_state;
pub mod snapshot;
pub mod synchronizer;
pub mod timer;
pub mod transport;
pub mod wake;

pub use buzzer::{BuzzerListener, BuzzerPolicy};
pub use dispatcher::{parse_duration_input, CommandDispatcher, CommandOutcome, SkipReason};
pub use host::{BuzzerSink, Key, RenderHook, Visibility, WakeLock};
pub use memory::LocalSharedState;
pub use session::{Session, SessionHooks, SessionOptions};
pub use shared_state::{DocumentStream, PatchError, SharedState};
pub use snapshot::{snapshot_channel, SnapshotReader, SnapshotWriter};
pub use transport::RemoteSharedState;

#[cfg(test)]
mod test_support;
