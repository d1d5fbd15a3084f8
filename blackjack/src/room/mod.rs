//! Room actors and the registry that owns them.
//!
//! Each room runs as its own tokio task with an mpsc inbox. Callers hold a
//! [`RoomHandle`] and get replies over oneshot channels; subscribers get
//! [`RoomEvent`]s pushed to them.

pub mod actor;
pub mod config;
pub mod messages;
pub mod registry;

pub use actor::{RoomActor, RoomHandle};
pub use config::RoomConfig;
pub use messages::{
    RoomError, RoomEvent, RoomMessage, RoomResponse, RoomSummary, ScheduledEvent, ScheduledKind,
};
pub use registry::RoomRegistry;
