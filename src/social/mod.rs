//! Social layer: circle graph queries and alert routing
//!
//! The circle graph is read-only from the engine's perspective; mutation
//! (follow/unfollow, circle management) belongs to the surrounding
//! application. The alert router decides who sees what and persists one
//! alert per recipient.

pub mod alerts;
pub mod circles;

pub use alerts::{AlertBroadcaster, AlertRouter, RealtimePublisher};
pub use circles::CircleGraph;
