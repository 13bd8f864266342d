//! Typed, group-addressed push bus carrying job progress, state-machine
//! transitions and credential challenges to connected clients.

mod auth;
mod bus;
mod error;
mod event;
mod group;

pub use auth::{AllowAll, SessionAuthorizer};
pub use bus::PushBus;
pub use error::{PushBusError, PushBusResult};
pub use event::{events, PushEvent};
pub use group::Group;
