//! Confer core: session and breakout-room coordination.
//!
//! Pure Rust crate with no platform dependencies. Media, rendering and
//! the wire protocol live behind [`transport::SessionTransport`]; UI shells
//! drive a [`ConferClient`] and listen to [`ConferEvent`]s.

mod breakout;
pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod help;
pub mod logging;
pub mod roster;
pub mod session;
mod signals;
pub mod subsession;
pub mod timers;
pub mod transport;

pub use client::ConferClient;
pub use config::{ClientConfig, ConfigStore};
pub use errors::{ConferError, ErrorKind, Failure, MeetingStateReason};
pub use events::{
    CloseReason, ConferEvent, ConferEventListener, ConnectionState, EventName, HelpRequest,
    HelpResponse, Participant, ReconnectReason, SubscriptionHandle,
};
pub use logging::init_logging;
pub use session::{JoinParams, SessionInfo};
pub use subsession::{
    AllocationPattern, CreateSubsessionsData, Subsession, SubsessionOptions, SubsessionStatus,
    UserStatus,
};
