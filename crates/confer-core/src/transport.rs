//! Seam to the remote coordination service.
//!
//! The core never frames bytes itself. A `SessionTransport` carries
//! commands to the service and returns its acknowledgement; unsolicited
//! deltas from the service arrive as `ServiceSignal`s on the channel handed
//! back by `connect`.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::errors::ConferError;
use crate::events::{CloseReason, HelpRequest, HelpResponse, Participant, SubsessionId, UserId};
use crate::subsession::{Subsession, SubsessionOptions, UserStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The service understood the request and refused it.
    #[error("rejected by service: {0}")]
    Rejected(String),
    #[error("service unreachable: {0}")]
    Unreachable(String),
    #[error("service fault: {0}")]
    Fault(String),
}

impl From<TransportError> for ConferError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Rejected(reason) => ConferError::InvalidParameters(reason),
            TransportError::Unreachable(reason) | TransportError::Fault(reason) => {
                ConferError::Internal(reason)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub topic: String,
    pub token: String,
    pub user_name: String,
    pub password: Option<String>,
    pub idle_timeout_mins: Option<u32>,
}

/// Service answer to a successful join.
#[derive(Debug)]
pub struct JoinAccepted {
    pub session_id: String,
    pub current_user: Participant,
    /// Everyone already in the meeting, the current user included or not.
    pub participants: Vec<Participant>,
    pub rename_locked: bool,
    /// Subsessions that already exist when joining late.
    pub subsessions: Vec<Subsession>,
    pub signals: mpsc::UnboundedReceiver<ServiceSignal>,
}

/// Where the media transport should be homed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaTarget {
    MainSession,
    Subsession(SubsessionId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRequest {
    Rename { user_id: UserId, name: String },
    RemoveUser { user_id: UserId },
    MakeHost { user_id: UserId },
    CreateSubsessions { names: Vec<String> },
    OpenSubsessions {
        subsession_ids: Vec<SubsessionId>,
        options: SubsessionOptions,
    },
    JoinSubsession { subsession_id: SubsessionId },
    LeaveSubsession,
    AssignUser {
        user_id: UserId,
        subsession_id: SubsessionId,
    },
    MoveUser {
        user_id: UserId,
        subsession_id: SubsessionId,
    },
    AskForHelp { subsession_id: SubsessionId },
    RespondToHelp { user_id: UserId, result: HelpResponse },
    Broadcast { content: String },
    CloseAllSubsessions { wait_seconds: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAck {
    Done,
    /// Ids assigned to the subsessions of a `CreateSubsessions`, in order.
    SubsessionsCreated(Vec<SubsessionId>),
}

/// Unsolicited deltas pushed by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceSignal {
    UsersAdded(Vec<Participant>),
    UsersUpdated(Vec<Participant>),
    UsersRemoved(Vec<UserId>),
    /// Main-session roster seen from inside a subsession.
    MainSessionUsersUpdated(Vec<Participant>),
    RenameLockChanged(bool),
    TransportInterrupted,
    TransportRecovered,
    /// No reconnect path left.
    TransportLost,
    Removed { reason: CloseReason },
    SubsessionsUpdated(Vec<Subsession>),
    SubsessionsOpened {
        subsession_ids: Vec<SubsessionId>,
        options: SubsessionOptions,
    },
    SubsessionsClosing { wait_seconds: u32 },
    SubsessionsClosed,
    UserAssigned {
        user_guid: String,
        subsession_id: SubsessionId,
    },
    UserMoved {
        user_guid: String,
        subsession_id: SubsessionId,
    },
    MembershipChanged {
        user_guid: String,
        status: UserStatus,
        subsession_id: Option<SubsessionId>,
    },
    HelpRequested(HelpRequest),
    HelpAnswered { result: HelpResponse },
    BroadcastMessage { message: String, sender_name: String },
}

#[async_trait]
pub trait SessionTransport: Send + Sync {
    async fn connect(&self, request: JoinRequest) -> Result<JoinAccepted, TransportError>;

    /// Leave the meeting, ending it for everyone when `end` is set.
    async fn disconnect(&self, end: bool) -> Result<(), TransportError>;

    async fn send(&self, request: ServiceRequest) -> Result<ServiceAck, TransportError>;

    /// Move media to `target`; resolves once media flows there.
    async fn rehome(&self, target: MediaTarget) -> Result<(), TransportError>;
}
