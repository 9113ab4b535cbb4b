use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Failure categories reported to callers as the `type` of a rejected command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidOperation,
    InternalError,
    InsufficientPrivileges,
    OperationTimeout,
    ImproperMeetingState,
    InvalidParameters,
    OperationLocked,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidOperation => "INVALID_OPERATION",
            Self::InternalError => "INTERNAL_ERROR",
            Self::InsufficientPrivileges => "INSUFFICIENT_PRIVILEGES",
            Self::OperationTimeout => "OPERATION_TIMEOUT",
            Self::ImproperMeetingState => "IMPROPER_MEETING_STATE",
            Self::InvalidParameters => "INVALID_PARAMETERS",
            Self::OperationLocked => "OPERATION_LOCKED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the meeting cannot accept a command right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStateReason {
    Closed,
    OnHold,
    Reconnecting,
}

impl fmt::Display for MeetingStateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::OnHold => f.write_str("on hold"),
            Self::Reconnecting => f.write_str("reconnecting"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConferError {
    #[error("duplicated operation: {0}")]
    DuplicatedOperation(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("insufficient privileges: {0}")]
    InsufficientPrivileges(String),
    #[error("client host permission required")]
    HostPermissionRequired,
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("improper meeting state: {0}")]
    ImproperMeetingState(MeetingStateReason),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("host disallows rename")]
    HostDisallowRename,
    #[error("subsession state mismatch: {0}")]
    SubsessionMismatchState(String),
    #[error("unknown subsession: {0}")]
    SubsessionMismatchId(String),
    #[error("user not eligible for subsession operation: {0}")]
    SubsessionMismatchUser(String),
    #[error("returning to the main session is disabled")]
    SubsessionExitRestricted,
    #[error("broadcast content is empty")]
    SubsessionBroadcastInvalidContent,
}

impl ConferError {
    /// Taxonomy bucket for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicatedOperation(_)
            | Self::InvalidOperation(_)
            | Self::SubsessionMismatchState(_)
            | Self::SubsessionExitRestricted => ErrorKind::InvalidOperation,
            Self::Internal(_) => ErrorKind::InternalError,
            Self::InsufficientPrivileges(_) | Self::HostPermissionRequired => {
                ErrorKind::InsufficientPrivileges
            }
            Self::Timeout(_) => ErrorKind::OperationTimeout,
            Self::ImproperMeetingState(_) => ErrorKind::ImproperMeetingState,
            Self::InvalidParameters(_)
            | Self::SubsessionMismatchId(_)
            | Self::SubsessionMismatchUser(_)
            | Self::SubsessionBroadcastInvalidContent => ErrorKind::InvalidParameters,
            Self::HostDisallowRename => ErrorKind::OperationLocked,
        }
    }

    /// Stable reason code, or the free-form detail for generic variants.
    pub fn reason(&self) -> String {
        match self {
            Self::HostPermissionRequired => "CLIENT_HOST_PERMISSION_REQUIRED".into(),
            Self::HostDisallowRename => "CLIENT_HOST_DISALLOW_RENAME".into(),
            Self::SubsessionMismatchState(_) => "SUBSESSION_MISMATCH_STATE".into(),
            Self::SubsessionMismatchId(_) => "SUBSESSION_MISMATCH_ID".into(),
            Self::SubsessionMismatchUser(_) => "SUBSESSION_MISMATCH_USER".into(),
            Self::SubsessionExitRestricted => "SUBSESSION_EXIT_RESTRICTED".into(),
            Self::SubsessionBroadcastInvalidContent => {
                "SUBSESSION_BROADCAST_INVALID_CONTENT".into()
            }
            Self::ImproperMeetingState(reason) => reason.to_string(),
            Self::DuplicatedOperation(detail)
            | Self::InvalidOperation(detail)
            | Self::Internal(detail)
            | Self::InsufficientPrivileges(detail)
            | Self::Timeout(detail)
            | Self::InvalidParameters(detail) => detail.clone(),
        }
    }

    pub fn failure(&self) -> Failure {
        Failure {
            kind: self.kind(),
            reason: self.reason(),
        }
    }
}

/// Serialisable `{type, reason}` form handed to UI shells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub reason: String,
}

impl From<&ConferError> for Failure {
    fn from(e: &ConferError) -> Self {
        e.failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_permission_is_an_insufficient_privilege() {
        let e = ConferError::HostPermissionRequired;
        assert_eq!(e.kind(), ErrorKind::InsufficientPrivileges);
        assert_eq!(e.reason(), "CLIENT_HOST_PERMISSION_REQUIRED");
    }

    #[test]
    fn rename_lock_maps_to_operation_locked() {
        assert_eq!(
            ConferError::HostDisallowRename.kind(),
            ErrorKind::OperationLocked
        );
    }

    #[test]
    fn failure_serialises_with_type_field() {
        let f = ConferError::ImproperMeetingState(MeetingStateReason::Reconnecting).failure();
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["type"], "IMPROPER_MEETING_STATE");
        assert_eq!(json["reason"], "reconnecting");
    }
}
