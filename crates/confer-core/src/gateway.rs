use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

use crate::errors::ConferError;
use crate::events::Participant;

/// Authority of a participant, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Attendee,
    Manager,
    Host,
}

impl Role {
    pub fn of(participant: &Participant) -> Self {
        if participant.is_host {
            Self::Host
        } else if participant.is_manager {
            Self::Manager
        } else {
            Self::Attendee
        }
    }

    pub fn is_elevated(self) -> bool {
        self >= Self::Manager
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Capability check run before any state mutation.
pub fn authorize(actor: Role, required: Role) -> Decision {
    if actor >= required {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// `authorize`, turning a denial into `denial`.
pub fn require(actor: Role, required: Role, denial: ConferError) -> Result<(), ConferError> {
    match authorize(actor, required) {
        Decision::Allow => Ok(()),
        Decision::Deny => Err(denial),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Join,
    Leave,
    ChangeName,
    RemoveUser,
    MakeHost,
    CreateSubsessions,
    OpenSubsessions,
    JoinSubsession,
    LeaveSubsession,
    MoveSelf,
    AskForHelp,
    RespondToHelp,
    Broadcast,
    AssignUser,
    MoveUser,
    CloseAllSubsessions,
}

impl CommandKind {
    /// Whether a second concurrent command of this kind on the same entity
    /// is rejected rather than queued behind the first.
    pub fn rejects_duplicates(self) -> bool {
        !matches!(
            self,
            Self::ChangeName
                | Self::MakeHost
                | Self::AssignUser
                | Self::MoveUser
                | Self::MoveSelf
                | Self::Broadcast
                | Self::RespondToHelp
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::ChangeName => "changeName",
            Self::RemoveUser => "removeUser",
            Self::MakeHost => "makeHost",
            Self::CreateSubsessions => "createSubsessions",
            Self::OpenSubsessions => "openSubsessions",
            Self::JoinSubsession => "joinSubsession",
            Self::LeaveSubsession => "leaveSubsession",
            Self::MoveSelf => "moveSelf",
            Self::AskForHelp => "askForHelp",
            Self::RespondToHelp => "respondToHelp",
            Self::Broadcast => "broadcast",
            Self::AssignUser => "assignUserToSubsession",
            Self::MoveUser => "moveUserToSubsession",
            Self::CloseAllSubsessions => "closeAllSubsessions",
        }
    }
}

/// What a command mutates; commands on the same entity run one at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Session,
    /// Keyed by user guid.
    User(String),
    Subsessions,
}

type InFlight = Arc<Mutex<HashMap<(CommandKind, EntityKey), usize>>>;
type EntityLocks = Arc<Mutex<HashMap<EntityKey, Arc<tokio::sync::Mutex<()>>>>>;

/// Sequences outbound commands.
///
/// `enter` rejects state-incompatible duplicates up front and otherwise
/// queues the caller FIFO behind any command already running on the same
/// entity. The returned ticket releases both on drop.
#[derive(Default)]
pub struct CommandGateway {
    in_flight: InFlight,
    locks: EntityLocks,
}

impl CommandGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enter(
        &self,
        kind: CommandKind,
        entity: EntityKey,
    ) -> Result<CommandTicket, ConferError> {
        let registration = self.register(kind, entity.clone())?;
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(entity.clone())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        Ok(CommandTicket {
            held: Some(HeldLock {
                guard: Some(guard),
                locks: self.locks.clone(),
                entity,
            }),
            _registration: registration,
        })
    }

    /// Register without queueing behind the entity's running command.
    ///
    /// For commands such as `leave` that must cut through whatever is in
    /// flight instead of waiting for it.
    pub fn preempt(&self, kind: CommandKind, entity: EntityKey) -> Result<CommandTicket, ConferError> {
        let registration = self.register(kind, entity)?;
        Ok(CommandTicket {
            held: None,
            _registration: registration,
        })
    }

    /// True while any command of `kind` is running or queued on `entity`.
    pub fn is_busy(&self, kind: CommandKind, entity: &EntityKey) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(kind, entity.clone()))
            .is_some_and(|n| *n > 0)
    }

    fn register(&self, kind: CommandKind, entity: EntityKey) -> Result<Registration, ConferError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let count = in_flight.entry((kind, entity.clone())).or_insert(0);
        if *count > 0 && kind.rejects_duplicates() {
            tracing::debug!("rejecting duplicate {} on {entity:?}", kind.as_str());
            return Err(ConferError::DuplicatedOperation(format!(
                "{} already in progress",
                kind.as_str()
            )));
        }
        *count += 1;
        Ok(Registration {
            in_flight: self.in_flight.clone(),
            key: (kind, entity),
        })
    }
}

struct Registration {
    in_flight: InFlight,
    key: (CommandKind, EntityKey),
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = in_flight.get_mut(&self.key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                in_flight.remove(&self.key);
            }
        }
    }
}

/// Held for the lifetime of a command.
pub struct CommandTicket {
    held: Option<HeldLock>,
    _registration: Registration,
}

/// An entity's queue position; the entity's lock is dropped from the map
/// once nobody holds or waits on it.
struct HeldLock {
    guard: Option<OwnedMutexGuard<()>>,
    locks: EntityLocks,
    entity: EntityKey,
}

impl Drop for HeldLock {
    fn drop(&mut self) {
        // The guard owns a handle on the lock; release it before counting.
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.entity)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.entity);
        }
    }
}
