use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::subsession::SubsessionStatus;

pub type UserId = u32;
pub type SubsessionId = String;

/// Events emitted by the core to UI listeners.
///
/// One variant per event name; payloads are typed so listeners can
/// match exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum ConferEvent {
    ConnectionChange(ConnectionState),
    UserAdded(Vec<Participant>),
    UserUpdated(Vec<Participant>),
    UserRemoved(Vec<Participant>),
    SubsessionInviteToJoin {
        subsession_id: SubsessionId,
        subsession_name: String,
    },
    SubsessionCountdown { countdown: u32 },
    SubsessionTimeUp,
    ClosingSubsessionCountdown { countdown: u32 },
    SubsessionBroadcastMessage { message: String, sender_name: String },
    SubsessionAskForHelp(HelpRequest),
    SubsessionAskForHelpResponse { result: HelpResponse },
    SubsessionStateChange { status: SubsessionStatus },
    MainSessionUserUpdated(Vec<Participant>),
}

impl ConferEvent {
    pub fn name(&self) -> EventName {
        match self {
            Self::ConnectionChange(_) => EventName::ConnectionChange,
            Self::UserAdded(_) => EventName::UserAdded,
            Self::UserUpdated(_) => EventName::UserUpdated,
            Self::UserRemoved(_) => EventName::UserRemoved,
            Self::SubsessionInviteToJoin { .. } => EventName::SubsessionInviteToJoin,
            Self::SubsessionCountdown { .. } => EventName::SubsessionCountdown,
            Self::SubsessionTimeUp => EventName::SubsessionTimeUp,
            Self::ClosingSubsessionCountdown { .. } => EventName::ClosingSubsessionCountdown,
            Self::SubsessionBroadcastMessage { .. } => EventName::SubsessionBroadcastMessage,
            Self::SubsessionAskForHelp(_) => EventName::SubsessionAskForHelp,
            Self::SubsessionAskForHelpResponse { .. } => {
                EventName::SubsessionAskForHelpResponse
            }
            Self::SubsessionStateChange { .. } => EventName::SubsessionStateChange,
            Self::MainSessionUserUpdated(_) => EventName::MainSessionUserUpdated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    ConnectionChange,
    UserAdded,
    UserUpdated,
    UserRemoved,
    SubsessionInviteToJoin,
    SubsessionCountdown,
    SubsessionTimeUp,
    ClosingSubsessionCountdown,
    SubsessionBroadcastMessage,
    SubsessionAskForHelp,
    SubsessionAskForHelpResponse,
    SubsessionStateChange,
    MainSessionUserUpdated,
}

impl EventName {
    /// Wire name used by UI shells.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionChange => "connection-change",
            Self::UserAdded => "user-added",
            Self::UserUpdated => "user-updated",
            Self::UserRemoved => "user-removed",
            Self::SubsessionInviteToJoin => "subsession-invite-to-join",
            Self::SubsessionCountdown => "subsession-countdown",
            Self::SubsessionTimeUp => "subsession-time-up",
            Self::ClosingSubsessionCountdown => "closing-subsession-countdown",
            Self::SubsessionBroadcastMessage => "subsession-broadcast-message",
            Self::SubsessionAskForHelp => "subsession-ask-for-help",
            Self::SubsessionAskForHelpResponse => "subsession-ask-for-help-response",
            Self::SubsessionStateChange => "subsession-state-change",
            Self::MainSessionUserUpdated => "main-session-user-updated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting { reason: ReconnectReason },
    Closed { reason: Option<CloseReason> },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectReason {
    Failover,
    JoinBreakoutRoom,
    MoveToBreakoutRoom,
    BackToMainSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    KickedByHost,
    EndedByHost,
    ExpelledByHost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    /// Same human across the main session and every subsession.
    pub user_guid: String,
    pub display_name: String,
    pub is_host: bool,
    pub is_manager: bool,
    pub video_on: bool,
    pub sharer_on: bool,
    pub muted: bool,
}

impl Participant {
    pub fn new(user_id: UserId, user_guid: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            user_guid: user_guid.into(),
            display_name: display_name.into(),
            is_host: false,
            is_manager: false,
            video_on: false,
            sharer_on: false,
            muted: false,
        }
    }

    pub fn host(mut self) -> Self {
        self.is_host = true;
        self
    }

    pub fn manager(mut self) -> Self {
        self.is_manager = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpRequest {
    pub user_id: UserId,
    pub user_name: String,
    pub subsession_id: SubsessionId,
    pub subsession_name: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpResponse {
    Postponed,
    Busy,
    Ignore,
    AlreadyInRoom,
}

/// Trait for receiving events from the core.
/// Implementations must be Send + Sync (called from tokio tasks).
pub trait ConferEventListener: Send + Sync {
    fn on_event(&self, event: ConferEvent);
}

impl<F> ConferEventListener for F
where
    F: Fn(ConferEvent) + Send + Sync,
{
    fn on_event(&self, event: ConferEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

struct Subscription {
    id: u64,
    /// `None` receives every event.
    name: Option<EventName>,
    listener: Arc<dyn ConferEventListener>,
}

struct BusInner {
    subscriptions: RwLock<Vec<Subscription>>,
    queue: Mutex<VecDeque<ConferEvent>>,
    dispatching: AtomicBool,
    next_id: AtomicU64,
}

/// In-process event bus with deterministic in-order delivery.
///
/// Events are queued and then drained in FIFO order; an event published
/// from inside a listener is delivered after the one currently being
/// dispatched. The subscriber list is snapshotted per event, so
/// unsubscribing mid-dispatch only affects later events.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscriptions: RwLock::new(Vec::new()),
                queue: Mutex::new(VecDeque::new()),
                dispatching: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a listener for a single event name.
    pub fn subscribe(
        &self,
        name: EventName,
        listener: impl ConferEventListener + 'static,
    ) -> SubscriptionHandle {
        self.register(Some(name), Arc::new(listener))
    }

    /// Register a listener for every event.
    pub fn add_listener(&self, listener: Arc<dyn ConferEventListener>) -> SubscriptionHandle {
        self.register(None, listener)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.inner
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|s| s.id != handle.0);
    }

    pub fn publish(&self, event: ConferEvent) {
        self.enqueue(event);
        self.drain();
    }

    /// Queue an event without dispatching it.
    ///
    /// Callers mutating shared state enqueue while still holding their
    /// lock so emission order matches mutation order, then call `drain`
    /// once the lock is released.
    pub(crate) fn enqueue(&self, event: ConferEvent) {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(event);
    }

    pub(crate) fn drain(&self) {
        loop {
            if self.inner.dispatching.swap(true, Ordering::AcqRel) {
                // Another pass is running; it will pick our events up.
                return;
            }
            while let Some(event) = self.pop() {
                self.dispatch(event);
            }
            self.inner.dispatching.store(false, Ordering::Release);

            let empty = self
                .inner
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_empty();
            if empty {
                return;
            }
        }
    }

    fn register(
        &self,
        name: Option<EventName>,
        listener: Arc<dyn ConferEventListener>,
    ) -> SubscriptionHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription { id, name, listener });
        SubscriptionHandle(id)
    }

    fn pop(&self) -> Option<ConferEvent> {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn dispatch(&self, event: ConferEvent) {
        let name = event.name();
        let targets: Vec<Arc<dyn ConferEventListener>> = self
            .inner
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.name.is_none_or(|n| n == name))
            .map(|s| s.listener.clone())
            .collect();

        for listener in targets {
            let delivered = catch_unwind(AssertUnwindSafe(|| listener.on_event(event.clone())));
            if delivered.is_err() {
                tracing::error!("listener panicked while handling {}", name.as_str());
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
