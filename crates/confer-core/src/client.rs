use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::errors::{ConferError, MeetingStateReason};
use crate::events::{
    CloseReason, ConferEvent, ConferEventListener, EventBus, EventName, HelpRequest, Participant,
    ReconnectReason, SubscriptionHandle, UserId,
};
use crate::gateway::{CommandGateway, CommandKind, EntityKey, Role, require};
use crate::help::HelpDesk;
use crate::roster::Roster;
use crate::session::{JoinParams, MAX_USER_NAME_LEN, SessionInfo, SessionState, check_length};
use crate::subsession::{Subsession, SubsessionBook, SubsessionStatus, UserStatus};
use crate::timers::TimerRegistry;
use crate::transport::{
    JoinAccepted, JoinRequest, MediaTarget, ServiceRequest, SessionTransport, TransportError,
};

/// Everything the core owns, behind one lock.
pub(crate) struct CoreState {
    pub(crate) session: SessionState,
    pub(crate) roster: Roster,
    pub(crate) book: SubsessionBook,
    pub(crate) help: HelpDesk,
    /// Cancelled when the current session ends; pending commands observe it.
    pub(crate) cancel: CancellationToken,
}

impl CoreState {
    fn new() -> Self {
        Self {
            session: SessionState::new(),
            roster: Roster::new(),
            book: SubsessionBook::new(),
            help: HelpDesk::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// The local participant.
    pub(crate) fn me(&self) -> Result<&Participant, ConferError> {
        self.session
            .current_user_id()
            .and_then(|id| self.roster.get(id))
            .ok_or(ConferError::ImproperMeetingState(MeetingStateReason::Closed))
    }

    pub(crate) fn local_guid(&self) -> Option<String> {
        self.session.current_user_guid().map(str::to_string)
    }
}

pub(crate) struct ClientInner {
    pub(crate) state: Mutex<CoreState>,
    pub(crate) bus: EventBus,
    pub(crate) transport: Arc<dyn SessionTransport>,
    pub(crate) gateway: CommandGateway,
    pub(crate) timers: TimerRegistry,
    pub(crate) config: ClientConfig,
}

/// Session and subsession coordination for one local user.
///
/// All state lives behind a single lock and is only mutated by commands
/// (after validation by the command gateway) or by signals from the
/// transport. Events implied by a mutation are queued while the lock is
/// held and delivered once it is released, so listeners observe them in
/// mutation order and may call the query methods freely.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct ConferClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl ConferClient {
    pub fn new(transport: Arc<dyn SessionTransport>, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                state: Mutex::new(CoreState::new()),
                bus: EventBus::new(),
                transport,
                gateway: CommandGateway::new(),
                timers: TimerRegistry::new(),
                config,
            }),
        }
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn subscribe(
        &self,
        name: EventName,
        listener: impl ConferEventListener + 'static,
    ) -> SubscriptionHandle {
        self.inner.bus.subscribe(name, listener)
    }

    /// Register a listener for every event.
    pub fn add_listener(&self, listener: Arc<dyn ConferEventListener>) -> SubscriptionHandle {
        self.inner.bus.add_listener(listener)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.inner.bus.unsubscribe(handle);
    }

    // ── Session commands ─────────────────────────────────────────────

    /// Join a meeting.
    ///
    /// Resolves once the service has accepted the join and the initial
    /// roster has been published.
    pub async fn join(&self, params: JoinParams) -> Result<(), ConferError> {
        params.validate()?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::Join, EntityKey::Session)
            .await?;

        let token = CancellationToken::new();
        self.try_apply(|state, events| {
            events.push(state.session.begin_join(&params)?);
            state.cancel = token.clone();
            Ok(())
        })?;
        tracing::info!("join: connecting to {}", params.topic);

        let request = JoinRequest {
            topic: params.topic.clone(),
            token: params.token.clone(),
            user_name: params.user_name.clone(),
            password: params.password.clone(),
            idle_timeout_mins: params.idle_timeout_mins,
        };
        let accepted = match self
            .remote(&token, "join", self.inner.transport.connect(request))
            .await
        {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("join: {e}");
                self.apply(|state, events| {
                    if !token.is_cancelled() {
                        events.extend(state.session.reject());
                    }
                });
                return Err(e);
            }
        };

        let JoinAccepted {
            session_id,
            current_user,
            participants,
            rename_locked,
            subsessions,
            signals,
        } = accepted;

        self.try_apply(|state, events| {
            if token.is_cancelled() {
                return Err(ConferError::ImproperMeetingState(MeetingStateReason::Closed));
            }
            events.push(state.session.accept(session_id, &current_user, rename_locked));

            let mut everyone = participants;
            if !everyone.iter().any(|p| p.user_id == current_user.user_id) {
                everyone.push(current_user.clone());
            }
            events.extend(state.roster.upsert(everyone));
            state.book.sync_roster(&state.roster);
            if !subsessions.is_empty() {
                state.book.merge_remote(subsessions, events);
            }
            Ok(())
        })?;

        crate::signals::spawn_signal_loop(self.clone(), signals, token);
        tracing::info!(
            "join: connected as {} (user {})",
            current_user.display_name,
            current_user.user_id
        );
        Ok(())
    }

    /// Leave the meeting, ending it for everyone when `end` is set.
    ///
    /// Any command still waiting on the service resolves with
    /// `ImproperMeetingState(Closed)`.
    pub async fn leave(&self, end: bool) -> Result<(), ConferError> {
        let _ticket = self
            .inner
            .gateway
            .preempt(CommandKind::Leave, EntityKey::Session)?;

        self.check(|state| {
            if state.session.connection().is_closed() {
                return Err(ConferError::ImproperMeetingState(MeetingStateReason::Closed));
            }
            if end {
                require(
                    Role::of(state.me()?),
                    Role::Host,
                    ConferError::InsufficientPrivileges("only the host can end the meeting".into()),
                )?;
            }
            Ok(())
        })?;

        tracing::info!("leave: end={end}");
        self.teardown(None);

        let disconnect = self.inner.transport.disconnect(end);
        match tokio::time::timeout(self.inner.config.ack_timeout(), disconnect).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("leave: disconnect failed: {e}"),
            Err(_) => tracing::warn!("leave: disconnect timed out"),
        }
        Ok(())
    }

    /// Rename the local user, or another participant when `user_id` is set.
    pub async fn change_name(
        &self,
        name: &str,
        user_id: Option<UserId>,
    ) -> Result<(), ConferError> {
        check_length("display name", name, MAX_USER_NAME_LEN)?;
        let name = name.trim().to_string();

        let target_guid = self.check(|state| {
            state.session.ensure_in_meeting()?;
            let target = match user_id {
                Some(id) => state.roster.get(id),
                None => Some(state.me()?),
            };
            target
                .map(|p| p.user_guid.clone())
                .ok_or_else(|| ConferError::InvalidParameters(format!("unknown user {user_id:?}")))
        })?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::ChangeName, EntityKey::User(target_guid))
            .await?;

        let (token, target_id) = self.check(|state| {
            state.session.ensure_in_meeting()?;
            let me = state.me()?;
            let target_id = user_id.unwrap_or(me.user_id);
            if target_id == me.user_id {
                if state.session.rename_locked() && !Role::of(me).is_elevated() {
                    return Err(ConferError::HostDisallowRename);
                }
            } else {
                require(
                    Role::of(me),
                    Role::Manager,
                    ConferError::InsufficientPrivileges(
                        "renaming others requires host or manager".into(),
                    ),
                )?;
                if state.roster.get(target_id).is_none() {
                    return Err(ConferError::InvalidParameters(format!(
                        "unknown user {target_id}"
                    )));
                }
            }
            Ok((state.cancel.clone(), target_id))
        })?;

        let request = ServiceRequest::Rename {
            user_id: target_id,
            name: name.clone(),
        };
        self.remote(&token, "changeName", self.inner.transport.send(request))
            .await?;

        self.apply(|state, events| {
            if let Some(mut participant) = state.roster.get(target_id).cloned() {
                participant.display_name = name;
                events.extend(state.roster.upsert(vec![participant]));
            }
        });
        tracing::info!("change_name: user {target_id} renamed");
        Ok(())
    }

    /// Remove a participant from the meeting. Host or manager only.
    pub async fn remove_user(&self, user_id: UserId) -> Result<(), ConferError> {
        let target_guid = self.check(|state| {
            state.session.ensure_in_meeting()?;
            state
                .roster
                .get(user_id)
                .map(|p| p.user_guid.clone())
                .ok_or_else(|| ConferError::InvalidParameters(format!("unknown user {user_id}")))
        })?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::RemoveUser, EntityKey::User(target_guid))
            .await?;

        let token = self.check(|state| {
            state.session.ensure_in_meeting()?;
            let me = state.me()?;
            require(
                Role::of(me),
                Role::Manager,
                ConferError::InsufficientPrivileges("removing users requires host or manager".into()),
            )?;
            let target = state
                .roster
                .get(user_id)
                .ok_or_else(|| ConferError::InvalidParameters(format!("unknown user {user_id}")))?;
            if target.user_id == me.user_id {
                return Err(ConferError::InvalidOperation("cannot remove yourself".into()));
            }
            if target.is_host {
                return Err(ConferError::InsufficientPrivileges(
                    "the host cannot be removed".into(),
                ));
            }
            Ok(state.cancel.clone())
        })?;

        self.remote(
            &token,
            "removeUser",
            self.inner.transport.send(ServiceRequest::RemoveUser { user_id }),
        )
        .await?;

        self.apply(|state, events| {
            events.extend(state.roster.remove(&[user_id]));
            state.help.drop_users(&[user_id]);
            state.book.sync_roster(&state.roster);
        });
        tracing::info!("remove_user: user {user_id} removed");
        Ok(())
    }

    /// Hand the host role to another participant. Host only.
    pub async fn make_host(&self, user_id: UserId) -> Result<(), ConferError> {
        self.check(|state| state.session.ensure_in_meeting())?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::MakeHost, EntityKey::Session)
            .await?;

        let (token, is_self) = self.check(|state| {
            state.session.ensure_in_meeting()?;
            let me = state.me()?;
            require(Role::of(me), Role::Host, ConferError::HostPermissionRequired)?;
            if state.roster.get(user_id).is_none() {
                return Err(ConferError::InvalidParameters(format!("unknown user {user_id}")));
            }
            Ok((state.cancel.clone(), me.user_id == user_id))
        })?;
        if is_self {
            return Ok(());
        }

        self.remote(
            &token,
            "makeHost",
            self.inner.transport.send(ServiceRequest::MakeHost { user_id }),
        )
        .await?;

        self.apply(|state, events| {
            if let Some(target) = state.roster.get(user_id).cloned() {
                events.extend(state.roster.upsert(vec![target.host()]));
            }
        });
        tracing::info!("make_host: host role handed to user {user_id}");
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get_all_user(&self) -> Vec<Participant> {
        self.lock().roster.all().to_vec()
    }

    pub fn get_user(&self, user_id: UserId) -> Option<Participant> {
        self.lock().roster.get(user_id).cloned()
    }

    pub fn get_session_info(&self) -> SessionInfo {
        let state = self.lock();
        state.session.info(state.me().ok())
    }

    pub fn get_subsession_list(&self) -> Vec<Subsession> {
        self.lock().book.list().to_vec()
    }

    /// Subsession status of the local user; `Initial` outside a meeting.
    pub fn get_user_status(&self) -> UserStatus {
        let state = self.lock();
        state
            .session
            .current_user_guid()
            .map_or(UserStatus::Initial, |guid| state.book.user_status(guid))
    }

    /// Aggregate status of the current round, `None` before any is created.
    pub fn get_subsession_status(&self) -> Option<SubsessionStatus> {
        self.lock().book.status()
    }

    pub fn get_current_subsession(&self) -> Option<Subsession> {
        let state = self.lock();
        let guid = state.session.current_user_guid()?;
        state.book.current_subsession(guid).cloned()
    }

    pub fn get_unassigned_user_list(&self) -> Vec<Participant> {
        let state = self.lock();
        state
            .book
            .unassigned(&state.roster)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Pending help requests, oldest first. Only populated for the host.
    pub fn get_help_requests(&self) -> Vec<HelpRequest> {
        self.lock().help.pending()
    }

    // ── Internals shared with the breakout and signal modules ───────

    fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate state and deliver the events the mutation produced.
    pub(crate) fn apply<T>(&self, f: impl FnOnce(&mut CoreState, &mut Vec<ConferEvent>) -> T) -> T {
        let result = {
            let mut state = self.lock();
            let mut events = Vec::new();
            let result = f(&mut state, &mut events);
            for event in events {
                self.inner.bus.enqueue(event);
            }
            result
        };
        self.inner.bus.drain();
        result
    }

    pub(crate) fn try_apply<T>(
        &self,
        f: impl FnOnce(&mut CoreState, &mut Vec<ConferEvent>) -> Result<T, ConferError>,
    ) -> Result<T, ConferError> {
        self.apply(f)
    }

    /// Read-only validation against a consistent snapshot.
    pub(crate) fn check<T>(
        &self,
        f: impl FnOnce(&CoreState) -> Result<T, ConferError>,
    ) -> Result<T, ConferError> {
        f(&self.lock())
    }

    /// Guid of the local user, keying the gateway before the meeting state
    /// is checked so in-flight duplicates are caught while reconnecting.
    pub(crate) fn local_guid(&self) -> Result<String, ConferError> {
        self.check(|state| {
            state
                .local_guid()
                .ok_or(ConferError::ImproperMeetingState(MeetingStateReason::Closed))
        })
    }

    /// Await a service call, bounded by the ack timeout and by the
    /// session's cancellation.
    pub(crate) async fn remote<T>(
        &self,
        token: &CancellationToken,
        what: &str,
        call: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, ConferError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!("{what}: cancelled by session end");
                Err(ConferError::ImproperMeetingState(MeetingStateReason::Closed))
            }
            outcome = tokio::time::timeout(self.inner.config.ack_timeout(), call) => match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => {
                    tracing::warn!("{what}: service error: {e}");
                    Err(e.into())
                }
                Err(_) => {
                    tracing::warn!("{what}: no acknowledgement");
                    Err(ConferError::Timeout(format!("no acknowledgement for {what}")))
                }
            },
        }
    }

    /// Re-home media to `target` inside one reconnect cycle.
    ///
    /// The connection always returns to `Connected` unless the session ended
    /// meanwhile; a failed move is reported as an internal error.
    pub(crate) async fn reconnect_to(
        &self,
        token: &CancellationToken,
        target: MediaTarget,
        reason: ReconnectReason,
    ) -> Result<(), ConferError> {
        self.apply(|state, events| events.extend(state.session.begin_reconnect(reason)));
        tracing::debug!("reconnect: {reason:?} to {target:?}");

        let moved = self
            .remote(token, "rehome", self.inner.transport.rehome(target))
            .await;
        if token.is_cancelled() {
            return Err(ConferError::ImproperMeetingState(MeetingStateReason::Closed));
        }

        self.apply(|state, events| events.extend(state.session.finish_reconnect()));
        moved.map_err(|e| ConferError::Internal(format!("media move failed: {e}")))
    }

    /// End the local session: stop timers, cancel pending commands, drop
    /// all meeting state and publish `Closed`.
    pub(crate) fn teardown(&self, reason: Option<CloseReason>) {
        self.inner.timers.cancel_all();
        self.apply(|state, events| {
            state.cancel.cancel();
            state.roster.clear();
            state.book.clear();
            state.help.clear();
            events.extend(state.session.close(reason));
        });
        tracing::info!("session closed: {reason:?}");
    }
}
