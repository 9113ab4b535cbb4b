//! Breakout-room commands and the flows they share with remote signals.
//!
//! Joining, leaving and being moved are compound transitions: a membership
//! change, one or two media reconnect cycles, and a final membership change
//! that only lands if nothing closed the round in between.

use std::time::Duration;

use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use crate::client::ConferClient;
use crate::errors::ConferError;
use crate::events::{ConferEvent, HelpResponse, ReconnectReason, SubsessionId, UserId};
use crate::gateway::{CommandKind, EntityKey, Role, require};
use crate::help::postpone_response;
use crate::subsession::{
    AllocationPattern, CreateSubsessionsData, Subsession, SubsessionOptions, SubsessionStatus,
    UserStatus, subsession_capacity,
};
use crate::timers::TimerKey;
use crate::transport::{MediaTarget, ServiceAck, ServiceRequest};

const TICK: Duration = Duration::from_secs(1);

impl ConferClient {
    /// Create a round of subsessions. Host or manager only.
    ///
    /// A count auto-names the subsessions; names create them as given.
    pub async fn create_subsessions(
        &self,
        data: impl Into<CreateSubsessionsData>,
        pattern: AllocationPattern,
    ) -> Result<Vec<Subsession>, ConferError> {
        let data = data.into();
        self.check(|state| state.session.ensure_in_meeting())?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::CreateSubsessions, EntityKey::Subsessions)
            .await?;

        let capacity = subsession_capacity(self.inner.config.elevated_subsession_capacity);
        let (token, names) = self.check(|state| {
            state.session.ensure_in_meeting()?;
            require_elevated(Role::of(state.me()?))?;
            let names = state.book.plan_create(&data, capacity)?;
            Ok((state.cancel.clone(), names))
        })?;

        let request = ServiceRequest::CreateSubsessions {
            names: names.clone(),
        };
        let ids = match self
            .remote(&token, "createSubsessions", self.inner.transport.send(request))
            .await?
        {
            ServiceAck::SubsessionsCreated(ids) if ids.len() == names.len() => ids,
            other => {
                return Err(ConferError::Internal(format!(
                    "unexpected acknowledgement for createSubsessions: {other:?}"
                )));
            }
        };

        let created = self.apply(|state, events| {
            let created = ids.into_iter().zip(names).collect();
            state
                .book
                .insert_created(created, pattern, &state.roster, events)
        });
        tracing::info!("create_subsessions: {} created ({pattern:?})", created.len());
        Ok(created)
    }

    /// Open subsessions, inviting their assigned users.
    pub async fn open_subsessions(
        &self,
        subsession_ids: &[SubsessionId],
        options: SubsessionOptions,
    ) -> Result<(), ConferError> {
        self.check(|state| state.session.ensure_in_meeting())?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::OpenSubsessions, EntityKey::Subsessions)
            .await?;

        let token = self.check(|state| {
            state.session.ensure_in_meeting()?;
            require_elevated(Role::of(state.me()?))?;
            state.book.validate_open(subsession_ids)?;
            Ok(state.cancel.clone())
        })?;

        let request = ServiceRequest::OpenSubsessions {
            subsession_ids: subsession_ids.to_vec(),
            options: options.clone(),
        };
        self.remote(&token, "openSubsessions", self.inner.transport.send(request))
            .await?;

        self.subsessions_opened(subsession_ids, options);
        tracing::info!("open_subsessions: {} opened", subsession_ids.len());
        Ok(())
    }

    /// Enter an open subsession.
    ///
    /// Resolves once media has moved, with the user `InSubsession`.
    pub async fn join_subsession(&self, subsession_id: &str) -> Result<(), ConferError> {
        let guid = self.local_guid()?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::JoinSubsession, EntityKey::User(guid.clone()))
            .await?;

        let (token, previous) = self.try_apply(|state, _| {
            state.session.ensure_in_meeting()?;
            let elevated = Role::of(state.me()?).is_elevated();
            state.book.validate_join(&guid, elevated, subsession_id)?;
            let previous = state.book.user_status(&guid);
            state
                .book
                .set_status(&guid, UserStatus::Joining, Some(subsession_id.to_string()));
            Ok((state.cancel.clone(), previous))
        })?;
        tracing::info!("join_subsession: joining {subsession_id}");

        let request = ServiceRequest::JoinSubsession {
            subsession_id: subsession_id.to_string(),
        };
        if let Err(e) = self
            .remote(&token, "joinSubsession", self.inner.transport.send(request))
            .await
        {
            self.restore_status(&token, &guid, UserStatus::Joining, previous);
            return Err(e);
        }

        let target = MediaTarget::Subsession(subsession_id.to_string());
        if let Err(e) = self
            .reconnect_to(&token, target, ReconnectReason::JoinBreakoutRoom)
            .await
        {
            self.restore_status(&token, &guid, UserStatus::Joining, previous);
            return Err(e);
        }

        let entered = self.apply(|state, _| {
            if state.book.user_status(&guid) != UserStatus::Joining {
                return None;
            }
            state.book.set_status(&guid, UserStatus::InSubsession, None);
            if state.me().is_ok_and(|me| me.is_host) {
                Some(state.help.resolve_subsession(subsession_id))
            } else {
                Some(Vec::new())
            }
        });
        let Some(resolved) = entered else {
            // The round closed while media was moving in; follow everyone out.
            tracing::info!("join_subsession: {subsession_id} closed during join");
            if let Err(e) = self
                .reconnect_to(&token, MediaTarget::MainSession, ReconnectReason::BackToMainSession)
                .await
            {
                tracing::warn!("join_subsession: return to main session failed: {e}");
            }
            return Err(ConferError::SubsessionMismatchState(format!(
                "subsession {subsession_id} closed while joining"
            )));
        };
        // Requesters in this room are told the host has arrived.
        for request in resolved {
            let answer = ServiceRequest::RespondToHelp {
                user_id: request.user_id,
                result: HelpResponse::AlreadyInRoom,
            };
            if let Err(e) = self
                .remote(&token, "respondToHelp", self.inner.transport.send(answer))
                .await
            {
                tracing::warn!(
                    "join_subsession: answering help from user {} failed: {e}",
                    request.user_id
                );
            }
        }
        tracing::info!("join_subsession: in {subsession_id}");
        Ok(())
    }

    /// Return from the current subsession to the main session.
    ///
    /// Already being in the main session, including after a forced close
    /// overtook this call, counts as success.
    pub async fn leave_subsession(&self) -> Result<(), ConferError> {
        let guid = self.local_guid()?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::LeaveSubsession, EntityKey::User(guid.clone()))
            .await?;

        let token = self.try_apply(|state, _| {
            state.session.ensure_in_meeting()?;
            match state.book.user_status(&guid) {
                UserStatus::MainSession => return Ok(None),
                UserStatus::InSubsession => {}
                other => {
                    return Err(ConferError::SubsessionMismatchState(format!(
                        "user is {other:?}"
                    )));
                }
            }
            let elevated = Role::of(state.me()?).is_elevated();
            if !elevated && !state.book.options().is_back_to_main_session_enabled {
                return Err(ConferError::SubsessionExitRestricted);
            }
            state.book.set_status(&guid, UserStatus::Leaving, None);
            // A pending help request does not follow the user out.
            state.help.set_awaiting_response(false);
            Ok(Some(state.cancel.clone()))
        })?;
        let Some(token) = token else {
            tracing::debug!("leave_subsession: already in main session");
            return Ok(());
        };

        if let Err(e) = self
            .remote(
                &token,
                "leaveSubsession",
                self.inner.transport.send(ServiceRequest::LeaveSubsession),
            )
            .await
        {
            self.restore_status(&token, &guid, UserStatus::Leaving, UserStatus::InSubsession);
            return Err(e);
        }
        if let Err(e) = self
            .reconnect_to(&token, MediaTarget::MainSession, ReconnectReason::BackToMainSession)
            .await
        {
            self.restore_status(&token, &guid, UserStatus::Leaving, UserStatus::InSubsession);
            return Err(e);
        }

        self.apply(|state, _| {
            if state.book.user_status(&guid) == UserStatus::Leaving {
                state.book.set_status(&guid, UserStatus::MainSession, None);
            }
        });
        tracing::info!("leave_subsession: back in main session");
        Ok(())
    }

    /// Assign a user who has no subsession yet. Host or manager only.
    pub async fn assign_user_to_subsession(
        &self,
        user_id: UserId,
        subsession_id: &str,
    ) -> Result<(), ConferError> {
        let target_guid = self.target_guid(user_id)?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::AssignUser, EntityKey::User(target_guid.clone()))
            .await?;

        let token = self.check(|state| {
            state.session.ensure_in_meeting()?;
            require_elevated(Role::of(state.me()?))?;
            if state.roster.get(user_id).is_none() {
                return Err(ConferError::SubsessionMismatchUser(format!("unknown user {user_id}")));
            }
            state.book.validate_assign(&target_guid, subsession_id)?;
            Ok(state.cancel.clone())
        })?;

        let request = ServiceRequest::AssignUser {
            user_id,
            subsession_id: subsession_id.to_string(),
        };
        self.remote(&token, "assignUserToSubsession", self.inner.transport.send(request))
            .await?;

        self.apply(|state, events| {
            if let Some(user) = state.roster.get(user_id).cloned() {
                let local = state.local_guid();
                state
                    .book
                    .assign(&user, subsession_id, local.as_deref(), events);
            }
        });
        tracing::info!("assign_user_to_subsession: user {user_id} to {subsession_id}");
        Ok(())
    }

    /// Move an assigned user to another open subsession. Host or manager only.
    pub async fn move_user_to_subsession(
        &self,
        user_id: UserId,
        subsession_id: &str,
    ) -> Result<(), ConferError> {
        let target_guid = self.target_guid(user_id)?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::MoveUser, EntityKey::User(target_guid.clone()))
            .await?;

        let token = self.check(|state| {
            state.session.ensure_in_meeting()?;
            require_elevated(Role::of(state.me()?))?;
            if state.roster.get(user_id).is_none() {
                return Err(ConferError::SubsessionMismatchUser(format!("unknown user {user_id}")));
            }
            state.book.validate_move(&target_guid, subsession_id)?;
            Ok(state.cancel.clone())
        })?;

        let request = ServiceRequest::MoveUser {
            user_id,
            subsession_id: subsession_id.to_string(),
        };
        self.remote(&token, "moveUserToSubsession", self.inner.transport.send(request))
            .await?;

        self.user_moved(&target_guid, subsession_id);
        tracing::info!("move_user_to_subsession: user {user_id} to {subsession_id}");
        Ok(())
    }

    /// Ask the host to come to the local user's subsession.
    pub async fn ask_for_help(&self) -> Result<(), ConferError> {
        let guid = self.local_guid()?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::AskForHelp, EntityKey::User(guid.clone()))
            .await?;

        let (token, subsession_id) = self.try_apply(|state, _| {
            state.session.ensure_in_meeting()?;
            if state.me()?.is_host {
                return Err(ConferError::InvalidOperation(
                    "the host cannot ask for help".into(),
                ));
            }
            let subsession_id = state
                .book
                .current_subsession(&guid)
                .map(|s| s.subsession_id.clone())
                .ok_or_else(|| {
                    ConferError::SubsessionMismatchState("user is not in a subsession".into())
                })?;
            if state.help.is_awaiting_response() {
                return Err(ConferError::DuplicatedOperation(
                    "help already requested".into(),
                ));
            }
            state.help.set_awaiting_response(true);
            Ok((state.cancel.clone(), subsession_id))
        })?;

        let request = ServiceRequest::AskForHelp {
            subsession_id: subsession_id.clone(),
        };
        if let Err(e) = self
            .remote(&token, "askForHelp", self.inner.transport.send(request))
            .await
        {
            self.apply(|state, _| state.help.set_awaiting_response(false));
            return Err(e);
        }
        tracing::info!("ask_for_help: requested from {subsession_id}");
        Ok(())
    }

    /// Put off a help request. The requester learns whether the host is
    /// busy elsewhere, already in their room, or simply postponing.
    pub async fn postpone_helping(&self, user_id: UserId) -> Result<(), ConferError> {
        self.respond_to_help(user_id, None).await
    }

    /// Dismiss a help request; the requester receives `Ignore`.
    pub async fn ignore_helping(&self, user_id: UserId) -> Result<(), ConferError> {
        self.respond_to_help(user_id, Some(HelpResponse::Ignore))
            .await
    }

    /// Send a message to every subsession and the main session. Host only.
    pub async fn broadcast(&self, content: &str) -> Result<(), ConferError> {
        self.check(|state| state.session.ensure_in_meeting())?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::Broadcast, EntityKey::Subsessions)
            .await?;

        let (token, sender_name) = self.check(|state| {
            state.session.ensure_in_meeting()?;
            let me = state.me()?;
            require(Role::of(me), Role::Host, ConferError::HostPermissionRequired)?;
            if content.trim().is_empty() {
                return Err(ConferError::SubsessionBroadcastInvalidContent);
            }
            if !state.book.is_live() {
                return Err(ConferError::SubsessionMismatchState(
                    "no subsession is open".into(),
                ));
            }
            Ok((state.cancel.clone(), me.display_name.clone()))
        })?;

        let request = ServiceRequest::Broadcast {
            content: content.to_string(),
        };
        self.remote(&token, "broadcast", self.inner.transport.send(request))
            .await?;

        self.apply(|_, events| {
            events.push(ConferEvent::SubsessionBroadcastMessage {
                message: content.to_string(),
                sender_name,
            })
        });
        Ok(())
    }

    /// Close every open subsession. Host only.
    ///
    /// Resolves on the service's acknowledgement; users return to the main
    /// session once the closing countdown (`wait_seconds`) runs out.
    pub async fn close_all_subsessions(&self) -> Result<(), ConferError> {
        self.check(|state| state.session.ensure_in_meeting())?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::CloseAllSubsessions, EntityKey::Subsessions)
            .await?;

        let (token, wait_seconds) = self.check(|state| {
            state.session.ensure_in_meeting()?;
            require(Role::of(state.me()?), Role::Host, ConferError::HostPermissionRequired)?;
            if state.book.status() != Some(SubsessionStatus::InProgress) {
                return Err(ConferError::SubsessionMismatchState(
                    "no subsession in progress".into(),
                ));
            }
            Ok((state.cancel.clone(), state.book.options().wait_seconds))
        })?;

        self.remote(
            &token,
            "closeAllSubsessions",
            self.inner
                .transport
                .send(ServiceRequest::CloseAllSubsessions { wait_seconds }),
        )
        .await?;

        tracing::info!("close_all_subsessions: closing in {wait_seconds}s");
        self.begin_closing(wait_seconds);
        Ok(())
    }

    // ── Flows shared with the signal loop ───────────────────────────

    /// Subsessions moved to `InProgress`, locally or by the service.
    pub(crate) fn subsessions_opened(&self, subsession_ids: &[SubsessionId], options: SubsessionOptions) {
        let timer = options
            .is_timer_enabled
            .then_some((options.timer_duration, options.is_timer_auto_enabled));
        let outcome = self.apply(|state, events| {
            state.book.open(
                subsession_ids,
                options,
                state.session.current_user_guid(),
                events,
            )
        });
        if outcome.opened == 0 {
            return;
        }

        if let Some((duration, auto_close)) = timer {
            self.start_countdown(duration, auto_close);
        }
        if let Some(subsession_id) = outcome.auto_join {
            let client = self.clone();
            tokio::spawn(async move {
                if let Err(e) = client.join_subsession(&subsession_id).await {
                    tracing::warn!("auto join of {subsession_id} failed: {e}");
                }
            });
        }
    }

    /// A user's assignment moved to `subsession_id`.
    ///
    /// When the local user is inside a subsession, media follows through a
    /// back-to-main cycle and then a move-to-breakout cycle.
    pub(crate) fn user_moved(&self, user_guid: &str, subsession_id: &str) {
        let follow = self.apply(|state, events| {
            let Some(user) = state.roster.get_by_guid(user_guid).cloned() else {
                tracing::debug!("move of unknown user {user_guid} ignored");
                return false;
            };
            let local = state.local_guid();
            let inside = state.book.user_status(user_guid) == UserStatus::InSubsession;
            state
                .book
                .relocate(&user, subsession_id, local.as_deref(), events);
            inside && local.as_deref() == Some(user_guid)
        });
        if follow {
            let client = self.clone();
            tokio::spawn(async move {
                if let Err(e) = client.follow_move().await {
                    tracing::warn!("following a move failed: {e}");
                }
            });
        }
    }

    /// Start closing the round, with a `wait_seconds` countdown first.
    pub(crate) fn begin_closing(&self, wait_seconds: u32) {
        self.inner.timers.cancel(TimerKey::SubsessionCountdown);
        if !self.apply(|state, events| state.book.begin_close(events)) {
            return;
        }
        if wait_seconds == 0 {
            self.finish_closing();
            return;
        }

        let client = self.clone();
        self.inner
            .timers
            .schedule(TimerKey::ClosingCountdown, move |id| async move {
                let mut ticks = interval_at(Instant::now() + TICK, TICK);
                for countdown in (0..wait_seconds).rev() {
                    ticks.tick().await;
                    let still_closing = client.apply(|state, events| {
                        let closing = state.book.status() == Some(SubsessionStatus::Closing);
                        if closing {
                            events.push(ConferEvent::ClosingSubsessionCountdown { countdown });
                        }
                        closing
                    });
                    if !still_closing {
                        return;
                    }
                }
                client.inner.timers.release(TimerKey::ClosingCountdown, id);
                client.finish_closing();
            });
    }

    /// Force everyone back to the main session and close the round.
    pub(crate) fn finish_closing(&self) {
        self.inner.timers.cancel(TimerKey::SubsessionCountdown);
        self.inner.timers.cancel(TimerKey::ClosingCountdown);

        let (local_rehome, token) = self.apply(|state, events| {
            let rehomed = state.book.finish_close(events);
            state.help.clear();
            let local = state
                .local_guid()
                .filter(|guid| rehomed.contains(guid));
            (local, state.cancel.clone())
        });
        tracing::info!("subsessions closed");

        let Some(guid) = local_rehome else {
            return;
        };
        // A join, leave or move in flight for the local user finishes the
        // media move itself.
        let entity = EntityKey::User(guid);
        let busy = [
            CommandKind::JoinSubsession,
            CommandKind::LeaveSubsession,
            CommandKind::MoveSelf,
        ]
        .into_iter()
        .any(|kind| self.inner.gateway.is_busy(kind, &entity));
        if busy {
            return;
        }

        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client
                .reconnect_to(&token, MediaTarget::MainSession, ReconnectReason::BackToMainSession)
                .await
            {
                tracing::warn!("return to main session after close failed: {e}");
            }
        });
    }

    // ── Helpers ─────────────────────────────────────────────────────

    async fn respond_to_help(
        &self,
        user_id: UserId,
        fixed: Option<HelpResponse>,
    ) -> Result<(), ConferError> {
        self.check(|state| state.session.ensure_in_meeting())?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::RespondToHelp, EntityKey::Subsessions)
            .await?;

        let (token, result) = self.check(|state| {
            state.session.ensure_in_meeting()?;
            let me = state.me()?;
            require(Role::of(me), Role::Host, ConferError::HostPermissionRequired)?;
            let request = state.help.find(user_id).ok_or_else(|| {
                ConferError::SubsessionMismatchUser(format!("no help request from user {user_id}"))
            })?;
            let result = fixed.unwrap_or_else(|| {
                let host_room = state
                    .book
                    .current_subsession(&me.user_guid)
                    .map(|s| s.subsession_id.clone());
                postpone_response(host_room.as_ref(), request)
            });
            Ok((state.cancel.clone(), result))
        })?;

        self.remote(
            &token,
            "respondToHelp",
            self.inner
                .transport
                .send(ServiceRequest::RespondToHelp { user_id, result }),
        )
        .await?;

        self.apply(|state, _| state.help.take(user_id));
        tracing::info!("help request from user {user_id} answered: {result:?}");
        Ok(())
    }

    /// Follow a move of the local user who is inside a subsession.
    async fn follow_move(&self) -> Result<(), ConferError> {
        let guid = self.local_guid()?;
        let _ticket = self
            .inner
            .gateway
            .enter(CommandKind::MoveSelf, EntityKey::User(guid.clone()))
            .await?;

        let started = self.apply(|state, _| {
            if state.book.user_status(&guid) != UserStatus::InSubsession {
                return None;
            }
            let target = state.book.membership(&guid).subsession_id?;
            state.book.set_status(&guid, UserStatus::Leaving, None);
            state.help.set_awaiting_response(false);
            Some((state.cancel.clone(), target))
        });
        let Some((token, target)) = started else {
            return Ok(());
        };

        if let Err(e) = self
            .reconnect_to(&token, MediaTarget::MainSession, ReconnectReason::BackToMainSession)
            .await
        {
            self.restore_status(&token, &guid, UserStatus::Leaving, UserStatus::InSubsession);
            return Err(e);
        }
        let joining = self.apply(|state, _| {
            let leaving = state.book.user_status(&guid) == UserStatus::Leaving;
            if leaving {
                state.book.set_status(&guid, UserStatus::Joining, None);
            }
            leaving
        });
        if !joining {
            return Ok(());
        }

        let moved = self
            .reconnect_to(
                &token,
                MediaTarget::Subsession(target.clone()),
                ReconnectReason::MoveToBreakoutRoom,
            )
            .await;
        if let Err(e) = moved {
            // Media is home in the main session; the user can rejoin.
            self.restore_status(&token, &guid, UserStatus::Joining, UserStatus::Invited);
            return Err(e);
        }
        let entered = self.apply(|state, _| {
            let joining = state.book.user_status(&guid) == UserStatus::Joining;
            if joining {
                state.book.set_status(&guid, UserStatus::InSubsession, None);
            }
            joining
        });
        if !entered {
            self.reconnect_to(&token, MediaTarget::MainSession, ReconnectReason::BackToMainSession)
                .await?;
            return Ok(());
        }
        tracing::info!("moved into {target}");
        Ok(())
    }

    /// Per-second `subsession-countdown` for the open round.
    fn start_countdown(&self, duration: u32, auto_close: bool) {
        let client = self.clone();
        self.inner
            .timers
            .schedule(TimerKey::SubsessionCountdown, move |id| async move {
                let mut ticks = interval_at(Instant::now() + TICK, TICK);
                for countdown in (0..duration).rev() {
                    ticks.tick().await;
                    let running = client.apply(|state, events| {
                        let running = state.book.status() == Some(SubsessionStatus::InProgress);
                        if running {
                            events.push(ConferEvent::SubsessionCountdown { countdown });
                        }
                        running
                    });
                    if !running {
                        return;
                    }
                }
                client.inner.timers.release(TimerKey::SubsessionCountdown, id);

                let is_host = client
                    .check(|state| Ok(state.me()?.is_host))
                    .unwrap_or(false);
                if auto_close {
                    if is_host {
                        if let Err(e) = client.close_all_subsessions().await {
                            tracing::warn!("automatic close failed: {e}");
                        }
                    }
                } else {
                    client.apply(|state, events| {
                        if state.book.status() == Some(SubsessionStatus::InProgress) {
                            events.push(ConferEvent::SubsessionTimeUp);
                        }
                    });
                }
            });
    }

    fn target_guid(&self, user_id: UserId) -> Result<String, ConferError> {
        self.check(|state| {
            state.session.ensure_in_meeting()?;
            state
                .roster
                .get(user_id)
                .map(|p| p.user_guid.clone())
                .ok_or_else(|| ConferError::SubsessionMismatchUser(format!("unknown user {user_id}")))
        })
    }

    /// Undo a transitional status after a failed step, unless the session
    /// ended or another flow already moved the user on.
    fn restore_status(
        &self,
        token: &CancellationToken,
        guid: &str,
        expected: UserStatus,
        restored: UserStatus,
    ) {
        if token.is_cancelled() {
            return;
        }
        self.apply(|state, _| {
            if state.book.user_status(guid) == expected {
                state.book.set_status(guid, restored, None);
            }
        });
    }
}

fn require_elevated(role: Role) -> Result<(), ConferError> {
    require(
        role,
        Role::Manager,
        ConferError::InsufficientPrivileges("requires host or manager".into()),
    )
}
