use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::ConferClient;
use crate::events::{ConferEvent, ReconnectReason};
use crate::transport::ServiceSignal;

/// Drain service signals into the client until the session ends.
///
/// The stream closing while the session is still live means the
/// transport is gone for good.
pub(crate) fn spawn_signal_loop(
    client: ConferClient,
    mut signals: mpsc::UnboundedReceiver<ServiceSignal>,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                signal = signals.recv() => match signal {
                    Some(signal) => client.handle_signal(signal),
                    None => {
                        if !token.is_cancelled() {
                            tracing::warn!("signal stream closed, treating as transport loss");
                            client.teardown(None);
                        }
                        break;
                    }
                },
            }
        }
        tracing::debug!("signal loop stopped");
    });
}

impl ConferClient {
    pub(crate) fn handle_signal(&self, signal: ServiceSignal) {
        tracing::debug!("signal: {signal:?}");
        match signal {
            ServiceSignal::UsersAdded(participants) | ServiceSignal::UsersUpdated(participants) => {
                self.apply(|state, events| {
                    events.extend(state.roster.upsert(participants));
                    state.book.sync_roster(&state.roster);
                });
            }
            ServiceSignal::UsersRemoved(user_ids) => {
                self.apply(|state, events| {
                    events.extend(state.roster.remove(&user_ids));
                    state.help.drop_users(&user_ids);
                    state.book.sync_roster(&state.roster);
                });
            }
            ServiceSignal::MainSessionUsersUpdated(participants) => {
                self.apply(|_, events| {
                    events.push(ConferEvent::MainSessionUserUpdated(participants))
                });
            }
            ServiceSignal::RenameLockChanged(locked) => {
                self.apply(|state, _| state.session.set_rename_locked(locked));
            }
            ServiceSignal::TransportInterrupted => {
                self.apply(|state, events| {
                    events.extend(state.session.begin_reconnect(ReconnectReason::Failover))
                });
            }
            ServiceSignal::TransportRecovered => {
                self.apply(|state, events| events.extend(state.session.finish_reconnect()));
            }
            ServiceSignal::TransportLost => {
                tracing::error!("transport lost with no reconnect path");
                self.teardown(None);
            }
            ServiceSignal::Removed { reason } => {
                tracing::info!("removed from meeting: {reason:?}");
                self.teardown(Some(reason));
            }
            ServiceSignal::SubsessionsUpdated(subsessions) => {
                self.apply(|state, events| state.book.merge_remote(subsessions, events));
            }
            ServiceSignal::SubsessionsOpened {
                subsession_ids,
                options,
            } => self.subsessions_opened(&subsession_ids, options),
            ServiceSignal::SubsessionsClosing { wait_seconds } => self.begin_closing(wait_seconds),
            ServiceSignal::SubsessionsClosed => self.finish_closing(),
            ServiceSignal::UserAssigned {
                user_guid,
                subsession_id,
            } => {
                self.apply(|state, events| {
                    let Some(user) = state.roster.get_by_guid(&user_guid).cloned() else {
                        tracing::debug!("assignment of unknown user {user_guid} ignored");
                        return;
                    };
                    let local = state.local_guid();
                    state
                        .book
                        .assign(&user, &subsession_id, local.as_deref(), events);
                });
            }
            ServiceSignal::UserMoved {
                user_guid,
                subsession_id,
            } => self.user_moved(&user_guid, &subsession_id),
            ServiceSignal::MembershipChanged {
                user_guid,
                status,
                subsession_id,
            } => {
                self.apply(|state, _| {
                    // The local user's membership only moves through local flows.
                    if state.local_guid().as_deref() == Some(user_guid.as_str())
                        || state.roster.get_by_guid(&user_guid).is_none()
                    {
                        return;
                    }
                    state.book.set_status(&user_guid, status, subsession_id);
                });
            }
            ServiceSignal::HelpRequested(request) => {
                self.apply(|state, events| {
                    if !state.me().is_ok_and(|me| me.is_host) {
                        return;
                    }
                    state.help.record(request.clone());
                    events.push(ConferEvent::SubsessionAskForHelp(request));
                });
            }
            ServiceSignal::HelpAnswered { result } => {
                self.apply(|state, events| {
                    state.help.set_awaiting_response(false);
                    events.push(ConferEvent::SubsessionAskForHelpResponse { result });
                });
            }
            ServiceSignal::BroadcastMessage {
                message,
                sender_name,
            } => {
                self.apply(|_, events| {
                    events.push(ConferEvent::SubsessionBroadcastMessage {
                        message,
                        sender_name,
                    })
                });
            }
        }
    }
}
