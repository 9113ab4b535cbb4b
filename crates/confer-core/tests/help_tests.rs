//! Help requests and broadcasts between subsessions and the host.

mod support;

use chrono::Utc;

use confer_core::errors::ConferError;
use confer_core::events::{ConferEvent, EventName, HelpRequest, HelpResponse, Participant};
use confer_core::subsession::{AllocationPattern, Subsession, SubsessionOptions, SubsessionStatus, SubsessionUser};
use confer_core::transport::{ServiceRequest, ServiceSignal};
use support::{attendee, host, joined, settle, Harness};

fn help_from(user: &Participant, subsession: &Subsession, seconds_ago: i64) -> HelpRequest {
    HelpRequest {
        user_id: user.user_id,
        user_name: user.display_name.clone(),
        subsession_id: subsession.subsession_id.clone(),
        subsession_name: subsession.subsession_name.clone(),
        requested_at: Utc::now() - chrono::Duration::seconds(seconds_ago),
    }
}

/// Host with attendee 2 in room A and attendee 3 in room B, both open.
async fn host_with_rooms() -> (Harness, Vec<Subsession>) {
    let h = joined(host(), vec![attendee(2), attendee(3)]).await;
    let rooms = h
        .client
        .create_subsessions(vec!["A", "B"], AllocationPattern::Automatically)
        .await
        .unwrap();
    let ids: Vec<String> = rooms.iter().map(|s| s.subsession_id.clone()).collect();
    h.client
        .open_subsessions(&ids, SubsessionOptions::default())
        .await
        .unwrap();
    h.capture.clear();
    (h, rooms)
}

/// Attendee 2 inside room `s0`.
async fn attendee_in_room() -> Harness {
    let h = joined(attendee(2), vec![host()]).await;
    h.transport.signal(ServiceSignal::SubsessionsUpdated(vec![Subsession {
        subsession_id: "s0".into(),
        subsession_name: "Alpha".into(),
        user_list: vec![SubsessionUser::from(&attendee(2))],
        status: SubsessionStatus::NotStarted,
    }]));
    h.transport.signal(ServiceSignal::SubsessionsOpened {
        subsession_ids: vec!["s0".into()],
        options: SubsessionOptions::default(),
    });
    settle().await;
    h.client.join_subsession("s0").await.unwrap();
    h.capture.clear();
    h
}

fn responses(h: &Harness) -> Vec<(u32, HelpResponse)> {
    h.transport
        .requests()
        .into_iter()
        .filter_map(|r| match r {
            ServiceRequest::RespondToHelp { user_id, result } => Some((user_id, result)),
            _ => None,
        })
        .collect()
}

// ── Host side ───────────────────────────────────────────────────────

#[tokio::test]
async fn requests_queue_oldest_first() {
    let (h, rooms) = host_with_rooms().await;
    let newer = help_from(&attendee(2), &rooms[0], 5);
    let older = help_from(&attendee(3), &rooms[1], 30);
    h.transport.signal(ServiceSignal::HelpRequested(newer.clone()));
    h.transport.signal(ServiceSignal::HelpRequested(older.clone()));
    settle().await;

    assert_eq!(h.client.get_help_requests(), vec![older, newer.clone()]);
    assert_eq!(
        h.capture.named(EventName::SubsessionAskForHelp)[0],
        ConferEvent::SubsessionAskForHelp(newer)
    );
}

#[tokio::test]
async fn postpone_answer_depends_on_where_the_host_is() {
    let (h, rooms) = host_with_rooms().await;
    h.transport
        .signal(ServiceSignal::HelpRequested(help_from(&attendee(2), &rooms[0], 10)));
    h.transport
        .signal(ServiceSignal::HelpRequested(help_from(&attendee(3), &rooms[1], 5)));
    settle().await;

    // In the main session the host can only postpone.
    h.client.postpone_helping(2).await.unwrap();
    assert_eq!(responses(&h), vec![(2, HelpResponse::Postponed)]);
    assert!(h.client.get_help_requests().iter().all(|r| r.user_id != 2));

    // Inside another room the host is busy.
    h.client
        .join_subsession(&rooms[0].subsession_id)
        .await
        .unwrap();
    h.client.postpone_helping(3).await.unwrap();
    assert_eq!(responses(&h)[1], (3, HelpResponse::Busy));

    // Inside the requester's own room the host is already there.
    h.transport
        .signal(ServiceSignal::HelpRequested(help_from(&attendee(2), &rooms[0], 0)));
    settle().await;
    h.client.postpone_helping(2).await.unwrap();
    assert_eq!(responses(&h)[2], (2, HelpResponse::AlreadyInRoom));
    assert!(h.client.get_help_requests().is_empty());
}

#[tokio::test]
async fn ignore_dismisses_the_request() {
    let (h, rooms) = host_with_rooms().await;
    h.transport
        .signal(ServiceSignal::HelpRequested(help_from(&attendee(3), &rooms[1], 1)));
    settle().await;

    h.client.ignore_helping(3).await.unwrap();
    assert_eq!(responses(&h), vec![(3, HelpResponse::Ignore)]);
    assert!(h.client.get_help_requests().is_empty());

    let err = h.client.ignore_helping(3).await.unwrap_err();
    assert!(matches!(err, ConferError::SubsessionMismatchUser(_)));
}

#[tokio::test]
async fn entering_a_room_resolves_its_requests() {
    let (h, rooms) = host_with_rooms().await;
    h.transport
        .signal(ServiceSignal::HelpRequested(help_from(&attendee(2), &rooms[0], 3)));
    h.transport
        .signal(ServiceSignal::HelpRequested(help_from(&attendee(3), &rooms[1], 2)));
    settle().await;

    h.client
        .join_subsession(&rooms[0].subsession_id)
        .await
        .unwrap();

    let pending: Vec<u32> = h
        .client
        .get_help_requests()
        .iter()
        .map(|r| r.user_id)
        .collect();
    assert_eq!(pending, vec![3]);
    assert_eq!(responses(&h), vec![(2, HelpResponse::AlreadyInRoom)]);
}

#[tokio::test]
async fn departed_requesters_drop_out_of_the_queue() {
    let (h, rooms) = host_with_rooms().await;
    h.transport
        .signal(ServiceSignal::HelpRequested(help_from(&attendee(2), &rooms[0], 3)));
    h.transport.signal(ServiceSignal::UsersRemoved(vec![2]));
    settle().await;

    assert!(h.client.get_help_requests().is_empty());
}

#[tokio::test]
async fn answering_help_is_host_only() {
    let h = joined(attendee(2), vec![host()]).await;
    let err = h.client.postpone_helping(1).await.unwrap_err();
    assert_eq!(err, ConferError::HostPermissionRequired);
    let err = h.client.ignore_helping(1).await.unwrap_err();
    assert_eq!(err, ConferError::HostPermissionRequired);

    let (host_side, _) = host_with_rooms().await;
    let err = host_side.client.postpone_helping(3).await.unwrap_err();
    assert!(matches!(err, ConferError::SubsessionMismatchUser(_)));
}

// ── Participant side ────────────────────────────────────────────────

#[tokio::test]
async fn asking_for_help_waits_for_one_answer() {
    let h = attendee_in_room().await;

    h.client.ask_for_help().await.unwrap();
    assert!(h.transport.requests().contains(&ServiceRequest::AskForHelp {
        subsession_id: "s0".into()
    }));

    let err = h.client.ask_for_help().await.unwrap_err();
    assert!(matches!(err, ConferError::DuplicatedOperation(_)));

    h.transport.signal(ServiceSignal::HelpAnswered {
        result: HelpResponse::Busy,
    });
    settle().await;
    assert_eq!(
        h.capture.named(EventName::SubsessionAskForHelpResponse),
        vec![ConferEvent::SubsessionAskForHelpResponse {
            result: HelpResponse::Busy
        }]
    );

    h.client.ask_for_help().await.unwrap();
}

#[tokio::test]
async fn leaving_the_room_withdraws_a_pending_request() {
    let h = attendee_in_room().await;
    h.client.ask_for_help().await.unwrap();

    h.client.leave_subsession().await.unwrap();
    h.client.join_subsession("s0").await.unwrap();

    h.client.ask_for_help().await.unwrap();
    let asks = h
        .transport
        .requests()
        .into_iter()
        .filter(|r| matches!(r, ServiceRequest::AskForHelp { .. }))
        .count();
    assert_eq!(asks, 2);
}

#[tokio::test]
async fn being_moved_withdraws_a_pending_request() {
    let h = attendee_in_room().await;
    h.transport.signal(ServiceSignal::SubsessionsUpdated(vec![Subsession {
        subsession_id: "s1".into(),
        subsession_name: "Beta".into(),
        user_list: Vec::new(),
        status: SubsessionStatus::InProgress,
    }]));
    settle().await;
    h.client.ask_for_help().await.unwrap();

    h.transport.signal(ServiceSignal::UserMoved {
        user_guid: "guid-2".into(),
        subsession_id: "s1".into(),
    });
    settle().await;
    settle().await;
    assert_eq!(h.client.get_current_subsession().unwrap().subsession_id, "s1");

    h.client.ask_for_help().await.unwrap();
    assert!(h.transport.requests().contains(&ServiceRequest::AskForHelp {
        subsession_id: "s1".into()
    }));
}

#[tokio::test]
async fn asking_for_help_requires_being_in_a_room() {
    let h = joined(attendee(2), vec![host()]).await;
    let err = h.client.ask_for_help().await.unwrap_err();
    assert!(matches!(err, ConferError::SubsessionMismatchState(_)));

    let (host_side, rooms) = host_with_rooms().await;
    host_side
        .client
        .join_subsession(&rooms[0].subsession_id)
        .await
        .unwrap();
    let err = host_side.client.ask_for_help().await.unwrap_err();
    assert!(matches!(err, ConferError::InvalidOperation(_)));
}

#[tokio::test]
async fn participants_never_queue_help_requests() {
    let h = attendee_in_room().await;
    let room = h.client.get_current_subsession().unwrap();
    h.transport
        .signal(ServiceSignal::HelpRequested(help_from(&attendee(3), &room, 0)));
    settle().await;

    assert!(h.client.get_help_requests().is_empty());
    assert!(h.capture.events().is_empty());
}

// ── Broadcast ───────────────────────────────────────────────────────

#[tokio::test]
async fn host_broadcast_reaches_the_host_too() {
    let (h, _) = host_with_rooms().await;
    h.client.broadcast("Five minutes left").await.unwrap();

    assert!(h.transport.requests().contains(&ServiceRequest::Broadcast {
        content: "Five minutes left".into()
    }));
    assert_eq!(
        h.capture.named(EventName::SubsessionBroadcastMessage),
        vec![ConferEvent::SubsessionBroadcastMessage {
            message: "Five minutes left".into(),
            sender_name: "Hazel".into(),
        }]
    );
}

#[tokio::test]
async fn broadcast_validation() {
    let h = joined(host(), vec![attendee(2)]).await;
    let err = h.client.broadcast("hello").await.unwrap_err();
    assert!(matches!(err, ConferError::SubsessionMismatchState(_)));
    let err = h.client.broadcast("   ").await.unwrap_err();
    assert_eq!(err, ConferError::SubsessionBroadcastInvalidContent);
    assert_eq!(err.reason(), "SUBSESSION_BROADCAST_INVALID_CONTENT");

    let attendee_side = attendee_in_room().await;
    let err = attendee_side.client.broadcast("hello").await.unwrap_err();
    assert_eq!(err, ConferError::HostPermissionRequired);
}

#[tokio::test]
async fn participants_receive_broadcasts() {
    let h = attendee_in_room().await;
    h.transport.signal(ServiceSignal::BroadcastMessage {
        message: "Wrap up".into(),
        sender_name: "Hazel".into(),
    });
    settle().await;

    assert_eq!(
        h.capture.events(),
        vec![ConferEvent::SubsessionBroadcastMessage {
            message: "Wrap up".into(),
            sender_name: "Hazel".into(),
        }]
    );
}
