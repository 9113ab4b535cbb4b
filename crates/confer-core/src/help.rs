use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::events::{HelpRequest, HelpResponse, SubsessionId, UserId};

/// Pending help requests.
///
/// On the host side this is the queue of requests raised from
/// subsessions, ordered by request time. On a participant's side it only
/// remembers whether the local user is still waiting for an answer.
#[derive(Debug, Default)]
pub struct HelpDesk {
    /// (requested_at, user_id) -> request
    requests: BTreeMap<(DateTime<Utc>, UserId), HelpRequest>,
    awaiting_response: bool,
}

impl HelpDesk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request from a subsession. A user has at most one pending
    /// request; a repeat replaces the earlier one.
    pub fn record(&mut self, request: HelpRequest) {
        self.requests.retain(|_, r| r.user_id != request.user_id);
        self.requests
            .insert((request.requested_at, request.user_id), request);
    }

    pub fn find(&self, user_id: UserId) -> Option<&HelpRequest> {
        self.requests.values().find(|r| r.user_id == user_id)
    }

    pub fn take(&mut self, user_id: UserId) -> Option<HelpRequest> {
        let key = self
            .requests
            .iter()
            .find(|(_, r)| r.user_id == user_id)
            .map(|(k, _)| *k)?;
        self.requests.remove(&key)
    }

    /// Drop every request raised from a subsession the host just entered.
    pub fn resolve_subsession(&mut self, subsession_id: &str) -> Vec<HelpRequest> {
        let mut resolved = Vec::new();
        self.requests.retain(|_, r| {
            if r.subsession_id == subsession_id {
                resolved.push(r.clone());
                false
            } else {
                true
            }
        });
        resolved
    }

    pub fn drop_users(&mut self, user_ids: &[UserId]) {
        self.requests.retain(|_, r| !user_ids.contains(&r.user_id));
    }

    /// Pending requests, oldest first.
    pub fn pending(&self) -> Vec<HelpRequest> {
        self.requests.values().cloned().collect()
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    pub fn set_awaiting_response(&mut self, awaiting: bool) {
        self.awaiting_response = awaiting;
    }

    pub fn clear(&mut self) {
        self.requests.clear();
        self.awaiting_response = false;
    }
}

/// Answer the host gives when putting a request off, based on where the
/// host currently is.
pub fn postpone_response(
    host_subsession: Option<&SubsessionId>,
    request: &HelpRequest,
) -> HelpResponse {
    match host_subsession {
        Some(id) if *id == request.subsession_id => HelpResponse::AlreadyInRoom,
        Some(_) => HelpResponse::Busy,
        None => HelpResponse::Postponed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(user_id: UserId, subsession_id: &str, at: DateTime<Utc>) -> HelpRequest {
        HelpRequest {
            user_id,
            user_name: format!("User {user_id}"),
            subsession_id: subsession_id.to_string(),
            subsession_name: format!("Room {subsession_id}"),
            requested_at: at,
        }
    }

    #[test]
    fn pending_is_ordered_by_request_time() {
        let now = Utc::now();
        let mut desk = HelpDesk::new();
        desk.record(request(3, "a", now + Duration::seconds(2)));
        desk.record(request(2, "b", now));

        let order: Vec<UserId> = desk.pending().iter().map(|r| r.user_id).collect();
        assert_eq!(order, vec![2, 3]);
    }

    #[test]
    fn repeat_request_replaces_previous() {
        let now = Utc::now();
        let mut desk = HelpDesk::new();
        desk.record(request(2, "a", now));
        desk.record(request(2, "a", now + Duration::seconds(5)));
        assert_eq!(desk.pending().len(), 1);
    }

    #[test]
    fn take_removes_request() {
        let mut desk = HelpDesk::new();
        desk.record(request(2, "a", Utc::now()));
        assert!(desk.take(2).is_some());
        assert!(desk.take(2).is_none());
        assert!(desk.find(2).is_none());
    }

    #[test]
    fn host_joining_resolves_requests_of_that_subsession() {
        let now = Utc::now();
        let mut desk = HelpDesk::new();
        desk.record(request(2, "a", now));
        desk.record(request(3, "b", now));
        desk.record(request(4, "a", now));

        let resolved = desk.resolve_subsession("a");
        assert_eq!(resolved.len(), 2);
        assert_eq!(desk.pending()[0].user_id, 3);
    }

    #[test]
    fn postpone_response_depends_on_host_location() {
        let req = request(2, "a", Utc::now());
        assert_eq!(postpone_response(None, &req), HelpResponse::Postponed);
        assert_eq!(
            postpone_response(Some(&"a".to_string()), &req),
            HelpResponse::AlreadyInRoom
        );
        assert_eq!(
            postpone_response(Some(&"b".to_string()), &req),
            HelpResponse::Busy
        );
    }

    #[test]
    fn clear_resets_everything() {
        let mut desk = HelpDesk::new();
        desk.record(request(2, "a", Utc::now()));
        desk.set_awaiting_response(true);
        desk.clear();
        assert!(desk.pending().is_empty());
        assert!(!desk.is_awaiting_response());
    }
}
