use crate::events::{ConferEvent, Participant, UserId};

/// Authoritative list of participants in the meeting.
///
/// Mutations return the events they imply, carrying only the affected
/// participants. The owner publishes them once its lock is released.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update participants.
    ///
    /// A participant arriving with `is_host` demotes every other host in
    /// the same pass, so no two hosts are ever observable. When a batch
    /// names several hosts the last one wins.
    pub fn upsert(&mut self, incoming: Vec<Participant>) -> Vec<ConferEvent> {
        let mut added: Vec<UserId> = Vec::new();
        let mut updated: Vec<UserId> = Vec::new();

        for info in incoming {
            let user_id = info.user_id;
            let becomes_host = info.is_host;

            match self.participants.iter_mut().find(|p| p.user_id == user_id) {
                Some(existing) if *existing == info => {}
                Some(existing) => {
                    *existing = info;
                    if !added.contains(&user_id) && !updated.contains(&user_id) {
                        updated.push(user_id);
                    }
                }
                None => {
                    self.participants.push(info);
                    added.push(user_id);
                }
            }

            if becomes_host {
                for other in self
                    .participants
                    .iter_mut()
                    .filter(|p| p.is_host && p.user_id != user_id)
                {
                    other.is_host = false;
                    if !added.contains(&other.user_id) && !updated.contains(&other.user_id) {
                        updated.push(other.user_id);
                    }
                }
            }
        }

        let mut events = Vec::new();
        if !added.is_empty() {
            events.push(ConferEvent::UserAdded(self.collect(&added)));
        }
        if !updated.is_empty() {
            events.push(ConferEvent::UserUpdated(self.collect(&updated)));
        }
        events
    }

    pub fn remove(&mut self, user_ids: &[UserId]) -> Vec<ConferEvent> {
        let mut removed = Vec::new();
        self.participants.retain(|p| {
            if user_ids.contains(&p.user_id) {
                removed.push(p.clone());
                false
            } else {
                true
            }
        });

        if removed.is_empty() {
            Vec::new()
        } else {
            vec![ConferEvent::UserRemoved(removed)]
        }
    }

    pub fn get(&self, user_id: UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn get_by_guid(&self, user_guid: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_guid == user_guid)
    }

    pub fn all(&self) -> &[Participant] {
        &self.participants
    }

    pub fn host(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.is_host)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Drop everyone without emitting events (session end).
    pub fn clear(&mut self) {
        self.participants.clear();
    }

    fn collect(&self, ids: &[UserId]) -> Vec<Participant> {
        ids.iter().filter_map(|id| self.get(*id).cloned()).collect()
    }
}
