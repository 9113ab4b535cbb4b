use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::ConferError;
use crate::events::{ConferEvent, Participant, SubsessionId, UserId};
use crate::roster::Roster;

/// Subsessions allowed per meeting without elevated capacity.
pub const DEFAULT_SUBSESSION_CAPACITY: usize = 50;
/// Subsessions allowed per meeting with elevated capacity.
pub const ELEVATED_SUBSESSION_CAPACITY: usize = 100;

pub fn subsession_capacity(elevated: bool) -> usize {
    if elevated {
        ELEVATED_SUBSESSION_CAPACITY
    } else {
        DEFAULT_SUBSESSION_CAPACITY
    }
}

/// Lifecycle of a subsession. One way; a closed subsession is never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsessionStatus {
    NotStarted,
    InProgress,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Initial,
    Invited,
    Joining,
    InSubsession,
    Leaving,
    MainSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPattern {
    Automatically,
    #[default]
    Manually,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsessionUser {
    pub user_guid: String,
    pub user_id: UserId,
    pub display_name: String,
}

impl From<&Participant> for SubsessionUser {
    fn from(p: &Participant) -> Self {
        Self {
            user_guid: p.user_guid.clone(),
            user_id: p.user_id,
            display_name: p.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsession {
    pub subsession_id: SubsessionId,
    pub subsession_name: String,
    pub user_list: Vec<SubsessionUser>,
    pub status: SubsessionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsessionOptions {
    pub is_auto_join_subsession: bool,
    pub is_back_to_main_session_enabled: bool,
    pub is_timer_enabled: bool,
    /// Seconds.
    pub timer_duration: u32,
    pub is_timer_auto_enabled: bool,
    /// Closing countdown length in seconds; zero closes immediately.
    pub wait_seconds: u32,
}

impl Default for SubsessionOptions {
    fn default() -> Self {
        Self {
            is_auto_join_subsession: false,
            is_back_to_main_session_enabled: true,
            is_timer_enabled: false,
            timer_duration: 1800,
            is_timer_auto_enabled: false,
            wait_seconds: 60,
        }
    }
}

/// What `createSubsessions` was asked to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateSubsessionsData {
    Count(u32),
    Names(Vec<String>),
}

impl From<u32> for CreateSubsessionsData {
    fn from(count: u32) -> Self {
        Self::Count(count)
    }
}

impl From<&str> for CreateSubsessionsData {
    fn from(name: &str) -> Self {
        Self::Names(vec![name.to_string()])
    }
}

impl From<Vec<String>> for CreateSubsessionsData {
    fn from(names: Vec<String>) -> Self {
        Self::Names(names)
    }
}

impl From<Vec<&str>> for CreateSubsessionsData {
    fn from(names: Vec<&str>) -> Self {
        Self::Names(names.into_iter().map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub status: UserStatus,
    /// Subsession the user is assigned to, kept after returning to the
    /// main session so the user can rejoin it.
    pub subsession_id: Option<SubsessionId>,
}

impl Default for Membership {
    fn default() -> Self {
        Self {
            status: UserStatus::Initial,
            subsession_id: None,
        }
    }
}

/// Result of opening subsessions, from the local user's point of view.
#[derive(Debug, Default)]
pub struct OpenOutcome {
    /// Subsessions that actually moved to `InProgress`.
    pub opened: usize,
    /// Set when the local user is assigned and must auto-join.
    pub auto_join: Option<SubsessionId>,
}

/// Subsession set plus one membership record per participant.
///
/// Memberships are keyed by user guid, which stays stable when a user's
/// numeric id changes between the main session and a subsession.
#[derive(Debug, Default)]
pub struct SubsessionBook {
    subsessions: Vec<Subsession>,
    memberships: HashMap<String, Membership>,
    options: SubsessionOptions,
    announced: Option<SubsessionStatus>,
}

impl SubsessionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> &[Subsession] {
        &self.subsessions
    }

    pub fn get(&self, subsession_id: &str) -> Option<&Subsession> {
        self.subsessions
            .iter()
            .find(|s| s.subsession_id == subsession_id)
    }

    pub fn options(&self) -> &SubsessionOptions {
        &self.options
    }

    pub fn membership(&self, user_guid: &str) -> Membership {
        self.memberships.get(user_guid).cloned().unwrap_or_default()
    }

    pub fn user_status(&self, user_guid: &str) -> UserStatus {
        self.membership(user_guid).status
    }

    /// Aggregate status of the current round of subsessions.
    pub fn status(&self) -> Option<SubsessionStatus> {
        let has = |status| self.subsessions.iter().any(|s| s.status == status);
        if self.subsessions.is_empty() {
            None
        } else if has(SubsessionStatus::InProgress) {
            Some(SubsessionStatus::InProgress)
        } else if has(SubsessionStatus::Closing) {
            Some(SubsessionStatus::Closing)
        } else if has(SubsessionStatus::NotStarted) {
            Some(SubsessionStatus::NotStarted)
        } else {
            Some(SubsessionStatus::Closed)
        }
    }

    /// True while a round is open or counting down to close.
    pub fn is_live(&self) -> bool {
        matches!(
            self.status(),
            Some(SubsessionStatus::InProgress | SubsessionStatus::Closing)
        )
    }

    /// Keep exactly one membership per roster participant.
    pub fn sync_roster(&mut self, roster: &Roster) {
        for p in roster.all() {
            self.memberships.entry(p.user_guid.clone()).or_default();
        }
        self.memberships
            .retain(|guid, _| roster.get_by_guid(guid).is_some());
        for subsession in &mut self.subsessions {
            subsession
                .user_list
                .retain(|u| roster.get_by_guid(&u.user_guid).is_some());
        }
    }

    pub fn unassigned<'a>(&self, roster: &'a Roster) -> Vec<&'a Participant> {
        roster
            .all()
            .iter()
            .filter(|p| self.membership(&p.user_guid).subsession_id.is_none())
            .collect()
    }

    /// Subsession the user is inside, if `InSubsession`.
    ///
    /// A `Closing` subsession is still live: users stay in it until the
    /// closing countdown ends, so it counts as their current subsession.
    pub fn current_subsession(&self, user_guid: &str) -> Option<&Subsession> {
        let membership = self.memberships.get(user_guid)?;
        if membership.status != UserStatus::InSubsession {
            return None;
        }
        self.get(membership.subsession_id.as_deref()?)
    }

    /// Check a create request and return the names to create.
    pub fn plan_create(
        &self,
        data: &CreateSubsessionsData,
        capacity: usize,
    ) -> Result<Vec<String>, ConferError> {
        if self.is_live() {
            return Err(ConferError::InvalidOperation(
                "subsessions are already in progress".into(),
            ));
        }

        let pending = self
            .subsessions
            .iter()
            .filter(|s| s.status == SubsessionStatus::NotStarted)
            .count();

        let requested = match data {
            CreateSubsessionsData::Count(0) => {
                return Err(ConferError::InvalidParameters(
                    "subsession count must be positive".into(),
                ));
            }
            CreateSubsessionsData::Count(count) => *count as usize,
            CreateSubsessionsData::Names(names) => {
                if names.is_empty() || names.iter().any(|n| n.trim().is_empty()) {
                    return Err(ConferError::InvalidParameters(
                        "subsession names must not be empty".into(),
                    ));
                }
                names.len()
            }
        };

        // Checked before any name is built.
        let total = pending.saturating_add(requested);
        if total > capacity {
            return Err(ConferError::InvalidParameters(format!(
                "{total} subsessions exceed the capacity of {capacity}"
            )));
        }

        Ok(match data {
            CreateSubsessionsData::Count(_) => (1..=requested)
                .map(|i| format!("Subsession {}", pending + i))
                .collect(),
            CreateSubsessionsData::Names(names) => {
                names.iter().map(|n| n.trim().to_string()).collect()
            }
        })
    }

    /// Record subsessions acknowledged by the service.
    ///
    /// Subsessions of a finished round are dropped first. With
    /// `Automatically`, every unassigned participant except the host is
    /// dealt round-robin, so the first subsessions take the remainder.
    pub fn insert_created(
        &mut self,
        created: Vec<(SubsessionId, String)>,
        pattern: AllocationPattern,
        roster: &Roster,
        events: &mut Vec<ConferEvent>,
    ) -> Vec<Subsession> {
        self.prune_closed();

        let first_new = self.subsessions.len();
        self.subsessions
            .extend(created.into_iter().map(|(subsession_id, subsession_name)| Subsession {
                subsession_id,
                subsession_name,
                user_list: Vec::new(),
                status: SubsessionStatus::NotStarted,
            }));

        let slots = self.subsessions.len() - first_new;
        if pattern == AllocationPattern::Automatically && slots > 0 {
            let candidates: Vec<&Participant> = self
                .unassigned(roster)
                .into_iter()
                .filter(|p| !p.is_host)
                .collect();
            for (i, participant) in candidates.into_iter().enumerate() {
                let target = &mut self.subsessions[first_new + i % slots];
                target.user_list.push(participant.into());
                self.memberships.insert(
                    participant.user_guid.clone(),
                    Membership {
                        status: UserStatus::Initial,
                        subsession_id: Some(target.subsession_id.clone()),
                    },
                );
            }
        }

        self.announce(events);
        self.subsessions[first_new..].to_vec()
    }

    /// Merge a subsession list pushed by the service.
    pub fn merge_remote(&mut self, incoming: Vec<Subsession>, events: &mut Vec<ConferEvent>) {
        if incoming
            .iter()
            .any(|s| s.status == SubsessionStatus::NotStarted)
        {
            self.prune_closed();
        }
        for subsession in incoming {
            for user in &subsession.user_list {
                let membership = self.memberships.entry(user.user_guid.clone()).or_default();
                if membership.subsession_id.is_none() {
                    membership.subsession_id = Some(subsession.subsession_id.clone());
                }
            }
            match self
                .subsessions
                .iter_mut()
                .find(|s| s.subsession_id == subsession.subsession_id)
            {
                Some(existing) => *existing = subsession,
                None => self.subsessions.push(subsession),
            }
        }
        self.announce(events);
    }

    pub fn validate_open(&self, subsession_ids: &[SubsessionId]) -> Result<(), ConferError> {
        if subsession_ids.is_empty() {
            return Err(ConferError::InvalidParameters(
                "no subsession to open".into(),
            ));
        }
        for id in subsession_ids {
            let subsession = self
                .get(id)
                .ok_or_else(|| ConferError::SubsessionMismatchId(id.clone()))?;
            if subsession.status != SubsessionStatus::NotStarted {
                return Err(ConferError::SubsessionMismatchState(format!(
                    "subsession {id} is {:?}",
                    subsession.status
                )));
            }
        }
        Ok(())
    }

    /// Move the listed subsessions to `InProgress` and invite their users.
    pub fn open(
        &mut self,
        subsession_ids: &[SubsessionId],
        options: SubsessionOptions,
        local_guid: Option<&str>,
        events: &mut Vec<ConferEvent>,
    ) -> OpenOutcome {
        let mut outcome = OpenOutcome::default();
        let auto_join = options.is_auto_join_subsession;
        self.options = options;

        for subsession in self
            .subsessions
            .iter_mut()
            .filter(|s| subsession_ids.contains(&s.subsession_id))
            .filter(|s| s.status == SubsessionStatus::NotStarted)
        {
            subsession.status = SubsessionStatus::InProgress;
            outcome.opened += 1;

            for user in &subsession.user_list {
                let membership = self.memberships.entry(user.user_guid.clone()).or_default();
                if !matches!(membership.status, UserStatus::Initial | UserStatus::MainSession) {
                    continue;
                }
                membership.status = UserStatus::Invited;
                membership.subsession_id = Some(subsession.subsession_id.clone());

                if local_guid == Some(user.user_guid.as_str()) {
                    if auto_join {
                        outcome.auto_join = Some(subsession.subsession_id.clone());
                    } else {
                        events.push(ConferEvent::SubsessionInviteToJoin {
                            subsession_id: subsession.subsession_id.clone(),
                            subsession_name: subsession.subsession_name.clone(),
                        });
                    }
                }
            }
        }

        self.announce(events);
        outcome
    }

    /// Check that a user may join `subsession_id`.
    ///
    /// Elevated users (host, manager) may enter any open subsession;
    /// everyone else only the one they were invited to.
    pub fn validate_join(
        &self,
        user_guid: &str,
        elevated: bool,
        subsession_id: &str,
    ) -> Result<(), ConferError> {
        let subsession = self
            .get(subsession_id)
            .ok_or_else(|| ConferError::SubsessionMismatchId(subsession_id.to_string()))?;
        let membership = self.membership(user_guid);

        let status_ok = match membership.status {
            UserStatus::Invited | UserStatus::MainSession => true,
            UserStatus::Initial => elevated,
            UserStatus::Joining | UserStatus::InSubsession | UserStatus::Leaving => false,
        };
        if !status_ok {
            return Err(ConferError::SubsessionMismatchState(format!(
                "user is {:?}",
                membership.status
            )));
        }
        if subsession.status != SubsessionStatus::InProgress {
            return Err(ConferError::SubsessionMismatchState(format!(
                "subsession {subsession_id} is {:?}",
                subsession.status
            )));
        }
        if !elevated && membership.subsession_id.as_deref() != Some(subsession_id) {
            return Err(ConferError::SubsessionMismatchId(format!(
                "user is not assigned to {subsession_id}"
            )));
        }
        Ok(())
    }

    pub fn set_status(
        &mut self,
        user_guid: &str,
        status: UserStatus,
        subsession_id: Option<SubsessionId>,
    ) {
        let membership = self.memberships.entry(user_guid.to_string()).or_default();
        membership.status = status;
        if subsession_id.is_some() {
            membership.subsession_id = subsession_id;
        }
    }

    pub fn validate_assign(&self, user_guid: &str, subsession_id: &str) -> Result<(), ConferError> {
        let subsession = self
            .get(subsession_id)
            .ok_or_else(|| ConferError::SubsessionMismatchId(subsession_id.to_string()))?;
        if matches!(
            subsession.status,
            SubsessionStatus::Closing | SubsessionStatus::Closed
        ) {
            return Err(ConferError::SubsessionMismatchState(format!(
                "subsession {subsession_id} is {:?}",
                subsession.status
            )));
        }
        let membership = self.membership(user_guid);
        if membership.status != UserStatus::Initial || membership.subsession_id.is_some() {
            return Err(ConferError::SubsessionMismatchState(
                "user is already assigned".into(),
            ));
        }
        Ok(())
    }

    /// Place an unassigned user in a subsession.
    pub fn assign(
        &mut self,
        user: &Participant,
        subsession_id: &str,
        local_guid: Option<&str>,
        events: &mut Vec<ConferEvent>,
    ) {
        let Some(subsession) = self
            .subsessions
            .iter_mut()
            .find(|s| s.subsession_id == subsession_id)
        else {
            return;
        };
        if !subsession.user_list.iter().any(|u| u.user_guid == user.user_guid) {
            subsession.user_list.push(user.into());
        }

        let membership = self.memberships.entry(user.user_guid.clone()).or_default();
        membership.subsession_id = Some(subsession_id.to_string());
        if subsession.status == SubsessionStatus::InProgress
            && matches!(membership.status, UserStatus::Initial | UserStatus::MainSession)
        {
            membership.status = UserStatus::Invited;
            if local_guid == Some(user.user_guid.as_str()) {
                events.push(ConferEvent::SubsessionInviteToJoin {
                    subsession_id: subsession.subsession_id.clone(),
                    subsession_name: subsession.subsession_name.clone(),
                });
            }
        }
    }

    pub fn validate_move(&self, user_guid: &str, subsession_id: &str) -> Result<(), ConferError> {
        let membership = self.membership(user_guid);
        let Some(current) = membership.subsession_id else {
            return Err(ConferError::SubsessionMismatchUser(
                "user is not in any subsession".into(),
            ));
        };
        let target = self
            .get(subsession_id)
            .ok_or_else(|| ConferError::SubsessionMismatchId(subsession_id.to_string()))?;
        if current == subsession_id {
            return Err(ConferError::SubsessionMismatchId(format!(
                "user is already in {subsession_id}"
            )));
        }
        if target.status != SubsessionStatus::InProgress {
            return Err(ConferError::SubsessionMismatchState(format!(
                "subsession {subsession_id} is {:?}",
                target.status
            )));
        }
        Ok(())
    }

    /// Re-home a user's assignment to another subsession.
    ///
    /// Users not currently inside a subsession are re-invited; users inside
    /// keep their status and follow the move through their own reconnects.
    pub fn relocate(
        &mut self,
        user: &Participant,
        subsession_id: &str,
        local_guid: Option<&str>,
        events: &mut Vec<ConferEvent>,
    ) {
        for subsession in &mut self.subsessions {
            subsession.user_list.retain(|u| u.user_guid != user.user_guid);
        }
        let Some(target) = self
            .subsessions
            .iter_mut()
            .find(|s| s.subsession_id == subsession_id)
        else {
            return;
        };
        target.user_list.push(user.into());

        let membership = self.memberships.entry(user.user_guid.clone()).or_default();
        membership.subsession_id = Some(subsession_id.to_string());
        if !matches!(
            membership.status,
            UserStatus::Joining | UserStatus::InSubsession | UserStatus::Leaving
        ) {
            membership.status = UserStatus::Invited;
            if local_guid == Some(user.user_guid.as_str()) {
                events.push(ConferEvent::SubsessionInviteToJoin {
                    subsession_id: target.subsession_id.clone(),
                    subsession_name: target.subsession_name.clone(),
                });
            }
        }
    }

    /// Start closing every open subsession. Returns false when nothing was open.
    pub fn begin_close(&mut self, events: &mut Vec<ConferEvent>) -> bool {
        let mut changed = false;
        for subsession in self
            .subsessions
            .iter_mut()
            .filter(|s| s.status == SubsessionStatus::InProgress)
        {
            subsession.status = SubsessionStatus::Closing;
            changed = true;
        }
        self.announce(events);
        changed
    }

    /// Force every participant back to the main session and close the round.
    ///
    /// Returns the guids of users whose media was inside a subsession.
    pub fn finish_close(&mut self, events: &mut Vec<ConferEvent>) -> Vec<String> {
        let mut rehomed = Vec::new();
        for (guid, membership) in &mut self.memberships {
            match membership.status {
                UserStatus::Joining | UserStatus::InSubsession | UserStatus::Leaving => {
                    rehomed.push(guid.clone());
                    membership.status = UserStatus::MainSession;
                }
                UserStatus::Invited => membership.status = UserStatus::MainSession,
                UserStatus::Initial | UserStatus::MainSession => {}
            }
        }
        for subsession in self.subsessions.iter_mut().filter(|s| {
            matches!(
                s.status,
                SubsessionStatus::InProgress | SubsessionStatus::Closing
            )
        }) {
            subsession.status = SubsessionStatus::Closed;
        }
        self.announce(events);
        rehomed
    }

    pub fn clear(&mut self) {
        self.subsessions.clear();
        self.memberships.clear();
        self.options = SubsessionOptions::default();
        self.announced = None;
    }

    fn prune_closed(&mut self) {
        let closed: Vec<SubsessionId> = self
            .subsessions
            .iter()
            .filter(|s| s.status == SubsessionStatus::Closed)
            .map(|s| s.subsession_id.clone())
            .collect();
        if closed.is_empty() {
            return;
        }
        self.subsessions
            .retain(|s| s.status != SubsessionStatus::Closed);
        for membership in self.memberships.values_mut() {
            if membership
                .subsession_id
                .as_ref()
                .is_some_and(|id| closed.contains(id))
            {
                *membership = Membership::default();
            }
        }
    }

    fn announce(&mut self, events: &mut Vec<ConferEvent>) {
        let status = self.status();
        if status != self.announced {
            self.announced = status;
            if let Some(status) = status {
                events.push(ConferEvent::SubsessionStateChange { status });
            }
        }
    }
}
