use std::time::{Duration, Instant};

use fnv::FnvHashMap;

use frameoxide_types::target::{SessionId, TargetId};
use frameoxide_types::{CallId, MethodId};

use crate::handler::PendingRequest;

/// Represents a Session within the cdp.
#[derive(Debug)]
pub(crate) struct Session {
    /// Identifier for this session.
    id: SessionId,
    /// The type of the target this session is attached to.
    /// Used to determine whether this is a page or worker session.
    target_type: String,
    /// The identifier of the target this session is attached to.
    target_id: TargetId,
    /// The page target whose frame manager consumes this session's events
    owner: Option<TargetId>,
    /// Commands sent over this session that wait for their response
    pending_commands: FnvHashMap<CallId, (PendingRequest, MethodId, Instant)>,
}

impl Session {
    pub fn new(
        id: SessionId,
        target_type: String,
        target_id: TargetId,
    ) -> Self {
        Self {
            id,
            target_type,
            target_id,
            owner: None,
            pending_commands: Default::default(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn target_id(&self) -> &TargetId {
        &self.target_id
    }

    pub fn owner(&self) -> Option<&TargetId> {
        self.owner.as_ref()
    }

    pub fn set_owner(&mut self, owner: TargetId) {
        self.owner = Some(owner);
    }

    pub fn insert_pending(&mut self, id: CallId, req: PendingRequest, method: MethodId, now: Instant) {
        self.pending_commands.insert(id, (req, method, now));
    }

    pub fn remove_pending(&mut self, id: &CallId) -> Option<(PendingRequest, MethodId)> {
        self.pending_commands
            .remove(id)
            .map(|(req, method, _)| (req, method))
    }

    /// Empties the table, every entry still has to be rejected by the caller
    pub fn drain_pending(&mut self) -> Vec<(PendingRequest, MethodId)> {
        let mut pending: Vec<_> = self.pending_commands.drain().collect();
        pending.sort_by_key(|(id, _)| *id);
        pending
            .into_iter()
            .map(|(_, (req, method, _))| (req, method))
            .collect()
    }

    /// Removes all requests that were sent more than `timeout` ago
    pub fn evict_timed_out(&mut self, now: Instant, timeout: Duration) -> Vec<(PendingRequest, MethodId)> {
        let expired: Vec<CallId> = self
            .pending_commands
            .iter()
            .filter(|(_, (_, _, sent))| now.saturating_duration_since(*sent) > timeout)
            .map(|(id, _)| *id)
            .collect();
        expired
            .iter()
            .filter_map(|id| self.remove_pending(id))
            .collect()
    }
}
