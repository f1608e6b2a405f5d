use frameoxide_types::runtime::{ExecutionContextId, RemoteObjectId};
use frameoxide_types::SessionId;

use crate::handler::domworld::DOMWorldKind;
use crate::handler::frame::FrameKey;

/// What the frame manager remembers about a remote execution context.
///
/// Indexed by `(session, context id)` since context ids are only unique
/// within their session.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ContextEntry {
    /// The name the context was created with, empty for default contexts
    pub name: String,
    /// The world this context is the current context of, `None` for
    /// contexts that belong to no frame or lost the race for a world
    pub world: Option<(FrameKey, DOMWorldKind)>,
}

/// A live execution context of a frame's world.
///
/// This is what clients receive when they ask a world for its context and
/// what wait tasks are rerun against.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextInfo {
    pub(crate) session_id: SessionId,
    pub(crate) context_id: ExecutionContextId,
    pub(crate) frame: FrameKey,
    pub(crate) world: DOMWorldKind,
    /// The object returned by the utility script, set once injected
    pub(crate) utility: Option<RemoteObjectId>,
}

impl ContextInfo {
    pub(crate) fn new(
        session_id: SessionId,
        context_id: ExecutionContextId,
        frame: FrameKey,
        world: DOMWorldKind,
    ) -> Self {
        Self {
            session_id,
            context_id,
            frame,
            world,
            utility: None,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn context_id(&self) -> ExecutionContextId {
        self.context_id
    }

    pub fn world(&self) -> DOMWorldKind {
        self.world
    }
}
