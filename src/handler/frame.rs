use std::collections::{HashMap, HashSet, VecDeque};
use std::task::Poll;

use futures::channel::mpsc::UnboundedSender;
use futures::channel::oneshot::Sender as OneshotSender;
use serde::Deserialize;

use frameoxide_types::page::{
    self, AddScriptToEvaluateOnNewDocumentParams, CreateIsolatedWorldParams, FrameDetachedReason,
    FrameId, FrameTree, GetFrameTreeParams, GetFrameTreeReturns, LoaderId,
    SetLifecycleEventsEnabledParams,
};
use frameoxide_types::runtime::{
    self, AddBindingParams, EvaluateParams, EvaluateReturns, ExecutionContextDescription,
    ExecutionContextId, RunIfWaitingForDebuggerParams,
};
use frameoxide_types::target::{SetAutoAttachParams, TargetId};
use frameoxide_types::{Command, MethodId, Request, SessionId};

use crate::cdp::CdpEvent;
use crate::cmd::CommandChain;
use crate::error::{CdpError, Result};
use crate::handler::domworld::{DOMWorld, DOMWorldKind, WaitTaskId, WaitTaskSignal};
use crate::handler::execution::{ContextEntry, ContextInfo};
use crate::js::{BINDING_INIT, DELIVER_ERROR, DELIVER_RESULT, UTILITY_SCRIPT};
use crate::utils::{evaluation_string, exception_message, with_source_url, EVALUATION_SCRIPT_URL};
use crate::world::Binding;

/// Stable handle of a frame inside its [`FrameManager`].
///
/// Unlike the remote `FrameId`, which the main frame may change on cross
/// process navigations, a key never changes and is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameKey(usize);

impl FrameKey {
    pub(crate) const fn new(key: usize) -> Self {
        Self(key)
    }
}

#[derive(Debug)]
pub(crate) struct Frame {
    key: FrameKey,
    id: FrameId,
    parent: Option<FrameKey>,
    children: Vec<FrameKey>,
    /// The session that currently controls this frame
    session: SessionId,
    loader_id: Option<LoaderId>,
    url: String,
    name: Option<String>,
    lifecycle_events: HashSet<String>,
    is_loading: bool,
    main_world: DOMWorld,
    secondary_world: DOMWorld,
}

impl Frame {
    fn new(key: FrameKey, id: FrameId, parent: Option<FrameKey>, session: SessionId) -> Self {
        Self {
            key,
            id,
            parent,
            children: Vec::new(),
            session,
            loader_id: None,
            url: String::new(),
            name: None,
            lifecycle_events: Default::default(),
            is_loading: false,
            main_world: DOMWorld::main_world(),
            secondary_world: DOMWorld::secondary_world(),
        }
    }

    #[cfg(test)]
    pub fn id(&self) -> &FrameId {
        &self.id
    }

    pub fn world(&self, kind: DOMWorldKind) -> &DOMWorld {
        match kind {
            DOMWorldKind::Main => &self.main_world,
            DOMWorldKind::Secondary => &self.secondary_world,
        }
    }

    pub fn world_mut(&mut self, kind: DOMWorldKind) -> &mut DOMWorld {
        match kind {
            DOMWorldKind::Main => &mut self.main_world,
            DOMWorldKind::Secondary => &mut self.secondary_world,
        }
    }

    fn navigated(&mut self, frame: &page::Frame) {
        self.name = frame.name.clone();
        self.url = match frame.url_fragment {
            Some(ref fragment) => format!("{}{}", frame.url, fragment),
            None => frame.url.clone(),
        };
    }

    fn navigated_within_document(&mut self, url: String) {
        self.url = url;
    }

    fn on_lifecycle_event(&mut self, loader_id: &LoaderId, name: &str) {
        if name == "init" {
            self.loader_id = Some(loader_id.clone());
            self.lifecycle_events.clear();
        }
        self.lifecycle_events.insert(name.to_string());
    }

    fn on_loading_started(&mut self) {
        self.is_loading = true;
    }

    fn on_loading_stopped(&mut self) {
        self.is_loading = false;
        self.lifecycle_events.insert("DOMContentLoaded".to_string());
        self.lifecycle_events.insert("load".to_string());
    }

    fn detach_worlds(&mut self) {
        self.main_world.detach();
        self.secondary_world.detach();
    }
}

/// A snapshot of a frame's state
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    pub id: FrameId,
    pub parent_id: Option<FrameId>,
    pub url: String,
    pub name: Option<String>,
    pub loader_id: Option<LoaderId>,
    /// All lifecycle events observed for the current document, sorted
    pub lifecycle_events: Vec<String>,
    pub session_id: SessionId,
    /// Whether the frame is controlled by a session other than the page's
    pub is_oop: bool,
    pub is_loading: bool,
}

/// Changes to the frame tree and its contexts
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FrameEvent {
    Attached(FrameKey),
    Navigated(FrameKey),
    NavigatedWithinDocument(FrameKey),
    Detached(FrameKey),
    Swapped(FrameKey),
    Lifecycle(FrameKey, String),
    ContextCreated {
        session_id: SessionId,
        context_id: ExecutionContextId,
        name: String,
        world: Option<(FrameKey, DOMWorldKind)>,
    },
    ContextDestroyed {
        session_id: SessionId,
        context_id: ExecutionContextId,
        world: Option<(FrameKey, DOMWorldKind)>,
    },
}

/// Requests the frame manager issues on its own behalf, the response is fed
/// back via [`FrameManager::on_response`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InternalRequest {
    /// A step of the initialization of a session
    Init(SessionId),
    CreateIsolatedWorld(FrameId),
    InjectUtility {
        frame: FrameKey,
        world: DOMWorldKind,
        generation: u64,
    },
    AddBinding {
        frame: FrameKey,
        world: DOMWorldKind,
        name: String,
        context_id: ExecutionContextId,
    },
    InitBinding {
        frame: FrameKey,
        world: DOMWorldKind,
        name: String,
        context_id: ExecutionContextId,
    },
    DeliverBindingResult,
}

#[derive(Debug)]
pub(crate) enum FrameManagerEvent {
    Request(Request, InternalRequest),
    Notify(FrameEvent),
    /// The handshake of this session completed
    Initialized(SessionId),
    /// The handshake of this session was cut short
    Aborted(SessionId, CdpError),
    /// The frame tree is inconsistent
    Fatal(CdpError),
}

/// Resolves once a frame and all its descendants observed every event
#[derive(Debug)]
struct LifecycleWatcher {
    frame: FrameKey,
    events: Vec<String>,
    tx: OneshotSender<Result<()>>,
}

/// The handshake of a session in progress
#[derive(Debug)]
struct SessionInit {
    /// The frame id of the target the session is attached to
    target_frame: FrameId,
    chain: CommandChain,
    tree_applied: bool,
    /// Frames that navigated before the frame tree arrived
    live_navigated: HashSet<FrameId>,
}

/// An attachment whose parent is still initializing
#[derive(Debug)]
struct DeferredAttach {
    session: SessionId,
    frame_id: FrameId,
    parent_id: FrameId,
}

#[derive(Deserialize)]
struct BindingPayload {
    r#type: String,
    name: String,
    seq: u64,
    args: Vec<serde_json::Value>,
}

/// Maintains the frame tree of a page and the execution contexts of every
/// frame's worlds.
///
/// This is a pure state machine: it consumes events and responses and
/// produces requests and notifications, which are drained with
/// [`FrameManager::poll`].
#[derive(Debug)]
pub(crate) struct FrameManager {
    /// The session of the page this manager belongs to
    main_session: SessionId,
    utility_world_name: String,
    main_frame: Option<FrameKey>,
    frames: HashMap<FrameKey, Frame>,
    frame_ids: HashMap<FrameId, FrameKey>,
    next_key: usize,
    /// All known contexts by `(session, context id)`
    contexts: HashMap<(SessionId, ExecutionContextId), ContextEntry>,
    /// Sessions where the utility world was already declared
    isolated_worlds: HashSet<(SessionId, String)>,
    /// Targets whose initialization has not settled yet, with the attachments
    /// that wait for it
    pending_target_init: HashMap<FrameId, Vec<DeferredAttach>>,
    /// Navigations of frames whose attachment was deferred
    pending_attachment: HashMap<FrameId, Vec<page::Frame>>,
    inits: HashMap<SessionId, SessionInit>,
    watchers: Vec<LifecycleWatcher>,
    events: VecDeque<FrameManagerEvent>,
}

impl FrameManager {
    pub fn new(main_session: SessionId, utility_world_name: impl Into<String>) -> Self {
        Self {
            main_session,
            utility_world_name: utility_world_name.into(),
            main_frame: None,
            frames: Default::default(),
            frame_ids: Default::default(),
            next_key: 0,
            contexts: Default::default(),
            isolated_worlds: Default::default(),
            pending_target_init: Default::default(),
            pending_attachment: Default::default(),
            inits: Default::default(),
            watchers: Vec::new(),
            events: Default::default(),
        }
    }

    /// The commands every session starts with
    fn init_commands(session: &SessionId) -> serde_json::Result<Vec<Request>> {
        let session = Some(session.clone());
        Ok(vec![
            Request::from_command(&page::EnableParams::default(), session.clone())?,
            Request::from_command(&GetFrameTreeParams::default(), session.clone())?,
            Request::from_command(&SetLifecycleEventsEnabledParams::new(true), session.clone())?,
            Request::from_command(&runtime::EnableParams::default(), session)?,
        ])
    }

    pub fn main_frame(&self) -> Option<FrameKey> {
        self.main_frame
    }

    pub fn frames(&self) -> Vec<FrameKey> {
        let mut keys: Vec<_> = self.frames.keys().copied().collect();
        keys.sort();
        keys
    }

    #[cfg(test)]
    pub fn frame(&self, key: FrameKey) -> Option<&Frame> {
        self.frames.get(&key)
    }

    pub fn frame_by_id(&self, id: &FrameId) -> Option<FrameKey> {
        self.frame_ids.get(id).copied()
    }

    pub fn child_frames(&self, key: FrameKey) -> Vec<FrameKey> {
        self.frames
            .get(&key)
            .map(|f| f.children.clone())
            .unwrap_or_default()
    }

    pub fn parent_frame(&self, key: FrameKey) -> Option<FrameKey> {
        self.frames.get(&key).and_then(|f| f.parent)
    }

    pub fn info(&self, key: FrameKey) -> Option<FrameInfo> {
        let frame = self.frames.get(&key)?;
        let mut lifecycle_events: Vec<_> = frame.lifecycle_events.iter().cloned().collect();
        lifecycle_events.sort();
        Some(FrameInfo {
            id: frame.id.clone(),
            parent_id: frame
                .parent
                .and_then(|p| self.frames.get(&p))
                .map(|p| p.id.clone()),
            url: frame.url.clone(),
            name: frame.name.clone(),
            loader_id: frame.loader_id.clone(),
            lifecycle_events,
            session_id: frame.session.clone(),
            is_oop: self.is_oop(frame),
            is_loading: frame.is_loading,
        })
    }

    fn is_oop(&self, frame: &Frame) -> bool {
        frame.session != self.main_session
    }

    fn world_mut(&mut self, key: FrameKey, kind: DOMWorldKind) -> Option<&mut DOMWorld> {
        self.frames.get_mut(&key).map(|f| f.world_mut(kind))
    }

    /// Returns the next request or notification
    pub fn poll(&mut self) -> Option<FrameManagerEvent> {
        let mut finished = Vec::new();
        for (session, init) in self.inits.iter_mut() {
            match init.chain.poll() {
                Poll::Ready(Some(req)) => self
                    .events
                    .push_back(FrameManagerEvent::Request(req, InternalRequest::Init(session.clone()))),
                Poll::Ready(None) => finished.push(session.clone()),
                Poll::Pending => {}
            }
        }
        for session in finished {
            self.settle(&session, Ok(()));
        }
        self.events.pop_front()
    }

    fn submit<C: Command>(&mut self, cmd: &C, session: &SessionId, req: InternalRequest) {
        match Request::from_command(cmd, Some(session.clone())) {
            Ok(request) => self
                .events
                .push_back(FrameManagerEvent::Request(request, req)),
            Err(err) => tracing::error!("Failed to serialize {}: {}", cmd.identifier(), err),
        }
    }

    fn push_init<C: Command>(&mut self, session: &SessionId, cmd: &C) {
        match Request::from_command(cmd, Some(session.clone())) {
            Ok(request) => {
                if let Some(init) = self.inits.get_mut(session) {
                    init.chain.push_back(request);
                }
            }
            Err(err) => tracing::error!("Failed to serialize {}: {}", cmd.identifier(), err),
        }
    }

    /// Starts the handshake for a session attached to `target_id`.
    ///
    /// Attachments of frames below that target are deferred until it settled.
    pub fn start_init(&mut self, session: SessionId, target_id: &TargetId) {
        let target_frame = FrameId::new(target_id.as_ref());
        self.pending_target_init
            .entry(target_frame.clone())
            .or_default();
        match Self::init_commands(&session) {
            Ok(cmds) => {
                self.inits.insert(
                    session,
                    SessionInit {
                        target_frame,
                        chain: CommandChain::new(cmds),
                        tree_applied: false,
                        live_navigated: Default::default(),
                    },
                );
            }
            Err(err) => {
                tracing::error!("Failed to initialize session {}: {}", session, err);
                self.complete_deferred(&target_frame, true);
                self.events
                    .push_back(FrameManagerEvent::Aborted(session, err.into()));
            }
        }
    }

    #[cfg(test)]
    pub fn is_initializing(&self, session: &SessionId) -> bool {
        self.inits.contains_key(session)
    }

    /// Processes the response to a request this manager issued
    pub fn on_response(&mut self, req: InternalRequest, method: &MethodId, result: Result<serde_json::Value>) {
        match req {
            InternalRequest::Init(session) => self.on_init_response(&session, method, result),
            InternalRequest::CreateIsolatedWorld(frame_id) => {
                if let Err(err) = result {
                    tracing::debug!("Failed to create isolated world for {}: {}", frame_id, err);
                }
            }
            InternalRequest::InjectUtility {
                frame,
                world,
                generation,
            } => match evaluate_result(result).and_then(|res| {
                res.result
                    .object_id
                    .ok_or_else(|| CdpError::msg("Utility script returned no object"))
            }) {
                Ok(utility) => {
                    if let Some(world) = self.world_mut(frame, world) {
                        world.set_utility(generation, utility);
                    }
                }
                Err(err) => tracing::debug!("Failed to inject utility script: {}", err),
            },
            InternalRequest::AddBinding {
                frame,
                world,
                name,
                context_id,
            } => match result {
                Ok(_) => self.init_binding(frame, world, name, context_id),
                Err(err) => {
                    tracing::debug!("Failed to add binding {}: {}", name, err);
                    self.finish_binding(frame, world);
                }
            },
            InternalRequest::InitBinding {
                frame,
                world,
                name,
                context_id,
            } => {
                match evaluate_result(result) {
                    Ok(_) => {
                        if let Some(w) = self.world_mut(frame, world) {
                            w.binding_ready(&name, context_id);
                        }
                    }
                    Err(err) => tracing::debug!("Failed to install binding {}: {}", name, err),
                }
                self.finish_binding(frame, world);
            }
            InternalRequest::DeliverBindingResult => {
                if let Err(err) = evaluate_result(result) {
                    tracing::debug!("Failed to deliver binding result: {}", err);
                }
            }
        }
    }

    fn on_init_response(&mut self, session: &SessionId, method: &MethodId, result: Result<serde_json::Value>) {
        match self.inits.get_mut(session) {
            Some(init) => {
                if !init.chain.received_response(method) {
                    return;
                }
            }
            None => return,
        }
        let value = match result {
            Ok(value) => value,
            Err(err) => {
                if err.is_target_closed() {
                    tracing::debug!("Target closed during initialization of {}: {}", session, err);
                } else {
                    tracing::error!("Failed to initialize session {}: {}", session, err);
                }
                self.settle(session, Err(err));
                return;
            }
        };
        match method.as_ref() {
            GetFrameTreeParams::IDENTIFIER => {
                match serde_json::from_value::<GetFrameTreeReturns>(value) {
                    Ok(res) => {
                        let live = match self.inits.get_mut(session) {
                            Some(init) => {
                                init.tree_applied = true;
                                std::mem::take(&mut init.live_navigated)
                            }
                            None => Default::default(),
                        };
                        self.handle_frame_tree(session, &res.frame_tree, &live);
                    }
                    Err(err) => {
                        tracing::error!("Invalid frame tree for {}: {}", session, err);
                        self.settle(session, Err(err.into()));
                    }
                }
            }
            runtime::EnableParams::IDENTIFIER => {
                let key = (session.clone(), self.utility_world_name.clone());
                if self.isolated_worlds.insert(key) {
                    let declare = AddScriptToEvaluateOnNewDocumentParams {
                        source: format!("//# sourceURL={EVALUATION_SCRIPT_URL}"),
                        world_name: Some(self.utility_world_name.clone()),
                    };
                    self.push_init(session, &declare);
                } else {
                    self.finish_init_commands(session, false);
                }
            }
            AddScriptToEvaluateOnNewDocumentParams::IDENTIFIER => {
                self.finish_init_commands(session, true)
            }
            _ => {}
        }
    }

    /// Creates the utility world in every frame of the session and queues the
    /// remaining handshake steps
    fn finish_init_commands(&mut self, session: &SessionId, create_worlds: bool) {
        if create_worlds {
            let mut frames: Vec<_> = self
                .frames
                .values()
                .filter(|f| &f.session == session)
                .map(|f| (f.key, f.id.clone()))
                .collect();
            frames.sort();
            for (_, frame_id) in frames {
                let params = CreateIsolatedWorldParams {
                    frame_id: frame_id.clone(),
                    world_name: Some(self.utility_world_name.clone()),
                    grant_univeral_access: Some(true),
                };
                self.submit(&params, session, InternalRequest::CreateIsolatedWorld(frame_id));
            }
        }
        self.push_init(session, &SetAutoAttachParams::flattened());
        self.push_init(session, &RunIfWaitingForDebuggerParams::default());
    }

    /// Ends the handshake of `session` and runs everything that waited on it
    fn settle(&mut self, session: &SessionId, result: Result<()>) {
        let Some(init) = self.inits.remove(session) else {
            return;
        };
        let aborted = result.is_err();
        match result {
            Ok(()) => self
                .events
                .push_back(FrameManagerEvent::Initialized(session.clone())),
            Err(err) => self
                .events
                .push_back(FrameManagerEvent::Aborted(session.clone(), err)),
        }
        self.complete_deferred(&init.target_frame, aborted);
    }

    fn complete_deferred(&mut self, target_frame: &FrameId, aborted: bool) {
        let Some(deferred) = self.pending_target_init.remove(target_frame) else {
            return;
        };
        for attach in deferred {
            match self.frame_ids.get(&attach.parent_id).copied() {
                // the frame tree of the parent target already listed it
                Some(_) if self.frame_by_id(&attach.frame_id).is_some() => {}
                Some(parent) => {
                    self.attach_child(&attach.session, attach.frame_id.clone(), parent);
                }
                None if aborted => {
                    tracing::warn!(
                        "Dropping frame {} of closed target {}",
                        attach.frame_id,
                        target_frame
                    );
                }
                None => {
                    self.events.push_back(FrameManagerEvent::Fatal(
                        CdpError::ParentFrameNotFound(attach.parent_id.to_string()),
                    ));
                }
            }
            if let Some(navigations) = self.pending_attachment.remove(&attach.frame_id) {
                for frame in navigations {
                    self.complete_navigation(&frame);
                }
            }
        }
    }

    fn handle_frame_tree(&mut self, session: &SessionId, tree: &FrameTree, live: &HashSet<FrameId>) {
        if let Some(ref parent_id) = tree.frame.parent_id {
            self.on_frame_attached(session, &tree.frame.id, parent_id);
        }
        if !live.contains(&tree.frame.id) {
            self.on_frame_navigated(&tree.frame);
        }
        if let Some(ref children) = tree.child_frames {
            for child in children {
                self.handle_frame_tree(session, child, live);
            }
        }
    }

    /// Handles an event received on `session`
    pub fn on_event(&mut self, session: &SessionId, event: &CdpEvent) {
        match event {
            CdpEvent::PageFrameAttached(ev) => {
                self.on_frame_attached(session, &ev.frame_id, &ev.parent_frame_id)
            }
            CdpEvent::PageFrameNavigated(ev) => {
                if self.on_frame_navigated(&ev.frame) {
                    if let Some(init) = self.inits.get_mut(session) {
                        if !init.tree_applied {
                            init.live_navigated.insert(ev.frame.id.clone());
                        }
                    }
                }
            }
            CdpEvent::PageNavigatedWithinDocument(ev) => {
                self.on_frame_navigated_within_document(&ev.frame_id, &ev.url)
            }
            CdpEvent::PageFrameDetached(ev) => self.on_frame_detached(&ev.frame_id, ev.reason),
            CdpEvent::PageFrameStartedLoading(ev) => {
                if let Some(frame) = self.frame_by_id_mut(&ev.frame_id) {
                    frame.on_loading_started();
                }
            }
            CdpEvent::PageFrameStoppedLoading(ev) => {
                if let Some(frame) = self.frame_by_id_mut(&ev.frame_id) {
                    frame.on_loading_stopped();
                    let key = frame.key;
                    self.notify(FrameEvent::Lifecycle(key, "load".to_string()));
                }
            }
            CdpEvent::PageLifecycleEvent(ev) => {
                if let Some(frame) = self.frame_by_id_mut(&ev.frame_id) {
                    frame.on_lifecycle_event(&ev.loader_id, &ev.name);
                    let key = frame.key;
                    self.notify(FrameEvent::Lifecycle(key, ev.name.clone()));
                }
            }
            CdpEvent::RuntimeExecutionContextCreated(ev) => {
                self.on_execution_context_created(session, &ev.context)
            }
            CdpEvent::RuntimeExecutionContextDestroyed(ev) => {
                self.on_execution_context_destroyed(session, ev.execution_context_id)
            }
            CdpEvent::RuntimeExecutionContextsCleared(_) => {
                self.on_execution_contexts_cleared(session)
            }
            CdpEvent::RuntimeBindingCalled(ev) => {
                self.on_binding_called(session, ev.execution_context_id, &ev.name, &ev.payload)
            }
            _ => {}
        }
        self.check_watchers();
    }

    fn frame_by_id_mut(&mut self, id: &FrameId) -> Option<&mut Frame> {
        let key = self.frame_ids.get(id)?;
        self.frames.get_mut(key)
    }

    fn notify(&mut self, event: FrameEvent) {
        self.events.push_back(FrameManagerEvent::Notify(event));
    }

    fn insert_frame(&mut self, id: FrameId, parent: Option<FrameKey>, session: SessionId) -> FrameKey {
        let key = FrameKey(self.next_key);
        self.next_key += 1;
        self.frame_ids.insert(id.clone(), key);
        self.frames.insert(key, Frame::new(key, id, parent, session));
        key
    }

    fn attach_child(&mut self, session: &SessionId, frame_id: FrameId, parent: FrameKey) -> FrameKey {
        let key = self.insert_frame(frame_id, Some(parent), session.clone());
        if let Some(parent) = self.frames.get_mut(&parent) {
            parent.children.push(key);
        }
        self.notify(FrameEvent::Attached(key));
        key
    }

    /// Moves a frame to another session, its worlds wait for new contexts
    fn rebind(&mut self, key: FrameKey, session: &SessionId) {
        let Some(frame) = self.frames.get_mut(&key) else {
            return;
        };
        let previous = std::mem::replace(&mut frame.session, session.clone());
        frame.main_world.clear_context();
        frame.secondary_world.clear_context();
        for ((ctx_session, _), entry) in self.contexts.iter_mut() {
            if ctx_session == &previous && matches!(entry.world, Some((k, _)) if k == key) {
                entry.world = None;
            }
        }
    }

    fn on_frame_attached(&mut self, session: &SessionId, frame_id: &FrameId, parent_id: &FrameId) {
        if let Some(key) = self.frame_by_id(frame_id) {
            let is_oop = self.frames.get(&key).map(|f| self.is_oop(f)).unwrap_or(false);
            if is_oop {
                // an out of process frame became a regular frame again
                self.rebind(key, session);
            }
            return;
        }
        if let Some(parent) = self.frame_by_id(parent_id) {
            self.attach_child(session, frame_id.clone(), parent);
            return;
        }
        if let Some(deferred) = self.pending_target_init.get_mut(parent_id) {
            deferred.push(DeferredAttach {
                session: session.clone(),
                frame_id: frame_id.clone(),
                parent_id: parent_id.clone(),
            });
            self.pending_attachment
                .entry(frame_id.clone())
                .or_default();
            return;
        }
        self.events.push_back(FrameManagerEvent::Fatal(
            CdpError::ParentFrameNotFound(parent_id.to_string()),
        ));
    }

    /// Returns `false` if the navigation was dropped because the frame is unknown
    fn on_frame_navigated(&mut self, frame: &page::Frame) -> bool {
        if let Some(pending) = self.pending_attachment.get_mut(&frame.id) {
            pending.push(frame.clone());
            return true;
        }
        self.complete_navigation(frame)
    }

    fn complete_navigation(&mut self, payload: &page::Frame) -> bool {
        let is_main = payload.parent_id.is_none();
        let existing = if is_main {
            self.main_frame
        } else {
            self.frame_by_id(&payload.id)
        };

        // a navigated frame loses all its children
        if let Some(key) = existing {
            for child in self.child_frames(key) {
                self.remove_frames_recursively(child);
            }
        }

        let key = match (existing, is_main) {
            (Some(key), true) => {
                if let Some(frame) = self.frames.get_mut(&key) {
                    if frame.id != payload.id {
                        // keep the identity of the main frame across processes
                        let previous = std::mem::replace(&mut frame.id, payload.id.clone());
                        self.frame_ids.remove(&previous);
                    }
                }
                self.frame_ids.insert(payload.id.clone(), key);
                key
            }
            (None, true) => {
                let key = self.insert_frame(payload.id.clone(), None, self.main_session.clone());
                self.main_frame = Some(key);
                key
            }
            (Some(key), false) => key,
            (None, false) => {
                tracing::warn!("Navigation of unknown frame {}", payload.id);
                return false;
            }
        };

        if let Some(frame) = self.frames.get_mut(&key) {
            frame.navigated(payload);
        }
        self.notify(FrameEvent::Navigated(key));
        true
    }

    fn on_frame_navigated_within_document(&mut self, frame_id: &FrameId, url: &str) {
        if let Some(frame) = self.frame_by_id_mut(frame_id) {
            frame.navigated_within_document(url.to_string());
            let key = frame.key;
            self.notify(FrameEvent::NavigatedWithinDocument(key));
            self.notify(FrameEvent::Navigated(key));
        }
    }

    fn on_frame_detached(&mut self, frame_id: &FrameId, reason: Option<FrameDetachedReason>) {
        let Some(key) = self.frame_by_id(frame_id) else {
            return;
        };
        match reason.unwrap_or(FrameDetachedReason::Remove) {
            FrameDetachedReason::Remove => self.remove_frames_recursively(key),
            // the frame moves to its own target and is attached there again
            FrameDetachedReason::Swap => self.notify(FrameEvent::Swapped(key)),
        }
    }

    /// Removes the frame after all its descendants, depth first
    fn remove_frames_recursively(&mut self, key: FrameKey) {
        for child in self.child_frames(key) {
            self.remove_frames_recursively(child);
        }
        let Some(mut frame) = self.frames.remove(&key) else {
            return;
        };
        frame.detach_worlds();
        if self.frame_ids.get(&frame.id) == Some(&key) {
            self.frame_ids.remove(&frame.id);
        }
        if let Some(parent) = frame.parent.and_then(|p| self.frames.get_mut(&p)) {
            parent.children.retain(|c| *c != key);
        }
        self.notify(FrameEvent::Detached(key));
    }

    /// A session for an out of process frame was attached
    pub fn on_attached_to_target(&mut self, session: SessionId, target_id: &TargetId) {
        if let Some(key) = self.frame_by_id(&FrameId::new(target_id.as_ref())) {
            self.rebind(key, &session);
        }
        self.start_init(session, target_id);
    }

    /// The session of an out of process frame went away
    pub fn on_session_detached(&mut self, session: &SessionId, target_id: &TargetId) {
        self.settle(session, Err(CdpError::TargetClosed("Target.detachedFromTarget".into())));
        if let Some(key) = self.frame_by_id(&FrameId::new(target_id.as_ref())) {
            let is_oop = self.frames.get(&key).map(|f| self.is_oop(f)).unwrap_or(false);
            if is_oop {
                self.remove_frames_recursively(key);
            }
        }
        self.on_execution_contexts_cleared(session);
        self.check_watchers();
    }

    /// The page itself went away: detach everything
    pub fn on_closed(&mut self) {
        if let Some(main) = self.main_frame.take() {
            self.remove_frames_recursively(main);
        }
        for key in self.frames() {
            self.remove_frames_recursively(key);
        }
        let sessions: Vec<_> = self.inits.keys().cloned().collect();
        for session in sessions {
            self.settle(&session, Err(CdpError::TargetClosed("Target.detachedFromTarget".into())));
        }
        self.contexts.clear();
        for watcher in self.watchers.drain(..) {
            let _ = watcher
                .tx
                .send(Err(CdpError::TargetClosed("Page.lifecycleEvent".into())));
        }
    }

    fn on_execution_context_created(&mut self, session: &SessionId, context: &ExecutionContextDescription) {
        let mut world = None;
        if let Some(key) = context.frame_id().and_then(|id| self.frame_by_id(&FrameId::from(id))) {
            if let Some(frame) = self.frames.get(&key) {
                if &frame.session != session {
                    tracing::debug!(
                        "Ignoring context {} of stale session {} for frame {}",
                        context.id,
                        session,
                        frame.id
                    );
                    return;
                }
                if context.is_default() {
                    world = Some((key, DOMWorldKind::Main));
                } else if context.name == self.utility_world_name
                    && !frame.secondary_world.has_context()
                {
                    world = Some((key, DOMWorldKind::Secondary));
                }
            }
        }

        if let Some((key, kind)) = world {
            let info = ContextInfo::new(session.clone(), context.id, key, kind);
            if let Some(w) = self.world_mut(key, kind) {
                let generation = w.set_context(info);
                let inject = EvaluateParams::new(with_source_url(UTILITY_SCRIPT))
                    .context_id(context.id)
                    .return_by_value(false);
                self.submit(
                    &inject,
                    session,
                    InternalRequest::InjectUtility {
                        frame: key,
                        world: kind,
                        generation,
                    },
                );
            }
        }

        self.contexts.insert(
            (session.clone(), context.id),
            ContextEntry {
                name: context.name.clone(),
                world,
            },
        );
        self.notify(FrameEvent::ContextCreated {
            session_id: session.clone(),
            context_id: context.id,
            name: context.name.clone(),
            world,
        });
    }

    fn on_execution_context_destroyed(&mut self, session: &SessionId, context_id: ExecutionContextId) {
        if let Some(entry) = self.contexts.remove(&(session.clone(), context_id)) {
            self.context_removed(session, context_id, entry);
        }
    }

    fn on_execution_contexts_cleared(&mut self, session: &SessionId) {
        let mut cleared: Vec<_> = self
            .contexts
            .keys()
            .filter(|(s, _)| s == session)
            .cloned()
            .collect();
        cleared.sort_by_key(|(_, id)| *id);
        for key in cleared {
            if let Some(entry) = self.contexts.remove(&key) {
                self.context_removed(&key.0, key.1, entry);
            }
        }
    }

    fn context_removed(&mut self, session: &SessionId, context_id: ExecutionContextId, entry: ContextEntry) {
        if let Some((key, kind)) = entry.world {
            if let Some(world) = self.world_mut(key, kind) {
                world.clear_context();
            }
        }
        self.notify(FrameEvent::ContextDestroyed {
            session_id: session.clone(),
            context_id,
            world: entry.world,
        });
    }

    #[cfg(test)]
    pub fn has_context(&self, session: &SessionId, context_id: ExecutionContextId) -> bool {
        self.contexts.contains_key(&(session.clone(), context_id))
    }

    pub fn execution_context(
        &mut self,
        frame: FrameKey,
        kind: DOMWorldKind,
        tx: OneshotSender<Result<ContextInfo>>,
    ) {
        match self.world_mut(frame, kind) {
            Some(world) => world.execution_context(tx),
            None => {
                let _ = tx.send(Err(CdpError::FrameDetached));
            }
        }
    }

    pub fn add_wait_task(
        &mut self,
        frame: FrameKey,
        kind: DOMWorldKind,
        id: WaitTaskId,
        bindings: Vec<Binding>,
        signals: UnboundedSender<WaitTaskSignal>,
    ) {
        match self.world_mut(frame, kind) {
            Some(world) => world.add_wait_task(id, bindings, signals),
            None => {
                let _ = signals.unbounded_send(WaitTaskSignal::Terminate(CdpError::FrameDetached));
            }
        }
    }

    pub fn remove_wait_task(&mut self, frame: FrameKey, kind: DOMWorldKind, id: WaitTaskId) {
        if let Some(world) = self.world_mut(frame, kind) {
            world.remove_wait_task(id);
        }
    }

    /// Wires the binding `name` into the context, resolving `tx` once done
    pub fn add_binding(
        &mut self,
        frame: FrameKey,
        kind: DOMWorldKind,
        name: String,
        context_id: ExecutionContextId,
        tx: OneshotSender<()>,
    ) {
        let Some(f) = self.frames.get_mut(&frame) else {
            let _ = tx.send(());
            return;
        };
        let session = f.session.clone();
        let Some((name, context_id)) = f.world_mut(kind).begin_binding(name, context_id, tx) else {
            return;
        };
        let context_name = self
            .contexts
            .get(&(session.clone(), context_id))
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let params = if context_name.is_empty() {
            AddBindingParams {
                name: name.clone(),
                execution_context_id: Some(context_id),
                execution_context_name: None,
            }
        } else {
            AddBindingParams {
                name: name.clone(),
                execution_context_id: None,
                execution_context_name: Some(context_name),
            }
        };
        self.submit(
            &params,
            &session,
            InternalRequest::AddBinding {
                frame,
                world: kind,
                name,
                context_id,
            },
        );
    }

    fn init_binding(&mut self, frame: FrameKey, kind: DOMWorldKind, name: String, context_id: ExecutionContextId) {
        let Some(session) = self.frames.get(&frame).map(|f| f.session.clone()) else {
            return self.finish_binding(frame, kind);
        };
        let script = evaluation_string(
            BINDING_INIT,
            &[serde_json::json!("internal"), serde_json::json!(name)],
        );
        let params = EvaluateParams::new(with_source_url(script)).context_id(context_id);
        self.submit(
            &params,
            &session,
            InternalRequest::InitBinding {
                frame,
                world: kind,
                name,
                context_id,
            },
        );
    }

    fn finish_binding(&mut self, frame: FrameKey, kind: DOMWorldKind) {
        let parked = match self.world_mut(frame, kind) {
            Some(world) => world.finish_binding(),
            None => return,
        };
        for call in parked {
            self.add_binding(frame, kind, call.name, call.context_id, call.tx);
        }
    }

    fn on_binding_called(&mut self, session: &SessionId, context_id: ExecutionContextId, name: &str, payload: &str) {
        let Some((frame, kind)) = self
            .contexts
            .get(&(session.clone(), context_id))
            .and_then(|entry| entry.world)
        else {
            return;
        };
        let payload: BindingPayload = match serde_json::from_str(payload) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!("Invalid payload for binding {}: {}", name, err);
                return;
            }
        };
        if payload.r#type != "internal" {
            return;
        }
        let Some(world) = self.frames.get(&frame).map(|f| f.world(kind)) else {
            return;
        };
        if !world.is_bound(&payload.name, context_id)
            || world.context().map(|c| c.context_id) != Some(context_id)
        {
            return;
        }
        let Some(binding) = world.binding(&payload.name).cloned() else {
            return;
        };
        let script = match binding.call(payload.args) {
            Ok(value) => evaluation_string(
                DELIVER_RESULT,
                &[payload.name.into(), payload.seq.into(), value],
            ),
            Err(message) => evaluation_string(
                DELIVER_ERROR,
                &[
                    payload.name.into(),
                    payload.seq.into(),
                    message.clone().into(),
                    message.into(),
                ],
            ),
        };
        let params = EvaluateParams::new(with_source_url(script)).context_id(context_id);
        self.submit(&params, session, InternalRequest::DeliverBindingResult);
    }

    /// Resolves `tx` once the frame and its descendants observed all `events`
    pub fn wait_for_lifecycle(&mut self, frame: FrameKey, events: Vec<String>, tx: OneshotSender<Result<()>>) {
        self.watchers.push(LifecycleWatcher { frame, events, tx });
        self.check_watchers();
    }

    fn lifecycle_complete(&self, key: FrameKey, events: &[String]) -> bool {
        match self.frames.get(&key) {
            Some(frame) => {
                events.iter().all(|e| frame.lifecycle_events.contains(e))
                    && frame
                        .children
                        .iter()
                        .all(|child| self.lifecycle_complete(*child, events))
            }
            None => false,
        }
    }

    fn check_watchers(&mut self) {
        for watcher in std::mem::take(&mut self.watchers) {
            if watcher.tx.is_canceled() {
                continue;
            }
            if !self.frames.contains_key(&watcher.frame) {
                let _ = watcher.tx.send(Err(CdpError::FrameDetached));
            } else if self.lifecycle_complete(watcher.frame, &watcher.events) {
                let _ = watcher.tx.send(Ok(()));
            } else {
                self.watchers.push(watcher);
            }
        }
    }
}

/// Decodes the response of a `Runtime.evaluate`, turning thrown exceptions
/// into errors
fn evaluate_result(result: Result<serde_json::Value>) -> Result<EvaluateReturns> {
    let res: EvaluateReturns = serde_json::from_value(result?)?;
    if let Some(ref details) = res.exception_details {
        return Err(CdpError::Evaluation(exception_message(details)));
    }
    Ok(res)
}
