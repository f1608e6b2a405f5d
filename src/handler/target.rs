use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use futures::channel::mpsc::UnboundedSender;
use futures::channel::oneshot::Sender;
use futures::stream::Stream;
use futures::task::{Context, Poll};

use frameoxide_types::page::FrameId;
use frameoxide_types::runtime::ExecutionContextId;
use frameoxide_types::target::{SessionId, TargetId, TargetInfo};
use frameoxide_types::{MethodId, Request};

use crate::cdp::CdpEventMessage;
use crate::cmd::CommandMessage;
use crate::error::{CdpError, Result};
use crate::handler::domworld::{DOMWorldKind, WaitTaskId, WaitTaskSignal};
use crate::handler::execution::ContextInfo;
use crate::handler::frame::{
    FrameEvent, FrameInfo, FrameKey, FrameManager, FrameManagerEvent, InternalRequest,
};
use crate::handler::page::PageHandle;
use crate::handler::HandlerConfig;
use crate::frame::Frame;
use crate::page::{ExecutionContextEvent, Page, PageEvent};
use crate::subscribe::{EventListeners, Subscriptions};
use crate::world::Binding;

/// A page target and everything the handler tracks for it
#[derive(Debug)]
pub(crate) struct Target {
    info: TargetInfo,
    /// The session of the page itself
    session_id: SessionId,
    page: PageHandle,
    frame_manager: FrameManager,
    /// The sender who initiated the creation of a page.
    initiator: Option<Sender<Result<Page>>>,
    /// Whether the handshake of the page's own session completed
    initialized: bool,
    listeners: EventListeners<PageEvent>,
    subscriptions: Subscriptions,
    queued_events: VecDeque<TargetEvent>,
}

impl Target {
    /// Create a new target for the page attached with `session_id` and start
    /// its initialization
    pub fn new(info: TargetInfo, session_id: SessionId, config: &HandlerConfig) -> Self {
        let page = PageHandle::new(
            info.target_id.clone(),
            session_id.clone(),
            config.channel_capacity,
            config.default_timeout,
            config.navigation_timeout,
        );
        let mut frame_manager =
            FrameManager::new(session_id.clone(), config.utility_world_name.clone());
        frame_manager.start_init(session_id.clone(), &info.target_id);
        Self {
            info,
            session_id,
            page,
            frame_manager,
            initiator: None,
            initialized: false,
            listeners: Default::default(),
            subscriptions: Default::default(),
            queued_events: Default::default(),
        }
    }

    /// The identifier for this target
    pub fn target_id(&self) -> &TargetId {
        &self.info.target_id
    }

    pub fn r#type(&self) -> &str {
        &self.info.r#type
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The page of this target, once initialized
    pub fn page(&self) -> Option<Page> {
        self.initialized
            .then(|| Page::from(Arc::clone(self.page.inner())))
    }

    pub fn set_initiator(&mut self, tx: Sender<Result<Page>>) {
        match self.page() {
            Some(page) => {
                let _ = tx.send(Ok(page));
            }
            None => self.initiator = Some(tx),
        }
    }

    /// An event for the page's session or one of its out of process frames
    pub fn on_event(&mut self, session: &SessionId, event: Arc<CdpEventMessage>) {
        self.frame_manager.on_event(session, &event.params);
        self.subscriptions.dispatch(&event);
    }

    /// Received the response to a request issued by the frame manager
    pub fn on_response(&mut self, req: InternalRequest, method: &MethodId, result: Result<serde_json::Value>) {
        self.frame_manager.on_response(req, method, result);
    }

    /// A session for one of this page's out of process frames was attached
    pub fn on_attached_to_target(&mut self, session: SessionId, target_id: &TargetId) {
        self.frame_manager.on_attached_to_target(session, target_id);
    }

    pub fn on_session_detached(&mut self, session: &SessionId, target_id: &TargetId) {
        self.frame_manager.on_session_detached(session, target_id);
    }

    /// The page's own session went away
    pub fn on_closed(&mut self) {
        self.frame_manager.on_closed();
        while let Some(event) = self.frame_manager.poll() {
            self.on_frame_manager_event(event);
        }
        if let Some(tx) = self.initiator.take() {
            let _ = tx.send(Err(CdpError::TargetClosed("Target.createTarget".into())));
        }
    }

    fn frame(&self, key: FrameKey) -> Frame {
        Frame::new(key, Arc::clone(self.page.inner()))
    }

    fn on_frame_manager_event(&mut self, event: FrameManagerEvent) {
        match event {
            FrameManagerEvent::Request(req, internal) => {
                self.queued_events
                    .push_back(TargetEvent::Request(req, internal));
            }
            FrameManagerEvent::Notify(event) => {
                let event = self.page_event(event);
                self.listeners.send(event);
            }
            FrameManagerEvent::Initialized(session) => {
                if session == self.session_id && !self.initialized {
                    self.initialized = true;
                    let page = Page::from(Arc::clone(self.page.inner()));
                    if let Some(tx) = self.initiator.take() {
                        let _ = tx.send(Ok(page.clone()));
                    }
                    self.queued_events.push_back(TargetEvent::Initialized(page));
                }
            }
            FrameManagerEvent::Aborted(session, err) => {
                if session == self.session_id {
                    if let Some(tx) = self.initiator.take() {
                        let _ = tx.send(Err(err));
                    }
                }
            }
            FrameManagerEvent::Fatal(err) => {
                self.queued_events.push_back(TargetEvent::Fatal(err));
            }
        }
    }

    fn page_event(&self, event: FrameEvent) -> PageEvent {
        match event {
            FrameEvent::Attached(key) => PageEvent::FrameAttached(self.frame(key)),
            FrameEvent::Navigated(key) => PageEvent::FrameNavigated(self.frame(key)),
            FrameEvent::NavigatedWithinDocument(key) => {
                PageEvent::FrameNavigatedWithinDocument(self.frame(key))
            }
            FrameEvent::Detached(key) => PageEvent::FrameDetached(self.frame(key)),
            FrameEvent::Swapped(key) => PageEvent::FrameSwapped(self.frame(key)),
            FrameEvent::Lifecycle(key, name) => PageEvent::Lifecycle {
                frame: self.frame(key),
                name,
            },
            FrameEvent::ContextCreated {
                session_id,
                context_id,
                name,
                world,
            } => PageEvent::ExecutionContextCreated(ExecutionContextEvent {
                session_id,
                context_id,
                name: Some(name),
                frame: world.map(|(key, _)| self.frame(key)),
                world: world.map(|(_, kind)| kind),
            }),
            FrameEvent::ContextDestroyed {
                session_id,
                context_id,
                world,
            } => PageEvent::ExecutionContextDestroyed(ExecutionContextEvent {
                session_id,
                context_id,
                name: None,
                frame: world.map(|(key, _)| self.frame(key)),
                world: world.map(|(_, kind)| kind),
            }),
        }
    }

    /// Process a message received by the target's page via channel
    fn on_page_message(&mut self, msg: TargetMessage) {
        let fm = &mut self.frame_manager;
        match msg {
            TargetMessage::Command(cmd) => self.queued_events.push_back(TargetEvent::Command(cmd)),
            TargetMessage::MainFrame(tx) => {
                let _ = tx.send(fm.main_frame());
            }
            TargetMessage::Frames(tx) => {
                let _ = tx.send(fm.frames());
            }
            TargetMessage::FrameById(id, tx) => {
                let _ = tx.send(fm.frame_by_id(&id));
            }
            TargetMessage::FrameInfo(key, tx) => {
                let _ = tx.send(fm.info(key));
            }
            TargetMessage::ChildFrames(key, tx) => {
                let _ = tx.send(fm.child_frames(key));
            }
            TargetMessage::ParentFrame(key, tx) => {
                let _ = tx.send(fm.parent_frame(key));
            }
            TargetMessage::ExecutionContext { frame, world, tx } => {
                fm.execution_context(frame, world, tx)
            }
            TargetMessage::AddWaitTask {
                frame,
                world,
                id,
                bindings,
                signals,
            } => fm.add_wait_task(frame, world, id, bindings, signals),
            TargetMessage::RemoveWaitTask { frame, world, id } => {
                fm.remove_wait_task(frame, world, id)
            }
            TargetMessage::AddBinding {
                frame,
                world,
                name,
                context_id,
                tx,
            } => fm.add_binding(frame, world, name, context_id, tx),
            TargetMessage::WaitForLifecycle { frame, events, tx } => {
                fm.wait_for_lifecycle(frame, events, tx)
            }
            TargetMessage::AddEventListener(tx) => self.listeners.add(tx),
            TargetMessage::Subscribe(method, tx) => self.subscriptions.subscribe(method, tx),
        }
    }

    /// Advance this target's state, returns the next event for the handler
    pub(crate) fn poll(&mut self, cx: &mut Context<'_>) -> Option<TargetEvent> {
        loop {
            if let Some(event) = self.queued_events.pop_front() {
                return Some(event);
            }
            if let Some(event) = self.frame_manager.poll() {
                self.on_frame_manager_event(event);
                continue;
            }
            match Pin::new(&mut self.page.rx).poll_next(cx) {
                Poll::Ready(Some(msg)) => self.on_page_message(msg),
                _ => return None,
            }
        }
    }
}

#[derive(Debug)]
pub(crate) enum TargetEvent {
    /// An internal request of the frame manager
    Request(Request, InternalRequest),
    /// A command issued by a client handle
    Command(CommandMessage),
    /// The page finished its initialization
    Initialized(Page),
    /// The frame tree of this page is corrupt
    Fatal(CdpError),
}

/// Messages the client handles of a page send to its target
#[derive(Debug)]
pub(crate) enum TargetMessage {
    Command(CommandMessage),
    MainFrame(Sender<Option<FrameKey>>),
    Frames(Sender<Vec<FrameKey>>),
    FrameById(FrameId, Sender<Option<FrameKey>>),
    FrameInfo(FrameKey, Sender<Option<FrameInfo>>),
    ChildFrames(FrameKey, Sender<Vec<FrameKey>>),
    ParentFrame(FrameKey, Sender<Option<FrameKey>>),
    ExecutionContext {
        frame: FrameKey,
        world: DOMWorldKind,
        tx: Sender<Result<ContextInfo>>,
    },
    AddWaitTask {
        frame: FrameKey,
        world: DOMWorldKind,
        id: WaitTaskId,
        bindings: Vec<Binding>,
        signals: UnboundedSender<WaitTaskSignal>,
    },
    RemoveWaitTask {
        frame: FrameKey,
        world: DOMWorldKind,
        id: WaitTaskId,
    },
    AddBinding {
        frame: FrameKey,
        world: DOMWorldKind,
        name: String,
        context_id: ExecutionContextId,
        tx: Sender<()>,
    },
    WaitForLifecycle {
        frame: FrameKey,
        events: Vec<String>,
        tx: Sender<Result<()>>,
    },
    AddEventListener(UnboundedSender<PageEvent>),
    Subscribe(MethodId, UnboundedSender<Arc<CdpEventMessage>>),
}
