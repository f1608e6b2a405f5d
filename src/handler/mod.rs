use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fnv::FnvHashMap;
use futures::channel::mpsc::{Receiver, UnboundedSender};
use futures::channel::oneshot::Sender as OneshotSender;
use futures::stream::{Fuse, Stream, StreamExt};
use futures::task::{Context, Poll};

use frameoxide_types::runtime::RunIfWaitingForDebuggerParams;
use frameoxide_types::target::{
    CreateTargetParams, EventAttachedToTarget, EventDetachedFromTarget, EventTargetDestroyed,
    SessionId, SetAutoAttachParams, SetDiscoverTargetsParams, TargetId,
};
use frameoxide_types::{CallId, Command, Message, MethodId, Request, Response};

use crate::browser::BrowserEvent;
use crate::cdp::{CdpEvent, CdpEventMessage};
use crate::cmd::{response_result, to_command_response, CommandMessage};
use crate::conn::Connection;
use crate::error::{CdpError, Result};
use crate::handler::frame::InternalRequest;
use crate::handler::job::PeriodicJob;
use crate::handler::session::Session;
use crate::handler::target::{Target, TargetEvent};
use crate::page::Page;
use crate::subscribe::{EventListeners, Subscriptions};

pub mod domworld;
pub(crate) mod execution;
pub mod frame;
mod job;
pub(crate) mod navigationfuture;
pub(crate) mod page;
mod session;
pub(crate) mod target;

/// Standard timeout in MS
pub const REQUEST_TIMEOUT: u64 = 30_000;

/// Name of the isolated world every frame gets for internal scripts
pub const UTILITY_WORLD_NAME: &str = "__frameoxide_utility_world__";

/// The handler that monitors the state of the browser and drives all the
/// requests and events.
///
/// It yields nothing during normal operation and ends once the connection
/// closed. Errors that leave the frame state corrupt are yielded as `Err`.
#[must_use = "streams do nothing unless polled"]
#[derive(Debug)]
pub struct Handler {
    /// Commands that are not addressed to a session and await a response
    pending_commands: FnvHashMap<CallId, (PendingRequest, MethodId, Instant)>,
    /// Connection to the browser instance
    from_browser: Fuse<Receiver<HandlerMessage>>,
    /// Used to loop over all targets in a consistent manner
    target_ids: Vec<TargetId>,
    /// The attached page targets
    targets: HashMap<TargetId, Target>,
    /// Targets that were created via `new_page` but not attached yet
    awaiting_targets: HashMap<TargetId, OneshotSender<Result<Page>>>,
    /// Keeps track of all the current active sessions
    ///
    /// There can be multiple sessions per target.
    sessions: HashMap<SessionId, Session>,
    /// The connection to the browser instance
    conn: Connection<CdpEventMessage>,
    /// Evicts timed out requests periodically
    evict_command_timeout: PeriodicJob,
    config: HandlerConfig,
    listeners: EventListeners<BrowserEvent>,
    /// Subscriptions to connection scoped events
    subscriptions: Subscriptions,
    closed: bool,
}

impl Handler {
    /// Create a new `Handler` that drives the connection and listens for
    /// messages on the receiver `rx`.
    pub(crate) fn new(
        conn: Connection<CdpEventMessage>,
        rx: Receiver<HandlerMessage>,
        config: HandlerConfig,
    ) -> Self {
        let mut handler = Self {
            pending_commands: Default::default(),
            from_browser: rx.fuse(),
            target_ids: Default::default(),
            targets: Default::default(),
            awaiting_targets: Default::default(),
            sessions: Default::default(),
            conn,
            evict_command_timeout: PeriodicJob::new(config.eviction_interval()),
            config,
            listeners: Default::default(),
            subscriptions: Default::default(),
            closed: false,
        };
        let now = Instant::now();
        handler.submit_untracked(&SetDiscoverTargetsParams::new(true), None, now);
        handler.submit_untracked(&SetAutoAttachParams::flattened(), None, now);
        handler
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// All pages that finished their initialization
    pub fn pages(&self) -> Vec<Page> {
        self.target_ids
            .iter()
            .filter_map(|id| self.targets.get(id))
            .filter_map(Target::page)
            .collect()
    }

    fn submit_untracked<C: Command>(&mut self, cmd: &C, session: Option<SessionId>, now: Instant) {
        match Request::from_command(cmd, session) {
            Ok(req) => self.submit(req, PendingRequest::Untracked, now, "target"),
            Err(err) => tracing::error!("Failed to serialize {}: {}", cmd.identifier(), err),
        }
    }

    /// Writes the request to the connection and remembers what to do with
    /// its response.
    ///
    /// A request for a session that is gone is rejected right away.
    fn submit(&mut self, req: Request, pending: PendingRequest, now: Instant, target_type: &str) {
        match req.session_id.map(SessionId::from) {
            Some(session_id) => {
                let Some(session) = self.sessions.get_mut(&session_id) else {
                    let err = CdpError::SessionClosed {
                        method: req.method.clone(),
                        target_type: target_type.to_string(),
                    };
                    return self.reject(pending, req.method, err);
                };
                let call_id =
                    self.conn
                        .submit_command(req.method.clone(), Some(session_id), req.params);
                session.insert_pending(call_id, pending, req.method, now);
            }
            None => {
                let call_id = self
                    .conn
                    .submit_command(req.method.clone(), None, req.params);
                self.pending_commands
                    .insert(call_id, (pending, req.method, now));
            }
        }
    }

    /// Fails the request with `err`
    fn reject(&mut self, pending: PendingRequest, method: MethodId, err: CdpError) {
        match pending {
            PendingRequest::CreateTarget(tx) => {
                let _ = tx.send(Err(err));
            }
            PendingRequest::ExternalCommand(tx) => {
                let _ = tx.send(Err(err));
            }
            PendingRequest::InternalCommand(target_id, req) => {
                if let Some(target) = self.targets.get_mut(&target_id) {
                    target.on_response(req, &method, Err(err));
                }
            }
            PendingRequest::Untracked => {
                tracing::debug!("Request {} failed: {}", method, err);
            }
        }
    }

    /// Received a response to a request.
    fn on_response(&mut self, resp: Response) {
        let session_pending = match resp.session_id.clone().map(SessionId::from) {
            Some(id) => self
                .sessions
                .get_mut(&id)
                .and_then(|session| session.remove_pending(&resp.id)),
            None => None,
        };
        let pending = session_pending.or_else(|| {
            self.pending_commands
                .remove(&resp.id)
                .map(|(req, method, _)| (req, method))
        });
        let Some((req, method)) = pending else {
            tracing::debug!("Received response to unknown request {}", resp.id);
            return;
        };
        match req {
            PendingRequest::CreateTarget(tx) => {
                match to_command_response::<CreateTargetParams>(resp, method) {
                    Ok(resp) => {
                        let target_id = resp.result.target_id;
                        if let Some(target) = self.targets.get_mut(&target_id) {
                            // the target resolves the page once initialized
                            target.set_initiator(tx);
                        } else {
                            self.awaiting_targets.insert(target_id, tx);
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err));
                    }
                }
            }
            PendingRequest::ExternalCommand(tx) => {
                let _ = tx.send(Ok(resp));
            }
            PendingRequest::InternalCommand(target_id, req) => {
                let result = response_result(resp, &method);
                if let Some(target) = self.targets.get_mut(&target_id) {
                    target.on_response(req, &method, result);
                }
            }
            PendingRequest::Untracked => {
                if let Err(err) = response_result(resp, &method) {
                    tracing::debug!("Request {} failed: {}", method, err);
                }
            }
        }
    }

    /// Submit a command initiated via channel
    fn submit_external_command(&mut self, msg: CommandMessage, now: Instant, target_type: &str) {
        let (req, tx) = msg.split();
        self.submit(req, PendingRequest::ExternalCommand(tx), now, target_type);
    }

    /// Submit a request of the frame manager of `target`, which is currently
    /// not part of the target map
    fn submit_internal_command(
        &mut self,
        target: &mut Target,
        req: Request,
        internal: InternalRequest,
        now: Instant,
    ) {
        let session_id = req.session_id.clone().map(SessionId::from);
        match session_id {
            Some(ref id) if !self.sessions.contains_key(id) => {
                let err = CdpError::SessionClosed {
                    method: req.method.clone(),
                    target_type: target.r#type().to_string(),
                };
                target.on_response(internal, &req.method, Err(err));
            }
            _ => {
                let pending = PendingRequest::InternalCommand(target.target_id().clone(), internal);
                self.submit(req, pending, now, target.r#type());
            }
        }
    }

    /// Create a new page and send it to the receiver when ready
    ///
    /// First a `CreateTargetParams` is send to the server, this will trigger
    /// `EventAttachedToTarget` which results in a new `Target` being created.
    /// Once the response to the request is received and the `Target` finished
    /// its initialization, the `Target` sends its newly created `Page` as
    /// response to the initiator (`tx`) of the `CreateTargetParams` request.
    fn create_page(&mut self, params: CreateTargetParams, tx: OneshotSender<Result<Page>>) {
        match Request::from_command(&params, None::<SessionId>) {
            Ok(req) => self.submit(req, PendingRequest::CreateTarget(tx), Instant::now(), "page"),
            Err(err) => {
                let _ = tx.send(Err(err.into()));
            }
        }
    }

    /// Process an incoming event read from the transport
    fn on_event(&mut self, event: CdpEventMessage) {
        let now = Instant::now();
        let parent = event.session_id.clone();
        match event.params {
            CdpEvent::TargetAttachedToTarget(ref ev) => {
                self.on_attached_to_target(ev.clone(), parent.clone(), now)
            }
            CdpEvent::TargetDetachedFromTarget(ref ev) => self.on_detached_from_target(ev.clone()),
            CdpEvent::TargetTargetDestroyed(ref ev) if parent.is_none() => {
                self.on_target_destroyed(ev.clone())
            }
            _ => {}
        }

        let event = Arc::new(event);
        match parent {
            Some(session_id) => {
                let owner = self
                    .sessions
                    .get(&session_id)
                    .and_then(|session| session.owner().cloned());
                let target = match owner {
                    Some(ref owner) => self.targets.get_mut(owner),
                    None => None,
                };
                match target {
                    Some(target) => target.on_event(&session_id, event),
                    None if self.sessions.contains_key(&session_id) => {}
                    None => tracing::warn!(
                        "Dropping {} for unknown session {}",
                        event.method,
                        session_id
                    ),
                }
            }
            None => self.subscriptions.dispatch(&event),
        }
    }

    /// A new session is attached to a target, `parent` is the session the
    /// event was reported on
    fn on_attached_to_target(
        &mut self,
        event: EventAttachedToTarget,
        parent: Option<SessionId>,
        now: Instant,
    ) {
        let info = event.target_info;
        let session_id = event.session_id;
        let mut session = Session::new(
            session_id.clone(),
            info.r#type.clone(),
            info.target_id.clone(),
        );

        // the page that owns the session the target was attached to
        let owner = parent
            .as_ref()
            .and_then(|p| self.sessions.get(p))
            .and_then(|s| s.owner().cloned());

        match owner {
            None if parent.is_none() && info.is_page() => {
                session.set_owner(info.target_id.clone());
                self.sessions.insert(session_id.clone(), session);
                let target_id = info.target_id.clone();
                let mut target = Target::new(info, session_id, &self.config);
                if let Some(tx) = self.awaiting_targets.remove(&target_id) {
                    target.set_initiator(tx);
                }
                if self.targets.insert(target_id.clone(), target).is_none() {
                    self.target_ids.push(target_id);
                }
            }
            Some(owner) if info.is_iframe() => {
                session.set_owner(owner.clone());
                self.sessions.insert(session_id.clone(), session);
                if let Some(target) = self.targets.get_mut(&owner) {
                    target.on_attached_to_target(session_id, &info.target_id);
                }
            }
            _ => {
                // not tracked, let it run
                self.sessions.insert(session_id.clone(), session);
                self.submit_untracked(&RunIfWaitingForDebuggerParams::default(), Some(session_id), now);
            }
        }
    }

    /// The session was detached from target.
    ///
    /// Can be issued multiple times per target if multiple session have been
    /// attached to it.
    fn on_detached_from_target(&mut self, event: EventDetachedFromTarget) {
        let Some(mut session) = self.sessions.remove(&event.session_id) else {
            return;
        };
        for (req, method) in session.drain_pending() {
            let err = CdpError::TargetClosed(method.clone());
            self.reject(req, method, err);
        }
        tracing::debug!(
            "Session {} of {} {} detached",
            session.id(),
            session.target_type(),
            session.target_id()
        );
        let Some(owner) = session.owner().cloned() else {
            return;
        };
        let is_page_session = self
            .targets
            .get(&owner)
            .map(|t| t.session_id() == session.id())
            .unwrap_or(false);
        if is_page_session {
            self.remove_target(&owner);
        } else if let Some(target) = self.targets.get_mut(&owner) {
            target.on_session_detached(session.id(), session.target_id());
        }
    }

    /// Fired when the target was destroyed in the browser
    fn on_target_destroyed(&mut self, event: EventTargetDestroyed) {
        if self.targets.contains_key(&event.target_id) {
            let page_session = self
                .targets
                .get(&event.target_id)
                .map(|t| t.session_id().clone());
            if let Some(session_id) = page_session {
                self.on_detached_from_target(EventDetachedFromTarget {
                    session_id,
                    target_id: Some(event.target_id.clone()),
                });
            }
            self.remove_target(&event.target_id);
        }
        if let Some(tx) = self.awaiting_targets.remove(&event.target_id) {
            let _ = tx.send(Err(CdpError::TargetClosed(CreateTargetParams::IDENTIFIER.into())));
        }
    }

    fn remove_target(&mut self, target_id: &TargetId) {
        if let Some(mut target) = self.targets.remove(target_id) {
            self.target_ids.retain(|id| id != target_id);
            // sessions of out of process frames go down with the page
            let orphans: Vec<_> = self
                .sessions
                .iter()
                .filter(|(_, s)| s.owner() == Some(target_id))
                .map(|(id, _)| id.clone())
                .collect();
            for session_id in orphans {
                if let Some(mut session) = self.sessions.remove(&session_id) {
                    for (req, method) in session.drain_pending() {
                        let err = CdpError::TargetClosed(method.clone());
                        self.reject(req, method, err);
                    }
                }
            }
            target.on_closed();
            self.listeners
                .send(BrowserEvent::TargetDetached(target_id.clone()));
        }
    }

    /// Rejects every request that was sent more than `request_timeout` ago
    fn evict_timed_out_commands(&mut self, now: Instant) {
        let timeout = self.config.request_timeout;
        if timeout.is_zero() {
            return;
        }
        let mut expired: Vec<_> = self
            .pending_commands
            .iter()
            .filter(|(_, (_, _, sent))| now.saturating_duration_since(*sent) > timeout)
            .map(|(id, _)| *id)
            .collect();
        expired.sort();
        let mut evicted: Vec<_> = expired
            .into_iter()
            .filter_map(|id| self.pending_commands.remove(&id))
            .map(|(req, method, _)| (req, method))
            .collect();
        for session in self.sessions.values_mut() {
            evicted.extend(session.evict_timed_out(now, timeout));
        }
        for (req, method) in evicted {
            let err = CdpError::Timeout(format!(
                "Request {} timed out after {}ms",
                method,
                timeout.as_millis()
            ));
            self.reject(req, method, err);
        }
    }

    /// The connection is gone: every request and page fails
    fn on_connection_closed(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        tracing::debug!("Connection closed");
        let mut pending: Vec<_> = self.pending_commands.drain().collect();
        pending.sort_by_key(|(id, _)| *id);
        for (_, (req, method, _)) in pending {
            let err = CdpError::TargetClosed(method.clone());
            self.reject(req, method, err);
        }
        let sessions: Vec<_> = self.sessions.keys().cloned().collect();
        for session_id in sessions {
            self.on_detached_from_target(EventDetachedFromTarget {
                session_id,
                target_id: None,
            });
        }
        for target_id in self.target_ids.clone() {
            self.remove_target(&target_id);
        }
        for (_, tx) in self.awaiting_targets.drain() {
            let _ = tx.send(Err(CdpError::TargetClosed(CreateTargetParams::IDENTIFIER.into())));
        }
        self.listeners.send(BrowserEvent::Disconnected);
    }

    fn on_browser_message(&mut self, msg: HandlerMessage, now: Instant) {
        match msg {
            HandlerMessage::Command(cmd) => self.submit_external_command(cmd, now, "target"),
            HandlerMessage::CreatePage(params, tx) => self.create_page(params, tx),
            HandlerMessage::GetPages(tx) => {
                let _ = tx.send(self.pages());
            }
            HandlerMessage::AddEventListener(tx) => self.listeners.add(tx),
            HandlerMessage::Subscribe(method, tx) => self.subscriptions.subscribe(method, tx),
        }
    }
}

impl Stream for Handler {
    type Item = Result<()>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let pin = self.get_mut();
        if pin.closed {
            return Poll::Ready(None);
        }

        loop {
            let now = Instant::now();
            // temporary pinning of the browser receiver should be safe as we are pinning
            // through the already pinned self. with the receivers we can also
            // safely ignore exhaustion as those are fused.
            while let Poll::Ready(Some(msg)) = Pin::new(&mut pin.from_browser).poll_next(cx) {
                pin.on_browser_message(msg, now);
            }

            let mut fatal = None;
            for n in (0..pin.target_ids.len()).rev() {
                let target_id = pin.target_ids.swap_remove(n);
                if let Some((id, mut target)) = pin.targets.remove_entry(&target_id) {
                    while let Some(event) = target.poll(cx) {
                        match event {
                            TargetEvent::Request(req, internal) => {
                                pin.submit_internal_command(&mut target, req, internal, now)
                            }
                            TargetEvent::Command(msg) => {
                                let target_type = target.r#type().to_string();
                                pin.submit_external_command(msg, now, &target_type)
                            }
                            TargetEvent::Initialized(page) => {
                                pin.listeners.send(BrowserEvent::PageCreated(page))
                            }
                            TargetEvent::Fatal(err) => {
                                tracing::error!("Frame tree of {} is corrupt: {}", id, err);
                                fatal = Some(err);
                            }
                        }
                    }
                    pin.targets.insert(id, target);
                    pin.target_ids.push(target_id);
                }
            }
            if let Some(err) = fatal {
                return Poll::Ready(Some(Err(err)));
            }

            let mut done = true;

            while let Poll::Ready(ev) = Pin::new(&mut pin.conn).poll_next(cx) {
                match ev {
                    Some(Ok(Message::Response(resp))) => pin.on_response(resp),
                    Some(Ok(Message::Event(ev))) => pin.on_event(ev),
                    Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                    None => {
                        pin.on_connection_closed();
                        return Poll::Ready(None);
                    }
                }
                done = false;
            }

            if pin.evict_command_timeout.poll_ready(cx) {
                pin.evict_timed_out_commands(now);
                done = false;
            }

            if done {
                // no events/responses were read from the transport
                return Poll::Pending;
            }
        }
    }
}

/// Settings of the [`Handler`] and the pages it drives
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Timeout of a single command round trip, zero disables it
    pub request_timeout: Duration,
    /// Timeout for wait tasks that do not specify their own
    pub default_timeout: Duration,
    /// Timeout for lifecycle waits like `set_content`
    pub navigation_timeout: Duration,
    /// Name of the isolated world used for internal scripts
    pub utility_world_name: String,
    /// Capacity of the channels client handles use to reach the handler
    pub channel_capacity: usize,
}

impl HandlerConfig {
    pub fn builder() -> HandlerConfigBuilder {
        HandlerConfigBuilder::default()
    }

    fn eviction_interval(&self) -> Duration {
        if self.request_timeout.is_zero() {
            Duration::from_millis(REQUEST_TIMEOUT)
        } else {
            (self.request_timeout / 2).max(Duration::from_millis(10))
        }
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(REQUEST_TIMEOUT),
            default_timeout: Duration::from_millis(REQUEST_TIMEOUT),
            navigation_timeout: Duration::from_millis(REQUEST_TIMEOUT),
            utility_world_name: UTILITY_WORLD_NAME.to_string(),
            channel_capacity: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HandlerConfigBuilder {
    request_timeout: Option<Duration>,
    default_timeout: Option<Duration>,
    navigation_timeout: Option<Duration>,
    utility_world_name: Option<String>,
    channel_capacity: Option<usize>,
}

impl HandlerConfigBuilder {
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = Some(timeout);
        self
    }

    pub fn utility_world_name(mut self, name: impl Into<String>) -> Self {
        self.utility_world_name = Some(name.into());
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> HandlerConfig {
        let default = HandlerConfig::default();
        HandlerConfig {
            request_timeout: self.request_timeout.unwrap_or(default.request_timeout),
            default_timeout: self.default_timeout.unwrap_or(default.default_timeout),
            navigation_timeout: self
                .navigation_timeout
                .unwrap_or(default.navigation_timeout),
            utility_world_name: self
                .utility_world_name
                .unwrap_or(default.utility_world_name),
            channel_capacity: self.channel_capacity.unwrap_or(default.channel_capacity),
        }
    }
}

/// Different kind of submitted request submitted from the  `Handler` to the
/// `Connection` and being waited on for the response.
#[derive(Debug)]
pub(crate) enum PendingRequest {
    /// A Request to create a new `Target` that results in the creation of a
    /// `Page` that represents a browser page.
    CreateTarget(OneshotSender<Result<Page>>),
    /// A common request received via a channel (`Page` or `Browser`).
    ExternalCommand(OneshotSender<Result<Response>>),
    /// Requests that are initiated directly by the frame manager of a
    /// `Target` (all the initialization commands).
    InternalCommand(TargetId, InternalRequest),
    /// Nobody waits for this response
    Untracked,
}

/// Events used internally to communicate with the handler, which are executed
/// in the background
#[derive(Debug)]
pub(crate) enum HandlerMessage {
    CreatePage(CreateTargetParams, OneshotSender<Result<Page>>),
    GetPages(OneshotSender<Vec<Page>>),
    Command(CommandMessage),
    AddEventListener(UnboundedSender<BrowserEvent>),
    Subscribe(MethodId, UnboundedSender<Arc<CdpEventMessage>>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::ChannelTransport;
    use futures::channel::mpsc::{channel, unbounded};

    #[test]
    fn config_builder_defaults() {
        let config = HandlerConfig::builder()
            .request_timeout(Duration::from_secs(5))
            .utility_world_name("world")
            .build();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.default_timeout, Duration::from_millis(REQUEST_TIMEOUT));
        assert_eq!(config.utility_world_name, "world");
        assert_eq!(config.channel_capacity, 1);
        assert_eq!(config.eviction_interval(), Duration::from_millis(2500));

        let config = HandlerConfig::builder()
            .request_timeout(Duration::ZERO)
            .build();
        assert_eq!(config.eviction_interval(), Duration::from_millis(REQUEST_TIMEOUT));
    }

    #[test]
    fn closing_twice_is_a_noop() {
        let (_to_client, incoming) = unbounded();
        let (outgoing, _from_client) = unbounded();
        let (_browser, rx) = channel(1);
        let mut handler = Handler::new(
            Connection::new(ChannelTransport::new(incoming, outgoing)),
            rx,
            HandlerConfig::default(),
        );
        let (tx, mut events) = unbounded();
        handler.listeners.add(tx);

        handler.on_connection_closed();
        handler.on_connection_closed();
        assert!(matches!(
            events.try_next(),
            Ok(Some(BrowserEvent::Disconnected))
        ));
        // nothing else was sent and the listener is still registered
        assert!(events.try_next().is_err());
        assert!(!handler.listeners.is_empty());
    }
}
