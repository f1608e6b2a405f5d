use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::{channel, Receiver, Sender};
use futures::channel::oneshot::{channel as oneshot_channel, Sender as OneshotSender};
use futures::stream::Fuse;
use futures::{SinkExt, StreamExt};

use frameoxide_types::target::{SessionId, TargetId};
use frameoxide_types::{Command, CommandResponse};

use crate::cmd::{to_command_response, CommandMessage};
use crate::error::Result;
use crate::handler::domworld::WaitTaskId;
use crate::handler::frame::FrameKey;
use crate::handler::navigationfuture::NavigationFuture;
use crate::handler::target::TargetMessage;

/// The handler side of a page: receives the messages of all the page's
/// client handles.
#[derive(Debug)]
pub(crate) struct PageHandle {
    pub(crate) rx: Fuse<Receiver<TargetMessage>>,
    page: Arc<PageInner>,
}

impl PageHandle {
    pub fn new(
        target_id: TargetId,
        session_id: SessionId,
        capacity: usize,
        default_timeout: Duration,
        navigation_timeout: Duration,
    ) -> Self {
        let (sender, rx) = channel(capacity);
        let page = PageInner {
            target_id,
            session_id,
            sender,
            next_wait_task: AtomicUsize::new(0),
            default_timeout,
            navigation_timeout,
        };
        Self {
            rx: rx.fuse(),
            page: Arc::new(page),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<PageInner> {
        &self.page
    }
}

/// Shared by all client handles of a page
#[derive(Debug)]
pub(crate) struct PageInner {
    target_id: TargetId,
    session_id: SessionId,
    sender: Sender<TargetMessage>,
    next_wait_task: AtomicUsize,
    default_timeout: Duration,
    navigation_timeout: Duration,
}

impl PageInner {
    /// Execute a command on the page's own session
    pub(crate) async fn execute<T: Command>(&self, cmd: T) -> Result<CommandResponse<T::Response>> {
        self.execute_in(cmd, Some(self.session_id.clone())).await
    }

    /// Execute a command on another session, like the one of an out of
    /// process frame
    pub(crate) async fn execute_in<T: Command>(
        &self,
        cmd: T,
        session: Option<SessionId>,
    ) -> Result<CommandResponse<T::Response>> {
        let (tx, rx) = oneshot_channel();
        let method = cmd.identifier();
        let msg = CommandMessage::with_session(cmd, tx, session)?;
        self.send(TargetMessage::Command(msg)).await?;
        let resp = rx.await??;
        to_command_response::<T>(resp, method)
    }

    pub(crate) async fn send(&self, msg: TargetMessage) -> Result<()> {
        Ok(self.sender.clone().send(msg).await?)
    }

    /// Sends the message built by `f` and waits for its reply
    pub(crate) async fn request<T>(&self, f: impl FnOnce(OneshotSender<T>) -> TargetMessage) -> Result<T> {
        let (tx, rx) = oneshot_channel();
        self.send(f(tx)).await?;
        Ok(rx.await?)
    }

    /// Waits for `frame` and its descendants to observe `events`
    pub(crate) fn wait_for_lifecycle(
        &self,
        frame: FrameKey,
        events: Vec<String>,
        timeout: Duration,
    ) -> NavigationFuture {
        NavigationFuture::new(self.sender.clone(), frame, events, timeout)
    }

    pub(crate) fn next_wait_task_id(&self) -> WaitTaskId {
        WaitTaskId(self.next_wait_task.fetch_add(1, Ordering::Relaxed))
    }

    pub fn target_id(&self) -> &TargetId {
        &self.target_id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }
}
