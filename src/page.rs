use std::sync::Arc;

use futures::channel::mpsc::unbounded;

use frameoxide_types::page::FrameId;
use frameoxide_types::runtime::ExecutionContextId;
use frameoxide_types::target::{SessionId, TargetId};
use frameoxide_types::{Command, CommandResponse, MethodId};

use crate::cdp::CdpEventMessage;
use crate::element::ElementHandle;
use crate::error::{CdpError, Result};
use crate::frame::Frame;
use crate::handle::JsHandle;
use crate::handler::domworld::DOMWorldKind;
use crate::handler::page::PageInner;
use crate::handler::target::TargetMessage;
use crate::js::{Evaluation, EvaluationResult};
use crate::subscribe::EventStream;
use crate::waittask::{SetContentOptions, WaitForFunctionOptions, WaitForSelectorOptions};

/// Changes of a page's frames and their execution contexts
#[derive(Debug, Clone)]
pub enum PageEvent {
    FrameAttached(Frame),
    FrameNavigated(Frame),
    FrameNavigatedWithinDocument(Frame),
    FrameDetached(Frame),
    /// The frame moved to another process, it is attached again shortly
    FrameSwapped(Frame),
    Lifecycle {
        frame: Frame,
        name: String,
    },
    ExecutionContextCreated(ExecutionContextEvent),
    ExecutionContextDestroyed(ExecutionContextEvent),
}

#[derive(Debug, Clone)]
pub struct ExecutionContextEvent {
    pub session_id: SessionId,
    pub context_id: ExecutionContextId,
    /// Only known on creation
    pub name: Option<String>,
    /// The frame whose world this context is, if any
    pub frame: Option<Frame>,
    pub world: Option<DOMWorldKind>,
}

#[derive(Debug, Clone)]
pub struct Page {
    inner: Arc<PageInner>,
}

impl Page {
    /// Execute a command and return the `Command::Response`
    pub async fn execute<T: Command>(&self, cmd: T) -> Result<CommandResponse<T::Response>> {
        self.inner.execute(cmd).await
    }

    /// The identifier of the `Target` this page belongs to
    pub fn target_id(&self) -> &TargetId {
        self.inner.target_id()
    }

    /// The identifier of the `Session` target of this page is attached to
    pub fn session_id(&self) -> &SessionId {
        self.inner.session_id()
    }

    fn frame_of(&self, key: crate::handler::frame::FrameKey) -> Frame {
        Frame::new(key, Arc::clone(&self.inner))
    }

    /// The top level frame of this page
    pub async fn main_frame(&self) -> Result<Frame> {
        self.inner
            .request(TargetMessage::MainFrame)
            .await?
            .map(|key| self.frame_of(key))
            .ok_or(CdpError::NotFound)
    }

    /// All frames of this page, including the ones of out of process iframes
    pub async fn frames(&self) -> Result<Vec<Frame>> {
        Ok(self
            .inner
            .request(TargetMessage::Frames)
            .await?
            .into_iter()
            .map(|key| self.frame_of(key))
            .collect())
    }

    /// The frame that currently has the id `id`
    pub async fn frame(&self, id: impl Into<FrameId>) -> Result<Option<Frame>> {
        let id = id.into();
        Ok(self
            .inner
            .request(|tx| TargetMessage::FrameById(id, tx))
            .await?
            .map(|key| self.frame_of(key)))
    }

    /// Stream of [`PageEvent`]s
    pub async fn event_listener(&self) -> Result<EventStream<PageEvent>> {
        let (tx, rx) = unbounded();
        self.inner.send(TargetMessage::AddEventListener(tx)).await?;
        Ok(EventStream::new(rx))
    }

    /// Stream of the raw events named `method` of this page's sessions
    pub async fn subscribe(&self, method: impl Into<MethodId>) -> Result<EventStream<Arc<CdpEventMessage>>> {
        let (tx, rx) = unbounded();
        self.inner
            .send(TargetMessage::Subscribe(method.into(), tx))
            .await?;
        Ok(EventStream::new(rx))
    }

    pub async fn evaluate(&self, evaluation: impl Into<Evaluation>) -> Result<EvaluationResult> {
        self.main_frame().await?.evaluate(evaluation).await
    }

    pub async fn evaluate_handle(&self, evaluation: impl Into<Evaluation>) -> Result<JsHandle> {
        self.main_frame().await?.evaluate_handle(evaluation).await
    }

    pub async fn query_selector(&self, selector: impl Into<String>) -> Result<Option<ElementHandle>> {
        self.main_frame().await?.query_selector(selector).await
    }

    pub async fn query_selector_all(&self, selector: impl Into<String>) -> Result<Vec<ElementHandle>> {
        self.main_frame().await?.query_selector_all(selector).await
    }

    pub async fn xpath(&self, expression: impl Into<String>) -> Result<Vec<ElementHandle>> {
        self.main_frame().await?.xpath(expression).await
    }

    pub async fn wait_for_selector(
        &self,
        selector: impl Into<String>,
        options: WaitForSelectorOptions,
    ) -> Result<Option<ElementHandle>> {
        self.main_frame()
            .await?
            .wait_for_selector(selector, options)
            .await
    }

    pub async fn wait_for_xpath(
        &self,
        xpath: impl Into<String>,
        options: WaitForSelectorOptions,
    ) -> Result<Option<ElementHandle>> {
        self.main_frame()
            .await?
            .wait_for_xpath(xpath, options)
            .await
    }

    pub async fn wait_for_function(
        &self,
        predicate: impl Into<Evaluation>,
        options: WaitForFunctionOptions,
    ) -> Result<JsHandle> {
        self.main_frame()
            .await?
            .wait_for_function(predicate, options)
            .await
    }

    /// The html of the main frame
    pub async fn content(&self) -> Result<String> {
        self.main_frame().await?.content().await
    }

    pub async fn set_content(&self, html: impl Into<String>, options: SetContentOptions) -> Result<()> {
        self.main_frame().await?.set_content(html, options).await
    }

    pub async fn title(&self) -> Result<String> {
        self.main_frame().await?.title().await
    }

    pub async fn focus(&self, selector: impl Into<String>) -> Result<()> {
        self.main_frame().await?.focus(selector).await
    }

    pub async fn select<I, S>(&self, selector: impl Into<String>, values: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.main_frame().await?.select(selector, values).await
    }
}

impl From<Arc<PageInner>> for Page {
    fn from(inner: Arc<PageInner>) -> Self {
        Self { inner }
    }
}
