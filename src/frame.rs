use std::sync::Arc;

use frameoxide_types::page::FrameId;

use crate::context::ExecutionContext;
use crate::element::ElementHandle;
use crate::error::{CdpError, Result};
use crate::handle::JsHandle;
use crate::handler::domworld::DOMWorldKind;
use crate::handler::frame::{FrameInfo, FrameKey};
use crate::handler::page::PageInner;
use crate::handler::target::TargetMessage;
use crate::js::{Evaluation, EvaluationResult};
use crate::waittask::{SetContentOptions, WaitForFunctionOptions, WaitForSelectorOptions};
use crate::world::IsolatedWorld;

/// A frame of a page.
///
/// The handle stays valid across navigations, even if the frame's id changes.
/// Once the frame is detached all operations fail with
/// [`CdpError::FrameDetached`].
#[derive(Debug, Clone)]
pub struct Frame {
    key: FrameKey,
    page: Arc<PageInner>,
}

impl Frame {
    pub(crate) fn new(key: FrameKey, page: Arc<PageInner>) -> Self {
        Self { key, page }
    }

    /// The stable identity of this frame within its page
    pub fn key(&self) -> FrameKey {
        self.key
    }

    /// A snapshot of the frame's current state
    pub async fn info(&self) -> Result<FrameInfo> {
        let key = self.key;
        self.page
            .request(|tx| TargetMessage::FrameInfo(key, tx))
            .await?
            .ok_or(CdpError::FrameDetached)
    }

    pub async fn id(&self) -> Result<FrameId> {
        Ok(self.info().await?.id)
    }

    pub async fn url(&self) -> Result<String> {
        Ok(self.info().await?.url)
    }

    pub async fn name(&self) -> Result<Option<String>> {
        Ok(self.info().await?.name)
    }

    pub async fn is_detached(&self) -> Result<bool> {
        let key = self.key;
        Ok(self
            .page
            .request(|tx| TargetMessage::FrameInfo(key, tx))
            .await?
            .is_none())
    }

    pub async fn parent_frame(&self) -> Result<Option<Frame>> {
        let key = self.key;
        Ok(self
            .page
            .request(|tx| TargetMessage::ParentFrame(key, tx))
            .await?
            .map(|key| Frame::new(key, Arc::clone(&self.page))))
    }

    pub async fn child_frames(&self) -> Result<Vec<Frame>> {
        let key = self.key;
        Ok(self
            .page
            .request(|tx| TargetMessage::ChildFrames(key, tx))
            .await?
            .into_iter()
            .map(|key| Frame::new(key, Arc::clone(&self.page)))
            .collect())
    }

    /// The world of the page's own scripts
    pub fn main_world(&self) -> IsolatedWorld {
        IsolatedWorld::new(self.key, DOMWorldKind::Main, Arc::clone(&self.page))
    }

    /// The isolated world page scripts can't observe
    pub fn secondary_world(&self) -> IsolatedWorld {
        IsolatedWorld::new(self.key, DOMWorldKind::Secondary, Arc::clone(&self.page))
    }

    /// The current context of the main world
    pub async fn execution_context(&self) -> Result<ExecutionContext> {
        self.main_world().execution_context().await
    }

    pub async fn evaluate(&self, evaluation: impl Into<Evaluation>) -> Result<EvaluationResult> {
        self.main_world().evaluate(evaluation).await
    }

    pub async fn evaluate_handle(&self, evaluation: impl Into<Evaluation>) -> Result<JsHandle> {
        self.main_world().evaluate_handle(evaluation).await
    }

    pub async fn query_selector(&self, selector: impl Into<String>) -> Result<Option<ElementHandle>> {
        self.main_world().query_selector(selector).await
    }

    pub async fn query_selector_all(&self, selector: impl Into<String>) -> Result<Vec<ElementHandle>> {
        self.main_world().query_selector_all(selector).await
    }

    pub async fn xpath(&self, expression: impl Into<String>) -> Result<Vec<ElementHandle>> {
        self.main_world().xpath(expression).await
    }

    /// Waits for an element matching `selector`, resolves with `None` if
    /// waiting for it to be hidden succeeded because there is no match.
    pub async fn wait_for_selector(
        &self,
        selector: impl Into<String>,
        options: WaitForSelectorOptions,
    ) -> Result<Option<ElementHandle>> {
        self.main_world()
            .wait_for_selector(selector, options)
            .await
    }

    pub async fn wait_for_xpath(
        &self,
        xpath: impl Into<String>,
        options: WaitForSelectorOptions,
    ) -> Result<Option<ElementHandle>> {
        self.main_world().wait_for_xpath(xpath, options).await
    }

    pub async fn wait_for_function(
        &self,
        predicate: impl Into<Evaluation>,
        options: WaitForFunctionOptions,
    ) -> Result<JsHandle> {
        self.main_world()
            .wait_for_function(predicate, options)
            .await
    }

    pub async fn content(&self) -> Result<String> {
        self.secondary_world().content().await
    }

    pub async fn set_content(&self, html: impl Into<String>, options: SetContentOptions) -> Result<()> {
        self.secondary_world().set_content(html, options).await
    }

    pub async fn title(&self) -> Result<String> {
        self.secondary_world().title().await
    }

    pub async fn focus(&self, selector: impl Into<String>) -> Result<()> {
        self.secondary_world().focus(selector).await
    }

    pub async fn select<I, S>(&self, selector: impl Into<String>, values: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secondary_world().select(selector, values).await
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.page.target_id() == other.page.target_id()
    }
}

impl Eq for Frame {}
