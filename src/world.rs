use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use frameoxide_types::runtime::ExecutionContextId;

use crate::context::ExecutionContext;
use crate::element::ElementHandle;
use crate::error::{CdpError, Result};
use crate::handle::JsHandle;
use crate::handler::domworld::DOMWorldKind;
use crate::handler::execution::ContextInfo;
use crate::handler::frame::FrameKey;
use crate::handler::page::PageInner;
use crate::handler::target::TargetMessage;
use crate::js::{self, Evaluation, EvaluationResult, JsArg, JsFunction};
use crate::waittask::{SetContentOptions, WaitForFunctionOptions, WaitForSelectorOptions, WaitTask};

type BindingFn = dyn Fn(Vec<serde_json::Value>) -> std::result::Result<serde_json::Value, String>
    + Send
    + Sync;

/// A function exposed to the page under `name`.
///
/// Calls from the page are answered with the returned value, or rejected with
/// the returned message.
#[derive(Clone)]
pub struct Binding {
    name: String,
    fun: Arc<BindingFn>,
}

impl Binding {
    pub fn new<F>(name: impl Into<String>, fun: F) -> Self
    where
        F: Fn(Vec<serde_json::Value>) -> std::result::Result<serde_json::Value, String>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            fun: Arc::new(fun),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: Vec<serde_json::Value>) -> std::result::Result<serde_json::Value, String> {
        (self.fun)(args)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").field("name", &self.name).finish()
    }
}

/// One of the two worlds of a frame.
///
/// A world always has at most one execution context, which is replaced on
/// navigation. Everything that runs in a world waits for its current context.
#[derive(Debug, Clone)]
pub struct IsolatedWorld {
    frame: FrameKey,
    kind: DOMWorldKind,
    page: Arc<PageInner>,
}

impl IsolatedWorld {
    pub(crate) fn new(frame: FrameKey, kind: DOMWorldKind, page: Arc<PageInner>) -> Self {
        Self { frame, kind, page }
    }

    pub fn kind(&self) -> DOMWorldKind {
        self.kind
    }

    pub(crate) fn frame_key(&self) -> FrameKey {
        self.frame
    }

    pub(crate) fn page(&self) -> &Arc<PageInner> {
        &self.page
    }

    pub(crate) async fn context_info(&self) -> Result<ContextInfo> {
        let (frame, world) = (self.frame, self.kind);
        self.page
            .request(|tx| TargetMessage::ExecutionContext { frame, world, tx })
            .await?
    }

    /// The current execution context, waits until there is one
    pub async fn execution_context(&self) -> Result<ExecutionContext> {
        let info = self.context_info().await?;
        Ok(ExecutionContext::new(info, Arc::clone(&self.page)))
    }

    /// Wires `name` into the context `context_id`, returns once it is present
    pub(crate) async fn add_binding_to_context(
        &self,
        name: impl Into<String>,
        context_id: ExecutionContextId,
    ) -> Result<()> {
        let (frame, world, name) = (self.frame, self.kind, name.into());
        self.page
            .request(|tx| TargetMessage::AddBinding {
                frame,
                world,
                name,
                context_id,
                tx,
            })
            .await
    }

    pub async fn evaluate(&self, evaluation: impl Into<Evaluation>) -> Result<EvaluationResult> {
        self.execution_context().await?.evaluate(evaluation).await
    }

    pub async fn evaluate_handle(&self, evaluation: impl Into<Evaluation>) -> Result<JsHandle> {
        self.execution_context()
            .await?
            .evaluate_handle(evaluation)
            .await
    }

    /// The `document` of this world
    pub async fn document(&self) -> Result<ElementHandle> {
        self.evaluate_handle("document")
            .await?
            .as_element()
            .ok_or(CdpError::NotFound)
    }

    pub async fn query_selector(&self, selector: impl Into<String>) -> Result<Option<ElementHandle>> {
        let document = self.document().await?;
        document.query_selector(selector).await
    }

    pub async fn query_selector_all(&self, selector: impl Into<String>) -> Result<Vec<ElementHandle>> {
        let document = self.document().await?;
        document.query_selector_all(selector).await
    }

    pub async fn xpath(&self, expression: impl Into<String>) -> Result<Vec<ElementHandle>> {
        let document = self.document().await?;
        document.xpath(expression).await
    }

    /// Polls `predicate` in this world until it returns a truthy value.
    ///
    /// The predicate is rerun in every new context of the world, a detached
    /// frame fails the wait.
    pub async fn wait_for_function(
        &self,
        predicate: impl Into<Evaluation>,
        options: WaitForFunctionOptions,
    ) -> Result<JsHandle> {
        let (body, args) = match predicate.into() {
            Evaluation::Expression(expr) => (format!("() => ({expr})"), Vec::new()),
            Evaluation::Function(fun) => fun.into_parts(),
        };
        let timeout = options.timeout.unwrap_or(self.page.default_timeout());
        WaitTask {
            world: self.clone(),
            title: "function".to_string(),
            predicate_body: body,
            accepts_root: false,
            polling: options.polling,
            timeout,
            root: options.root,
            args,
            bindings: options.bindings,
        }
        .run()
        .await
    }

    pub async fn wait_for_selector(
        &self,
        selector: impl Into<String>,
        options: WaitForSelectorOptions,
    ) -> Result<Option<ElementHandle>> {
        self.wait_for_selector_in_page(js::SELECTOR_PREDICATE, "selector", selector.into(), options)
            .await
    }

    pub async fn wait_for_xpath(
        &self,
        xpath: impl Into<String>,
        options: WaitForSelectorOptions,
    ) -> Result<Option<ElementHandle>> {
        self.wait_for_selector_in_page(js::XPATH_PREDICATE, "XPath", xpath.into(), options)
            .await
    }

    async fn wait_for_selector_in_page(
        &self,
        predicate: &str,
        kind: &str,
        selector: String,
        options: WaitForSelectorOptions,
    ) -> Result<Option<ElementHandle>> {
        let title = format!(
            "{} `{}`{}",
            kind,
            selector,
            if options.hidden {
                " to be hidden"
            } else if options.visible {
                " to be visible"
            } else {
                ""
            }
        );
        let polling = options.polling();
        let timeout = options.timeout.unwrap_or(self.page.default_timeout());
        let task = WaitTask {
            world: self.clone(),
            title,
            predicate_body: predicate.to_string(),
            accepts_root: true,
            polling,
            timeout,
            root: options.root,
            args: vec![
                JsArg::from(selector.clone()),
                JsArg::from(options.visible),
                JsArg::from(options.hidden),
            ],
            bindings: Vec::new(),
        };
        match task.run().await {
            Ok(handle) => {
                let element = handle.as_element();
                if element.is_none() {
                    handle.dispose().await?;
                }
                Ok(element)
            }
            Err(err @ (CdpError::Timeout(_) | CdpError::FrameDetached)) => Err(err),
            Err(err) => Err(CdpError::msg(format!(
                "Waiting for {kind} `{selector}` failed: {err}"
            ))),
        }
    }

    /// The full html of the document, including the doctype
    pub async fn content(&self) -> Result<String> {
        Ok(self
            .evaluate(JsFunction::new(js::CONTENT))
            .await?
            .into_value()?)
    }

    /// Replaces the document and waits for the requested lifecycle events
    pub async fn set_content(&self, html: impl Into<String>, options: SetContentOptions) -> Result<()> {
        self.evaluate(JsFunction::new(js::SET_CONTENT).arg(html.into()))
            .await?;
        let timeout = options
            .timeout
            .unwrap_or(self.page.navigation_timeout());
        self.page
            .wait_for_lifecycle(self.frame, options.wait_until, timeout)
            .await
    }

    pub async fn title(&self) -> Result<String> {
        Ok(self
            .evaluate(JsFunction::new(js::TITLE))
            .await?
            .into_value()?)
    }

    /// Focuses the first element matching `selector`
    pub async fn focus(&self, selector: impl Into<String>) -> Result<()> {
        let selector = selector.into();
        let element = self
            .query_selector(selector.as_str())
            .await?
            .ok_or_else(|| CdpError::msg(format!("No node found for selector: {selector}")))?;
        let res = element.focus().await;
        element.dispose().await?;
        res
    }

    /// Selects options of the first `<select>` matching `selector`
    pub async fn select<I, S>(&self, selector: impl Into<String>, values: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let selector = selector.into();
        let element = self
            .query_selector(selector.as_str())
            .await?
            .ok_or_else(|| CdpError::msg(format!("No node found for selector: {selector}")))?;
        let res = element.select(values).await;
        element.dispose().await?;
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binding_calls_the_closure() {
        let add = Binding::new("add", |args| {
            let sum: i64 = args.iter().filter_map(|v| v.as_i64()).sum();
            Ok(json!(sum))
        });
        assert_eq!(add.name(), "add");
        assert_eq!(add.call(vec![json!(1), json!(2)]), Ok(json!(3)));
        assert_eq!(format!("{add:?}"), "Binding { name: \"add\" }");

        let fail = Binding::new("fail", |_| Err("nope".to_string()));
        assert_eq!(fail.call(Vec::new()), Err("nope".to_string()));
    }
}
