use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::{unbounded, UnboundedReceiver};
use futures::future::{BoxFuture, Fuse};
use futures::{select, FutureExt, StreamExt};
use futures_timer::Delay;

use crate::context::ExecutionContext;
use crate::element::ElementHandle;
use crate::error::{CdpError, Result};
use crate::handle::JsHandle;
use crate::handler::domworld::WaitTaskSignal;
use crate::handler::execution::ContextInfo;
use crate::handler::target::TargetMessage;
use crate::js::{is_truthy, JsArg, POLL_PREDICATE, WAIT_FOR_PREDICATE};
use crate::world::{Binding, IsolatedWorld};

/// Delay before a predicate that ran ahead of its bindings is tried again
const BINDING_RETRY_DELAY: Duration = Duration::from_millis(50);

/// How often a predicate is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polling {
    /// On every animation frame
    #[default]
    Raf,
    /// On every DOM mutation
    Mutation,
    /// In a fixed interval, must not be zero
    Interval(Duration),
}

impl Polling {
    fn as_str(&self) -> &'static str {
        match self {
            Polling::Raf => "raf",
            Polling::Mutation => "mutation",
            Polling::Interval(_) => "interval",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WaitForFunctionOptions {
    pub polling: Polling,
    /// Falls back to the configured default timeout, zero waits forever
    pub timeout: Option<Duration>,
    /// Scopes the predicate, `document` otherwise
    pub root: Option<ElementHandle>,
    /// Functions exposed to the page while the predicate runs
    pub bindings: Vec<Binding>,
}

impl WaitForFunctionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn polling(mut self, polling: Polling) -> Self {
        self.polling = polling;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn root(mut self, root: ElementHandle) -> Self {
        self.root = Some(root);
        self
    }

    pub fn binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct WaitForSelectorOptions {
    /// Wait for the element to be present and visible
    pub visible: bool,
    /// Wait for the element to be absent or hidden
    pub hidden: bool,
    pub timeout: Option<Duration>,
    pub root: Option<ElementHandle>,
}

impl WaitForSelectorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(mut self) -> Self {
        self.visible = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn root(mut self, root: ElementHandle) -> Self {
        self.root = Some(root);
        self
    }

    /// Visibility depends on layout, presence only on the DOM
    pub(crate) fn polling(&self) -> Polling {
        if self.visible || self.hidden {
            Polling::Raf
        } else {
            Polling::Mutation
        }
    }
}

#[derive(Debug, Clone)]
pub struct SetContentOptions {
    /// Lifecycle events the frame and its children must observe
    pub wait_until: Vec<String>,
    /// Falls back to the navigation timeout, zero waits forever
    pub timeout: Option<Duration>,
}

impl Default for SetContentOptions {
    fn default() -> Self {
        Self {
            wait_until: vec!["load".to_string()],
            timeout: None,
        }
    }
}

impl SetContentOptions {
    pub fn wait_until<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wait_until = events.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A predicate that is polled in a world until it is truthy.
///
/// The task is registered with the world on the handler side, which reruns
/// it whenever the world gets a new context and terminates it when the frame
/// is detached.
pub(crate) struct WaitTask {
    pub world: IsolatedWorld,
    pub title: String,
    pub predicate_body: String,
    /// Whether the predicate is called with the root as first argument
    pub accepts_root: bool,
    pub polling: Polling,
    pub timeout: Duration,
    pub root: Option<ElementHandle>,
    pub args: Vec<JsArg>,
    pub bindings: Vec<Binding>,
}

impl WaitTask {
    pub async fn run(self) -> Result<JsHandle> {
        if self.polling == Polling::Interval(Duration::ZERO) {
            return Err(CdpError::msg("Cannot poll with non-positive interval"));
        }
        let page = Arc::clone(self.world.page());
        let (frame, world) = (self.world.frame_key(), self.world.kind());
        let id = page.next_wait_task_id();
        let (signals_tx, mut signals) = unbounded();
        page.send(TargetMessage::AddWaitTask {
            frame,
            world,
            id,
            bindings: self.bindings.clone(),
            signals: signals_tx,
        })
        .await?;

        let res = self.drive(&mut signals).await;
        let _ = page
            .send(TargetMessage::RemoveWaitTask { frame, world, id })
            .await;
        res
    }

    async fn drive(&self, signals: &mut UnboundedReceiver<WaitTaskSignal>) -> Result<JsHandle> {
        let deadline: Pin<Box<dyn Future<Output = ()> + Send>> = if self.timeout.is_zero() {
            Box::pin(futures::future::pending())
        } else {
            Box::pin(Delay::new(self.timeout))
        };
        let mut deadline = deadline.fuse();
        let mut current: Option<ContextInfo> = None;
        // bindings are retried once per context, a failed setup is not repeated
        let mut binding_retried = false;
        let mut run: Fuse<BoxFuture<'_, Result<Option<JsHandle>>>> = Fuse::terminated();

        loop {
            select! {
                _ = deadline => {
                    return Err(CdpError::Timeout(format!(
                        "waiting for {} failed: timeout {}ms exceeded",
                        self.title,
                        self.timeout.as_millis()
                    )));
                }
                signal = signals.next() => match signal {
                    Some(WaitTaskSignal::Rerun(info)) => {
                        tracing::trace!("rerunning wait task for {} in context {:?}", self.title, info.context_id());
                        current = Some(info.clone());
                        binding_retried = false;
                        run = self.run_in(info).boxed().fuse();
                    }
                    Some(WaitTaskSignal::Terminate(err)) => return Err(err),
                    None => return Err(CdpError::FrameDetached),
                },
                res = run => match res {
                    Ok(Some(handle)) => return Ok(handle),
                    // the in page timeout elapsed
                    Ok(None) => {}
                    Err(err) if err.is_context_destroyed() => {}
                    Err(err) if self.is_missing_binding(&err) => match current.clone() {
                        Some(info) if !binding_retried => {
                            binding_retried = true;
                            run = async move {
                                Delay::new(BINDING_RETRY_DELAY).await;
                                self.run_in(info).await
                            }
                            .boxed()
                            .fuse();
                        }
                        _ => tracing::debug!(
                            "bindings of wait task for {} are unavailable, waiting for the next context: {}",
                            self.title,
                            err
                        ),
                    },
                    Err(err) => return Err(err),
                },
            }
        }
    }

    /// The predicate ran before one of its bindings was wired
    fn is_missing_binding(&self, err: &CdpError) -> bool {
        match err {
            CdpError::Evaluation(msg) => self
                .bindings
                .iter()
                .any(|b| msg.contains(&format!("{} is not a function", b.name()))),
            _ => false,
        }
    }

    async fn run_in(&self, info: ContextInfo) -> Result<Option<JsHandle>> {
        let utility = match info.utility.clone() {
            Some(utility) => JsArg::ObjectId(utility),
            None => return Ok(None),
        };
        let context = ExecutionContext::new(info, Arc::clone(self.world.page()));
        for binding in &self.bindings {
            self.world
                .add_binding_to_context(binding.name(), context.id())
                .await?;
        }
        let root = match self.root {
            Some(ref root) => root.handle().to_arg(),
            None => JsArg::Value(serde_json::Value::Null),
        };

        match self.polling {
            Polling::Interval(interval) => loop {
                let mut args = vec![
                    utility.clone(),
                    root.clone(),
                    JsArg::from(self.predicate_body.as_str()),
                    JsArg::from(self.accepts_root),
                ];
                args.extend(self.args.iter().cloned());
                let object = context.call_function(POLL_PREDICATE, args, false).await?;
                if is_truthy(&object) {
                    return Ok(Some(context.handle(object)));
                }
                Delay::new(interval).await;
            },
            Polling::Raf | Polling::Mutation => {
                let mut args = vec![
                    utility,
                    JsArg::from(self.polling.as_str()),
                    JsArg::from(self.timeout.as_millis() as i64),
                    root,
                    JsArg::from(self.predicate_body.as_str()),
                    JsArg::from(self.accepts_root),
                ];
                args.extend(self.args.iter().cloned());
                let object = context
                    .call_function(WAIT_FOR_PREDICATE, args, false)
                    .await?;
                if is_truthy(&object) {
                    Ok(Some(context.handle(object)))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_polling_follows_visibility() {
        assert_eq!(WaitForSelectorOptions::new().polling(), Polling::Mutation);
        assert_eq!(WaitForSelectorOptions::new().visible().polling(), Polling::Raf);
        assert_eq!(WaitForSelectorOptions::new().hidden().polling(), Polling::Raf);
    }

    #[test]
    fn set_content_waits_for_load() {
        let options = SetContentOptions::default();
        assert_eq!(options.wait_until, vec!["load".to_string()]);
        let options = options.wait_until(["DOMContentLoaded"]);
        assert_eq!(options.wait_until, vec!["DOMContentLoaded".to_string()]);
    }
}
