use std::sync::Arc;

use frameoxide_types::runtime::{
    CallFunctionOnParams, EvaluateParams, ExecutionContextId, RemoteObject,
};
use frameoxide_types::SessionId;

use crate::error::{
    CdpError, Result, CANNOT_FIND_CONTEXT, TARGET_NAVIGATED_OR_CLOSED,
};
use crate::handle::JsHandle;
use crate::handler::domworld::DOMWorldKind;
use crate::handler::execution::ContextInfo;
use crate::handler::page::PageInner;
use crate::js::{Evaluation, EvaluationResult, JsArg};
use crate::utils::{exception_message, with_source_url};

/// A javascript execution context of a frame's world.
///
/// Contexts are replaced on every navigation, a context that went away
/// fails all evaluations with [`CdpError::ContextDestroyed`].
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    info: ContextInfo,
    page: Arc<PageInner>,
}

impl ExecutionContext {
    pub(crate) fn new(info: ContextInfo, page: Arc<PageInner>) -> Self {
        Self { info, page }
    }

    pub fn id(&self) -> ExecutionContextId {
        self.info.context_id
    }

    /// The session the context lives in, differs from the page's session for
    /// out of process frames
    pub fn session_id(&self) -> &SessionId {
        &self.info.session_id
    }

    pub fn world(&self) -> DOMWorldKind {
        self.info.world
    }

    pub(crate) fn info(&self) -> &ContextInfo {
        &self.info
    }

    pub(crate) fn page(&self) -> &Arc<PageInner> {
        &self.page
    }

    /// Evaluates the expression or function and returns its value.
    ///
    /// Results that can't be serialized, like DOM nodes, evaluate to
    /// `undefined`.
    pub async fn evaluate(&self, evaluation: impl Into<Evaluation>) -> Result<EvaluationResult> {
        let object = self.evaluate_object(evaluation.into(), true).await?;
        Ok(EvaluationResult::new(object))
    }

    /// Evaluates the expression or function and returns a handle to the
    /// resulting object.
    pub async fn evaluate_handle(&self, evaluation: impl Into<Evaluation>) -> Result<JsHandle> {
        let object = self.evaluate_object(evaluation.into(), false).await?;
        Ok(self.handle(object))
    }

    pub(crate) fn handle(&self, object: RemoteObject) -> JsHandle {
        JsHandle::new(self.clone(), object)
    }

    pub(crate) async fn evaluate_object(
        &self,
        evaluation: Evaluation,
        return_by_value: bool,
    ) -> Result<RemoteObject> {
        match evaluation {
            Evaluation::Expression(expr) => self.evaluate_expression(expr, return_by_value).await,
            Evaluation::Function(fun) => {
                let (declaration, args) = fun.into_parts();
                self.call_function(&declaration, args, return_by_value)
                    .await
            }
        }
    }

    async fn evaluate_expression(&self, expr: String, return_by_value: bool) -> Result<RemoteObject> {
        let params = EvaluateParams::new(with_source_url(expr))
            .context_id(self.id())
            .return_by_value(return_by_value)
            .await_promise(true)
            .user_gesture(true);
        let resp = match self
            .page
            .execute_in(params, Some(self.info.session_id.clone()))
            .await
        {
            Ok(resp) => resp,
            Err(err) => return rewrite_error(err),
        };
        if let Some(ref details) = resp.exception_details {
            return Err(CdpError::Evaluation(exception_message(details)));
        }
        Ok(resp.result.result)
    }

    /// Calls `declaration` with `args` in this context
    pub(crate) async fn call_function(
        &self,
        declaration: &str,
        args: Vec<JsArg>,
        return_by_value: bool,
    ) -> Result<RemoteObject> {
        let arguments = args
            .into_iter()
            .map(|arg| arg.into_call_argument(&self.info.session_id, self.id()))
            .collect::<Result<Vec<_>>>()?;
        let mut params = CallFunctionOnParams::new(with_source_url(declaration));
        params.execution_context_id = Some(self.id());
        params.arguments = Some(arguments);
        params.return_by_value = Some(return_by_value);
        params.await_promise = Some(true);
        params.user_gesture = Some(true);

        let resp = match self
            .page
            .execute_in(params, Some(self.info.session_id.clone()))
            .await
        {
            Ok(resp) => resp,
            Err(err) => return rewrite_error(err),
        };
        if let Some(ref details) = resp.exception_details {
            return Err(CdpError::Evaluation(exception_message(details)));
        }
        Ok(resp.result.result)
    }
}

impl PartialEq for ExecutionContext {
    fn eq(&self, other: &Self) -> bool {
        self.info.session_id == other.info.session_id && self.info.context_id == other.info.context_id
    }
}

/// Remote failures that have a better meaning for callers
fn rewrite_error(err: CdpError) -> Result<RemoteObject> {
    if let CdpError::Protocol { ref message, .. } = err {
        if message.contains("Object reference chain is too long")
            || message.contains("Object couldn't be returned by value")
        {
            return Ok(RemoteObject::undefined());
        }
        if message.contains(CANNOT_FIND_CONTEXT) || message.contains(TARGET_NAVIGATED_OR_CLOSED) {
            return Err(CdpError::ContextDestroyed);
        }
    }
    Err(err)
}
