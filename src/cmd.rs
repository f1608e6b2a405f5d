use std::collections::VecDeque;
use std::iter::FromIterator;
use std::task::Poll;

use futures::channel::oneshot::Sender as OneshotSender;
use serde::Serialize;

use frameoxide_types::{Command, CommandResponse, Method, MethodId, Request, Response, SessionId};

use crate::error::{CdpError, Result};

/// Deserialize a response
pub(crate) fn to_command_response<T: Command>(
    resp: Response,
    method: MethodId,
) -> Result<CommandResponse<T::Response>> {
    if let Some(res) = resp.result {
        let result = serde_json::from_value(res)?;
        Ok(CommandResponse {
            id: resp.id,
            result,
            method,
        })
    } else if let Some(err) = resp.error {
        Err(CdpError::protocol(method, err))
    } else {
        Err(CdpError::NoResponse)
    }
}

/// Converts the raw response into either its json payload or the error the
/// browser reported for `method`
pub(crate) fn response_result(resp: Response, method: &MethodId) -> Result<serde_json::Value> {
    if let Some(err) = resp.error {
        Err(CdpError::protocol(method.clone(), err))
    } else {
        Ok(resp.result.unwrap_or(serde_json::Value::Null))
    }
}

/// Messages used internally to communicate with the connection, which is
/// executed in the the background task.
#[derive(Debug, Serialize)]
pub(crate) struct CommandMessage<T = Result<Response>> {
    pub method: MethodId,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub params: serde_json::Value,
    #[serde(skip_serializing)]
    pub sender: OneshotSender<T>,
}

impl<T> CommandMessage<T> {
    pub fn new<C: Command>(cmd: C, sender: OneshotSender<T>) -> serde_json::Result<Self> {
        Ok(Self {
            method: cmd.identifier(),
            session_id: None,
            params: serde_json::to_value(cmd)?,
            sender,
        })
    }

    pub fn with_session<C: Command>(
        cmd: C,
        sender: OneshotSender<T>,
        session_id: Option<SessionId>,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            method: cmd.identifier(),
            session_id,
            params: serde_json::to_value(cmd)?,
            sender,
        })
    }

    pub fn split(self) -> (Request, OneshotSender<T>) {
        (
            Request {
                method: self.method,
                session_id: self.session_id.map(Into::into),
                params: self.params,
            },
            self.sender,
        )
    }
}

impl<T> Method for CommandMessage<T> {
    fn identifier(&self) -> MethodId {
        self.method.clone()
    }
}

/// A sequence of requests where each one is only issued after the response to
/// the previous one arrived.
#[derive(Debug, Default)]
pub(crate) struct CommandChain {
    /// The commands to process
    cmds: VecDeque<Request>,
    /// The last issued command we currently waiting for its completion
    waiting: Option<MethodId>,
}

impl CommandChain {
    /// Creates a new `CommandChain` from an `Iterator`.
    ///
    /// The order of the commands corresponds to the iterator
    pub fn new<I>(cmds: I) -> Self
    where
        I: IntoIterator<Item = Request>,
    {
        Self {
            cmds: VecDeque::from_iter(cmds),
            waiting: None,
        }
    }

    /// queue in another request
    pub fn push_back(&mut self, req: Request) {
        self.cmds.push_back(req)
    }

    /// Removes the waiting state if the identifier matches that of the last
    /// issued command
    pub fn received_response(&mut self, identifier: &str) -> bool {
        if self.waiting.as_deref() == Some(identifier) {
            self.waiting.take();
            true
        } else {
            false
        }
    }

    /// Return the next command to process or `None` if done
    pub fn poll(&mut self) -> Poll<Option<Request>> {
        if self.waiting.is_some() {
            return Poll::Pending;
        }
        match self.cmds.pop_front() {
            Some(req) => {
                self.waiting = Some(req.method.clone());
                Poll::Ready(Some(req))
            }
            None => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frameoxide_types::{CallId, Error};

    #[test]
    fn chain_waits_for_each_response() {
        let mut chain = CommandChain::new(vec![
            Request::new("Page.enable".into(), serde_json::json!({})),
            Request::new("Page.getFrameTree".into(), serde_json::json!({})),
        ]);
        let first = match chain.poll() {
            Poll::Ready(Some(req)) => req,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(first.method, "Page.enable");
        assert!(chain.poll().is_pending());
        assert!(!chain.received_response("Runtime.enable"));
        assert!(chain.received_response("Page.enable"));

        chain.push_back(Request::new("Runtime.enable".into(), serde_json::json!({})));
        assert!(matches!(chain.poll(), Poll::Ready(Some(r)) if r.method == "Page.getFrameTree"));
        assert!(chain.received_response("Page.getFrameTree"));
        assert!(matches!(chain.poll(), Poll::Ready(Some(r)) if r.method == "Runtime.enable"));
        assert!(chain.received_response("Runtime.enable"));
        assert!(matches!(chain.poll(), Poll::Ready(None)));
    }

    #[test]
    fn error_response_carries_method() {
        let resp = Response {
            id: CallId::new(1),
            session_id: None,
            result: None,
            error: Some(Error {
                code: -32000,
                message: "Session with given id not found.".to_string(),
                data: None,
            }),
        };
        let err = response_result(resp, &"Page.enable".into()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Protocol error (Page.enable): Session with given id not found."
        );
    }
}
