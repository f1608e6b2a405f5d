use std::io;

use async_tungstenite::tungstenite;
use futures::channel::mpsc::SendError;
use futures::channel::oneshot::Canceled;
use thiserror::Error;

use frameoxide_types::MethodId;

pub type Result<T, E = CdpError> = std::result::Result<T, E>;

/// Remote failure text reported when a context id is no longer valid.
pub(crate) const CANNOT_FIND_CONTEXT: &str = "Cannot find context with specified id";
/// Remote failure text reported when the page went away mid evaluation.
pub(crate) const TARGET_NAVIGATED_OR_CLOSED: &str = "Inspected target navigated or closed";
/// Message produced by a rejected in-page promise of a destroyed context.
pub(crate) const CONTEXT_WAS_DESTROYED: &str = "Execution context was destroyed";

#[derive(Debug, Error)]
pub enum CdpError {
    #[error("{0}")]
    Ws(#[from] tungstenite::Error),
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Serde(#[from] serde_json::Error),
    /// The remote end answered a command with an error payload
    #[error("Protocol error ({method}): {message}{}", fmt_data(.data))]
    Protocol {
        method: MethodId,
        message: String,
        data: Option<String>,
    },
    /// The session or connection a command was pending on went away
    #[error("Protocol error ({0}): Target closed.")]
    TargetClosed(MethodId),
    /// A command was addressed to a session that no longer exists
    #[error("Protocol error ({method}): Session closed. Most likely the {target_type} has been closed.")]
    SessionClosed {
        method: MethodId,
        target_type: String,
    },
    #[error("{0}")]
    Timeout(String),
    #[error("waitForFunction failed: frame got detached.")]
    FrameDetached,
    #[error("Execution context was destroyed, most likely because of a navigation.")]
    ContextDestroyed,
    #[error("Evaluation failed: {0}")]
    Evaluation(String),
    /// A frame was attached below a parent that was never announced
    #[error("Parent frame {0} not found")]
    ParentFrameNotFound(String),
    #[error("Received no response from the browser.")]
    NoResponse,
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    ChannelSendError(#[from] ChannelError),
    #[error("{0}")]
    Msg(String),
}

fn fmt_data(data: &Option<String>) -> String {
    data.as_ref().map(|d| format!(" {d}")).unwrap_or_default()
}

impl CdpError {
    pub fn msg(msg: impl Into<String>) -> Self {
        CdpError::Msg(msg.into())
    }

    /// Creates the error for a failed response to `method`
    pub fn protocol(method: MethodId, err: frameoxide_types::Error) -> Self {
        CdpError::Protocol {
            method,
            message: err.message,
            data: err.data,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CdpError::Timeout(_))
    }

    pub fn is_target_closed(&self) -> bool {
        matches!(
            self,
            CdpError::TargetClosed(_) | CdpError::SessionClosed { .. }
        )
    }

    /// Whether this error means the context the operation ran in is gone.
    ///
    /// Matches the typed variant as well as raw remote messages that were not
    /// rewritten yet.
    pub fn is_context_destroyed(&self) -> bool {
        match self {
            CdpError::ContextDestroyed => true,
            CdpError::Protocol { message, .. } | CdpError::Evaluation(message) => {
                message.contains(CANNOT_FIND_CONTEXT)
                    || message.contains(CONTEXT_WAS_DESTROYED)
                    || message.contains(TARGET_NAVIGATED_OR_CLOSED)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Send(#[from] SendError),
    #[error("channel closed")]
    Canceled(#[from] Canceled),
}

impl From<SendError> for CdpError {
    fn from(err: SendError) -> Self {
        ChannelError::from(err).into()
    }
}

impl From<Canceled> for CdpError {
    fn from(err: Canceled) -> Self {
        ChannelError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_message() {
        let err = CdpError::protocol(
            "Runtime.callFunctionOn".into(),
            frameoxide_types::Error {
                code: -32000,
                message: "Object reference chain is too long".to_string(),
                data: None,
            },
        );
        assert_eq!(
            err.to_string(),
            "Protocol error (Runtime.callFunctionOn): Object reference chain is too long"
        );

        let err = CdpError::protocol(
            "Page.navigate".into(),
            frameoxide_types::Error {
                code: -32602,
                message: "Invalid parameters".to_string(),
                data: Some("url: string value expected".to_string()),
            },
        );
        assert_eq!(
            err.to_string(),
            "Protocol error (Page.navigate): Invalid parameters url: string value expected"
        );
    }

    #[test]
    fn closed_errors() {
        let err = CdpError::TargetClosed("Runtime.evaluate".into());
        assert_eq!(
            err.to_string(),
            "Protocol error (Runtime.evaluate): Target closed."
        );
        assert!(err.is_target_closed());

        let err = CdpError::SessionClosed {
            method: "Page.enable".into(),
            target_type: "page".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Protocol error (Page.enable): Session closed. Most likely the page has been closed."
        );
    }

    #[test]
    fn detects_destroyed_context() {
        let err = CdpError::protocol(
            "Runtime.callFunctionOn".into(),
            frameoxide_types::Error {
                code: -32000,
                message: "Cannot find context with specified id".to_string(),
                data: None,
            },
        );
        assert!(err.is_context_destroyed());
        assert!(CdpError::ContextDestroyed.is_context_destroyed());
        assert!(!CdpError::Timeout("x".to_string()).is_context_destroyed());
    }
}
