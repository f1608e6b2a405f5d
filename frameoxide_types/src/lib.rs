use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Identifier of a protocol method, like `Page.enable`
pub type MethodId = Cow<'static, str>;

/// Implements `Method` and `Command` for a params type.
macro_rules! protocol_command {
    ($params:ty => $returns:ty, $id:literal) => {
        impl $params {
            pub const IDENTIFIER: &'static str = $id;
        }
        impl $crate::Method for $params {
            fn identifier(&self) -> $crate::MethodId {
                Self::IDENTIFIER.into()
            }
        }
        impl $crate::Command for $params {
            type Response = $returns;
        }
    };
}

/// Attaches the method identifier to an event payload.
macro_rules! protocol_event {
    ($event:ty, $id:literal) => {
        impl $event {
            pub const IDENTIFIER: &'static str = $id;
        }
        impl $crate::Method for $event {
            fn identifier(&self) -> $crate::MethodId {
                Self::IDENTIFIER.into()
            }
        }
    };
}

pub(crate) use {protocol_command, protocol_event};

pub mod page;
pub mod runtime;
pub mod target;

pub use target::SessionId;

/// A Message sent by the client
#[derive(Serialize, Debug, PartialEq, Clone)]
pub struct MethodCall {
    /// Identifier for this method call
    ///
    /// [`MethodCall`] id's must be unique for every connection
    pub id: CallId,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub method: MethodId,
    pub params: serde_json::Value,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(usize);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallId({})", self.0)
    }
}

impl CallId {
    pub fn new(id: usize) -> Self {
        CallId(id)
    }

    pub fn inner(&self) -> usize {
        self.0
    }
}

pub trait Command: serde::ser::Serialize + Method {
    type Response: serde::de::DeserializeOwned + fmt::Debug;
}

#[derive(Debug)]
pub struct CommandResponse<T>
where
    T: fmt::Debug,
{
    pub id: CallId,
    pub result: T,
    pub method: MethodId,
}

impl<T: fmt::Debug> Deref for CommandResponse<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.result
    }
}

/// An event as it was read from the wire, before it is decoded into a typed
/// payload.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct CdpJsonEventMessage {
    /// Name of the method
    pub method: MethodId,
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Json params
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Method for CdpJsonEventMessage {
    fn identifier(&self) -> MethodId {
        self.method.clone()
    }
}

impl Event for CdpJsonEventMessage {
    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

pub trait Event: Method + DeserializeOwned {
    /// The session this event was emitted for, `None` for connection-scoped
    /// events.
    fn session_id(&self) -> Option<&str>;
}

pub trait Method {
    /// The whole string identifier for this method like: `DOM.removeNode`
    fn identifier(&self) -> MethodId;

    /// The name of the domain this method belongs to: `DOM`
    fn domain_name(&self) -> MethodId {
        self.split().0
    }

    /// The standalone identifier of the method inside the domain: `removeNode`
    fn method_name(&self) -> MethodId {
        self.split().1
    }

    /// Tuple of (`domain_name`, `method_name`) : (`DOM`, `removeNode`)
    fn split(&self) -> (MethodId, MethodId) {
        match self.identifier() {
            Cow::Borrowed(id) => {
                let (domain, name) = id.split_once('.').unwrap_or((id, ""));
                (domain.into(), name.into())
            }
            Cow::Owned(id) => {
                let (domain, name) = id.split_once('.').unwrap_or((id.as_str(), ""));
                (Cow::Owned(domain.into()), Cow::Owned(name.into()))
            }
        }
    }
}

/// A cdp request
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Request {
    pub method: MethodId,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub params: serde_json::Value,
}

impl Request {
    pub fn new(method: MethodId, params: serde_json::Value) -> Self {
        Self {
            method,
            params,
            session_id: None,
        }
    }

    pub fn with_session(
        method: MethodId,
        params: serde_json::Value,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            method,
            params,
            session_id: Some(session_id.into()),
        }
    }

    /// Serializes the command into a request addressed to `session_id`
    pub fn from_command<C: Command>(
        cmd: &C,
        session_id: Option<impl Into<String>>,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            method: cmd.identifier(),
            session_id: session_id.map(Into::into),
            params: serde_json::to_value(cmd)?,
        })
    }
}

/// A response to a [`MethodCall`] from the browser
#[derive(Deserialize, Debug, PartialEq, Clone)]
pub struct Response {
    /// Numeric identifier for the exact request
    pub id: CallId,
    /// Set when the request was addressed to a session
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
    /// The response payload
    pub result: Option<serde_json::Value>,
    /// The Reason why the [`MethodCall`] failed.
    pub error: Option<Error>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
#[allow(clippy::large_enum_variant)]
pub enum Message<T = CdpJsonEventMessage> {
    Response(Response),
    Event(T),
}

/// The error payload of a failed [`MethodCall`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Error {
    /// Error code
    pub code: i64,
    /// Error Message
    pub message: String,
    /// Additional details supplied by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error {}: {}", self.code, self.message)?;
        if let Some(ref data) = self.data {
            write!(f, " {}", data)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_call_skips_missing_session() {
        let call = MethodCall {
            id: CallId::new(7),
            session_id: None,
            method: "Runtime.enable".into(),
            params: serde_json::json!({}),
        };
        let s = serde_json::to_string(&call).unwrap();
        assert_eq!(s, r#"{"id":7,"method":"Runtime.enable","params":{}}"#);

        let call = MethodCall {
            session_id: Some("S1".to_string()),
            ..call
        };
        let v = serde_json::to_value(&call).unwrap();
        assert_eq!(v["sessionId"], "S1");
    }

    #[test]
    fn message_distinguishes_responses_from_events() {
        let resp: Message = serde_json::from_str(
            r#"{"id":3,"sessionId":"S","error":{"code":-32000,"message":"Cannot find context with specified id"}}"#,
        )
        .unwrap();
        match resp {
            Message::Response(resp) => {
                assert_eq!(resp.id, CallId::new(3));
                assert_eq!(resp.session_id.as_deref(), Some("S"));
                assert!(resp.error.is_some());
            }
            Message::Event(_) => panic!("expected a response"),
        }

        let event: Message = serde_json::from_str(
            r#"{"method":"Runtime.executionContextsCleared","params":{},"sessionId":"S"}"#,
        )
        .unwrap();
        match event {
            Message::Event(ev) => {
                assert_eq!(ev.identifier(), "Runtime.executionContextsCleared");
                assert_eq!(ev.session_id(), Some("S"));
            }
            Message::Response(_) => panic!("expected an event"),
        }
    }

    #[test]
    fn split_identifier() {
        let ev = CdpJsonEventMessage {
            method: "Page.frameAttached".into(),
            session_id: None,
            params: Default::default(),
        };
        assert_eq!(ev.domain_name(), "Page");
        assert_eq!(ev.method_name(), "frameAttached");
    }
}
