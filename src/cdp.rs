//! Typed decoding of the events this crate reacts to.

use std::convert::TryFrom;

use serde::Deserialize;

use frameoxide_types::page::*;
use frameoxide_types::runtime::*;
use frameoxide_types::target::*;
use frameoxide_types::{CdpJsonEventMessage, Event, Method, MethodId};

pub use frameoxide_types::{page, runtime, target};

/// All events that are decoded into a typed payload. Everything else is kept
/// as raw json.
#[derive(Debug, Clone, PartialEq)]
pub enum CdpEvent {
    TargetAttachedToTarget(EventAttachedToTarget),
    TargetDetachedFromTarget(EventDetachedFromTarget),
    TargetTargetCreated(EventTargetCreated),
    TargetTargetDestroyed(EventTargetDestroyed),
    PageFrameAttached(EventFrameAttached),
    PageFrameNavigated(Box<EventFrameNavigated>),
    PageNavigatedWithinDocument(EventNavigatedWithinDocument),
    PageFrameDetached(EventFrameDetached),
    PageFrameStartedLoading(EventFrameStartedLoading),
    PageFrameStoppedLoading(EventFrameStoppedLoading),
    PageLifecycleEvent(EventLifecycleEvent),
    RuntimeExecutionContextCreated(EventExecutionContextCreated),
    RuntimeExecutionContextDestroyed(EventExecutionContextDestroyed),
    RuntimeExecutionContextsCleared(EventExecutionContextsCleared),
    RuntimeBindingCalled(EventBindingCalled),
    Other(serde_json::Value),
}

impl CdpEvent {
    /// Decodes the `params` of the event identified by `method`
    pub fn from_json(method: &str, params: serde_json::Value) -> serde_json::Result<Self> {
        let event = match method {
            EventAttachedToTarget::IDENTIFIER => {
                CdpEvent::TargetAttachedToTarget(serde_json::from_value(params)?)
            }
            EventDetachedFromTarget::IDENTIFIER => {
                CdpEvent::TargetDetachedFromTarget(serde_json::from_value(params)?)
            }
            EventTargetCreated::IDENTIFIER => {
                CdpEvent::TargetTargetCreated(serde_json::from_value(params)?)
            }
            EventTargetDestroyed::IDENTIFIER => {
                CdpEvent::TargetTargetDestroyed(serde_json::from_value(params)?)
            }
            EventFrameAttached::IDENTIFIER => {
                CdpEvent::PageFrameAttached(serde_json::from_value(params)?)
            }
            EventFrameNavigated::IDENTIFIER => {
                CdpEvent::PageFrameNavigated(Box::new(serde_json::from_value(params)?))
            }
            EventNavigatedWithinDocument::IDENTIFIER => {
                CdpEvent::PageNavigatedWithinDocument(serde_json::from_value(params)?)
            }
            EventFrameDetached::IDENTIFIER => {
                CdpEvent::PageFrameDetached(serde_json::from_value(params)?)
            }
            EventFrameStartedLoading::IDENTIFIER => {
                CdpEvent::PageFrameStartedLoading(serde_json::from_value(params)?)
            }
            EventFrameStoppedLoading::IDENTIFIER => {
                CdpEvent::PageFrameStoppedLoading(serde_json::from_value(params)?)
            }
            EventLifecycleEvent::IDENTIFIER => {
                CdpEvent::PageLifecycleEvent(serde_json::from_value(params)?)
            }
            EventExecutionContextCreated::IDENTIFIER => {
                CdpEvent::RuntimeExecutionContextCreated(serde_json::from_value(params)?)
            }
            EventExecutionContextDestroyed::IDENTIFIER => {
                CdpEvent::RuntimeExecutionContextDestroyed(serde_json::from_value(params)?)
            }
            EventExecutionContextsCleared::IDENTIFIER => {
                CdpEvent::RuntimeExecutionContextsCleared(EventExecutionContextsCleared {})
            }
            EventBindingCalled::IDENTIFIER => {
                CdpEvent::RuntimeBindingCalled(serde_json::from_value(params)?)
            }
            _ => CdpEvent::Other(params),
        };
        Ok(event)
    }
}

/// A decoded event together with the session it was emitted for
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "CdpJsonEventMessage")]
pub struct CdpEventMessage {
    /// Name of the method
    pub method: MethodId,
    pub session_id: Option<SessionId>,
    pub params: CdpEvent,
}

impl TryFrom<CdpJsonEventMessage> for CdpEventMessage {
    type Error = serde_json::Error;

    fn try_from(raw: CdpJsonEventMessage) -> Result<Self, Self::Error> {
        let params = CdpEvent::from_json(&raw.method, raw.params)?;
        Ok(Self {
            method: raw.method,
            session_id: raw.session_id.map(SessionId::from),
            params,
        })
    }
}

impl Method for CdpEventMessage {
    fn identifier(&self) -> MethodId {
        self.method.clone()
    }
}

impl Event for CdpEventMessage {
    fn session_id(&self) -> Option<&str> {
        self.session_id.as_ref().map(|s| s.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frameoxide_types::Message;

    #[test]
    fn decodes_known_and_unknown_events() {
        let msg: Message<CdpEventMessage> = serde_json::from_str(
            r#"{"method":"Page.frameDetached","params":{"frameId":"F1","reason":"swap"},"sessionId":"S"}"#,
        )
        .unwrap();
        let Message::Event(ev) = msg else {
            panic!("expected an event")
        };
        assert_eq!(ev.session_id, Some(SessionId::from("S")));
        assert_eq!(
            ev.params,
            CdpEvent::PageFrameDetached(EventFrameDetached {
                frame_id: "F1".into(),
                reason: Some(FrameDetachedReason::Swap),
            })
        );

        let msg: Message<CdpEventMessage> =
            serde_json::from_str(r#"{"method":"Network.dataReceived","params":{"x":1}}"#)
                .unwrap();
        let Message::Event(ev) = msg else {
            panic!("expected an event")
        };
        assert!(matches!(ev.params, CdpEvent::Other(_)));
        assert_eq!(ev.session_id, None);
    }
}
