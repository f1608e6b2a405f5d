use std::collections::VecDeque;
use std::marker::PhantomData;
use std::pin::Pin;

use async_tungstenite::tungstenite::Message as WsMessage;
use async_tungstenite::WebSocketStream;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender};
use futures::stream::Stream;
use futures::task::{Context, Poll};
use futures::Sink;

use frameoxide_types::{CallId, Event, Message, MethodCall, MethodId, SessionId};

use crate::error::{CdpError, Result};

cfg_if::cfg_if! {
    if #[cfg(feature = "async-std-runtime")] {
        type ConnectStream = async_tungstenite::async_std::ConnectStream;
    } else if #[cfg(feature = "tokio-runtime")] {
        type ConnectStream = async_tungstenite::tokio::ConnectStream;
    }
}

/// A duplex channel that delivers and accepts whole serialized messages.
pub trait Transport:
    Stream<Item = Result<String>> + Sink<String, Error = CdpError> + Send + Unpin
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<String>> + Sink<String, Error = CdpError> + Send + Unpin
{
}

/// A [`Transport`] over the debugging websocket of a browser
#[derive(Debug)]
pub struct WsTransport {
    ws: WebSocketStream<ConnectStream>,
}

impl WsTransport {
    pub async fn connect(debug_ws_url: impl AsRef<str>) -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "async-std-runtime")] {
                let (ws, _) = async_tungstenite::async_std::connect_async(debug_ws_url.as_ref()).await?;
            } else if #[cfg(feature = "tokio-runtime")] {
                let (ws, _) = async_tungstenite::tokio::connect_async(debug_ws_url.as_ref()).await?;
            }
        }
        Ok(Self { ws })
    }
}

impl Stream for WsTransport {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let pin = self.get_mut();
        loop {
            return match Stream::poll_next(Pin::new(&mut pin.ws), cx) {
                Poll::Ready(Some(Ok(WsMessage::Text(text)))) => Poll::Ready(Some(Ok(text))),
                Poll::Ready(Some(Ok(WsMessage::Binary(data)))) => Poll::Ready(Some(
                    String::from_utf8(data)
                        .map_err(|err| CdpError::msg(format!("Invalid utf-8 frame: {err}"))),
                )),
                Poll::Ready(Some(Ok(WsMessage::Close(_)))) => Poll::Ready(None),
                // ping, pong and raw frames carry no protocol messages
                Poll::Ready(Some(Ok(_))) => continue,
                Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(CdpError::Ws(err)))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            };
        }
    }
}

impl Sink<String> for WsTransport {
    type Error = CdpError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Sink::poll_ready(Pin::new(&mut self.get_mut().ws), cx).map_err(Into::into)
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<()> {
        Sink::start_send(Pin::new(&mut self.get_mut().ws), WsMessage::Text(item))
            .map_err(Into::into)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Sink::poll_flush(Pin::new(&mut self.get_mut().ws), cx).map_err(Into::into)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Sink::poll_close(Pin::new(&mut self.get_mut().ws), cx).map_err(Into::into)
    }
}

/// An in-process [`Transport`] backed by a pair of unbounded channels.
///
/// Messages written to the transport show up on `outgoing`, whatever is sent
/// on the `incoming` sender is read back as a message from the browser.
#[derive(Debug)]
pub struct ChannelTransport {
    incoming: UnboundedReceiver<String>,
    outgoing: UnboundedSender<String>,
}

impl ChannelTransport {
    pub fn new(incoming: UnboundedReceiver<String>, outgoing: UnboundedSender<String>) -> Self {
        Self { incoming, outgoing }
    }
}

impl Stream for ChannelTransport {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Stream::poll_next(Pin::new(&mut self.get_mut().incoming), cx).map(|msg| msg.map(Ok))
    }
}

impl Sink<String> for ChannelTransport {
    type Error = CdpError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Sink::poll_ready(Pin::new(&mut self.get_mut().outgoing), cx).map_err(Into::into)
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<()> {
        Sink::start_send(Pin::new(&mut self.get_mut().outgoing), item).map_err(Into::into)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Sink::poll_flush(Pin::new(&mut self.get_mut().outgoing), cx).map_err(Into::into)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Sink::poll_close(Pin::new(&mut self.get_mut().outgoing), cx).map_err(Into::into)
    }
}

/// Exchanges the messages with the transport
#[must_use = "streams do nothing unless polled"]
pub struct Connection<T: Event> {
    /// Queue of commands to send.
    pending_commands: VecDeque<MethodCall>,
    /// The transport to the browser instance
    transport: Pin<Box<dyn Transport>>,
    /// The identifier for a specific command
    next_id: usize,
    needs_flush: bool,
    /// Set once the inbound half reported its end
    closed: bool,
    _marker: PhantomData<T>,
}

impl<T: Event> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("pending_commands", &self.pending_commands)
            .field("next_id", &self.next_id)
            .field("needs_flush", &self.needs_flush)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<T: Event> Connection<T> {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            pending_commands: Default::default(),
            transport: Box::pin(transport),
            next_id: 0,
            needs_flush: false,
            closed: false,
            _marker: Default::default(),
        }
    }

    pub async fn connect(debug_ws_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self::new(WsTransport::connect(debug_ws_url).await?))
    }

    fn next_call_id(&mut self) -> CallId {
        self.next_id = self.next_id.wrapping_add(1);
        CallId::new(self.next_id)
    }

    /// Queue in the command to send over the transport and return the id for
    /// this command
    pub fn submit_command(
        &mut self,
        method: MethodId,
        session_id: Option<SessionId>,
        params: serde_json::Value,
    ) -> CallId {
        let id = self.next_call_id();
        let call = MethodCall {
            id,
            method,
            session_id: session_id.map(Into::into),
            params,
        };
        self.pending_commands.push_back(call);
        id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Writes all queued commands to the sink for as long as it accepts them
    /// and flushes afterwards.
    fn start_send_next(&mut self, cx: &mut Context<'_>) -> Result<()> {
        while !self.pending_commands.is_empty() {
            match self.transport.as_mut().poll_ready(cx) {
                Poll::Ready(Ok(())) => {
                    if let Some(call) = self.pending_commands.pop_front() {
                        let msg = serde_json::to_string(&call)?;
                        tracing::trace!(target: "frameoxide::conn", "SEND {}", msg);
                        self.transport.as_mut().start_send(msg)?;
                        self.needs_flush = true;
                    }
                }
                Poll::Ready(Err(err)) => return Err(err),
                Poll::Pending => break,
            }
        }
        if self.needs_flush {
            if let Poll::Ready(res) = self.transport.as_mut().poll_flush(cx) {
                self.needs_flush = false;
                res?;
            }
        }
        Ok(())
    }
}

impl<T: Event + Unpin> Stream for Connection<T> {
    type Item = Result<Message<T>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let pin = self.get_mut();
        if pin.closed {
            return Poll::Ready(None);
        }

        if let Err(err) = pin.start_send_next(cx) {
            return Poll::Ready(Some(Err(err)));
        }

        match pin.transport.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(msg))) => {
                tracing::trace!(target: "frameoxide::conn", "RECV {}", msg);
                match serde_json::from_str::<Message<T>>(&msg) {
                    Ok(msg) => Poll::Ready(Some(Ok(msg))),
                    Err(err) => {
                        tracing::error!("Failed to deserialize message: {}", msg);
                        Poll::Ready(Some(Err(err.into())))
                    }
                }
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err))),
            Poll::Ready(None) => {
                pin.closed = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frameoxide_types::CdpJsonEventMessage;
    use futures::channel::mpsc::unbounded;
    use futures::StreamExt;

    #[tokio::test]
    async fn assigns_increasing_ids_and_routes_session() {
        let (to_client, incoming) = unbounded();
        let (outgoing, mut sent) = unbounded();
        let mut conn =
            Connection::<CdpJsonEventMessage>::new(ChannelTransport::new(incoming, outgoing));

        let first = conn.submit_command("Page.enable".into(), None, serde_json::json!({}));
        let second = conn.submit_command(
            "Runtime.enable".into(),
            Some(SessionId::from("S1")),
            serde_json::json!({}),
        );
        assert!(second > first);

        to_client
            .unbounded_send(r#"{"id":1,"result":{}}"#.to_string())
            .unwrap();
        match conn.next().await {
            Some(Ok(Message::Response(resp))) => assert_eq!(resp.id, first),
            other => panic!("unexpected {:?}", other),
        }

        let msg: serde_json::Value =
            serde_json::from_str(&sent.next().await.unwrap()).unwrap();
        assert_eq!(msg["method"], "Page.enable");
        assert!(msg.get("sessionId").is_none());
        let msg: serde_json::Value =
            serde_json::from_str(&sent.next().await.unwrap()).unwrap();
        assert_eq!(msg["method"], "Runtime.enable");
        assert_eq!(msg["sessionId"], "S1");
        assert_eq!(msg["id"], second.inner());

        drop(to_client);
        assert!(conn.next().await.is_none());
        assert!(conn.is_closed());
    }
}
