use std::sync::Arc;

use futures::channel::mpsc::{channel, unbounded, Sender};
use futures::channel::oneshot::channel as oneshot_channel;
use futures::SinkExt;

use frameoxide_types::target::{CreateTargetParams, TargetId};
use frameoxide_types::{Command, CommandResponse, Method, MethodId};

use crate::cdp::CdpEventMessage;
use crate::cmd::{to_command_response, CommandMessage};
use crate::conn::{Connection, Transport};
use crate::error::Result;
use crate::handler::{Handler, HandlerConfig, HandlerMessage};
use crate::page::Page;
use crate::subscribe::EventStream;

/// Events concerning the browser as a whole
#[derive(Debug, Clone)]
pub enum BrowserEvent {
    /// A page finished its initialization
    PageCreated(Page),
    /// The session of a page went away
    TargetDetached(TargetId),
    /// The connection to the browser closed
    Disconnected,
}

/// A [`Browser`] is created when frameoxide connects to a browser instance.
///
/// It only talks to the [`Handler`] that must be polled for anything to
/// happen.
#[derive(Debug, Clone)]
pub struct Browser {
    /// The `Sender` to send messages to the connection handler that drives the
    /// transport
    sender: Sender<HandlerMessage>,
    config: HandlerConfig,
}

impl Browser {
    /// Connect to an already running browser instance via websocket
    pub async fn connect(debug_ws_url: impl AsRef<str>) -> Result<(Self, Handler)> {
        Self::connect_with_config(debug_ws_url, HandlerConfig::default()).await
    }

    pub async fn connect_with_config(
        debug_ws_url: impl AsRef<str>,
        config: HandlerConfig,
    ) -> Result<(Self, Handler)> {
        let conn = Connection::<CdpEventMessage>::connect(debug_ws_url).await?;
        Ok(Self::from_connection(conn, config))
    }

    /// Drive the protocol over any transport, like an in process channel
    pub fn with_transport(
        transport: impl Transport + 'static,
        config: HandlerConfig,
    ) -> (Self, Handler) {
        Self::from_connection(Connection::new(transport), config)
    }

    fn from_connection(conn: Connection<CdpEventMessage>, config: HandlerConfig) -> (Self, Handler) {
        let (tx, rx) = channel(config.channel_capacity);
        let handler = Handler::new(conn, rx, config.clone());
        (Self { sender: tx, config }, handler)
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Create a new browser page, resolves once the page is initialized
    pub async fn new_page(&self, params: impl Into<CreateTargetParams>) -> Result<Page> {
        let (tx, rx) = oneshot_channel();

        self.sender
            .clone()
            .send(HandlerMessage::CreatePage(params.into(), tx))
            .await?;

        rx.await?
    }

    /// All initialized pages
    pub async fn pages(&self) -> Result<Vec<Page>> {
        let (tx, rx) = oneshot_channel();
        self.sender
            .clone()
            .send(HandlerMessage::GetPages(tx))
            .await?;
        Ok(rx.await?)
    }

    /// Call a browser method.
    pub async fn execute<T: Command>(&self, cmd: T) -> Result<CommandResponse<T::Response>> {
        let (tx, rx) = oneshot_channel();
        let method = cmd.identifier();
        let msg = CommandMessage::new(cmd, tx)?;

        self.sender
            .clone()
            .send(HandlerMessage::Command(msg))
            .await?;
        let resp = rx.await??;
        to_command_response::<T>(resp, method)
    }

    /// Stream of [`BrowserEvent`]s
    pub async fn event_listener(&self) -> Result<EventStream<BrowserEvent>> {
        let (tx, rx) = unbounded();
        self.sender
            .clone()
            .send(HandlerMessage::AddEventListener(tx))
            .await?;
        Ok(EventStream::new(rx))
    }

    /// Stream of the connection scoped events named `method`
    pub async fn subscribe(&self, method: impl Into<MethodId>) -> Result<EventStream<Arc<CdpEventMessage>>> {
        let (tx, rx) = unbounded();
        self.sender
            .clone()
            .send(HandlerMessage::Subscribe(method.into(), tx))
            .await?;
        Ok(EventStream::new(rx))
    }
}
