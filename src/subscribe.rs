use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender};
use futures::Stream;

use frameoxide_types::MethodId;

use crate::cdp::CdpEventMessage;

/// Fan-out of events of type `T` to any number of listeners.
///
/// Listeners whose receiving half was dropped are removed on the next send.
#[derive(Debug)]
pub(crate) struct EventListeners<T> {
    listeners: Vec<UnboundedSender<T>>,
}

impl<T> Default for EventListeners<T> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<T: Clone> EventListeners<T> {
    pub fn add(&mut self, listener: UnboundedSender<T>) {
        self.listeners.push(listener)
    }

    pub fn send(&mut self, event: T) {
        self.listeners
            .retain(|listener| listener.unbounded_send(event.clone()).is_ok());
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// All the currently active subscriptions to raw protocol events
#[derive(Debug, Default)]
pub(crate) struct Subscriptions {
    /// Tracks the subscribers for each event identified by the key
    subs: HashMap<MethodId, EventListeners<Arc<CdpEventMessage>>>,
}

impl Subscriptions {
    pub fn subscribe(&mut self, method: MethodId, listener: UnboundedSender<Arc<CdpEventMessage>>) {
        self.subs.entry(method).or_default().add(listener)
    }

    /// Send the event to every listener of its method
    pub fn dispatch(&mut self, event: &Arc<CdpEventMessage>) {
        if let Some(listeners) = self.subs.get_mut(&event.method) {
            listeners.send(Arc::clone(event));
            if listeners.is_empty() {
                self.subs.remove(&event.method);
            }
        }
    }
}

/// The receiver part of an event subscription
#[must_use = "streams do nothing unless polled"]
#[derive(Debug)]
pub struct EventStream<T> {
    events: UnboundedReceiver<T>,
}

impl<T> EventStream<T> {
    pub(crate) fn new(events: UnboundedReceiver<T>) -> Self {
        Self { events }
    }
}

impl<T> Stream for EventStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Stream::poll_next(Pin::new(&mut self.get_mut().events), cx)
    }
}
