use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::{
    mpsc,
    oneshot::{self, channel as oneshot_channel},
};
use futures_timer::Delay;
use pin_project_lite::pin_project;

use crate::error::{CdpError, Result};
use crate::handler::frame::FrameKey;
use crate::handler::target::TargetMessage;

pin_project! {
    /// Resolves once a frame and all of its descendants observed a set of
    /// lifecycle events.
    ///
    /// Dropping the future disposes the watcher on the handler side.
    pub(crate) struct NavigationFuture {
        #[pin]
        rx: oneshot::Receiver<Result<()>>,
        #[pin]
        delay: Option<Delay>,
        timeout: Duration,
        target_sender: mpsc::Sender<TargetMessage>,
        message: Option<TargetMessage>,
    }
}

impl NavigationFuture {
    /// A zero `timeout` waits forever
    pub fn new(
        target_sender: mpsc::Sender<TargetMessage>,
        frame: FrameKey,
        events: Vec<String>,
        timeout: Duration,
    ) -> Self {
        let (tx, rx) = oneshot_channel();
        let message = Some(TargetMessage::WaitForLifecycle { frame, events, tx });
        let delay = (!timeout.is_zero()).then(|| Delay::new(timeout));
        Self {
            rx,
            delay,
            timeout,
            target_sender,
            message,
        }
    }
}

impl Future for NavigationFuture {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        if let Some(delay) = this.delay.as_mut().as_pin_mut() {
            if delay.poll(cx).is_ready() {
                return Poll::Ready(Err(CdpError::Timeout(format!(
                    "Navigation timeout of {} ms exceeded",
                    this.timeout.as_millis()
                ))));
            }
        }

        if this.message.is_some() {
            match this.target_sender.poll_ready(cx) {
                Poll::Ready(Err(e)) => Poll::Ready(Err(e.into())),
                Poll::Ready(Ok(_)) => {
                    if let Some(message) = this.message.take() {
                        this.target_sender.start_send(message)?;
                    }
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
                Poll::Pending => Poll::Pending,
            }
        } else {
            match this.rx.poll(cx) {
                Poll::Ready(Ok(res)) => Poll::Ready(res),
                Poll::Ready(Err(_)) => Poll::Ready(Err(CdpError::TargetClosed(
                    "Page.lifecycleEvent".into(),
                ))),
                Poll::Pending => Poll::Pending,
            }
        }
    }
}
