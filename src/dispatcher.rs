use std::{io, sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{io::{AsyncRead, AsyncWrite}, select, sync::watch, time::timeout};
use tokio_util::{codec::Framed, sync::CancellationToken};
use tracing::{debug, error, info, trace};

use crate::{
    protocol::{Frame, FrameCodec, Message},
    publish::Publisher,
    queue::OutboundReceiver,
    state::{PumpState, StateCache},
};


/// The link to the unit failed. There is no reconnection: the controller
/// stops when this happens.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("link unavailable: {0}")]
    Unavailable(#[from] io::Error),

    #[error("link closed by peer")]
    Closed,
}


/// Sole owner of the link. Writes one frame at a time and waits for its
/// response (or a timeout) before taking the next one off the queue.
pub struct LinkDispatcher<T> {
    link: Framed<T, FrameCodec>,
    queue: OutboundReceiver,
    cache: StateCache,
    publisher: Arc<dyn Publisher>,
    topic_prefix: String,
    response_timeout: Duration,
    snapshot: watch::Sender<PumpState>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> LinkDispatcher<T> {
    pub fn new(
        link: T,
        queue: OutboundReceiver,
        publisher: Arc<dyn Publisher>,
        topic_prefix: String,
        response_timeout: Duration,
        snapshot: watch::Sender<PumpState>
    ) -> Self {
        Self {
            link: Framed::new(link, FrameCodec::new()),
            queue,
            cache: StateCache::new(),
            publisher,
            topic_prefix,
            response_timeout,
            snapshot,
        }
    }

    /// Run until `cancel` fires, the queue closes or the link fails.
    /// `cancel` is triggered on the way out regardless, so everything else
    /// sharing the token stops with the dispatcher.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), LinkError> {
        let _guard = cancel.clone().drop_guard();

        let result = self.serve(&cancel).await;

        if let Err(err) = &result {
            error!("{err}");
        }

        debug!(dropped_frames = self.link.codec().dropped_frames(), "dispatcher stopped");

        result
    }

    async fn serve(&mut self, cancel: &CancellationToken) -> Result<(), LinkError> {
        loop {
            let frame = select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                frame = self.queue.pop() => match frame {
                    Some(frame) => frame,
                    None => return Ok(()),
                }
            };

            debug!(waiting = self.queue.depth(), "sending {frame:?}");

            // not cancellable: a write that has started is allowed to finish
            self.link.send(frame).await?;

            let response = select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                response = timeout(self.response_timeout, self.link.next()) => response,
            };

            match response {
                Err(_) => debug!(timeout_ms = self.response_timeout.as_millis() as u64, "no response"),
                Ok(None) => return Err(LinkError::Closed),
                Ok(Some(Err(err))) => return Err(LinkError::Unavailable(err)),
                Ok(Some(Ok(frame))) => self.handle(frame),
            }
        }
    }

    fn handle(&mut self, frame: Frame) {
        let message = Message::decode(&frame);

        if let Message::Unknown(frame) = &message {
            trace!("ignoring {frame:?}");
            return
        }

        let changes = self.cache.apply(&message);

        if changes.is_empty() {
            return
        }

        for (attribute, value) in &changes {
            info!(%attribute, %value, "changed");

            let topic = format!("{}/{}", self.topic_prefix, attribute.topic_suffix());
            self.publisher.publish(&topic, &value.to_string());
        }

        self.snapshot.send_replace(self.cache.state().clone());
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocol::{
            lookup::Power,
            message::{subtype, OperationStatusState},
            response, Command, MessageKind,
        },
        publish::ChannelPublisher,
        queue::outbound_queue,
    };
    use tokio::io::{duplex, DuplexStream};

    fn dispatcher(link: DuplexStream, queue: OutboundReceiver) -> (LinkDispatcher<DuplexStream>, tokio::sync::mpsc::UnboundedReceiver<(String, String)>, watch::Receiver<PumpState>) {
        let (publisher, published) = ChannelPublisher::new();
        let (snapshot, snapshot_rx) = watch::channel(PumpState::default());

        let dispatcher = LinkDispatcher::new(link, queue, Arc::new(publisher), "heat_pump".to_string(), Duration::from_millis(500), snapshot);

        (dispatcher, published, snapshot_rx)
    }

    fn info_request(kind: MessageKind) -> Frame {
        Command::InfoRequest(kind).encode().unwrap()
    }

    #[tokio::test]
    async fn test_publishes_changes() {
        let (link, device) = duplex(256);
        let (queue, rx) = outbound_queue();
        let (dispatcher, mut published, snapshot) = dispatcher(link, rx);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(dispatcher.run(cancel.clone()));

        let mut device = Framed::new(device, FrameCodec::new());

        queue.push(info_request(MessageKind::OperationStatus));

        let request = device.next().await.unwrap().unwrap();
        assert_eq!(request.subtype(), Some(subtype::OPERATION_STATUS));

        let status = OperationStatusState::new(Power::On, 42);
        device.send(response::operation_status_info(&status)).await.unwrap();

        assert_eq!(published.recv().await, Some(("heat_pump/compressor/state".to_string(), "ON".to_string())));
        assert_eq!(published.recv().await, Some(("heat_pump/compressor/frequency".to_string(), "42".to_string())));

        // same answer again: nothing new to publish
        queue.push(info_request(MessageKind::OperationStatus));
        device.next().await.unwrap().unwrap();
        device.send(response::operation_status_info(&status)).await.unwrap();

        queue.push(info_request(MessageKind::Settings));
        device.next().await.unwrap().unwrap();

        cancel.cancel();
        task.await.unwrap().unwrap();

        assert!(published.try_recv().is_err());
        assert_eq!(snapshot.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_echoed_request_publishes_nothing() {
        let (link, device) = duplex(256);
        let (queue, rx) = outbound_queue();
        let (dispatcher, mut published, snapshot) = dispatcher(link, rx);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(dispatcher.run(cancel.clone()));

        let mut device = Framed::new(device, FrameCodec::new());

        // a single-wire adapter reads back every poll it writes
        for kind in [MessageKind::Temperature, MessageKind::OperationStatus] {
            queue.push(info_request(kind));

            let request = device.next().await.unwrap().unwrap();
            device.send(request).await.unwrap();
        }

        queue.push(info_request(MessageKind::Settings));
        device.next().await.unwrap().unwrap();

        cancel.cancel();
        task.await.unwrap().unwrap();

        assert!(published.try_recv().is_err());
        assert!(snapshot.borrow().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_device_does_not_wedge() {
        let (link, device) = duplex(256);
        let (queue, rx) = outbound_queue();
        let (dispatcher, _published, _snapshot) = dispatcher(link, rx);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(dispatcher.run(cancel.clone()));

        let mut device = Framed::new(device, FrameCodec::new());

        queue.push(info_request(MessageKind::Temperature));
        queue.push(info_request(MessageKind::Settings));

        // never answered
        assert_eq!(device.next().await.unwrap().unwrap().subtype(), Some(subtype::TEMPERATURE));
        assert_eq!(device.next().await.unwrap().unwrap().subtype(), Some(subtype::SETTINGS));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_link_failure_cancels() {
        let (link, device) = duplex(256);
        drop(device);

        let (queue, rx) = outbound_queue();
        let (dispatcher, _published, _snapshot) = dispatcher(link, rx);

        let cancel = CancellationToken::new();
        queue.push(info_request(MessageKind::Settings));

        let result = dispatcher.run(cancel.clone()).await;

        assert!(matches!(result, Err(LinkError::Unavailable(_))));
        assert!(cancel.is_cancelled());
    }
}
