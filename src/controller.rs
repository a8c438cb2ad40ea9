use std::sync::Arc;

use tokio::{select, sync::{mpsc, watch}, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::{ControllerConfig, Link},
    dispatcher::{LinkDispatcher, LinkError},
    protocol::{startup_frame, Command, CommandError, MessageKind, SettingsUpdate},
    publish::Publisher,
    queue::{outbound_queue, OutboundQueue},
    scheduler::RequestScheduler,
    state::PumpState,
};


/// A running connection to one heat pump.
///
/// Owns the dispatcher task and one poller per readable message kind. All
/// of them stop together, either through [`HeatPumpController::stop`] or
/// when the link fails.
pub struct HeatPumpController {
    config: ControllerConfig,
    publisher: Arc<dyn Publisher>,
    updates: UpdateHandle,
    snapshot: watch::Receiver<PumpState>,
    cancel: CancellationToken,
    dispatcher: JoinHandle<Result<(), LinkError>>,
    pollers: Vec<JoinHandle<()>>,
}

impl HeatPumpController {
    /// Take over `link`: queue the connect handshake, then start polling.
    pub fn start<L: Link + 'static>(link: L, publisher: Arc<dyn Publisher>, config: ControllerConfig) -> Result<Self, CommandError> {
        let (queue, rx) = outbound_queue();
        let cancel = CancellationToken::new();

        // handshake must be the first frame on the wire
        queue.push(startup_frame());

        let (snapshot_tx, snapshot) = watch::channel(PumpState::default());

        let dispatcher = LinkDispatcher::new(
            link,
            rx,
            publisher.clone(),
            config.topic_prefix.clone(),
            config.response_timeout,
            snapshot_tx
        );

        let scheduler = RequestScheduler::new(queue.clone(), config.jitter, cancel.clone());

        let pollers = MessageKind::READABLE.iter()
            .map(|&kind| {
                let interval = match kind {
                    MessageKind::Temperature => config.temperature_interval,
                    MessageKind::OperationStatus => config.operation_status_interval,
                    _ => config.settings_interval,
                };

                scheduler.spawn(kind, interval)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let dispatcher = tokio::spawn(dispatcher.run(cancel.clone()));

        publisher.publish(&config.topic("connected"), "1");
        info!(prefix = %config.topic_prefix, "controller started");

        Ok(Self {
            updates: UpdateHandle { queue },
            config,
            publisher,
            snapshot,
            cancel,
            dispatcher,
            pollers,
        })
    }

    /// A cloneable handle for submitting setting changes from other tasks.
    pub fn updates(&self) -> UpdateHandle {
        self.updates.clone()
    }

    /// Encode and queue a change to one setting. Errors are returned before
    /// anything is written to the unit.
    pub fn on_attribute_update_requested(&self, attribute: &str, raw_value: &str) -> Result<(), CommandError> {
        self.updates.on_attribute_update_requested(attribute, raw_value)
    }

    /// Last known value of every attribute.
    pub fn snapshot(&self) -> PumpState {
        self.snapshot.borrow().clone()
    }

    /// Completes once the controller is stopping, either on request or
    /// because the link failed.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Stop polling and dispatching. A write already in progress completes;
    /// its response is discarded. Returns the link error if that is what
    /// stopped the dispatcher.
    pub async fn stop(self) -> Result<(), LinkError> {
        self.cancel.cancel();

        for poller in self.pollers {
            if let Err(err) = poller.await {
                warn!("poller panicked: {err}");
            }
        }

        let result = match self.dispatcher.await {
            Ok(result) => result,
            Err(err) => {
                warn!("dispatcher panicked: {err}");
                Ok(())
            }
        };

        self.publisher.publish(&self.config.topic("connected"), "0");
        info!("controller stopped");

        result
    }
}


/// Submits setting changes to a running controller.
#[derive(Clone, Debug)]
pub struct UpdateHandle {
    queue: OutboundQueue
}

impl UpdateHandle {
    /// Queued behind any pending polls; there is no priority lane.
    pub fn on_attribute_update_requested(&self, attribute: &str, raw_value: &str) -> Result<(), CommandError> {
        let update = SettingsUpdate::parse(attribute, raw_value)?;
        let frame = Command::Update(update).encode()?;

        if !self.queue.push(frame) {
            return Err(CommandError::Stopped)
        }

        info!(attribute, value = raw_value, "update queued");

        Ok(())
    }
}


/// Route `<prefix>/update/<attribute> <value>` messages from the control
/// plane to `handle`. Other topics are ignored.
pub fn spawn_inbound_handler(
    handle: UpdateHandle,
    topic_prefix: String,
    mut inbound: mpsc::Receiver<(String, String)>,
    cancel: CancellationToken
) -> JoinHandle<()> {
    let update_prefix = format!("{topic_prefix}/update/");

    tokio::spawn(async move {
        loop {
            let (topic, payload) = select! {
                _ = cancel.cancelled() => break,
                message = inbound.recv() => match message {
                    Some(message) => message,
                    None => break,
                }
            };

            let Some(attribute) = topic.strip_prefix(&update_prefix) else {
                debug!(%topic, "ignoring message");
                continue
            };

            if attribute.contains('/') {
                debug!(%topic, "ignoring nested update topic");
                continue
            }

            if let Err(err) = handle.on_attribute_update_requested(attribute, &payload) {
                warn!(%topic, %payload, "rejected update: {err}");
            }
        }
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocol::{codec::frame_type, message::subtype, Frame},
        queue::outbound_queue,
    };

    #[tokio::test]
    async fn test_update_handle_queues_frame() {
        let (queue, mut rx) = outbound_queue();
        let handle = UpdateHandle { queue };

        handle.on_attribute_update_requested("power", "ON").unwrap();

        let frame = rx.pop().await.unwrap();
        assert_eq!(frame.frame_type(), frame_type::SET_REQUEST);
        assert_eq!(frame.subtype(), Some(subtype::UPDATE));
        assert_eq!(&frame.data()[1..4], &[0x01, 0x00, 0x01]);
    }

    #[tokio::test]
    async fn test_update_handle_rejects() {
        let (queue, rx) = outbound_queue();
        let handle = UpdateHandle { queue };

        assert_eq!(
            handle.on_attribute_update_requested("room_temp", "20"),
            Err(CommandError::UnknownAttribute("room_temp".to_string()))
        );
        assert!(matches!(
            handle.on_attribute_update_requested("mode", "TURBO"),
            Err(CommandError::UnencodableValue { .. })
        ));
        assert_eq!(rx.depth(), 0);

        drop(rx);
        assert_eq!(handle.on_attribute_update_requested("power", "OFF"), Err(CommandError::Stopped));
    }

    #[tokio::test]
    async fn test_inbound_routing() {
        let (queue, mut rx) = outbound_queue();
        let (tx, inbound) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let task = spawn_inbound_handler(UpdateHandle { queue }, "heat_pump".to_string(), inbound, cancel.clone());

        for (topic, payload) in [
            ("heat_pump/settings/power", "ON"),
            ("other/update/power", "ON"),
            ("heat_pump/update/fan_speed", "FAST"),
            ("heat_pump/update/a/power", "OFF"),
            ("heat_pump/update/power/", "OFF"),
            ("heat_pump/update/fan_speed", "QUIET"),
        ] {
            tx.send((topic.to_string(), payload.to_string())).await.unwrap();
        }
        drop(tx);
        task.await.unwrap();

        let frame: Frame = rx.pop().await.unwrap();
        assert_eq!(frame.data()[1], 0x08);
        assert_eq!(frame.data()[6], 0x01);
        assert_eq!(rx.depth(), 0);
    }
}
