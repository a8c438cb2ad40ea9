use std::time::Duration;

use rand::Rng;
use tokio::{select, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    protocol::{Command, MessageKind, CommandError},
    queue::OutboundQueue,
};


/// Spawns one polling task per readable message kind.
pub struct RequestScheduler {
    queue: OutboundQueue,
    jitter: Duration,
    cancel: CancellationToken
}

impl RequestScheduler {
    pub fn new(queue: OutboundQueue, jitter: Duration, cancel: CancellationToken) -> Self {
        Self { queue, jitter, cancel }
    }

    /// Enqueue an info request for `kind` now and then every `interval`
    /// (plus jitter) until cancelled.
    pub fn spawn(&self, kind: MessageKind, interval: Duration) -> Result<JoinHandle<()>, CommandError> {
        let request = Command::InfoRequest(kind).encode()?;

        let queue = self.queue.clone();
        let cancel = self.cancel.clone();
        let jitter = self.jitter;

        Ok(tokio::spawn(async move {
            loop {
                if !queue.push(request.clone()) {
                    debug!(?kind, "outbound queue closed, stopping poller");
                    break;
                }

                debug!(?kind, depth = queue.depth(), "queued info request");

                let delay = interval + random_jitter(jitter);

                select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(delay) => ()
                }
            }
        }))
    }
}

fn random_jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO
    }

    let millis = rand::thread_rng().gen_range(0..=max.as_millis() as u64);
    Duration::from_millis(millis)
}
