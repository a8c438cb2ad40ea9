use std::{io::Write, sync::Mutex};

use tokio::sync::mpsc;
use tracing::{debug, warn};


/// The outbound half of the control plane.
pub trait Publisher: Send + Sync + 'static {
    fn publish(&self, topic: &str, payload: &str);
}


/// Writes one `topic payload` line per publication.
///
/// Writes and flushes synchronously from the dispatcher task, so `W` must
/// not block for long: stdout or an in-memory buffer, not a socket to a
/// slow consumer.
pub struct LinePublisher<W> {
    out: Mutex<W>
}

impl<W: Write + Send + 'static> LinePublisher<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }
}

impl<W: Write + Send + 'static> Publisher for LinePublisher<W> {
    fn publish(&self, topic: &str, payload: &str) {
        let Ok(mut out) = self.out.lock() else {
            warn!(topic, "publisher poisoned, dropping publication");
            return
        };

        if let Err(err) = writeln!(out, "{topic} {payload}").and_then(|_| out.flush()) {
            warn!(topic, "failed to publish: {err}");
        }
    }
}


/// Forwards publications to a channel.
#[derive(Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<(String, String)>
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, topic: &str, payload: &str) {
        if self.tx.send((topic.to_string(), payload.to_string())).is_err() {
            debug!(topic, "publication receiver dropped");
        }
    }
}
