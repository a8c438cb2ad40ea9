use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};

use tokio::sync::mpsc;

use crate::protocol::Frame;


/// Create the outbound frame queue: many producers, one consumer (the
/// dispatcher), FIFO, unbounded.
pub fn outbound_queue() -> (OutboundQueue, OutboundReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));

    (
        OutboundQueue { tx, depth: depth.clone() },
        OutboundReceiver { rx, depth }
    )
}


#[derive(Clone, Debug)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<Frame>,
    depth: Arc<AtomicUsize>
}

impl OutboundQueue {
    /// Enqueue a frame. Returns `false` if the dispatcher has gone away.
    pub fn push(&self, frame: Frame) -> bool {
        self.depth.fetch_add(1, Ordering::SeqCst);

        if self.tx.send(frame).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return false
        }

        true
    }

    /// Frames waiting to be sent.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}


#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::UnboundedReceiver<Frame>,
    depth: Arc<AtomicUsize>
}

impl OutboundReceiver {
    pub async fn pop(&mut self) -> Option<Frame> {
        let frame = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::SeqCst);

        Some(frame)
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{command::startup_frame, Command, MessageKind};

    #[tokio::test]
    async fn test_fifo_across_producers() {
        let (queue, mut rx) = outbound_queue();

        let first = startup_frame();
        let second = Command::InfoRequest(MessageKind::Settings).encode().unwrap();

        let other = queue.clone();
        assert!(queue.push(first.clone()));
        assert!(other.push(second.clone()));
        assert_eq!(rx.depth(), 2);

        assert_eq!(rx.pop().await, Some(first));
        assert_eq!(rx.pop().await, Some(second));
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn test_push_after_close() {
        let (queue, rx) = outbound_queue();
        drop(rx);

        assert!(!queue.push(startup_frame()));
        assert_eq!(queue.depth(), 0);
    }
}
