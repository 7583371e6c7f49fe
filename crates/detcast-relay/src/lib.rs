// -----------------------------------------------------------------------------
// detcast-relay
//
// Single-slot "latest frame wins" hand-off between the producer thread and
// any number of async consumers. Built on `tokio::sync::watch`, so publish
// never blocks and memory stays bounded to one frame.
// -----------------------------------------------------------------------------

use std::fmt;
use tokio::sync::watch;

#[derive(Debug)]
struct Slot<T> {
    seq: u64,
    frame: Option<T>,
    closed: bool,
}

impl<T> Slot<T> {
    fn ready_after(&self, last_seen: u64) -> bool {
        self.closed || (self.seq > last_seen && self.frame.is_some())
    }
}

/// Holds the newest published value and its sequence number.
///
/// Sequence numbers start at 1; `0` means "nothing seen yet". A consumer
/// that has seen `n` is only ever handed a sequence `> n`, and may skip
/// frames when it falls behind.
pub struct Relay<T> {
    tx: watch::Sender<Slot<T>>,
}

impl<T: Clone> Relay<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Slot { seq: 0, frame: None, closed: false });
        Self { tx }
    }

    /// Replace the current frame and wake every waiter. Works with zero
    /// consumers. Returns the new sequence number; after [`close`](Self::close)
    /// the frame is discarded and the last sequence is returned.
    pub fn publish(&self, frame: T) -> u64 {
        let mut seq = 0;
        self.tx.send_modify(|slot| {
            if !slot.closed {
                slot.seq += 1;
                slot.frame = Some(frame);
            }
            seq = slot.seq;
        });
        seq
    }

    /// Resolve with the first frame newer than `last_seen`, or `None` once
    /// the relay is closed.
    pub async fn wait_next(&self, last_seen: u64) -> Option<(T, u64)> {
        let mut rx = self.tx.subscribe();
        next_after(&mut rx, last_seen).await
    }

    /// A cursor that starts before the first frame, so the current frame (if
    /// any) is delivered immediately.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription { rx: self.tx.subscribe(), last_seen: 0 }
    }

    pub fn latest(&self) -> Option<(T, u64)> {
        let slot = self.tx.borrow();
        slot.frame.clone().map(|f| (f, slot.seq))
    }

    pub fn sequence(&self) -> u64 {
        self.tx.borrow().seq
    }

    /// Wake every waiter with `None`. Idempotent.
    pub fn close(&self) {
        self.tx.send_if_modified(|slot| !std::mem::replace(&mut slot.closed, true));
    }

    pub fn is_closed(&self) -> bool {
        self.tx.borrow().closed
    }

    /// Number of live subscriptions and pending waiters.
    pub fn consumers(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone> Default for Relay<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Relay<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.tx.borrow();
        f.debug_struct("Relay")
            .field("seq", &slot.seq)
            .field("closed", &slot.closed)
            .field("consumers", &self.tx.receiver_count())
            .finish()
    }
}

/// Per-consumer read cursor.
pub struct Subscription<T> {
    rx: watch::Receiver<Slot<T>>,
    last_seen: u64,
}

impl<T: Clone> Subscription<T> {
    /// Next frame newer than the last one returned; `None` once the relay
    /// is closed or dropped.
    pub async fn next(&mut self) -> Option<(T, u64)> {
        let (frame, seq) = next_after(&mut self.rx, self.last_seen).await?;
        self.last_seen = seq;
        Some((frame, seq))
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("last_seen", &self.last_seen).finish()
    }
}

async fn next_after<T: Clone>(rx: &mut watch::Receiver<Slot<T>>, last_seen: u64) -> Option<(T, u64)> {
    let slot = rx.wait_for(|slot| slot.ready_after(last_seen)).await.ok()?;
    if slot.closed {
        return None;
    }
    slot.frame.clone().map(|f| (f, slot.seq))
}
