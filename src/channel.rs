//! Bounded FIFO channel with suspending push/pull and two close modes.
//!
//! This is the buffer that sits behind every [`Reader`](crate::reader::Reader).
//! Producers `push` into it and are suspended while it is at capacity;
//! consumers `pull` from it and are suspended while it is empty. Both kinds
//! of waiter are served strictly in arrival order.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// How buffered items are treated when a channel is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Items already buffered are still delivered to pending and future pulls.
    Flush,
    /// Items already buffered are dropped and pending pulls are released.
    Discard,
}

struct State<T> {
    items: VecDeque<T>,
    capacity: usize,
    closed: bool,
    pullers: VecDeque<oneshot::Sender<T>>,
    pushers: VecDeque<(T, oneshot::Sender<()>)>,
}

/// A bounded, closable FIFO shared between producers and consumers.
pub struct BoundedChannel<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for BoundedChannel<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> BoundedChannel<T> {
    /// Create a channel holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Arc::new(Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                capacity,
                closed: false,
                pullers: VecDeque::new(),
                pushers: VecDeque::new(),
            })),
        }
    }

    /// Push an item, suspending while the channel is full.
    ///
    /// Fails with [`Error::ChannelClosed`] if the channel is closed before
    /// the item is accepted.
    pub async fn push(&self, item: T) -> Result<()> {
        let rx = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(Error::ChannelClosed);
            }
            let item = match state.hand_off(item) {
                None => return Ok(()),
                Some(item) => item,
            };
            if state.items.len() < state.capacity {
                state.items.push_back(item);
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            state.pushers.push_back((item, tx));
            rx
        };

        // The sender is dropped without a value when the channel closes.
        rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// Pull the next item, suspending while the channel is empty and open.
    ///
    /// Fails with [`Error::ChannelClosed`] once the channel is closed and
    /// drained.
    pub async fn pull(&self) -> Result<T> {
        let rx = {
            let mut state = self.state.lock();
            if let Some(item) = state.items.pop_front() {
                state.admit_pusher();
                return Ok(item);
            }
            if state.closed {
                return Err(Error::ChannelClosed);
            }
            let (tx, rx) = oneshot::channel();
            state.pullers.push_back(tx);
            rx
        };

        rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// Append `last` beyond capacity and close in [`CloseMode::Flush`].
    ///
    /// Does nothing if the channel is already closed.
    pub fn close_with(&self, last: T) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        if let Some(last) = state.hand_off(last) {
            state.items.push_back(last);
        }
        state.shut(CloseMode::Flush);
    }

    /// Close the channel. Pending pushes are rejected in either mode.
    pub fn close(&self, mode: CloseMode) {
        let mut state = self.state.lock();
        if state.closed && mode == CloseMode::Flush {
            return;
        }
        state.shut(mode);
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of buffered items.
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }
}

impl<T> State<T> {
    /// Give `item` straight to the oldest live puller, or hand it back.
    fn hand_off(&mut self, mut item: T) -> Option<T> {
        while let Some(puller) = self.pullers.pop_front() {
            match puller.send(item) {
                Ok(()) => return None,
                // That pull was dropped; try the next one.
                Err(returned) => item = returned,
            }
        }
        Some(item)
    }

    /// Move the oldest live suspended push into the buffer.
    fn admit_pusher(&mut self) {
        while let Some((item, tx)) = self.pushers.pop_front() {
            if tx.send(()).is_ok() {
                self.items.push_back(item);
                return;
            }
        }
    }

    fn shut(&mut self, mode: CloseMode) {
        self.closed = true;
        // Dropping the senders rejects suspended pushes.
        self.pushers.clear();
        if mode == CloseMode::Discard {
            self.items.clear();
        }
        // Pullers only wait on an empty buffer, so none of them can be fed.
        self.pullers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, assert_ready_err, assert_ready_ok, task};

    #[tokio::test]
    async fn test_fifo_order() {
        let channel = BoundedChannel::new(4);
        for i in 0..4 {
            channel.push(i).await.unwrap();
        }
        for i in 0..4 {
            assert_eq!(channel.pull().await.unwrap(), i);
        }
        assert!(channel.is_empty());
    }

    #[tokio::test]
    async fn test_push_suspends_at_capacity() {
        let channel = BoundedChannel::new(1);
        channel.push(1).await.unwrap();

        let mut blocked = task::spawn(channel.push(2));
        assert_pending!(blocked.poll());

        assert_eq!(channel.pull().await.unwrap(), 1);
        assert!(blocked.is_woken());
        assert_ready_ok!(blocked.poll());
        assert_eq!(channel.pull().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_pending_pulls_served_in_order() {
        let channel = BoundedChannel::new(2);
        let mut first = task::spawn(channel.pull());
        let mut second = task::spawn(channel.pull());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        channel.push("a").await.unwrap();
        channel.push("b").await.unwrap();

        assert_eq!(assert_ready_ok!(first.poll()), "a");
        assert_eq!(assert_ready_ok!(second.poll()), "b");
    }

    #[tokio::test]
    async fn test_flush_close_delivers_buffered() {
        let channel = BoundedChannel::new(3);
        channel.push(1).await.unwrap();
        channel.close_with(2);

        assert!(channel.push(3).await.is_err());
        assert_eq!(channel.pull().await.unwrap(), 1);
        assert_eq!(channel.pull().await.unwrap(), 2);
        assert!(matches!(channel.pull().await, Err(Error::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_close_with_ignores_capacity() {
        let channel = BoundedChannel::new(1);
        channel.push(1).await.unwrap();
        channel.close_with(2);
        assert_eq!(channel.len(), 2);
    }

    #[tokio::test]
    async fn test_discard_close_drops_buffered_and_releases_waiters() {
        let channel = BoundedChannel::new(1);
        channel.push(1).await.unwrap();
        let mut blocked = task::spawn(channel.push(2));
        assert_pending!(blocked.poll());

        channel.close(CloseMode::Discard);
        assert_ready_err!(blocked.poll());
        assert!(matches!(channel.pull().await, Err(Error::ChannelClosed)));

        let empty = BoundedChannel::<i32>::new(1);
        let mut waiting = task::spawn(empty.pull());
        assert_pending!(waiting.poll());
        empty.close(CloseMode::Discard);
        assert!(assert_ready!(waiting.poll()).is_err());
    }

    #[tokio::test]
    async fn test_dropped_pull_does_not_swallow_items() {
        let channel = BoundedChannel::new(1);
        let mut abandoned = task::spawn(channel.pull());
        assert_pending!(abandoned.poll());
        drop(abandoned);

        channel.push(7).await.unwrap();
        assert_eq!(channel.pull().await.unwrap(), 7);
    }

    #[test]
    fn test_capacity_is_at_least_one() {
        assert_eq!(BoundedChannel::<u8>::new(0).capacity(), 1);
    }
}
