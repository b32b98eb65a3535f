//! Long-poll notification channel
//!
//! Delivers messages from the graph services to a single consumer, in the
//! order they were produced, without losing any.
//!
//! # Architecture
//!
//! ```text
//! notify(m) ──► queue (FIFO) ──► pending acceptance ──► accept().await
//! ```
//!
//! - `notify` never blocks: the message is queued and, if the consumer is
//!   already waiting, handed over immediately
//! - `accept` resolves at once with the oldest queued message, or waits for
//!   the next `notify`
//! - at most one acceptance may be outstanding; a second concurrent `accept`
//!   is a consumer bug and poisons the channel
//!
//! `accept` is cancel-safe. A message handed to an acceptance whose future is
//! dropped before it resolves (a lost `select!` branch, an elapsed `timeout`)
//! goes back to the front of the queue.
//!
//! # Examples
//!
//! ```rust
//! use notegraph_core::services::NotificationChannel;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let channel = NotificationChannel::new();
//! channel.notify("a");
//! channel.notify("b");
//!
//! assert_eq!(channel.accept().await?, "a");
//! assert_eq!(channel.accept().await?, "b");
//! # Ok(())
//! # }
//! ```

use crate::services::ChannelError;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, error};

#[derive(Debug)]
struct ChannelState<M> {
    queue: VecDeque<M>,
    pending: Option<oneshot::Sender<M>>,
    poisoned: bool,
    closed: bool,
}

#[derive(Debug)]
pub struct NotificationChannel<M> {
    state: Mutex<ChannelState<M>>,
}

impl<M> Default for NotificationChannel<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> NotificationChannel<M> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState {
                queue: VecDeque::new(),
                pending: None,
                poisoned: false,
                closed: false,
            }),
        }
    }

    /// Queue a message and deliver it if the consumer is waiting
    ///
    /// Messages sent after `close()` are dropped.
    pub fn notify(&self, message: M) {
        let mut state = self.lock();
        if state.closed {
            debug!("Dropping notification on closed channel");
            return;
        }
        state.queue.push_back(message);
        Self::deliver(&mut state);
    }

    /// Wait for the next message
    ///
    /// The acceptance is registered as soon as the future is first polled.
    pub async fn accept(&self) -> Result<M, ChannelError> {
        let mut acceptance = Acceptance {
            channel: self,
            receiver: self.register()?,
        };
        match (&mut acceptance.receiver).await {
            Ok(message) => Ok(message),
            Err(_) if self.is_poisoned() => Err(ChannelError::Poisoned),
            Err(_) => Err(ChannelError::Closed),
        }
    }

    /// Refuse further messages and fail any waiting acceptance
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.pending = None;
    }

    /// Number of queued, undelivered messages
    pub fn pending_len(&self) -> usize {
        self.lock().queue.len()
    }

    /// True while a consumer is waiting in `accept`
    pub fn has_waiting_consumer(&self) -> bool {
        self.lock()
            .pending
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }

    pub fn is_poisoned(&self) -> bool {
        self.lock().poisoned
    }

    fn register(&self) -> Result<oneshot::Receiver<M>, ChannelError> {
        let mut state = self.lock();
        if state.poisoned {
            return Err(ChannelError::Poisoned);
        }
        if state.closed {
            return Err(ChannelError::Closed);
        }
        if state
            .pending
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
        {
            error!("accept() called while another acceptance is pending; channel poisoned");
            state.poisoned = true;
            state.pending = None;
            return Err(ChannelError::AcceptAlreadyPending);
        }

        let (sender, receiver) = oneshot::channel();
        state.pending = Some(sender);
        Self::deliver(&mut state);
        Ok(receiver)
    }

    fn deliver(state: &mut ChannelState<M>) {
        if state.queue.is_empty() {
            return;
        }
        let Some(sender) = state.pending.take() else {
            return;
        };
        if let Some(message) = state.queue.pop_front() {
            if let Err(message) = sender.send(message) {
                // consumer went away before receiving
                state.queue.push_front(message);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState<M>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving end of one `accept` call
///
/// Requeues a message that was sent but never received.
struct Acceptance<'a, M> {
    channel: &'a NotificationChannel<M>,
    receiver: oneshot::Receiver<M>,
}

impl<M> Drop for Acceptance<'_, M> {
    fn drop(&mut self) {
        self.receiver.close();
        if let Ok(message) = self.receiver.try_recv() {
            debug!("Acceptance dropped before delivery; requeueing message");
            let mut state = self.channel.lock();
            state.queue.push_front(message);
            NotificationChannel::deliver(&mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_test::{assert_pending, assert_ready, assert_ready_eq, task};

    #[tokio::test]
    async fn test_queued_messages_are_delivered_in_order() {
        let channel = NotificationChannel::new();
        channel.notify(1);
        channel.notify(2);
        channel.notify(3);

        for expected in 1..=3 {
            let got = timeout(Duration::from_secs(1), channel.accept())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(got, expected);
        }
        assert_eq!(channel.pending_len(), 0);
    }

    #[test]
    fn test_waiting_acceptance_resolves_on_notify() {
        let channel = NotificationChannel::new();
        let mut accept = task::spawn(channel.accept());

        assert_pending!(accept.poll());
        assert!(channel.has_waiting_consumer());

        channel.notify("hello");
        assert!(accept.is_woken());
        assert_ready_eq!(accept.poll(), Ok("hello"));
    }

    #[test]
    fn test_second_concurrent_accept_poisons_channel() {
        let channel = NotificationChannel::<u32>::new();
        let mut first = task::spawn(channel.accept());
        assert_pending!(first.poll());

        let mut second = task::spawn(channel.accept());
        assert_ready_eq!(second.poll(), Err(ChannelError::AcceptAlreadyPending));

        assert!(channel.is_poisoned());
        assert_ready_eq!(first.poll(), Err(ChannelError::Poisoned));

        let mut third = task::spawn(channel.accept());
        assert_ready_eq!(third.poll(), Err(ChannelError::Poisoned));
    }

    #[test]
    fn test_dropped_acceptance_keeps_messages() {
        let channel = NotificationChannel::new();
        {
            let mut abandoned = task::spawn(channel.accept());
            assert_pending!(abandoned.poll());
        }
        assert!(!channel.has_waiting_consumer());

        channel.notify(7);
        assert_eq!(channel.pending_len(), 1);

        let mut next = task::spawn(channel.accept());
        assert_ready_eq!(next.poll(), Ok(7));
    }

    #[test]
    fn test_cancelled_acceptance_requeues_delivered_message() {
        let channel = NotificationChannel::new();
        let mut cancelled = task::spawn(channel.accept());
        assert_pending!(cancelled.poll());

        channel.notify("a");
        channel.notify("b");
        assert_eq!(channel.pending_len(), 1, "'a' is in flight to the acceptance");

        drop(cancelled);
        assert_eq!(channel.pending_len(), 2);

        let mut next = task::spawn(channel.accept());
        assert_ready_eq!(next.poll(), Ok("a"));
        let mut after = task::spawn(channel.accept());
        assert_ready_eq!(after.poll(), Ok("b"));
        assert!(!channel.is_poisoned());
    }

    #[tokio::test]
    async fn test_timed_out_accept_loses_nothing() {
        let channel = NotificationChannel::new();
        let missed = timeout(Duration::from_millis(10), channel.accept()).await;
        assert!(missed.is_err());
        assert!(!channel.has_waiting_consumer());

        channel.notify(1);

        let got = timeout(Duration::from_secs(1), channel.accept())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, 1);
    }

    #[test]
    fn test_close_fails_waiting_acceptance() {
        let channel = NotificationChannel::<u32>::new();
        let mut waiting = task::spawn(channel.accept());
        assert_pending!(waiting.poll());

        channel.close();
        let outcome = assert_ready!(waiting.poll());
        assert_eq!(outcome, Err(ChannelError::Closed));

        channel.notify(1);
        assert_eq!(channel.pending_len(), 0);
    }
}
