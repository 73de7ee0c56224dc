use std::sync::atomic::Ordering;

use log::debug;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::PollError;
use crate::metrics::METRICS;
use crate::schema::Ticker;

/// Creates the bounded hand-off queue between the polling side and
/// the consuming side of the program.
///
/// CONTRACT:
/// - FIFO per producer, bounded to `capacity` records. `capacity`
///   must be at least 1; the config layer rejects zero at startup.
/// - Producers never drop a record: when the queue is full, `push`
///   parks the polling task until the consumer frees a slot. The
///   stall is counted in `queue_full_stalls`.
/// - The consumer never blocks: `try_pop` returns immediately with
///   `None` when nothing is buffered.
///
/// The sender side is cheap to clone; every scheduled client holds
/// its own handle.
pub fn bounded(capacity: usize) -> (TickerSender, TickerReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (TickerSender { tx }, TickerReceiver { rx })
}

/// Producer handle used by scheduled clients.
#[derive(Clone)]
pub struct TickerSender {
    tx: mpsc::Sender<Ticker>,
}

impl TickerSender {
    /// Hands one record to the consumer, waiting for queue space if
    /// necessary.
    ///
    /// Returns `PollError::QueueClosed` once the receiver is gone;
    /// clients treat that as their signal to stop producing.
    pub async fn push(&self, ticker: Ticker) -> Result<(), PollError> {
        match self.tx.try_send(ticker) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(ticker)) => {
                METRICS.queue_full_stalls.fetch_add(1, Ordering::Relaxed);
                debug!("[queue] full, waiting for the consumer to drain");
                self.tx.send(ticker).await.map_err(|_| PollError::QueueClosed)
            }
            Err(TrySendError::Closed(_)) => Err(PollError::QueueClosed),
        }
    }
}

/// Consumer handle, owned by whatever thread displays or stores the
/// records. Deliberately has no blocking receive.
pub struct TickerReceiver {
    rx: mpsc::Receiver<Ticker>,
}

impl TickerReceiver {
    /// Non-blocking pop. `None` means "nothing right now", whether
    /// the queue is merely empty or already closed.
    pub fn try_pop(&mut self) -> Option<Ticker> {
        self.rx.try_recv().ok()
    }
}
