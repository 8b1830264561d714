//! Output throttle task.
//!
//! [`start_throttle`] spawns a task that owns the [`OutputQueue`] and the
//! transport sink. The game loop talks to it only through a
//! [`ThrottleHandle`], so enqueueing never blocks a tick.
//!
//! * `Enqueue` appends to the queue.
//! * `Snapshot` reports queue depth and running totals.
//! * `Shutdown` flushes what the window allows within a short grace
//!   period, then stops the task.

use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

use super::throttle::{DrainStats, LineSink, NarrativeLine, OutputQueue, ThrottlePolicy};

/// Longest the task keeps flushing after a shutdown request.
const FLUSH_LIMIT: Duration = Duration::from_secs(10);
const TICK: Duration = Duration::from_millis(50);

pub enum ThrottleCommand {
    Enqueue(NarrativeLine),
    Snapshot(oneshot::Sender<ThrottleStats>),
    Shutdown(oneshot::Sender<ThrottleStats>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleStats {
    pub queued: usize,
    pub delivered_total: u64,
    pub late_total: u64,
    pub backpressure_total: u64,
}

#[derive(Clone, Debug)]
pub struct ThrottleHandle {
    tx: mpsc::UnboundedSender<ThrottleCommand>,
    deliver_within: Duration,
}

impl ThrottleHandle {
    pub fn enqueue(&self, line: NarrativeLine) {
        let _ = self.tx.send(ThrottleCommand::Enqueue(line));
    }

    pub fn say(&self, text: impl Into<String>) {
        self.enqueue(NarrativeLine::channel(text, Instant::now() + self.deliver_within));
    }

    pub fn tell(&self, nick: &str, text: impl Into<String>) {
        self.enqueue(NarrativeLine::private(nick, text, Instant::now() + self.deliver_within));
    }

    pub async fn snapshot(&self) -> Option<ThrottleStats> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(ThrottleCommand::Snapshot(tx)).is_ok() {
            rx.await.ok()
        } else {
            None
        }
    }

    /// Stops the task after its final flush. Returns the last stats, or
    /// `None` if the task was already gone.
    pub async fn shutdown(&self) -> Option<ThrottleStats> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(ThrottleCommand::Shutdown(tx)).is_ok() {
            rx.await.ok()
        } else {
            None
        }
    }
}

fn release(queue: &mut OutputQueue, stats: &mut ThrottleStats, sink: &mut dyn LineSink) -> DrainStats {
    let drained = queue.drain(Instant::now(), sink);
    stats.delivered_total += drained.delivered as u64;
    stats.late_total += drained.late as u64;
    if drained.backpressure {
        stats.backpressure_total += 1;
    }
    drained
}

pub fn start_throttle(policy: ThrottlePolicy, mut sink: Box<dyn LineSink>) -> ThrottleHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<ThrottleCommand>();
    let handle = ThrottleHandle {
        tx,
        deliver_within: policy.deliver_within,
    };

    tokio::spawn(async move {
        let mut queue = OutputQueue::new(policy);
        let mut stats = ThrottleStats::default();
        loop {
            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        Some(ThrottleCommand::Enqueue(line)) => queue.enqueue(line),
                        Some(ThrottleCommand::Snapshot(resp)) => {
                            let _ = resp.send(ThrottleStats { queued: queue.len(), ..stats });
                        }
                        Some(ThrottleCommand::Shutdown(done)) => {
                            let deadline = Instant::now() + FLUSH_LIMIT;
                            while !queue.is_empty() && Instant::now() < deadline {
                                let drained = release(&mut queue, &mut stats, sink.as_mut());
                                if drained.closed {
                                    break;
                                }
                                let wait = queue
                                    .next_release(Instant::now())
                                    .map(|at| at.saturating_duration_since(Instant::now()))
                                    .unwrap_or_default()
                                    .max(TICK);
                                tokio::time::sleep(wait).await;
                            }
                            if !queue.is_empty() {
                                log::warn!("Throttle stopped with {} line(s) undelivered", queue.len());
                            }
                            let _ = done.send(ThrottleStats { queued: queue.len(), ..stats });
                            break;
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep(TICK) => {}
            }
            if !queue.is_empty() {
                release(&mut queue, &mut stats, sink.as_mut());
            }
        }
        log::debug!(
            "Throttle task stopped: delivered={} late={} backpressure={}",
            stats.delivered_total,
            stats.late_total,
            stats.backpressure_total
        );
    });

    handle
}
