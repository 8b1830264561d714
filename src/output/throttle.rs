//! Rate-limited, ordered release of narrative lines.
//!
//! At most `rate` lines leave in any sliding `period` window. A line is
//! wrapped on word boundaries when it is released and all of its pieces
//! count as one line. A sink that is busy or failing leaves the line at the
//! head of the queue; late lines are logged, never dropped.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::ThrottleConfig;
use crate::logutil::escape_log;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeLine {
    /// `None` for the channel, otherwise a private recipient nick.
    pub recipient: Option<String>,
    pub text: String,
    pub deliver_by: Instant,
}

impl NarrativeLine {
    pub fn channel(text: impl Into<String>, deliver_by: Instant) -> Self {
        Self {
            recipient: None,
            text: text.into(),
            deliver_by,
        }
    }

    pub fn private(nick: &str, text: impl Into<String>, deliver_by: Instant) -> Self {
        Self {
            recipient: Some(nick.to_string()),
            text: text.into(),
            deliver_by,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("transport is applying back-pressure")]
    Backpressure,

    #[error("transport closed: {0}")]
    Closed(String),
}

/// Where released lines go. `pieces` are the wrapped parts of one line and
/// must be accepted or refused as a whole.
pub trait LineSink: Send {
    fn send(&mut self, recipient: Option<&str>, pieces: &[String]) -> Result<(), SendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    pub rate: usize,
    pub period: Duration,
    pub wrap_width: usize,
    pub deliver_within: Duration,
}

impl ThrottlePolicy {
    pub fn from_config(cfg: &ThrottleConfig) -> Self {
        Self {
            rate: cfg.rate.max(1),
            period: Duration::from_secs(cfg.period_secs),
            wrap_width: cfg.wrap_width,
            deliver_within: Duration::from_secs(cfg.deliver_within_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub delivered: usize,
    pub late: usize,
    pub backpressure: bool,
    pub closed: bool,
}

pub struct OutputQueue {
    policy: ThrottlePolicy,
    pending: VecDeque<NarrativeLine>,
    /// Release instants inside the current window, oldest first.
    sent_at: VecDeque<Instant>,
}

impl OutputQueue {
    pub fn new(policy: ThrottlePolicy) -> Self {
        Self {
            policy,
            pending: VecDeque::new(),
            sent_at: VecDeque::new(),
        }
    }

    pub fn policy(&self) -> &ThrottlePolicy {
        &self.policy
    }

    pub fn enqueue(&mut self, line: NarrativeLine) {
        self.pending.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(first) = self.sent_at.front() {
            if now.saturating_duration_since(*first) >= self.policy.period {
                self.sent_at.pop_front();
            } else {
                break;
            }
        }
    }

    /// Earliest instant another line may leave, or `None` when idle.
    pub fn next_release(&mut self, now: Instant) -> Option<Instant> {
        if self.pending.is_empty() {
            return None;
        }
        self.prune(now);
        if self.sent_at.len() < self.policy.rate {
            Some(now)
        } else {
            self.sent_at.front().map(|first| *first + self.policy.period)
        }
    }

    /// Releases as many lines as the window allows, in FIFO order.
    pub fn drain(&mut self, now: Instant, sink: &mut dyn LineSink) -> DrainStats {
        let mut stats = DrainStats::default();
        loop {
            self.prune(now);
            if self.sent_at.len() >= self.policy.rate {
                break;
            }
            let Some(line) = self.pending.front() else {
                break;
            };
            let pieces = wrap(&line.text, self.policy.wrap_width);
            match sink.send(line.recipient.as_deref(), &pieces) {
                Ok(()) => {}
                Err(SendError::Backpressure) => {
                    stats.backpressure = true;
                    break;
                }
                Err(SendError::Closed(reason)) => {
                    log::warn!("Output sink closed: {}", reason);
                    stats.closed = true;
                    break;
                }
            }
            if now > line.deliver_by {
                stats.late += 1;
                log::warn!(
                    "Late line ({:?} past deadline): {}",
                    now.duration_since(line.deliver_by),
                    escape_log(&line.text)
                );
            }
            self.pending.pop_front();
            self.sent_at.push_back(now);
            stats.delivered += 1;
        }
        stats
    }
}

/// Splits `text` into pieces of at most `width` characters on word
/// boundaries. Words longer than `width` are cut. A width of zero disables
/// wrapping.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    if width == 0 || text.chars().count() <= width {
        return vec![text.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            pieces.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }
    if current_len > 0 {
        pieces.push(current);
    }
    if pieces.is_empty() {
        return vec![text.to_string()];
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<(Option<String>, Vec<String>)>,
        refuse: bool,
    }

    impl LineSink for Recorder {
        fn send(&mut self, recipient: Option<&str>, pieces: &[String]) -> Result<(), SendError> {
            if self.refuse {
                return Err(SendError::Backpressure);
            }
            self.sent.push((recipient.map(str::to_string), pieces.to_vec()));
            Ok(())
        }
    }

    fn policy(rate: usize, secs: u64, width: usize) -> ThrottlePolicy {
        ThrottlePolicy {
            rate,
            period: Duration::from_secs(secs),
            wrap_width: width,
            deliver_within: Duration::from_secs(60),
        }
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(wrap("short", 10), vec!["short"]);
        assert_eq!(wrap("aaa bbb ccc", 7), vec!["aaa bbb", "ccc"]);
        assert_eq!(wrap("abcdefghij kl", 4), vec!["abcd", "efgh", "ij", "kl"]);
        assert_eq!(wrap("anything at all", 0), vec!["anything at all"]);
    }

    #[test]
    fn blank_line_still_yields_a_piece() {
        let blank = " ".repeat(20);
        assert_eq!(wrap(&blank, 16), vec![blank.clone()]);

        let mut queue = OutputQueue::new(policy(5, 10, 16));
        let start = Instant::now();
        queue.enqueue(NarrativeLine::channel(blank.clone(), start + Duration::from_secs(60)));
        let mut sink = Recorder::default();
        assert_eq!(queue.drain(start, &mut sink).delivered, 1);
        assert_eq!(sink.sent[0].1, vec![blank]);
    }

    #[test]
    fn wrapped_pieces_count_as_one_line() {
        let mut queue = OutputQueue::new(policy(1, 10, 5));
        let start = Instant::now();
        queue.enqueue(NarrativeLine::channel("one two three", start + Duration::from_secs(60)));
        queue.enqueue(NarrativeLine::channel("four", start + Duration::from_secs(60)));
        let mut sink = Recorder::default();
        let stats = queue.drain(start, &mut sink);
        assert_eq!(stats.delivered, 1);
        assert_eq!(sink.sent[0].1, vec!["one", "two", "three"]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn refused_line_stays_at_head() {
        let mut queue = OutputQueue::new(policy(5, 10, 0));
        let start = Instant::now();
        queue.enqueue(NarrativeLine::channel("first", start));
        queue.enqueue(NarrativeLine::private("mira", "second", start));
        let mut sink = Recorder {
            refuse: true,
            ..Default::default()
        };
        let stats = queue.drain(start, &mut sink);
        assert!(stats.backpressure);
        assert_eq!(queue.len(), 2);

        sink.refuse = false;
        queue.drain(start, &mut sink);
        assert_eq!(sink.sent[0].1, vec!["first"]);
        assert_eq!(sink.sent[1].0.as_deref(), Some("mira"));
    }

    #[test]
    fn late_lines_are_still_delivered() {
        let mut queue = OutputQueue::new(policy(5, 10, 0));
        let start = Instant::now();
        queue.enqueue(NarrativeLine::channel("old news", start));
        let mut sink = Recorder::default();
        let stats = queue.drain(start + Duration::from_secs(1), &mut sink);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.late, 1);
    }

    #[test]
    fn next_release_waits_for_the_window() {
        let mut queue = OutputQueue::new(policy(1, 10, 0));
        let start = Instant::now();
        let by = start + Duration::from_secs(60);
        queue.enqueue(NarrativeLine::channel("a", by));
        queue.enqueue(NarrativeLine::channel("b", by));
        assert_eq!(queue.next_release(start), Some(start));
        queue.drain(start, &mut Recorder::default());
        assert_eq!(queue.next_release(start), Some(start + Duration::from_secs(10)));
    }
}
