//! Transport boundary.
//!
//! A transport feeds [`ChannelEvent`]s into the game loop and drains
//! [`OutboundLine`]s produced by the throttle. The chat protocol itself
//! lives behind this seam; the crate ships a console transport for local
//! play and testing.

pub mod console;

use log::debug;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::game::penalty::Occurrence;
use crate::game::types::Timestamp;
use crate::output::{LineSink, SendError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEventKind {
    /// The nick is present in the channel (joined, or seen at startup).
    Join,
    /// Channel message.
    Message { text: String },
    /// Private message to the bot: commands.
    Private { text: String },
    Part,
    Kick,
    Quit,
    NickChange { new_nick: String },
    NetsplitDeparture,
    NetsplitRejoin,
}

impl ChannelEventKind {
    /// The occurrence this event means for a logged-in character, if any.
    pub fn occurrence(&self) -> Option<Occurrence> {
        match self {
            ChannelEventKind::Message { text } => Some(Occurrence::Message {
                len: text.chars().count(),
            }),
            ChannelEventKind::Part => Some(Occurrence::Part),
            ChannelEventKind::Kick => Some(Occurrence::Kick),
            ChannelEventKind::Quit => Some(Occurrence::Quit),
            ChannelEventKind::NickChange { new_nick } => Some(Occurrence::NickChange {
                new_nick: new_nick.clone(),
            }),
            ChannelEventKind::NetsplitDeparture => Some(Occurrence::NetsplitDeparture),
            ChannelEventKind::NetsplitRejoin => Some(Occurrence::NetsplitRejoin),
            ChannelEventKind::Join | ChannelEventKind::Private { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    pub nick: String,
    pub userhost: String,
    pub kind: ChannelEventKind,
    pub at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundLine {
    /// `None` for the channel.
    pub recipient: Option<String>,
    pub text: String,
}

/// [`LineSink`] over a bounded channel to a transport writer task. A full
/// channel is back-pressure; a dropped receiver is a closed transport.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<OutboundLine>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<OutboundLine>) -> Self {
        Self { tx }
    }

    pub fn pair(buffer: usize) -> (Self, mpsc::Receiver<OutboundLine>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }
}

impl LineSink for ChannelSink {
    fn send(&mut self, recipient: Option<&str>, pieces: &[String]) -> Result<(), SendError> {
        if self.tx.is_closed() {
            return Err(SendError::Closed("writer task has stopped".into()));
        }
        // All pieces go or none do.
        if self.tx.capacity() < pieces.len() {
            debug!("Transport buffer full; holding line");
            return Err(SendError::Backpressure);
        }
        for piece in pieces {
            let line = OutboundLine {
                recipient: recipient.map(str::to_string),
                text: piece.clone(),
            };
            match self.tx.try_send(line) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => return Err(SendError::Backpressure),
                Err(TrySendError::Closed(_)) => {
                    return Err(SendError::Closed("writer task has stopped".into()))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_map_to_length_penalties() {
        let kind = ChannelEventKind::Message {
            text: "héllo".into(),
        };
        assert_eq!(kind.occurrence(), Some(Occurrence::Message { len: 5 }));
        assert_eq!(ChannelEventKind::Join.occurrence(), None);
        assert_eq!(
            ChannelEventKind::Private { text: "login".into() }.occurrence(),
            None
        );
    }

    #[tokio::test]
    async fn full_buffer_is_backpressure() {
        let (mut sink, mut rx) = ChannelSink::pair(2);
        let three: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(sink.send(None, &three), Err(SendError::Backpressure));
        assert!(sink.send(Some("mira"), &three[..2]).is_ok());
        assert_eq!(rx.recv().await.unwrap().recipient.as_deref(), Some("mira"));

        drop(rx);
        assert!(matches!(sink.send(None, &three[..1]), Err(SendError::Closed(_))));
    }
}
