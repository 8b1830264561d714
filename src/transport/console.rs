//! Console transport: one scripted channel on stdin/stdout.
//!
//! Each input line describes one channel event:
//!
//! ```text
//! mira!mira@example.org join
//! mira say hello everyone
//! mira msg login Mira hunter22
//! mira nick mira_away
//! mira split
//! mira rejoin
//! mira part | kick | quit
//! ```
//!
//! The userhost defaults to `<nick>@console`. Output lines go to stdout,
//! private ones prefixed with the recipient.

use log::{debug, info, warn};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{ChannelEvent, ChannelEventKind, ChannelSink, OutboundLine};
use crate::game::types::Timestamp;
use crate::logutil::escape_log;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("empty line")]
    Empty,

    #[error("missing verb after nick")]
    MissingVerb,

    #[error("unknown verb '{0}'")]
    UnknownVerb(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
}

pub fn parse_console_line(line: &str, at: Timestamp) -> Result<ChannelEvent, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ConsoleError::Empty);
    }
    let (who, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let (nick, userhost) = match who.split_once('!') {
        Some((nick, host)) => (nick.to_string(), host.to_string()),
        None => (who.to_string(), format!("{who}@console")),
    };
    let rest = rest.trim_start();
    if rest.is_empty() {
        return Err(ConsoleError::MissingVerb);
    }
    let (verb, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let args = args.trim();

    let kind = match verb.to_ascii_lowercase().as_str() {
        "join" => ChannelEventKind::Join,
        "say" => ChannelEventKind::Message {
            text: args.to_string(),
        },
        "msg" => {
            if args.is_empty() {
                return Err(ConsoleError::MissingArgument("msg"));
            }
            ChannelEventKind::Private {
                text: args.to_string(),
            }
        }
        "nick" => {
            if args.is_empty() {
                return Err(ConsoleError::MissingArgument("nick"));
            }
            ChannelEventKind::NickChange {
                new_nick: args.to_string(),
            }
        }
        "part" => ChannelEventKind::Part,
        "kick" => ChannelEventKind::Kick,
        "quit" => ChannelEventKind::Quit,
        "split" => ChannelEventKind::NetsplitDeparture,
        "rejoin" => ChannelEventKind::NetsplitRejoin,
        other => return Err(ConsoleError::UnknownVerb(other.to_string())),
    };
    Ok(ChannelEvent {
        nick,
        userhost,
        kind,
        at,
    })
}

pub struct ConsoleTransport {
    pub events: mpsc::Receiver<ChannelEvent>,
    pub sink: ChannelSink,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ConsoleTransport {
    /// Spawns the stdin reader and stdout writer tasks.
    pub fn spawn(buffer: usize) -> Self {
        let (event_tx, events) = mpsc::channel(buffer.max(1));
        let (sink, mut out_rx) = ChannelSink::pair(buffer);

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match parse_console_line(&line, chrono::Utc::now().timestamp()) {
                        Ok(event) => {
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(ConsoleError::Empty) => {}
                        Err(e) => warn!("Ignoring console line '{}': {}", escape_log(&line), e),
                    },
                    Ok(None) => {
                        info!("Console input closed");
                        break;
                    }
                    Err(e) => {
                        warn!("Console read error: {}", e);
                        break;
                    }
                }
            }
            debug!("Console reader stopped");
        });

        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(line) = out_rx.recv().await {
                let rendered = format!("{}\n", render(&line));
                if let Err(e) = stdout.write_all(rendered.as_bytes()).await {
                    warn!("Console write error: {}", e);
                    break;
                }
                let _ = stdout.flush().await;
            }
            debug!("Console writer stopped");
        });

        Self {
            events,
            sink,
            reader,
            writer,
        }
    }

    pub fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Renders an outbound line the way the console writer prints it.
pub fn render(line: &OutboundLine) -> String {
    match &line.recipient {
        Some(nick) => format!("-> {}: {}", nick, line.text),
        None => line.text.clone(),
    }
}
