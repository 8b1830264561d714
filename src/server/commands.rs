//! Private-message commands.
//!
//! Players talk to the game only through a handful of short commands sent
//! privately to the bot. [`parse_command`] turns the text into a
//! [`Command`]; [`CommandProcessor::process`] applies it to the [`World`]
//! and returns a [`Report`] whose notices are the replies.
//!
//! | command                              | effect                                 |
//! |--------------------------------------|----------------------------------------|
//! | `register <name> <password> <class>` | create a character and log it in       |
//! | `login <name> <password>`            | bind the sender's nick to a character  |
//! | `logout`                             | leave the game (logout penalty)        |
//! | `status [name]`                      | level, TTL and alignment               |
//! | `whoami`                             | which character the nick plays         |
//! | `align good\|neutral\|evil`          | change alignment                       |
//! | `help`                               | command summary                        |
//! | `retire <name>` *(admin)*            | archive a character                    |
//! | `die` *(admin)*                      | save and shut the server down          |

use log::{info, warn};
use thiserror::Error;

use crate::auth::PasswordVault;
use crate::game::events::Report;
use crate::game::format::duration;
use crate::game::ledger::LedgerError;
use crate::game::penalty::Occurrence;
use crate::game::types::{Alignment, Timestamp};
use crate::game::World;
use crate::logutil::escape_log;
use crate::validation::{validate_character_name, validate_class, validate_password};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register {
        name: String,
        password: String,
        class: String,
    },
    Login {
        name: String,
        password: String,
    },
    Logout,
    Status {
        name: Option<String>,
    },
    Whoami,
    Align(Alignment),
    Help,
    Retire {
        name: String,
    },
    Die,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'; try HELP")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parses one private message. The verb is case-insensitive; the class of
/// a `register` is the rest of the line and may contain spaces.
pub fn parse_command(text: &str) -> Result<Command, CommandError> {
    let text = text.trim();
    let (verb, rest) = match text.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (text, ""),
    };
    if verb.is_empty() {
        return Err(CommandError::Empty);
    }
    let mut args = rest.split_whitespace();
    match verb.to_ascii_lowercase().as_str() {
        "register" => {
            const USAGE: &str = "REGISTER <name> <password> <class>";
            let mut parts = rest.splitn(3, char::is_whitespace);
            let name = parts.next().filter(|s| !s.is_empty());
            let password = parts.next().filter(|s| !s.is_empty());
            let class = parts.next().map(str::trim).filter(|s| !s.is_empty());
            match (name, password, class) {
                (Some(name), Some(password), Some(class)) => Ok(Command::Register {
                    name: name.to_string(),
                    password: password.to_string(),
                    class: class.to_string(),
                }),
                _ => Err(CommandError::Usage(USAGE)),
            }
        }
        "login" => match (args.next(), args.next()) {
            (Some(name), Some(password)) => Ok(Command::Login {
                name: name.to_string(),
                password: password.to_string(),
            }),
            _ => Err(CommandError::Usage("LOGIN <name> <password>")),
        },
        "logout" => Ok(Command::Logout),
        "status" => Ok(Command::Status {
            name: args.next().map(str::to_string),
        }),
        "whoami" => Ok(Command::Whoami),
        "align" => args
            .next()
            .and_then(Alignment::parse)
            .map(Command::Align)
            .ok_or(CommandError::Usage("ALIGN good|neutral|evil")),
        "help" => Ok(Command::Help),
        "retire" => args
            .next()
            .map(|name| Command::Retire {
                name: name.to_string(),
            })
            .ok_or(CommandError::Usage("RETIRE <name>")),
        "die" => Ok(Command::Die),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

/// What a processed command asks of the server beyond its replies.
#[derive(Debug, Default)]
pub struct CommandOutcome {
    pub report: Report,
    pub shutdown: bool,
}

pub struct CommandProcessor {
    vault: PasswordVault,
}

impl CommandProcessor {
    pub fn new(vault: PasswordVault) -> Self {
        Self { vault }
    }

    pub fn process(
        &self,
        world: &mut World,
        nick: &str,
        userhost: &str,
        text: &str,
        now: Timestamp,
    ) -> CommandOutcome {
        let mut outcome = CommandOutcome::default();
        let command = match parse_command(text) {
            Ok(command) => command,
            Err(CommandError::Empty) => return outcome,
            Err(e) => {
                outcome.report.tell(nick, e.to_string());
                return outcome;
            }
        };
        let report = &mut outcome.report;
        let playing = world.ledger().name_for_nick(nick);

        match command {
            Command::Register { name, password, class } => {
                if let Some(current) = playing {
                    report.tell(nick, format!("You are already online as {current}."));
                    return outcome;
                }
                let max_name = world.config().game.max_name_len;
                let max_class = world.config().game.max_class_len;
                let name = match validate_character_name(&name, max_name) {
                    Ok(name) => name,
                    Err(e) => {
                        report.tell(nick, e.to_string());
                        return outcome;
                    }
                };
                let class = match validate_class(&class, max_class) {
                    Ok(class) => class,
                    Err(e) => {
                        report.tell(nick, e.to_string());
                        return outcome;
                    }
                };
                if let Err(e) = validate_password(&password) {
                    report.tell(nick, e.to_string());
                    return outcome;
                }
                if world.ledger().contains(&name) {
                    report.tell(nick, format!("Sorry, the name {name} is already taken."));
                    return outcome;
                }
                let hash = match self.vault.hash(&password) {
                    Ok(hash) => hash,
                    Err(e) => {
                        warn!("Registration of {} failed: {}", escape_log(&name), e);
                        report.tell(nick, "Registration failed; please try again later.");
                        return outcome;
                    }
                };
                match world.register(&name, &class, &hash, nick, userhost, now) {
                    Ok(registered) => {
                        report.merge(registered);
                        let ttl = world.ledger().get(&name).map(|c| c.ttl).unwrap_or_default();
                        report.tell(
                            nick,
                            format!("Success! Account {name} created. You have {} until level 1.", duration(ttl)),
                        );
                    }
                    Err(e) => report.tell(nick, ledger_reply(&e)),
                }
            }

            Command::Login { name, password } => {
                if let Some(current) = playing {
                    report.tell(nick, format!("You are already online as {current}."));
                    return outcome;
                }
                let verified = world
                    .ledger()
                    .get(&name)
                    .is_some_and(|c| self.vault.verify(&password, &c.password_hash));
                if !verified {
                    info!("Failed login for {} from {}", escape_log(&name), escape_log(nick));
                    report.tell(nick, "Wrong name or password.");
                    return outcome;
                }
                match world.login(&name, nick, userhost, now) {
                    Ok(logged_in) => {
                        report.merge(logged_in);
                        report.tell(nick, "Logon successful.");
                    }
                    Err(e) => report.tell(nick, ledger_reply(&e)),
                }
            }

            Command::Logout => {
                if playing.is_none() {
                    report.tell(nick, "You are not logged in.");
                    return outcome;
                }
                report.merge(world.apply_occurrence(nick, Occurrence::Logout, now));
                report.tell(nick, "You have been logged out.");
            }

            Command::Status { name } => {
                let target = name.or(playing);
                let Some(target) = target else {
                    report.tell(nick, "You are not logged in. Try STATUS <name>.");
                    return outcome;
                };
                match world.ledger().get(&target) {
                    Some(c) => report.tell(
                        nick,
                        format!(
                            "{}: level {} {}; {}; {} until level {}; idled {}; {}.",
                            c.name,
                            c.level,
                            c.class,
                            c.alignment.as_str(),
                            duration(c.ttl),
                            c.level + 1,
                            duration(c.idled),
                            if c.archived {
                                "retired"
                            } else if c.online {
                                "online"
                            } else {
                                "offline"
                            }
                        ),
                    ),
                    None => report.tell(nick, format!("No such character {target}.")),
                }
            }

            Command::Whoami => match playing {
                Some(name) => {
                    let text = world
                        .ledger()
                        .get(&name)
                        .map(|c| {
                            format!(
                                "You are {}, the level {} {}. Next level in {}.",
                                c.name,
                                c.level,
                                c.class,
                                duration(c.ttl)
                            )
                        })
                        .unwrap_or_default();
                    report.tell(nick, text);
                }
                None => report.tell(nick, "You are not logged in."),
            },

            Command::Align(alignment) => {
                let Some(name) = playing else {
                    report.tell(nick, "You are not logged in.");
                    return outcome;
                };
                match world.set_alignment(&name, alignment) {
                    Ok(()) => report.tell(nick, format!("Your alignment was changed to {}.", alignment.as_str())),
                    Err(e) => report.tell(nick, ledger_reply(&e)),
                }
            }

            Command::Help => {
                for line in HELP {
                    report.tell(nick, *line);
                }
            }

            Command::Retire { name } => {
                if !is_admin(world, playing.as_deref()) {
                    report.tell(nick, "You don't have access to RETIRE.");
                    return outcome;
                }
                match world.archive(&name, now) {
                    Ok(retired) => {
                        report.merge(retired);
                        report.tell(nick, format!("{name} has been retired."));
                    }
                    Err(e) => report.tell(nick, ledger_reply(&e)),
                }
            }

            Command::Die => {
                if !is_admin(world, playing.as_deref()) {
                    report.tell(nick, "You don't have access to DIE.");
                    return outcome;
                }
                info!("Shutdown requested by {}", escape_log(nick));
                report.tell(nick, "Shutting down.");
                outcome.shutdown = true;
            }
        }
        outcome
    }
}

const HELP: &[&str] = &[
    "REGISTER <name> <password> <class>  create a character",
    "LOGIN <name> <password>  resume playing; LOGOUT to stop (penalised)",
    "STATUS [name]  WHOAMI  ALIGN good|neutral|evil",
];

fn is_admin(world: &World, playing: Option<&str>) -> bool {
    playing
        .and_then(|name| world.ledger().get(name))
        .is_some_and(|c| c.is_admin)
}

fn ledger_reply(e: &LedgerError) -> String {
    match e {
        LedgerError::Duplicate(name) => format!("Sorry, the name {name} is already taken."),
        LedgerError::NotFound(_) => "Wrong name or password.".to_string(),
        LedgerError::Archived(name) => format!("{name} has been retired and can no longer play."),
        LedgerError::AlreadyOnline(name) => format!("{name} is already online."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_keeps_its_spaces() {
        assert_eq!(
            parse_command("REGISTER Mira s3cret Wandering  Bard ").unwrap(),
            Command::Register {
                name: "Mira".into(),
                password: "s3cret".into(),
                class: "Wandering  Bard".into(),
            }
        );
    }

    #[test]
    fn verbs_are_case_insensitive() {
        assert_eq!(parse_command("WhoAmI").unwrap(), Command::Whoami);
        assert_eq!(
            parse_command("status mira").unwrap(),
            Command::Status {
                name: Some("mira".into())
            }
        );
        assert_eq!(parse_command("align EVIL").unwrap(), Command::Align(Alignment::Evil));
    }

    #[test]
    fn usage_errors() {
        assert_eq!(
            parse_command("register Mira"),
            Err(CommandError::Usage("REGISTER <name> <password> <class>"))
        );
        assert_eq!(parse_command("login Mira"), Err(CommandError::Usage("LOGIN <name> <password>")));
        assert_eq!(parse_command("align chaotic"), Err(CommandError::Usage("ALIGN good|neutral|evil")));
        assert_eq!(parse_command("dance"), Err(CommandError::Unknown("dance".into())));
        assert_eq!(parse_command("   "), Err(CommandError::Empty));
    }
}
