//! # idlequest - an idle role-playing game for chat channels
//!
//! Characters level up by staying connected and quiet. The longer they
//! idle, the higher they climb; talking, leaving or changing nick costs
//! time. Along the way they wander a grid map, fight whoever they bump
//! into, find items and are sent on cooperative quests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use idlequest::config::Config;
//! use idlequest::server::GameServer;
//! use idlequest::storage::open_store;
//! use idlequest::transport::console::ConsoleTransport;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = open_store(&config.storage)?;
//!     let console = ConsoleTransport::spawn(config.throttle.transport_buffer);
//!     let ConsoleTransport { events, sink, .. } = console;
//!     let mut server = GameServer::new(config, store, Box::new(sink))?;
//!     server.run(events).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - the world: ledger, leveling, penalties, map, quests, events
//! - [`server`] - the game loop and private-message commands
//! - [`output`] - rate-limited narrative delivery
//! - [`transport`] - the chat boundary and a console transport
//! - [`storage`] - flat-file and SQLite stores, artifacts, backups
//! - [`config`] - configuration loading and validation
//! - [`auth`] - password hashing
//! - [`validation`] - name, class and password checks
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  ChannelEvent  ┌─────────────┐  lines  ┌─────────────┐
//! │  Transport  │ ─────────────▶ │ Game Server │ ──────▶ │  Throttle   │ ─▶ Transport
//! └─────────────┘                └─────────────┘         └─────────────┘
//!                                       │
//!                                ┌─────────────┐
//!                                │   Storage   │
//!                                └─────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod game;
pub mod logutil;
pub mod output;
pub mod server;
pub mod storage;
pub mod transport;
pub mod validation;
