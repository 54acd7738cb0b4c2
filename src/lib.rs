//! Trail Arena - authoritative multiplayer trail survival game
//!
//! The server side runs one match task that owns the simulation and
//! streams snapshots and per-tick deltas over WebSockets. The `client`
//! module holds the browser-independent half: the state reconciler, the
//! layered render pipeline, HUD throttling and key mapping.

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
