//! viking - command-line front-end for an OpenViking server.
//!
//! Indexing, embedding, search ranking and tiered summaries all happen in
//! the OpenViking server. This crate parses arguments, talks to the server
//! and formats what comes back.
//!
//! # Modules
//!
//! - [`commands`] - Command handlers and the client lifecycle
//! - [`client`] - Client trait, wire types and the HTTP implementation
//! - [`config`] - `ov.conf` loading and server URL resolution
//! - [`cli`] - Command-line interface definitions

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
