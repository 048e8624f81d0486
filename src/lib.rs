//! Broadcaster is an HTTP request broadcaster for cache clusters.
//!
//! Every inbound request is replayed against each cache of a named group
//! (or of all groups) and answered with a JSON map of cache name to the
//! status that cache returned. Delivery goes through a bounded queue
//! drained by a fixed pool of workers, each reusing a warmed-up client
//! per cache.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate).
//! - [`config`] -- Caches file model, parsing, and validation behind the
//!   [`ConfigSource`](config::ConfigSource) trait.
//! - [`registry`] -- Immutable group-to-caches snapshots, swapped on reload.
//! - [`pool`] -- One pooled HTTP client per cache, warmed ahead of use.
//! - [`dispatch`] -- Jobs, the bounded queue, and the retrying workers.
//! - [`broadcast`] -- Fan-out of one request and aggregation of the replies.
//! - [`lifecycle`] -- Reload and shutdown events.
//! - [`server`] -- Axum router plus the plaintext and TLS listeners.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML caches file support _(enabled by default)_ |
//! | `json` | JSON caches file support |
//! | `toml` | TOML caches file support |
//! | `file-backends` | All file formats |
//! | `full` | All features |

// Binary crate, public functions are internal.
#![allow(clippy::missing_errors_doc)]

pub mod broadcast;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod pool;
pub mod registry;
pub mod server;
