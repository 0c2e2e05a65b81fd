//! Lightship - a minimal container platform gateway
//!
//! One process fronts a Docker engine with three surfaces:
//! - A subdomain reverse proxy that routes `<name>.<domain>` to the matching
//!   running container
//! - A small REST API for deploying, listing, and stopping containers
//! - An embedded dashboard
//!
//! Containers publish one auto-detected port on an ephemeral host port. The
//! routing table is never cached; every request resolves against a fresh
//! engine snapshot.

pub mod api;
pub mod builder;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod orchestrator;
pub mod proxy;
pub mod resolver;
pub mod server;

pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
