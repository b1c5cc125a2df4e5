//! Aerodesk API Library Crate
//!
//! Everything behind the HTTP service: configuration, the shared application
//! state, REST handlers, the voice relay websocket and routing. The `api`
//! binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;

#[cfg(test)]
mod testing;
