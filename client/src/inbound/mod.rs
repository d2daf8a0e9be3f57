//! Inbound adapters that turn user input into store operations while keeping
//! terminal details at the edge.
//!
//! The interactive console lives under [`console`].

pub mod console;
