//! Outbound adapters implementing domain ports.
//!
//! - **hosted**: reqwest client for the hosted auth (`/auth/v1`) and row
//!   storage (`/rest/v1`) service.
//!
//! Adapters translate between wire payloads and domain types. They contain no
//! business rules.

pub mod hosted;
