//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Field names are camelCase, matching the rest of the membership API.

pub mod auth;
pub mod ballot;
pub mod election;
pub mod id;
pub mod member;
