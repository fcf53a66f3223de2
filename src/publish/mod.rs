//! Transport Resilience Policy
//!
//! This module handles:
//! - Connect, publish (retained) and disconnect as one bounded unit of work
//! - Converting every transport error or timeout into a transient outcome
//!
//! Restart escalation itself lives in `ivy_shared::resilience`.

mod publisher;

pub use publisher::Publisher;
