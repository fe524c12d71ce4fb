//! The authoritative zone store: holds statically-configured resource
//! records and delegations, and answers lookups against them.

pub mod types;

pub use types::{DomainAuthority, ZoneStore};
