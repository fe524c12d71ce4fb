//! Wire format for DNS messages: types, decoding, and encoding.
//!
//! See RFC 1035 section 4.

pub mod deserialise;
pub mod serialise;
pub mod types;
