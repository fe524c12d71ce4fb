#![warn(clippy::pedantic)]
// Sometimes a redundant else is clearer
#![allow(clippy::redundant_else)]
// Don't care enough to fix
#![allow(clippy::match_same_arms)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::wildcard_imports)]

pub mod lookup;
pub mod nameserver;
pub mod recursive;
pub mod responder;
pub mod udp;

pub use lookup::{Lookup, ResolutionError};
pub use recursive::{RecursiveResolver, Resolution};
pub use responder::Responder;
pub use udp::UdpServer;

mod local;
