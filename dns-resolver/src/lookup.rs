//! The capability the responder (C4) needs from whatever answers a
//! question (a static zone or a recursive resolver), expressed as a
//! small interface rather than a shared base class.

use async_trait::async_trait;

use dns_types::protocol::types::{Name, RrClass, RrType};
use dns_types::zone::DomainAuthority;

/// Errors a recursive resolve can surface. `RemoteRefused` is the only
/// variant the responder treats specially (mapping to `rcode=REFUSED`);
/// every other variant is reported up and converted into a generic
/// `rcode=SERVFAIL` by the responder's catch-all path.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum ResolutionError {
    #[error("upstream response was not a response message")]
    InvalidResponse,
    #[error("no upstream server responded within the round budget")]
    Timeout,
    #[error("exceeded the CNAME chase switch limit")]
    RecursionLimit,
    #[error("upstream server reported SERVFAIL")]
    RemoteFailure,
    #[error("upstream server refused the query")]
    RemoteRefused,
}

/// Either a static zone or a recursive resolver, from the responder's
/// point of view. `find_records` returns `Ok(vec![])`, not an error,
/// when there simply are no matching records: that's the normal "not
/// found" outcome, same as an empty zone-store match.
#[async_trait]
pub trait Lookup {
    async fn find_records(
        &self,
        labels: &Name,
        qtype: RrType,
        qclass: RrClass,
        recursive: bool,
    ) -> Result<Vec<dns_types::protocol::types::Rr>, ResolutionError>;

    fn find_authorities(&self, labels: &Name, rclass: RrClass) -> Vec<DomainAuthority>;

    fn supports_recursion(&self) -> bool;
}
