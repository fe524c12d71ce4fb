//! `Lookup` over a static [`ZoneStore`], used by the responder when
//! configured with no upstream servers.

use async_trait::async_trait;

use dns_types::protocol::types::{Name, Rr, RrClass, RrType};
use dns_types::zone::{DomainAuthority, ZoneStore};

use crate::lookup::{Lookup, ResolutionError};

#[async_trait]
impl Lookup for ZoneStore {
    async fn find_records(
        &self,
        labels: &Name,
        qtype: RrType,
        qclass: RrClass,
        recursive: bool,
    ) -> Result<Vec<Rr>, ResolutionError> {
        Ok(self.find_records(labels, qtype, qclass, recursive))
    }

    fn find_authorities(&self, labels: &Name, rclass: RrClass) -> Vec<DomainAuthority> {
        self.find_authorities(labels, rclass)
    }

    fn supports_recursion(&self) -> bool {
        self.supports_recursion()
    }
}
