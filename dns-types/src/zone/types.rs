use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::protocol::types::{Name, Rr, RrClass, RrType};

/// A delegation: the zone/subtree rooted at `domain` is served by the
/// nameserver `name`, with `ips` as glue A-records for it. Comparisons
/// (and the dedup performed by [`ZoneStore::find_authorities`])
/// consider every field.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DomainAuthority {
    pub domain: Name,
    pub name: Name,
    pub rclass: RrClass,
    pub ips: Vec<Ipv4Addr>,
    pub ttl: u32,
}

/// Authoritative records and delegations for a set of zones, matched
/// by exact name or wildcard. Once constructed via [`ZoneStore::add_record`]
/// and [`ZoneStore::add_authority`], lookups never mutate it and never
/// fail.
#[derive(Debug, Clone, Default)]
pub struct ZoneStore {
    exact: HashMap<String, Vec<Rr>>,
    wildcard: HashMap<String, Vec<Rr>>,
    authorities: Vec<DomainAuthority>,
}

impl ZoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&mut self, record: Rr) {
        let key = record.labels.canonical_key();
        if record
            .labels
            .labels()
            .first()
            .is_some_and(crate::protocol::types::Label::is_wildcard)
            && record.labels.len() >= 2
        {
            self.wildcard.entry(key.clone()).or_default().push(record.clone());
        }
        self.exact.entry(key).or_default().push(record);
    }

    pub fn add_authority(&mut self, authority: DomainAuthority) {
        self.authorities.push(authority);
    }

    /// Exact + wildcard lookup. `recursive` is `true` when the query
    /// asked for recursion; this store never performs recursion, so
    /// that case always returns empty (recursion is handled by a
    /// different `Lookup` implementation, never by this one).
    pub fn find_records(
        &self,
        labels: &Name,
        qtype: RrType,
        qclass: RrClass,
        recursive: bool,
    ) -> Vec<Rr> {
        if recursive {
            return Vec::new();
        }

        let mut found = Vec::new();

        if let Some(candidates) = self.exact.get(&labels.canonical_key()) {
            for candidate in candidates {
                if matches(candidate, qtype, qclass) {
                    found.push(candidate.clone());
                }
            }
        }

        let all_labels = labels.labels();
        if all_labels.len() >= 2 {
            for i in 1..all_labels.len() {
                let mut key_labels = vec![crate::protocol::types::Label::wildcard()];
                key_labels.extend_from_slice(&all_labels[i..]);
                let key = Name::new(key_labels).canonical_key();
                if let Some(candidates) = self.wildcard.get(&key) {
                    for candidate in candidates {
                        if matches(candidate, qtype, qclass) {
                            found.push(candidate.clone());
                        }
                    }
                }
            }
        }

        found
    }

    /// Authorities whose `domain` is a suffix of `labels` (compared
    /// label-wise from the right), deduplicated, for the given class.
    pub fn find_authorities(&self, labels: &Name, rclass: RrClass) -> Vec<DomainAuthority> {
        let mut found: Vec<DomainAuthority> = Vec::new();
        for authority in &self.authorities {
            if authority.rclass != rclass {
                continue;
            }
            if !is_suffix(authority.domain.labels(), labels.labels()) {
                continue;
            }
            if !found.contains(authority) {
                found.push(authority.clone());
            }
        }
        found
    }

    pub fn supports_recursion(&self) -> bool {
        false
    }
}

fn matches(candidate: &Rr, qtype: RrType, qclass: RrClass) -> bool {
    if candidate.rclass != qclass {
        return false;
    }
    candidate.rtype == qtype
        || qtype == RrType::All
        || (qtype == RrType::A && candidate.rtype == RrType::Cname)
}

/// Is `domain` a suffix of `labels`, compared label-wise right to
/// left?
fn is_suffix(domain: &[crate::protocol::types::Label], labels: &[crate::protocol::types::Label]) -> bool {
    if domain.len() > labels.len() {
        return false;
    }
    let offset = labels.len() - domain.len();
    domain == &labels[offset..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::Name;

    fn name(labels: &[&str]) -> Name {
        Name::from_dotted(&labels.join(".")).unwrap()
    }

    #[test]
    fn wildcard_matches_deeper_names_but_not_itself() {
        let mut zone = ZoneStore::new();
        let mut wildcard_labels = vec![crate::protocol::types::Label::wildcard()];
        wildcard_labels.extend(name(&["example", "com"]).labels().iter().cloned());
        let wildcard_name = Name::new(wildcard_labels);
        zone.add_record(Rr::a(wildcard_name, Ipv4Addr::UNSPECIFIED, 86400));

        let deep = name(&["a", "b", "c", "d", "example", "com"]);
        let found = zone.find_records(&deep, RrType::A, RrClass::In, false);
        assert_eq!(found.len(), 1);

        let single = name(&["example", "com"]);
        let found_single = zone.find_records(&single, RrType::A, RrClass::In, false);
        assert!(found_single.is_empty());
    }

    #[test]
    fn a_query_matches_stored_cname() {
        let mut zone = ZoneStore::new();
        let owner = name(&["alias", "com"]);
        let target = name(&["example", "com"]);
        zone.add_record(Rr::cname(owner.clone(), &target, 300));

        let found = zone.find_records(&owner, RrType::A, RrClass::In, false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rtype, RrType::Cname);
    }

    #[test]
    fn authority_referral_is_deduplicated() {
        let mut zone = ZoneStore::new();
        let mil = name(&["mil"]);
        let a1 = DomainAuthority {
            domain: mil.clone(),
            name: name(&["sri-nic", "arpa"]),
            rclass: RrClass::In,
            ips: vec![Ipv4Addr::new(0x1A, 0x00, 0x00, 0x49)],
            ttl: 86400,
        };
        let a2 = DomainAuthority {
            domain: mil.clone(),
            name: name(&["a", "isi", "edu"]),
            rclass: RrClass::In,
            ips: vec![Ipv4Addr::new(0x1A, 0x03, 0x00, 0x67)],
            ttl: 86400,
        };
        zone.add_authority(a1.clone());
        zone.add_authority(a2.clone());
        zone.add_authority(a1.clone());

        let query = name(&["brl", "mil"]);
        let found = zone.find_authorities(&query, RrClass::In);
        assert_eq!(found, vec![a1, a2]);
    }
}
