//! The recursive resolver (C3): fans a query out to a configurable
//! server list, evicts servers that report SERVFAIL, and follows
//! CNAME chains.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::RwLock;

use dns_types::protocol::types::{Message, Name, Question, Rcode, Rr, RrClass, RrType};
use dns_types::zone::DomainAuthority;

use crate::lookup::{Lookup, ResolutionError};
use crate::nameserver::{query_nameserver, DnsServer};

/// Rounds of fan-out attempted before giving up on a single question.
const MAX_SEND_COUNT: usize = 3;

/// CNAME rewrites allowed before a chase is abandoned.
const MAX_CNAME_SWITCHES: usize = 10;

/// The per-attempt timeout used by the `Lookup` impl, which has no
/// timeout parameter of its own. Callers that need a different bound
/// can call [`RecursiveResolver::resolve`] directly.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// The outcome of a recursive resolve: every answer record
/// accumulated across the CNAME chase, plus the final response's
/// rcode.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub records: Vec<Rr>,
    pub rcode: Rcode,
}

/// Owns the upstream server list and performs fan-out resolution
/// against it. A read lock guards lookups of `slist`; a write lock is
/// only ever taken to evict a server that reported SERVFAIL.
pub struct RecursiveResolver {
    slist: RwLock<Vec<DnsServer>>,
}

impl RecursiveResolver {
    pub fn new(servers: Vec<DnsServer>) -> Self {
        Self {
            slist: RwLock::new(servers),
        }
    }

    /// A snapshot of the current server list, for diagnostics/tests.
    pub async fn servers(&self) -> Vec<DnsServer> {
        self.slist.read().await.clone()
    }

    /// Resolve `(labels, qtype, qclass, request_recursion)` to a
    /// [`Resolution`], fanning each round out to every server
    /// currently in `slist` and chasing CNAMEs up to the switch
    /// limit.
    ///
    /// # Errors
    ///
    /// `Timeout` if no round produces a winner within `MAX_SEND_COUNT`
    /// rounds; `RecursionLimit` if the CNAME chase exceeds the switch
    /// limit; `RemoteRefused`/`RemoteFailure`/`InvalidResponse` as
    /// reported by the winning attempt.
    pub async fn resolve(
        &self,
        labels: &Name,
        qtype: RrType,
        qclass: RrClass,
        request_recursion: bool,
        timeout: Duration,
    ) -> Result<Resolution, ResolutionError> {
        let mut current = labels.clone();
        let mut records = Vec::new();
        let mut switches = 0usize;

        loop {
            let question = Question {
                labels: current.clone(),
                qtype,
                qclass,
            };
            let (message, raw) = self.fan_out(question, request_recursion, timeout).await?;

            records.extend(message.answers.iter().cloned());

            let cname_target = message
                .answers
                .iter()
                .find(|rr| rr.rtype == RrType::Cname)
                .map(|rr| rr.name_from_rdata(&raw));

            match cname_target {
                Some(Ok(target)) => {
                    switches += 1;
                    if switches > MAX_CNAME_SWITCHES {
                        return Err(ResolutionError::RecursionLimit);
                    }
                    current = target;
                    continue;
                }
                Some(Err(_)) => return Err(ResolutionError::InvalidResponse),
                None => {
                    return Ok(Resolution {
                        records,
                        rcode: message.header.rcode,
                    });
                }
            }
        }
    }

    /// Run up to `MAX_SEND_COUNT` rounds of fan-out for a single
    /// question (no CNAME chase - that's the caller's job). Each
    /// round races every server in the current snapshot; the first
    /// attempt to resolve wins, and dropping the unfinished
    /// `FuturesUnordered` cancels every loser's in-flight socket I/O.
    async fn fan_out(
        &self,
        question: Question,
        request_recursion: bool,
        timeout: Duration,
    ) -> Result<(Message, Vec<u8>), ResolutionError> {
        for round in 0..MAX_SEND_COUNT {
            let snapshot = self.slist.read().await.clone();
            if snapshot.is_empty() {
                return Err(ResolutionError::Timeout);
            }

            tracing::debug!(round, servers = snapshot.len(), %question, "fan-out round");

            let mut attempts = FuturesUnordered::new();
            for server in snapshot {
                attempts.push(self.attempt(server, question.clone(), request_recursion, timeout));
            }

            while let Some(outcome) = attempts.next().await {
                if let Ok(result) = outcome {
                    tracing::debug!(round, "fan-out round produced a winner");
                    return Ok(result);
                }
            }
        }

        tracing::debug!(%question, "fan-out exhausted all rounds");
        Err(ResolutionError::Timeout)
    }

    /// Query one server and evict it from `slist` on SERVFAIL.
    async fn attempt(
        &self,
        server: DnsServer,
        question: Question,
        request_recursion: bool,
        timeout: Duration,
    ) -> Result<(Message, Vec<u8>), ResolutionError> {
        let effective = DnsServer {
            recursive: request_recursion && server.recursive,
            ..server
        };
        let (message, raw) = query_nameserver(&effective, question, timeout).await?;

        if message.header.rcode == Rcode::ServerFailure {
            self.evict(&server).await;
            return Err(ResolutionError::RemoteFailure);
        }

        Ok((message, raw))
    }

    /// Remove `server` from `slist`, if present. Idempotent: evicting
    /// an already-absent server is a no-op, not an error.
    async fn evict(&self, server: &DnsServer) {
        let mut slist = self.slist.write().await;
        if let Some(index) = slist.iter().position(|s| s == server) {
            slist.remove(index);
            tracing::info!(ip = %server.ip, port = server.port, "evicted server after SERVFAIL");
        }
    }
}

#[async_trait]
impl Lookup for RecursiveResolver {
    async fn find_records(
        &self,
        labels: &Name,
        qtype: RrType,
        qclass: RrClass,
        recursive: bool,
    ) -> Result<Vec<Rr>, ResolutionError> {
        let resolution = self
            .resolve(labels, qtype, qclass, recursive, DEFAULT_TIMEOUT)
            .await?;
        if resolution.rcode == Rcode::Refused {
            return Err(ResolutionError::RemoteRefused);
        }
        Ok(resolution.records)
    }

    fn find_authorities(&self, _labels: &Name, _rclass: RrClass) -> Vec<DomainAuthority> {
        Vec::new()
    }

    fn supports_recursion(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_server_list_times_out_immediately() {
        let resolver = RecursiveResolver::new(Vec::new());
        let labels = Name::from_dotted("example.com").unwrap();
        let result = resolver
            .resolve(
                &labels,
                RrType::A,
                RrClass::In,
                false,
                Duration::from_millis(50),
            )
            .await;
        assert_eq!(result.unwrap_err(), ResolutionError::Timeout);
    }

    #[tokio::test]
    async fn blackhole_server_times_out_within_three_rounds() {
        use std::net::Ipv4Addr;
        // 192.0.2.0/24 is TEST-NET-1 (RFC 5737): reserved for
        // documentation, guaranteed unroutable.
        let blackhole = DnsServer::new_v4(Ipv4Addr::new(192, 0, 2, 1), false);
        let resolver = RecursiveResolver::new(vec![blackhole]);
        let labels = Name::from_dotted("example.com").unwrap();

        let start = std::time::Instant::now();
        let result = resolver
            .resolve(
                &labels,
                RrType::A,
                RrClass::In,
                false,
                Duration::from_millis(100),
            )
            .await;
        assert_eq!(result.unwrap_err(), ResolutionError::Timeout);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
