//! The responder (C4): turns one decoded query into one response
//! Message, deciding between an authoritative answer, a referral, or
//! a recursive lookup depending on what the wrapped `Lookup` reports.

use dns_types::protocol::types::{Message, Rcode, Rr, RrClass, RrType};

use crate::lookup::{Lookup, ResolutionError};

/// Wraps exactly one [`Lookup`] (a zone store or a recursive
/// resolver), never both at once.
pub struct Responder<L: Lookup> {
    lookup: L,
}

impl<L: Lookup> Responder<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// Build a response to `query`. Never panics: any lookup error
    /// other than `RemoteRefused` becomes a zero-answer `SERVFAIL`
    /// response.
    pub async fn respond(&self, query: &Message) -> Message {
        let mut response = query.clone();
        response.header.is_response = true;
        response.header.is_authoritative = true;
        response.header.z = 0;
        response.header.rcode = Rcode::NoError;
        response.answers.clear();
        response.authorities.clear();
        response.additional.clear();

        response.header.recursion_available = self.lookup.supports_recursion();
        if !response.header.recursion_available && response.header.recursion_desired {
            response.header.rcode = Rcode::Refused;
            force_counts(&mut response);
            return response;
        }

        if response.questions.is_empty() {
            force_counts(&mut response);
            return response;
        }

        // This core answers exactly one question per datagram;
        // extra questions are reflected back but not answered.
        let question = response.questions[0].clone();
        let rd = response.header.recursion_desired;

        match self
            .lookup
            .find_records(&question.labels, question.qtype, question.qclass, rd)
            .await
        {
            Ok(records) => {
                let found_answer = !records.is_empty();
                response.answers.extend(records);

                if question.qtype == RrType::Mx {
                    // Glue for the MX targets, looked up by owner
                    // labels rather than the rdata's exchange name.
                    match self
                        .lookup
                        .find_records(&question.labels, RrType::A, RrClass::In, rd)
                        .await
                    {
                        Ok(glue) => response.additional.extend(glue),
                        Err(err) => return self.servfail(query, err),
                    }
                }

                if !found_answer {
                    let authorities = self
                        .lookup
                        .find_authorities(&question.labels, question.qclass);
                    if !authorities.is_empty() {
                        for authority in &authorities {
                            response.authorities.push(Rr::ns(
                                authority.domain.clone(),
                                &authority.name,
                                authority.ttl,
                            ));
                            for ip in &authority.ips {
                                response
                                    .additional
                                    .push(Rr::a(authority.name.clone(), *ip, 0));
                            }
                        }
                        // The response is a referral now, not an
                        // authoritative answer.
                        response.header.is_authoritative = false;
                    } else {
                        match self
                            .lookup
                            .find_records(&question.labels, RrType::All, question.qclass, rd)
                            .await
                        {
                            Ok(probe) => {
                                if probe.is_empty() {
                                    response.header.rcode = Rcode::NameError;
                                }
                            }
                            Err(err) => return self.servfail(query, err),
                        }
                    }
                }
            }
            Err(ResolutionError::RemoteRefused) => {
                response.header.rcode = Rcode::Refused;
            }
            Err(err) => return self.servfail(query, err),
        }

        force_counts(&mut response);
        response
    }

    fn servfail(&self, query: &Message, err: ResolutionError) -> Message {
        tracing::warn!(%err, "lookup failed unexpectedly, converting to SERVFAIL");
        let mut response = Message::minimal_response(query.header.id, Rcode::ServerFailure);
        response.questions = query.questions.clone();
        force_counts(&mut response);
        response
    }
}

fn force_counts(message: &mut Message) {
    message.header.qdcount = clamp_len(message.questions.len());
    message.header.ancount = clamp_len(message.answers.len());
    message.header.nscount = clamp_len(message.authorities.len());
    message.header.arcount = clamp_len(message.additional.len());
}

fn clamp_len(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use dns_types::protocol::types::{Name, Question};
    use dns_types::zone::{DomainAuthority, ZoneStore};

    use super::*;

    fn question(name: &str, qtype: RrType) -> Question {
        Question {
            labels: Name::from_dotted(name).unwrap(),
            qtype,
            qclass: RrClass::In,
        }
    }

    #[tokio::test]
    async fn answers_from_zone_store() {
        let mut zone = ZoneStore::new();
        zone.add_record(Rr::a(
            Name::from_dotted("www.example.com").unwrap(),
            Ipv4Addr::new(127, 0, 0, 1),
            300,
        ));
        let responder = Responder::new(zone);

        let query = Message::from_question(42, false, question("www.example.com", RrType::A));
        let response = responder.respond(&query).await;

        assert!(response.header.is_response);
        assert!(response.header.is_authoritative);
        assert_eq!(response.header.rcode, Rcode::NoError);
        assert_eq!(response.answers.len(), 1);
        assert_eq!(response.header.ancount, 1);
    }

    #[tokio::test]
    async fn nxdomain_when_nothing_matches_and_no_authority() {
        let zone = ZoneStore::new();
        let responder = Responder::new(zone);

        let query = Message::from_question(7, false, question("nowhere.example.com", RrType::A));
        let response = responder.respond(&query).await;

        assert_eq!(response.header.rcode, Rcode::NameError);
        assert!(response.answers.is_empty());
    }

    #[tokio::test]
    async fn referral_clears_aa_and_adds_glue() {
        let mut zone = ZoneStore::new();
        zone.add_authority(DomainAuthority {
            domain: Name::from_dotted("example.com").unwrap(),
            name: Name::from_dotted("ns1.example.com").unwrap(),
            rclass: RrClass::In,
            ips: vec![Ipv4Addr::new(10, 0, 0, 1)],
            ttl: 3600,
        });
        let responder = Responder::new(zone);

        let query = Message::from_question(9, false, question("sub.example.com", RrType::A));
        let response = responder.respond(&query).await;

        assert!(!response.header.is_authoritative);
        assert_eq!(response.header.rcode, Rcode::NoError);
        assert_eq!(response.authorities.len(), 1);
        assert_eq!(response.additional.len(), 1);
    }

    #[tokio::test]
    async fn mx_glue_is_looked_up_at_the_owner_name() {
        let mut zone = ZoneStore::new();
        let owner = Name::from_dotted("example.com").unwrap();
        zone.add_record(Rr::mx(
            owner.clone(),
            10,
            &Name::from_dotted("mail.example.com").unwrap(),
            3600,
        ));
        // Glue is looked up at the owner name `example.com`, not at the
        // MX exchange name `mail.example.com` -- the documented quirk.
        zone.add_record(Rr::a(owner.clone(), Ipv4Addr::new(127, 0, 0, 1), 300));
        let responder = Responder::new(zone);

        let query = Message::from_question(11, false, question("example.com", RrType::Mx));
        let response = responder.respond(&query).await;

        assert_eq!(response.answers.len(), 1);
        assert_eq!(response.additional.len(), 1);
        assert_eq!(response.additional[0].labels, owner);
    }

    #[tokio::test]
    async fn recursion_desired_without_support_is_refused() {
        let zone = ZoneStore::new();
        let responder = Responder::new(zone);

        let query = Message::from_question(3, true, question("example.com", RrType::A));
        let response = responder.respond(&query).await;

        assert_eq!(response.header.rcode, Rcode::Refused);
    }

    #[tokio::test]
    async fn z_is_forced_to_zero_on_the_response() {
        let zone = ZoneStore::new();
        let responder = Responder::new(zone);

        let mut query = Message::from_question(3, false, question("example.com", RrType::A));
        query.header.z = 5;
        let response = responder.respond(&query).await;

        assert_eq!(response.header.z, 0);
    }
}
