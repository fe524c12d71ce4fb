//! Serialisation of DNS messages to the network. See the `types`
//! module for details of the format.

use crate::protocol::types::*;

/// A buffer which can be written to, for serialisation purposes.
pub struct WritableBuffer {
    pub octets: Vec<u8>,
}

impl Default for WritableBuffer {
    fn default() -> Self {
        Self {
            octets: Vec::with_capacity(512),
        }
    }
}

impl WritableBuffer {
    pub fn index(&self) -> usize {
        self.octets.len()
    }

    pub fn write_u8(&mut self, octet: u8) {
        self.octets.push(octet);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.octets.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.octets.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_octets(&mut self, octets: &[u8]) {
        self.octets.extend_from_slice(octets);
    }

    /// Overwrite two octets already written, at `index`, with a u16.
    /// Used to backpatch rdlength once an Rr's rdata is known.
    fn patch_u16(&mut self, index: usize, value: u16) {
        let bytes = value.to_be_bytes();
        self.octets[index] = bytes[0];
        self.octets[index + 1] = bytes[1];
    }
}

/// Write a name uncompressed: each label as `<len><bytes>`, terminated
/// by a zero octet. This core never emits compression pointers; they
/// are only required to be accepted on decode (see `deserialise`).
pub(crate) fn write_name(buffer: &mut WritableBuffer, name: &Name) {
    for label in name.labels() {
        let bytes = label.as_str().as_bytes();
        buffer.write_u8(bytes.len() as u8);
        buffer.write_octets(bytes);
    }
    buffer.write_u8(0);
}

impl Header {
    pub(crate) fn serialise(&self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.id);

        let mut flags: u16 = 0;
        if self.is_response {
            flags |= 0b1000_0000_0000_0000;
        }
        flags |= u16::from(self.opcode.to_u8() & 0b1111) << 11;
        if self.is_authoritative {
            flags |= 0b0000_0100_0000_0000;
        }
        if self.is_truncated {
            flags |= 0b0000_0010_0000_0000;
        }
        if self.recursion_desired {
            flags |= 0b0000_0001_0000_0000;
        }
        if self.recursion_available {
            flags |= 0b0000_0000_1000_0000;
        }
        flags |= u16::from(self.z & 0b111) << 4;
        flags |= u16::from(self.rcode.to_u8() & 0b1111);
        buffer.write_u16(flags);

        buffer.write_u16(self.qdcount);
        buffer.write_u16(self.ancount);
        buffer.write_u16(self.nscount);
        buffer.write_u16(self.arcount);
    }
}

impl Question {
    pub(crate) fn serialise(&self, buffer: &mut WritableBuffer) {
        write_name(buffer, &self.labels);
        buffer.write_u16(self.qtype.to_u16());
        buffer.write_u16(self.qclass.to_u16());
    }
}

impl Rr {
    pub(crate) fn serialise(&self, buffer: &mut WritableBuffer) {
        write_name(buffer, &self.labels);
        buffer.write_u16(self.rtype.to_u16());
        buffer.write_u16(self.rclass.to_u16());
        buffer.write_u32(self.ttl);

        let rdlength_index = buffer.index();
        buffer.write_u16(0); // placeholder, patched below
        buffer.write_octets(&self.rdata);
        let rdlength = self.rdata.len().try_into().unwrap_or(u16::MAX);
        buffer.patch_u16(rdlength_index, rdlength);
    }
}

impl Message {
    /// # Panics
    ///
    /// Never: counts are forced to the section lengths, clamped to
    /// `u16::MAX` if a section is implausibly large, rather than
    /// failing. A DNS message cannot actually carry that many records
    /// (it wouldn't fit in any transport this core supports), so
    /// clamping is unreachable in practice and simpler than a fallible
    /// encode path the rest of the codec doesn't otherwise need.
    pub fn to_octets(&self) -> Vec<u8> {
        let mut buffer = WritableBuffer::default();
        self.serialise(&mut buffer);
        buffer.octets
    }

    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        let mut header = self.header;
        header.qdcount = clamp_len(self.questions.len());
        header.ancount = clamp_len(self.answers.len());
        header.nscount = clamp_len(self.authorities.len());
        header.arcount = clamp_len(self.additional.len());
        header.serialise(buffer);

        for question in &self.questions {
            question.serialise(buffer);
        }
        for rr in &self.answers {
            rr.serialise(buffer);
        }
        for rr in &self.authorities {
            rr.serialise(buffer);
        }
        for rr in &self.additional {
            rr.serialise(buffer);
        }
    }
}

fn clamp_len(len: usize) -> u16 {
    len.try_into().unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::deserialise::ConsumableBuffer;

    fn name(labels: &[&str]) -> Name {
        Name::new(labels.iter().map(|l| Label::new(l).unwrap()).collect())
    }

    #[test]
    fn message_round_trip() {
        let message = Message {
            header: Header {
                id: 42,
                is_response: true,
                opcode: Opcode::Query,
                is_authoritative: true,
                is_truncated: false,
                recursion_desired: true,
                recursion_available: true,
                z: 0,
                rcode: Rcode::NoError,
                qdcount: 0,
                ancount: 0,
                nscount: 0,
                arcount: 0,
            },
            questions: vec![Question {
                labels: name(&["example", "com"]),
                qtype: RrType::A,
                qclass: RrClass::In,
            }],
            answers: vec![Rr::a(
                name(&["example", "com"]),
                std::net::Ipv4Addr::new(1, 2, 3, 4),
                3600,
            )],
            authorities: vec![],
            additional: vec![],
        };

        let octets = message.to_octets();
        let decoded = Message::deserialise(&mut ConsumableBuffer::new(&octets)).unwrap();

        assert_eq!(decoded.header.qdcount, 1);
        assert_eq!(decoded.header.ancount, 1);
        assert_eq!(decoded.questions, message.questions);
        assert_eq!(decoded.answers, message.answers);
    }

    #[test]
    fn counts_are_forced_from_section_sizes() {
        let mut message = Message {
            header: Header {
                id: 1,
                is_response: true,
                opcode: Opcode::Query,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                z: 0,
                rcode: Rcode::NoError,
                qdcount: 99,
                ancount: 99,
                nscount: 99,
                arcount: 99,
            },
            questions: vec![],
            answers: vec![],
            authorities: vec![],
            additional: vec![],
        };
        message.answers.push(Rr::a(
            name(&["a", "com"]),
            std::net::Ipv4Addr::new(1, 1, 1, 1),
            60,
        ));

        let octets = message.to_octets();
        let decoded = Message::deserialise(&mut ConsumableBuffer::new(&octets)).unwrap();
        assert_eq!(decoded.header.qdcount, 0);
        assert_eq!(decoded.header.ancount, 1);
    }

    #[test]
    fn mx_rdata_round_trips() {
        let rr = Rr::mx(name(&["example", "com"]), 10, &name(&["mail", "example", "com"]), 300);
        let mut buffer = WritableBuffer::default();
        rr.serialise(&mut buffer);
        let decoded = Rr::deserialise(&mut ConsumableBuffer::new(&buffer.octets)).unwrap();
        assert_eq!(decoded, rr);
    }
}
