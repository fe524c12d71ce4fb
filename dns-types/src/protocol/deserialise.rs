//! Deserialisation of DNS messages from the network. See the `types`
//! module for details of the format.

use crate::protocol::types::*;

/// At most this many pointer jumps are followed while decoding a
/// single name. Prevents pointer cycles and quadratic blowup. See
/// `read_name`.
const JUMP_LIMIT: usize = 100;

/// Maximum total wire length of a name (including length-prefix
/// octets and the terminating zero), per RFC 1035 section 3.1.
const NAME_MAX_LEN: usize = 255;

/// Maximum length of a single label.
const LABEL_MAX_LEN: usize = 63;

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum MessageError {
    #[error("unexpected end of buffer")]
    Eof,
    #[error("attempted read past the buffer's limit")]
    ReadError,
    #[error("label contains a character other than alphanumeric or '-'")]
    InvalidLabelChar,
    #[error("label longer than 63 octets")]
    LabelTooLong,
    #[error("name longer than 255 octets")]
    NameTooLong,
    #[error("exceeded the compression-pointer jump limit")]
    JumpLimit,
}

/// A read cursor over a byte view of at most 512 octets, with an
/// explicit `limit` separate from the view's length: reading past
/// `limit` fails with `ReadError`, while reading past the end of the
/// view itself (which may lie beyond `limit`, e.g. while chasing a
/// compression pointer) fails with `Eof`.
#[derive(Debug, Clone, Copy)]
pub struct ConsumableBuffer<'a> {
    octets: &'a [u8],
    position: usize,
    limit: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            position: 0,
            limit: octets.len(),
        }
    }

    pub fn pos(&self) -> usize {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Move the cursor to an absolute offset. Does not change
    /// `limit`; used both for ordinary forward seeks and for jumping
    /// to a compression-pointer target, which may be before the
    /// current position.
    pub fn seek(&mut self, position: usize) -> Result<(), MessageError> {
        if position > self.octets.len() {
            return Err(MessageError::Eof);
        }
        self.position = position;
        Ok(())
    }

    fn check(&self, len: usize) -> Result<(), MessageError> {
        if self.position + len > self.octets.len() {
            return Err(MessageError::Eof);
        }
        if self.position + len > self.limit {
            return Err(MessageError::ReadError);
        }
        Ok(())
    }

    /// Peek at the octet at an absolute offset without moving the
    /// cursor. Used by `read_name` to inspect length bytes while
    /// following pointers without disturbing `position`.
    fn peek_u8_at(&self, offset: usize) -> Result<u8, MessageError> {
        if offset >= self.octets.len() {
            return Err(MessageError::Eof);
        }
        Ok(self.octets[offset])
    }

    pub fn next_u8(&mut self) -> Result<u8, MessageError> {
        self.check(1)?;
        let value = self.octets[self.position];
        self.position += 1;
        Ok(value)
    }

    pub fn next_u16(&mut self) -> Result<u16, MessageError> {
        self.check(2)?;
        let value = u16::from_be_bytes([self.octets[self.position], self.octets[self.position + 1]]);
        self.position += 2;
        Ok(value)
    }

    pub fn next_u32(&mut self) -> Result<u32, MessageError> {
        self.check(4)?;
        let value = u32::from_be_bytes([
            self.octets[self.position],
            self.octets[self.position + 1],
            self.octets[self.position + 2],
            self.octets[self.position + 3],
        ]);
        self.position += 4;
        Ok(value)
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], MessageError> {
        self.check(len)?;
        let slice = &self.octets[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }
}

/// Read a compressed name. Length-byte top bits select a normal label
/// (`00`), a compression pointer (`11`), or a reserved, invalid
/// encoding (`01`/`10`).
///
/// The cursor is left, on return, just past the first terminating
/// zero octet or pointer encountered in the *original* scan, never
/// past a jumped-to region. This is tracked by only updating `end_pos`
/// while still on the first (non-jumped) branch; pointer targets are
/// inspected by direct offset via `peek_u8_at`/`take`-style indexing
/// rather than by moving the primary cursor permanently there.
pub(crate) fn read_name(buffer: &mut ConsumableBuffer) -> Result<Name, MessageError> {
    let mut labels = Vec::new();
    let mut wire_len: usize = 0;
    let mut jumps: usize = 0;
    let mut cursor = buffer.pos();
    let mut end_pos = cursor;
    let mut on_first_branch = true;

    loop {
        let len_byte = buffer.peek_u8_at(cursor)?;
        cursor += 1;
        if on_first_branch {
            end_pos = cursor;
        }

        match len_byte >> 6 {
            0b00 => {
                let len = usize::from(len_byte);
                if len == 0 {
                    break;
                }
                if len > LABEL_MAX_LEN {
                    return Err(MessageError::LabelTooLong);
                }
                wire_len += len + 1;
                if wire_len > NAME_MAX_LEN {
                    return Err(MessageError::NameTooLong);
                }
                if cursor + len > buffer.octets.len() {
                    return Err(MessageError::Eof);
                }
                let text = &buffer.octets[cursor..cursor + len];
                cursor += len;
                if on_first_branch {
                    end_pos = cursor;
                }
                labels.push(decode_label(text)?);
            }
            0b11 => {
                if jumps >= JUMP_LIMIT {
                    return Err(MessageError::JumpLimit);
                }
                let hi = u16::from(len_byte & 0b0011_1111);
                let lo = u16::from(buffer.peek_u8_at(cursor)?);
                cursor += 1;
                if on_first_branch {
                    end_pos = cursor;
                }
                let offset = usize::from((hi << 8) | lo);
                cursor = offset;
                jumps += 1;
                on_first_branch = false;
            }
            _ => return Err(MessageError::ReadError),
        }
    }

    buffer.seek(end_pos)?;
    Ok(Name::new(labels))
}

fn decode_label(text: &[u8]) -> Result<Label, MessageError> {
    let is_alnum = |b: u8| b.is_ascii_alphanumeric();
    if !is_alnum(text[0]) || !is_alnum(text[text.len() - 1]) {
        return Err(MessageError::InvalidLabelChar);
    }
    for &b in text {
        if !(is_alnum(b) || b == b'-') {
            return Err(MessageError::InvalidLabelChar);
        }
    }
    // Safety of `from_utf8_unchecked`-free approach: only ASCII
    // alphanumeric/'-' bytes survive the check above, which is valid
    // UTF-8 by construction.
    let lowercase: String = text.iter().map(|&b| b.to_ascii_lowercase() as char).collect();
    Ok(Label::from_lowercase(lowercase))
}

impl Header {
    pub(crate) fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, MessageError> {
        let id = buffer.next_u16()?;
        let flags = buffer.next_u16()?;
        let qdcount = buffer.next_u16()?;
        let ancount = buffer.next_u16()?;
        let nscount = buffer.next_u16()?;
        let arcount = buffer.next_u16()?;

        let is_response = (flags & 0b1000_0000_0000_0000) != 0;
        let opcode = Opcode::from_u8(((flags >> 11) & 0b1111) as u8);
        let is_authoritative = (flags & 0b0000_0100_0000_0000) != 0;
        let is_truncated = (flags & 0b0000_0010_0000_0000) != 0;
        let recursion_desired = (flags & 0b0000_0001_0000_0000) != 0;
        let recursion_available = (flags & 0b0000_0000_1000_0000) != 0;
        let z = ((flags >> 4) & 0b111) as u8;
        let rcode = Rcode::from_u8((flags & 0b1111) as u8);

        Ok(Self {
            id,
            is_response,
            opcode,
            is_authoritative,
            is_truncated,
            recursion_desired,
            recursion_available,
            z,
            rcode,
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }
}

impl Question {
    pub(crate) fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, MessageError> {
        let labels = read_name(buffer)?;
        let qtype = RrType::from_u16(buffer.next_u16()?);
        let qclass = RrClass::from_u16(buffer.next_u16()?);
        Ok(Self {
            labels,
            qtype,
            qclass,
        })
    }
}

impl Rr {
    pub(crate) fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, MessageError> {
        let labels = read_name(buffer)?;
        let rtype = RrType::from_u16(buffer.next_u16()?);
        let rclass = RrClass::from_u16(buffer.next_u16()?);
        let ttl = buffer.next_u32()?;
        let rdlength = usize::from(buffer.next_u16()?);
        let rdata_start = buffer.pos();
        let rdata = buffer.take(rdlength)?.to_vec();
        Ok(Self {
            labels,
            rtype,
            rclass,
            ttl,
            rdata,
            rdata_start,
        })
    }
}

impl Message {
    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn from_octets(octets: &[u8]) -> Result<Self, MessageError> {
        Self::deserialise(&mut ConsumableBuffer::new(octets))
    }

    /// Decode just the header and its questions, leaving the answer,
    /// authority, and additional sections empty. A receiver that only
    /// needs the question(s) to build a response (the UDP transport's
    /// receive loop) can use this instead of [`Message::from_octets`]
    /// so a query with malformed trailing resource records still gets
    /// answered rather than FORMERR'd.
    ///
    /// # Errors
    ///
    /// If the header or any question cannot be parsed.
    pub fn from_header_and_questions(octets: &[u8]) -> Result<Self, MessageError> {
        let mut buffer = ConsumableBuffer::new(octets);
        let header = Header::deserialise(&mut buffer)?;
        let questions = read_questions(&mut buffer, header.qdcount)?;
        Ok(Self {
            header,
            questions,
            answers: Vec::new(),
            authorities: Vec::new(),
            additional: Vec::new(),
        })
    }

    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, MessageError> {
        let header = Header::deserialise(buffer)?;
        let questions = read_questions(buffer, header.qdcount)?;

        let mut answers = Vec::with_capacity(header.ancount.into());
        for _ in 0..header.ancount {
            answers.push(Rr::deserialise(buffer)?);
        }

        let mut authorities = Vec::with_capacity(header.nscount.into());
        for _ in 0..header.nscount {
            authorities.push(Rr::deserialise(buffer)?);
        }

        let mut additional = Vec::with_capacity(header.arcount.into());
        for _ in 0..header.arcount {
            additional.push(Rr::deserialise(buffer)?);
        }

        Ok(Self {
            header,
            questions,
            answers,
            authorities,
            additional,
        })
    }
}

fn read_questions(buffer: &mut ConsumableBuffer, qdcount: u16) -> Result<Vec<Question>, MessageError> {
    let mut questions = Vec::with_capacity(qdcount.into());
    for _ in 0..qdcount {
        questions.push(Question::deserialise(buffer)?);
    }
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::serialise::WritableBuffer;

    fn name(labels: &[&str]) -> Name {
        Name::new(labels.iter().map(|l| Label::new(l).unwrap()).collect())
    }

    #[test]
    fn header_round_trip() {
        let header = Header {
            id: 1,
            is_response: true,
            opcode: Opcode::Query,
            is_authoritative: true,
            is_truncated: true,
            recursion_desired: false,
            recursion_available: false,
            z: 1,
            rcode: Rcode::ServerFailure,
            qdcount: 1,
            ancount: 1,
            nscount: 0,
            arcount: 1,
        };
        let mut out = WritableBuffer::default();
        header.serialise(&mut out);
        assert_eq!(
            out.octets,
            vec![0x00, 0x01, 0x86, 0x12, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01]
        );
        let decoded = Header::deserialise(&mut ConsumableBuffer::new(&out.octets)).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn a_record_decode() {
        let bytes = [
            0x07, 0x65, 0x78, 0x61, 0x6D, 0x70, 0x6C, 0x65, 0x03, 0x63, 0x6F, 0x6D, 0x00, 0x00,
            0x01, 0x00, 0x01, 0x00, 0x00, 0x0E, 0x10, 0x00, 0x04, 0x01, 0x02, 0x03, 0x04,
        ];
        let rr = Rr::deserialise(&mut ConsumableBuffer::new(&bytes)).unwrap();
        assert_eq!(rr.labels, name(&["example", "com"]));
        assert_eq!(rr.rtype, RrType::A);
        assert_eq!(rr.rclass, RrClass::In);
        assert_eq!(rr.ttl, 3600);
        assert_eq!(rr.rdata, vec![1, 2, 3, 4]);
    }

    #[test]
    fn pointer_loop_fails_with_jump_limit() {
        let bytes = [0xC0, 0x00, 0x01, 0x61, 0x01, 0x62, 0x00];
        let err = read_name(&mut ConsumableBuffer::new(&bytes)).unwrap_err();
        assert_eq!(err, MessageError::JumpLimit);
    }

    #[test]
    fn pointer_is_followed_and_cursor_restored() {
        // "example.com" at offset 0, then a question pointing back at it.
        let mut msg = vec![
            0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00,
        ];
        let base = msg.len();
        msg.push(0xC0);
        msg.push(0x00);
        let mut buffer = ConsumableBuffer::new(&msg);
        buffer.seek(base).unwrap();
        let decoded = read_name(&mut buffer).unwrap();
        assert_eq!(decoded, name(&["example", "com"]));
        assert_eq!(buffer.pos(), base + 2);
    }

    #[test]
    fn label_too_long_is_rejected() {
        let mut bytes = vec![64];
        bytes.extend(std::iter::repeat(b'a').take(64));
        bytes.push(0);
        let err = read_name(&mut ConsumableBuffer::new(&bytes)).unwrap_err();
        assert_eq!(err, MessageError::LabelTooLong);
    }

    #[test]
    fn reserved_length_bits_are_rejected() {
        let bytes = [0b0100_0000, 0x00];
        let err = read_name(&mut ConsumableBuffer::new(&bytes)).unwrap_err();
        assert_eq!(err, MessageError::ReadError);
    }

    #[test]
    fn header_and_questions_tolerates_malformed_trailing_records() {
        let header = Header {
            id: 7,
            is_response: false,
            opcode: Opcode::Query,
            is_authoritative: false,
            is_truncated: false,
            recursion_desired: true,
            recursion_available: false,
            z: 0,
            rcode: Rcode::NoError,
            qdcount: 1,
            ancount: 1,
            nscount: 0,
            arcount: 0,
        };
        let mut out = WritableBuffer::default();
        header.serialise(&mut out);
        Question {
            labels: name(&["example", "com"]),
            qtype: RrType::A,
            qclass: RrClass::In,
        }
        .serialise(&mut out);
        // ancount claims one answer record, but none follows: a full
        // `Message::deserialise` would fail here.
        assert!(Message::from_octets(&out.octets).is_err());

        let decoded = Message::from_header_and_questions(&out.octets).unwrap();
        assert_eq!(decoded.header.id, 7);
        assert_eq!(decoded.questions.len(), 1);
        assert_eq!(decoded.questions[0].labels, name(&["example", "com"]));
        assert!(decoded.answers.is_empty());
    }
}
