use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A single label of a domain name: 1-63 octets, alphanumeric or `-`,
/// beginning and ending with an alphanumeric. Comparisons are
/// case-insensitive; the canonical form stored here is lowercased.
///
/// The sentinel label `*` (used as the leftmost label of a wildcard
/// record) is represented too, but only ever produced by
/// [`Label::wildcard`] (the decoder's validator rejects it).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Label(String);

impl Label {
    /// Build a label from already-validated, already-lowercased text.
    /// Used internally by the decoder and by [`Label::new`].
    pub(crate) fn from_lowercase(text: String) -> Self {
        Self(text)
    }

    /// Validate and construct a label for programmatic zone
    /// construction. Rejects the wildcard sentinel - use
    /// [`Label::wildcard`] for that.
    pub fn new(text: &str) -> Result<Self, LabelError> {
        if text == "*" {
            return Err(LabelError::InvalidChar);
        }
        Self::validate(text)?;
        Ok(Self::from_lowercase(text.to_ascii_lowercase()))
    }

    /// The wildcard sentinel label, valid only as the leftmost label
    /// of a stored record.
    pub fn wildcard() -> Self {
        Self("*".to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == "*"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(text: &str) -> Result<(), LabelError> {
        if text.is_empty() || text.len() > 63 {
            return Err(LabelError::TooLong);
        }
        let bytes = text.as_bytes();
        let is_alnum = |b: u8| b.is_ascii_alphanumeric();
        if !is_alnum(bytes[0]) || !is_alnum(bytes[bytes.len() - 1]) {
            return Err(LabelError::InvalidChar);
        }
        for &b in bytes {
            if !(is_alnum(b) || b == b'-') {
                return Err(LabelError::InvalidChar);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LabelError {
    TooLong,
    InvalidChar,
}

/// A domain name: an ordered, dot-less sequence of [`Label`]s. Total
/// wire length (sum of `label.len() + 1` over all labels, plus the
/// terminating zero octet) must be at most 255.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Name(pub Vec<Label>);

impl Name {
    pub fn new(labels: Vec<Label>) -> Self {
        Self(labels)
    }

    pub fn labels(&self) -> &[Label] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a dotted string into a `Name`, validating each label.
    /// Convenience for building zones and tests; not used by the wire
    /// decoder, which builds labels directly from wire octets.
    pub fn from_dotted(s: &str) -> Result<Self, LabelError> {
        let labels = s
            .split('.')
            .map(Label::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(labels))
    }

    /// Canonical lowercased dotted form, used as the zone store's map
    /// key.
    pub fn canonical_key(&self) -> String {
        self.0
            .iter()
            .map(Label::as_str)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// The wire length of the name, including the terminating zero
    /// octet: `sum(len(label) + 1) + 1`.
    pub fn wire_len(&self) -> usize {
        self.0.iter().map(|l| l.as_str().len() + 1).sum::<usize>() + 1
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, ".");
        }
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{label}")?;
        }
        Ok(())
    }
}

/// A four-bit opcode, carried in the second header word.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub enum Opcode {
    Query,
    IQuery,
    Status,
    Unknown(u8),
}

impl Opcode {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Query,
            1 => Self::IQuery,
            2 => Self::Status,
            other => Self::Unknown(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Query => 0,
            Self::IQuery => 1,
            Self::Status => 2,
            Self::Unknown(value) => value,
        }
    }
}

/// A four-bit response code, carried in the second header word.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub enum Rcode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Unknown(u8),
}

impl Rcode {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::FormatError,
            2 => Self::ServerFailure,
            3 => Self::NameError,
            4 => Self::NotImplemented,
            5 => Self::Refused,
            other => Self::Unknown(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::NoError => 0,
            Self::FormatError => 1,
            Self::ServerFailure => 2,
            Self::NameError => 3,
            Self::NotImplemented => 4,
            Self::Refused => 5,
            Self::Unknown(value) => value,
        }
    }
}

impl fmt::Display for Rcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoError => "NOERROR",
            Self::FormatError => "FORMERR",
            Self::ServerFailure => "SERVFAIL",
            Self::NameError => "NXDOMAIN",
            Self::NotImplemented => "NOTIMP",
            Self::Refused => "REFUSED",
            Self::Unknown(_) => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// Common header type for all messages.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      ID                       |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    QDCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ANCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    NSCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ARCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// See section 4.1.1 of RFC 1035.
///
/// `z` is preserved faithfully by the codec in both directions: it
/// round-trips through decode/encode like every other field. Nothing
/// above the codec ever branches on it; the responder is the one place
/// that sets it to zero, as an explicit step of composing a response,
/// not as something the wire format forces.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Header {
    pub id: u16,
    pub is_response: bool,
    pub opcode: Opcode,
    pub is_authoritative: bool,
    pub is_truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub z: u8,
    pub rcode: Rcode,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

/// 16-bit record type. Unrecognized values decode to `Unknown` rather
/// than failing: RFC 1035 requires tolerance of record types a server
/// doesn't interpret, so long as it can still frame them (it always
/// can -- rdata is opaque).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub enum RrType {
    A,
    Ns,
    Cname,
    Soa,
    Ptr,
    Hinfo,
    Mx,
    Txt,
    Aaaa,
    Axfr,
    Mailb,
    Maila,
    All,
    Unknown(u16),
}

impl RrType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::A,
            2 => Self::Ns,
            5 => Self::Cname,
            6 => Self::Soa,
            12 => Self::Ptr,
            13 => Self::Hinfo,
            15 => Self::Mx,
            16 => Self::Txt,
            28 => Self::Aaaa,
            252 => Self::Axfr,
            253 => Self::Mailb,
            254 => Self::Maila,
            255 => Self::All,
            other => Self::Unknown(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            Self::A => 1,
            Self::Ns => 2,
            Self::Cname => 5,
            Self::Soa => 6,
            Self::Ptr => 12,
            Self::Hinfo => 13,
            Self::Mx => 15,
            Self::Txt => 16,
            Self::Aaaa => 28,
            Self::Axfr => 252,
            Self::Mailb => 253,
            Self::Maila => 254,
            Self::All => 255,
            Self::Unknown(value) => value,
        }
    }
}

impl fmt::Display for RrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 16-bit record class.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub enum RrClass {
    In,
    Cs,
    Ch,
    Hs,
    Unknown(u16),
}

impl Default for RrClass {
    fn default() -> Self {
        Self::In
    }
}

impl RrClass {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::In,
            2 => Self::Cs,
            3 => Self::Ch,
            4 => Self::Hs,
            other => Self::Unknown(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            Self::In => 1,
            Self::Cs => 2,
            Self::Ch => 3,
            Self::Hs => 4,
            Self::Unknown(value) => value,
        }
    }
}

impl fmt::Display for RrClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single question: the name, type, and class being asked about.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Question {
    pub labels: Name,
    pub qtype: RrType,
    pub qclass: RrClass,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.labels, self.qclass, self.qtype)
    }
}

/// A resource record. `rdata` is the opaque, uninterpreted rdata
/// octets as read off the wire (or as built by the `*_record`
/// constructors below); `rdata_start` is the absolute offset within
/// the message it was decoded from, kept so a consumer that needs a
/// name embedded in rdata (CNAME chasing) can re-parse it with a fresh
/// cursor over the original buffer and have compression pointers
/// resolve correctly. `rdata_start` is bookkeeping, not part of the
/// record's identity: it is excluded from equality and hashing.
#[derive(Debug, Clone)]
pub struct Rr {
    pub labels: Name,
    pub rtype: RrType,
    pub rclass: RrClass,
    pub ttl: u32,
    pub rdata: Vec<u8>,
    pub rdata_start: usize,
}

impl PartialEq for Rr {
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels
            && self.rtype == other.rtype
            && self.rclass == other.rclass
            && self.ttl == other.ttl
            && self.rdata == other.rdata
    }
}

impl Eq for Rr {}

impl std::hash::Hash for Rr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.labels.hash(state);
        self.rtype.hash(state);
        self.rclass.hash(state);
        self.ttl.hash(state);
        self.rdata.hash(state);
    }
}

impl Rr {
    fn new(labels: Name, rtype: RrType, rclass: RrClass, ttl: u32, rdata: Vec<u8>) -> Self {
        Self {
            labels,
            rtype,
            rclass,
            ttl,
            rdata,
            rdata_start: 0,
        }
    }

    pub fn a(labels: Name, addr: Ipv4Addr, ttl: u32) -> Self {
        Self::new(labels, RrType::A, RrClass::In, ttl, addr.octets().to_vec())
    }

    pub fn aaaa(labels: Name, addr: Ipv6Addr, ttl: u32) -> Self {
        Self::new(
            labels,
            RrType::Aaaa,
            RrClass::In,
            ttl,
            addr.octets().to_vec(),
        )
    }

    pub fn ns(labels: Name, target: &Name, ttl: u32) -> Self {
        Self::new(labels, RrType::Ns, RrClass::In, ttl, encode_name(target))
    }

    pub fn cname(labels: Name, target: &Name, ttl: u32) -> Self {
        Self::new(labels, RrType::Cname, RrClass::In, ttl, encode_name(target))
    }

    pub fn ptr(labels: Name, target: &Name, ttl: u32) -> Self {
        Self::new(labels, RrType::Ptr, RrClass::In, ttl, encode_name(target))
    }

    pub fn mx(labels: Name, preference: u16, exchange: &Name, ttl: u32) -> Self {
        let mut rdata = preference.to_be_bytes().to_vec();
        rdata.extend(encode_name(exchange));
        Self::new(labels, RrType::Mx, RrClass::In, ttl, rdata)
    }

    pub fn hinfo(labels: Name, cpu: &str, os: &str, ttl: u32) -> Self {
        let mut rdata = Vec::with_capacity(cpu.len() + os.len() + 2);
        rdata.push(u8::try_from(cpu.len()).unwrap_or(u8::MAX));
        rdata.extend_from_slice(cpu.as_bytes());
        rdata.push(u8::try_from(os.len()).unwrap_or(u8::MAX));
        rdata.extend_from_slice(os.as_bytes());
        Self::new(labels, RrType::Hinfo, RrClass::In, ttl, rdata)
    }

    pub fn as_a(&self) -> Option<Ipv4Addr> {
        if self.rdata.len() != 4 {
            return None;
        }
        Some(Ipv4Addr::new(
            self.rdata[0],
            self.rdata[1],
            self.rdata[2],
            self.rdata[3],
        ))
    }

    /// Re-parse the name embedded in this record's rdata (NS, CNAME,
    /// PTR), using a fresh cursor over `original_message`, the raw
    /// bytes this record was decoded from. The codec does not
    /// decompress names inside rdata during the main decode pass, so
    /// any compression pointer in the rdata only resolves correctly
    /// against the message it came from.
    pub fn name_from_rdata(
        &self,
        original_message: &[u8],
    ) -> Result<Name, super::deserialise::MessageError> {
        let mut buffer = super::deserialise::ConsumableBuffer::new(original_message);
        buffer.seek(self.rdata_start)?;
        super::deserialise::read_name(&mut buffer)
    }
}

fn encode_name(name: &Name) -> Vec<u8> {
    let mut buffer = super::serialise::WritableBuffer::default();
    super::serialise::write_name(&mut buffer, name);
    buffer.octets
}

/// Basic DNS message format, used for both queries and responses.
///
/// ```text
///     +---------------------+
///     |        Header       |
///     +---------------------+
///     |       Question      | the question for the name server
///     +---------------------+
///     |        Answer       | RRs answering the question
///     +---------------------+
///     |      Authority      | RRs pointing toward an authority
///     +---------------------+
///     |      Additional     | RRs holding additional information
///     +---------------------+
/// ```
///
/// See section 4.1 of RFC 1035.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<Rr>,
    pub authorities: Vec<Rr>,
    pub additional: Vec<Rr>,
}

impl Message {
    /// A header-only response carrying `rcode`, used when decoding
    /// fails before a full query can be recovered.
    pub fn minimal_response(id: u16, rcode: Rcode) -> Self {
        Self {
            header: Header {
                id,
                is_response: true,
                opcode: Opcode::Query,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                z: 0,
                rcode,
                qdcount: 0,
                ancount: 0,
                nscount: 0,
                arcount: 0,
            },
            questions: Vec::new(),
            answers: Vec::new(),
            authorities: Vec::new(),
            additional: Vec::new(),
        }
    }

    pub fn from_question(id: u16, rd: bool, question: Question) -> Self {
        Self {
            header: Header {
                id,
                is_response: false,
                opcode: Opcode::Query,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: rd,
                recursion_available: false,
                z: 0,
                rcode: Rcode::NoError,
                qdcount: 1,
                ancount: 0,
                nscount: 0,
                arcount: 0,
            },
            questions: vec![question],
            answers: Vec::new(),
            authorities: Vec::new(),
            additional: Vec::new(),
        }
    }
}
