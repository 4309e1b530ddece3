//! Completion tag codec.
//!
//! Every SQE carries a 64-bit `user_data` value built by [`encode`]. The top
//! six bits name an operation class (one-hot); the remaining 58 bits pack a
//! file descriptor, a buffer id, and a sequence id. The encoding is bit-exact
//! because it crosses the kernel ABI boundary on the wire between user space
//! and the ring.

/// One-hot operation class occupying the tag's top six bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum OpClass {
    Read = 1 << 63,
    Write = 1 << 62,
    Accept = 1 << 61,
    Connect = 1 << 60,
    Message = 1 << 59,
    Close = 1 << 58,
}

impl OpClass {
    const ALL: [OpClass; 6] = [
        OpClass::Read,
        OpClass::Write,
        OpClass::Accept,
        OpClass::Connect,
        OpClass::Message,
        OpClass::Close,
    ];

    /// Bitmask covering every defined operation class.
    pub const ALL_FLAGS: u64 = OpClass::Read as u64
        | OpClass::Write as u64
        | OpClass::Accept as u64
        | OpClass::Connect as u64
        | OpClass::Message as u64
        | OpClass::Close as u64;

    fn from_bits(bits: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|class| *class as u64 == bits)
    }
}

/// Sentinel meaning "no buffer" / "no sequence" in a packed payload.
pub const NONE_ID: u16 = u16::MAX;

const FD_BITS: u32 = 26;
const FD_SHIFT: u32 = 32;
const BUFFER_SHIFT: u32 = 16;
const FD_MASK: u64 = (1u64 << FD_BITS) - 1;
const FIELD_MASK: u64 = 0xFFFF;

/// Decoded contents of a completion tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub class: OpClass,
    pub fd: i32,
    pub buffer_id: Option<u16>,
    pub sequence_id: Option<u16>,
}

/// Packs an operation class and payload into a 64-bit `user_data` value.
///
/// `fd` is truncated to 26 bits (sufficient for any real file descriptor
/// table); `buffer_id`/`sequence_id` use `NONE_ID` to mean "absent".
pub fn encode(class: OpClass, fd: i32, buffer_id: Option<u16>, sequence_id: Option<u16>) -> u64 {
    let fd_bits = (fd as u32 as u64) & FD_MASK;
    let buffer_bits = buffer_id.unwrap_or(NONE_ID) as u64;
    let sequence_bits = sequence_id.unwrap_or(NONE_ID) as u64;
    (class as u64) | (fd_bits << FD_SHIFT) | (buffer_bits << BUFFER_SHIFT) | sequence_bits
}

/// Recovers the operation class and payload from a `user_data` value.
///
/// Returns `None` if the top bits do not name exactly one known class.
pub fn decode(tag: u64) -> Option<Tag> {
    let class_bits = tag & OpClass::ALL_FLAGS;
    let class = OpClass::from_bits(class_bits)?;
    let payload = tag & !OpClass::ALL_FLAGS;
    let fd = ((payload >> FD_SHIFT) & FD_MASK) as i32;
    let buffer_raw = ((payload >> BUFFER_SHIFT) & FIELD_MASK) as u16;
    let sequence_raw = (payload & FIELD_MASK) as u16;
    Some(Tag {
        class,
        fd,
        buffer_id: if buffer_raw == NONE_ID { None } else { Some(buffer_raw) },
        sequence_id: if sequence_raw == NONE_ID { None } else { Some(sequence_raw) },
    })
}

/// Strips the operation-class bits, leaving the raw payload.
pub fn payload_bits(tag: u64) -> u64 {
    tag & !OpClass::ALL_FLAGS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_basic() {
        let t = encode(OpClass::Read, 42, Some(3), None);
        let decoded = decode(t).unwrap();
        assert_eq!(decoded.class, OpClass::Read);
        assert_eq!(decoded.fd, 42);
        assert_eq!(decoded.buffer_id, Some(3));
        assert_eq!(decoded.sequence_id, None);
    }

    #[test]
    fn round_trip_all_classes() {
        for class in OpClass::ALL {
            let t = encode(class, 7, Some(1), Some(2));
            let decoded = decode(t).unwrap();
            assert_eq!(decoded.class, class);
            assert_eq!(decoded.fd, 7);
            assert_eq!(decoded.buffer_id, Some(1));
            assert_eq!(decoded.sequence_id, Some(2));
        }
    }

    #[test]
    fn absent_ids_round_trip_as_none() {
        let t = encode(OpClass::Write, 0, None, None);
        let decoded = decode(t).unwrap();
        assert_eq!(decoded.buffer_id, None);
        assert_eq!(decoded.sequence_id, None);
    }

    #[test]
    fn unknown_class_bits_decode_to_none() {
        assert!(decode(0).is_none());
    }

    #[test]
    fn fd_is_recoverable_via_payload_mask() {
        let t = encode(OpClass::Accept, 99, None, None);
        let payload = payload_bits(t);
        assert_eq!((payload >> FD_SHIFT) & FD_MASK, 99);
    }
}
