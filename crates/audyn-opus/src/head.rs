use byteorder::{LittleEndian, WriteBytesExt};

/// Opus preskip, in samples at 48 kHz: encoder lookahead that players must
/// discard at stream start.
pub const PRESKIP_48K: u16 = 312;

/// Builds the `OpusHead` packet (RFC 7845 §5.1).
pub fn opus_head(channels: u8, input_sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(19);
    buf.extend_from_slice(b"OpusHead");
    buf.push(1); // version
    buf.push(channels);
    buf.write_u16::<LittleEndian>(PRESKIP_48K).unwrap();
    buf.write_u32::<LittleEndian>(input_sample_rate).unwrap(); // informational only
    buf.write_i16::<LittleEndian>(0).unwrap(); // output gain
    buf.push(0); // channel mapping family
    buf
}

/// Builds the `OpusTags` packet (RFC 7845 §5.2): a vendor string and zero
/// user comments except for a single `ENCODER=Audyn` tag.
pub fn opus_tags() -> Vec<u8> {
    const VENDOR: &[u8] = b"Audyn";
    const COMMENT: &[u8] = b"ENCODER=Audyn";

    let mut buf = Vec::with_capacity(8 + 4 + VENDOR.len() + 4 + 4 + COMMENT.len());
    buf.extend_from_slice(b"OpusTags");
    buf.write_u32::<LittleEndian>(VENDOR.len() as u32).unwrap();
    buf.extend_from_slice(VENDOR);
    buf.write_u32::<LittleEndian>(1).unwrap(); // one user comment
    buf.write_u32::<LittleEndian>(COMMENT.len() as u32).unwrap();
    buf.extend_from_slice(COMMENT);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_has_magic_and_preskip() {
        let head = opus_head(2, 48_000);
        assert_eq!(&head[0..8], b"OpusHead");
        assert_eq!(head[8], 1);
        assert_eq!(head[9], 2);
        let preskip = u16::from_le_bytes([head[10], head[11]]);
        assert_eq!(preskip, PRESKIP_48K);
    }

    #[test]
    fn tags_carry_encoder_comment() {
        let tags = opus_tags();
        assert_eq!(&tags[0..8], b"OpusTags");
        assert!(tags
            .windows(b"ENCODER=Audyn".len())
            .any(|w| w == b"ENCODER=Audyn"));
    }
}
