//! Small byte-buffer helpers shared by the framing decoders

/// Peek a little-endian signed 32-bit integer from the start of a buffer
///
/// Returns `None` when fewer than four bytes are available. The value is
/// widened by callers before length comparisons so a hostile prefix cannot
/// overflow the arithmetic.
pub fn peek_i32_le(buf: &[u8]) -> Option<i32> {
    let bytes: [u8; 4] = buf.get(..4)?.try_into().ok()?;
    Some(i32::from_le_bytes(bytes))
}

/// Index of the first occurrence of `needle` in `buf`
pub fn find_byte(buf: &[u8], needle: u8) -> Option<usize> {
    buf.iter().position(|&b| b == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peeks_little_endian() {
        assert_eq!(peek_i32_le(&[0x05, 0x00, 0x00, 0x00, 0xFF]), Some(5));
        assert_eq!(peek_i32_le(&[0xFF, 0xFF, 0xFF, 0xFF]), Some(-1));
        assert_eq!(peek_i32_le(&[0x01, 0x02]), None);
    }

    #[test]
    fn finds_sentinel() {
        assert_eq!(find_byte(b"abc\x1edef", 0x1E), Some(3));
        assert_eq!(find_byte(b"abc", 0x1E), None);
        assert_eq!(find_byte(b"\x0a", 0x0A), Some(0));
    }
}
