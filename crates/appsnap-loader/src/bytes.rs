//! Little-endian field access over untrusted byte windows

pub(crate) fn le_u16(buf: &[u8], at: usize) -> Option<u16> {
    let bytes = buf.get(at..at.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn le_u32(buf: &[u8], at: usize) -> Option<u32> {
    let bytes = buf.get(at..at.checked_add(4)?)?;
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    Some(u32::from_le_bytes(raw))
}

pub(crate) fn le_u64(buf: &[u8], at: usize) -> Option<u64> {
    let bytes = buf.get(at..at.checked_add(8)?)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Some(u64::from_le_bytes(raw))
}

/// Fixed-width, NUL-padded name field (Mach-O and PE section names).
pub(crate) fn padded_name(buf: &[u8], at: usize, width: usize) -> Option<&[u8]> {
    let field = buf.get(at..at.checked_add(width)?)?;
    let end = field.iter().position(|&b| b == 0).unwrap_or(width);
    Some(&field[..end])
}

/// NUL-terminated string starting at `at`.
pub(crate) fn c_str(buf: &[u8], at: usize) -> Option<&[u8]> {
    let tail = buf.get(at..)?;
    let end = tail.iter().position(|&b| b == 0)?;
    Some(&tail[..end])
}

pub(crate) fn round_up(value: u64, alignment: u64) -> Option<u64> {
    debug_assert!(alignment.is_power_of_two());
    Some(value.checked_add(alignment - 1)? & !(alignment - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_bounds_checked() {
        let buf = [1u8, 0, 0, 0, 2, 0, 0, 0];
        assert_eq!(le_u16(&buf, 0), Some(1));
        assert_eq!(le_u32(&buf, 4), Some(2));
        assert_eq!(le_u64(&buf, 0), Some(0x0000_0002_0000_0001));
        assert_eq!(le_u32(&buf, 5), None);
        assert_eq!(le_u64(&buf, usize::MAX), None);
    }

    #[test]
    fn test_names() {
        let buf = *b"__text\0\0\0\0\0\0\0\0\0\0.data\0";
        assert_eq!(padded_name(&buf, 0, 16), Some(&b"__text"[..]));
        assert_eq!(c_str(&buf, 16), Some(&b".data"[..]));
        assert_eq!(c_str(b"unterminated", 0), None);
    }

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(0, 16), Some(0));
        assert_eq!(round_up(1, 16), Some(16));
        assert_eq!(round_up(16384, 16384), Some(16384));
        assert_eq!(round_up(u64::MAX, 16), None);
    }
}
