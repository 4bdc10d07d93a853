#[inline(always)]
pub(crate) fn le_u32(d: &[u8]) -> u32 {
    u32::from_le_bytes([d[0], d[1], d[2], d[3]])
}

#[inline(always)]
pub(crate) fn le_u16(d: &[u8]) -> u16 {
    u16::from_le_bytes([d[0], d[1]])
}

/// Converts an in-memory position into a 32-bit archive offset
#[inline]
pub(crate) fn archive_offset(pos: usize) -> Result<u32, crate::Error> {
    u32::try_from(pos).map_err(|_| crate::Error::from(crate::ErrorKind::Zip64Unsupported))
}
