/// Compute the CRC32 (IEEE) of a byte slice
///
/// Entries written through [`ZipDataWriter`](crate::ZipDataWriter) have their
/// checksum computed incrementally, this is for data held entirely in memory.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    crc.sum()
}
