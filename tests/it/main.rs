use std::io::Read;

mod archive_tests;
mod process_tests;

const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x02014b50;
const END_OF_CENTRAL_DIR_SIGNATURE: u32 = 0x06054b50;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn le_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

pub fn le_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// An entry as seen by a reader that never consults the central directory
#[derive(Debug)]
pub struct ForwardEntry {
    pub offset: usize,
    pub name: String,
    pub flags: u16,
    pub compression_method: u16,
    pub dos_time: u16,
    pub dos_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub compressed: Vec<u8>,
}

impl ForwardEntry {
    pub fn contents(&self) -> Vec<u8> {
        match self.compression_method {
            0 => self.compressed.clone(),
            8 => {
                let mut out = Vec::new();
                flate2::read::DeflateDecoder::new(self.compressed.as_slice())
                    .read_to_end(&mut out)
                    .unwrap();
                out
            }
            method => panic!("unexpected compression method {}", method),
        }
    }
}

/// Walks local entries front to back using only the sizes in each local
/// header. Returns the entries and the position where the walk stopped.
pub fn read_forward(data: &[u8]) -> (Vec<ForwardEntry>, usize) {
    let mut entries = Vec::new();
    let mut pos = 0;
    while data.len() >= pos + 4 && le_u32(data, pos) == LOCAL_FILE_HEADER_SIGNATURE {
        let name_len = le_u16(data, pos + 26) as usize;
        let extra_len = le_u16(data, pos + 28) as usize;
        let compressed_size = le_u32(data, pos + 18);
        let name_start = pos + 30;
        let data_start = name_start + name_len + extra_len;
        let data_end = data_start + compressed_size as usize;

        entries.push(ForwardEntry {
            offset: pos,
            name: String::from_utf8(data[name_start..name_start + name_len].to_vec()).unwrap(),
            flags: le_u16(data, pos + 6),
            compression_method: le_u16(data, pos + 8),
            dos_time: le_u16(data, pos + 10),
            dos_date: le_u16(data, pos + 12),
            crc32: le_u32(data, pos + 14),
            compressed_size,
            uncompressed_size: le_u32(data, pos + 22),
            compressed: data[data_start..data_end].to_vec(),
        });
        pos = data_end;
    }

    (entries, pos)
}

/// Asserts that an archive can be consumed without data descriptors and
/// that its central directory agrees with its local headers.
pub fn assert_inline_archive(data: &[u8]) -> Vec<ForwardEntry> {
    let (entries, end) = read_forward(data);
    let eocd = zipfix::EocdLocator::new().locate(data).unwrap();
    let central = zipfix::parse_central_directory(data, &eocd).unwrap();
    assert_eq!(central.len(), entries.len());

    for (local, cd) in entries.iter().zip(&central) {
        assert_eq!(local.flags & 0x08, 0, "{} still flags a descriptor", local.name);
        assert!(!cd.has_data_descriptor());
        assert_eq!(cd.local_header_offset as usize, local.offset);
        assert_eq!(cd.crc32, local.crc32, "{}", local.name);
        assert_eq!(cd.compressed_size, local.compressed_size, "{}", local.name);
        assert_eq!(cd.uncompressed_size, local.uncompressed_size, "{}", local.name);

        let contents = local.contents();
        assert_eq!(contents.len(), local.uncompressed_size as usize);
        assert_eq!(zipfix::crc32(&contents), local.crc32);
    }

    // The central directory immediately follows the last entry
    assert_eq!(eocd.central_directory_offset as usize, end);
    let expected_signature = if entries.is_empty() {
        END_OF_CENTRAL_DIR_SIGNATURE
    } else {
        CENTRAL_HEADER_SIGNATURE
    };
    assert_eq!(le_u32(data, end), expected_signature);

    entries
}

/// Extracts every entry with the `zip` crate, once through the central
/// directory and once as a stream of local headers. Both views must agree.
pub fn extract_with_zip_crate(data: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
    let mut indexed = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        indexed.push((file.name().to_string(), contents));
    }

    // The stream ends at the first central directory header, which an empty
    // archive does not have
    let mut streamed = Vec::new();
    if !indexed.is_empty() {
        let mut reader = data;
        while let Some(mut file) = zip::read::read_zipfile_from_stream(&mut reader).unwrap() {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents).unwrap();
            streamed.push((file.name().to_string(), contents));
        }
    }

    assert_eq!(streamed, indexed);
    indexed
}
