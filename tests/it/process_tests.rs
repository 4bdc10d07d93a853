use crate::{assert_inline_archive, extract_with_zip_crate, init_logger, le_u16, read_forward};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use quickcheck_macros::quickcheck;
use std::io::Write;
use zipfix::{CompressionMethod, ErrorKind, StreamingZipWriter, ZipDataWriter};

fn streamed_archive(files: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
    let mut archive = StreamingZipWriter::new(Vec::new());
    for (name, data, method) in files {
        let mut file = archive
            .new_file(name)
            .compression_method(*method)
            .create()
            .unwrap();

        let output = match method {
            CompressionMethod::Store => {
                let mut writer = ZipDataWriter::new(&mut file);
                writer.write_all(data).unwrap();
                writer.finish().unwrap().1
            }
            CompressionMethod::Deflate => {
                let encoder = DeflateEncoder::new(&mut file, Compression::default());
                let mut writer = ZipDataWriter::new(encoder);
                writer.write_all(data).unwrap();
                let (encoder, output) = writer.finish().unwrap();
                encoder.finish().unwrap();
                output
            }
        };
        file.finish(output).unwrap();
    }
    archive.finish().unwrap()
}

#[test]
fn test_two_streaming_entries() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("streamed.zip");
    let target = dir.path().join("fixed.zip");

    let streamed = streamed_archive(&[
        ("a.txt", b"hi".as_slice(), CompressionMethod::Store),
        ("b.txt", b"bye".as_slice(), CompressionMethod::Store),
    ]);
    std::fs::write(&source, &streamed).unwrap();

    // The forward reader cannot get past an entry that relies on a descriptor
    let (entries, _) = read_forward(&streamed);
    assert_eq!(entries[0].flags & 0x08, 0x08);
    assert_eq!(entries[0].compressed_size, 0);

    zipfix::process(&source, &target).unwrap();
    let fixed = std::fs::read(&target).unwrap();
    assert_eq!(fixed.len(), streamed.len() - 2 * 16);

    let entries = assert_inline_archive(&fixed);
    let summary: Vec<_> = entries
        .iter()
        .map(|e| (e.name.as_str(), e.crc32, e.compressed_size, e.uncompressed_size))
        .collect();
    assert_eq!(
        summary,
        [("a.txt", 0xD8932AAC, 2, 2), ("b.txt", 0x77379134, 3, 3)]
    );
    assert_eq!(entries[1].contents(), b"bye");

    // The source is read, never written
    assert_eq!(std::fs::read(&source).unwrap(), streamed);
}

#[test]
fn test_process_in_place() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.zip");
    let contents = b"The quick brown fox jumps over the lazy dog".repeat(50);
    let streamed = streamed_archive(&[
        ("fox.txt", contents.as_slice(), CompressionMethod::Deflate),
        ("empty", b"".as_slice(), CompressionMethod::Deflate),
    ]);
    std::fs::write(&path, &streamed).unwrap();

    zipfix::process(&path, &path).unwrap();
    let fixed = std::fs::read(&path).unwrap();
    let entries = assert_inline_archive(&fixed);
    assert_eq!(entries[0].compression_method, 8);
    assert_eq!(entries[0].contents(), contents);
    assert_eq!(entries[1].uncompressed_size, 0);

    // A second pass has nothing left to do
    zipfix::process(&path, &path).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), fixed);
}

#[test]
fn test_missing_end_of_central_directory() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("broken.zip");
    let mut streamed = streamed_archive(&[(
        "a.txt", b"hi".as_slice(), CompressionMethod::Store,
    )]);
    streamed.truncate(streamed.len() - 22);
    std::fs::write(&source, &streamed).unwrap();

    let missing = dir.path().join("missing.zip");
    let err = zipfix::process(&source, &missing).unwrap_err();
    assert!(err.is_not_found());
    assert!(!missing.exists());

    let existing = dir.path().join("existing.zip");
    std::fs::write(&existing, b"previous contents").unwrap();
    let err = zipfix::process(&source, &existing).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::MissingEndOfCentralDirectory));
    assert_eq!(std::fs::read(&existing).unwrap(), b"previous contents");
}

#[test]
fn test_zip64_refused() {
    let mut streamed = streamed_archive(&[(
        "a.txt", b"hi".as_slice(), CompressionMethod::Store,
    )]);
    let eocd = streamed.len() - 22;
    streamed[eocd + 16..eocd + 20].copy_from_slice(&u32::MAX.to_le_bytes());

    let err = zipfix::rewrite(&streamed).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Zip64Unsupported));
}

#[test]
fn test_unsigned_data_descriptor() {
    // Remove the optional descriptor signature, leaving 12 bytes of values
    let streamed = streamed_archive(&[(
        "a.txt", b"hi".as_slice(), CompressionMethod::Store,
    )]);
    let descriptor = 30 + 5 + 2;
    let mut unsigned = streamed[..descriptor].to_vec();
    unsigned.extend_from_slice(&streamed[descriptor + 4..]);

    let eocd = unsigned.len() - 22;
    let cd_offset = crate::le_u32(&unsigned, eocd + 16) - 4;
    unsigned[eocd + 16..eocd + 20].copy_from_slice(&cd_offset.to_le_bytes());

    let fixed = zipfix::rewrite(&unsigned).unwrap();
    let entries = assert_inline_archive(&fixed);
    assert_eq!(entries[0].crc32, 0xD8932AAC);
    assert_eq!(fixed.len(), unsigned.len() - 12);
}

#[test]
fn test_general_purpose_flags_preserved() {
    let streamed = streamed_archive(&[(
        "naïve.txt", b"utf8".as_slice(), CompressionMethod::Store,
    )]);
    let fixed = zipfix::rewrite(&streamed).unwrap();
    assert_eq!(le_u16(&streamed, 6), 0x808);
    assert_eq!(le_u16(&fixed, 6), 0x800);
    assert_inline_archive(&fixed);
}

#[quickcheck]
fn test_rewrite_streamed_archives(files: Vec<(Vec<u8>, bool)>) {
    let names: Vec<String> = (0..files.len()).map(|i| format!("dir/file{}.bin", i)).collect();
    let inputs: Vec<(&str, &[u8], CompressionMethod)> = files
        .iter()
        .zip(&names)
        .take(32)
        .map(|((data, deflate), name)| {
            let method = if *deflate {
                CompressionMethod::Deflate
            } else {
                CompressionMethod::Store
            };
            (name.as_str(), data.as_slice(), method)
        })
        .collect();

    let streamed = streamed_archive(&inputs);
    let (fixed, summary) = zipfix::rewrite_with_summary(&streamed).unwrap();
    assert_eq!(summary.entries, inputs.len());
    assert_eq!(summary.descriptors_removed, inputs.len());
    assert_eq!(fixed.len(), streamed.len() - 16 * inputs.len());

    let entries = assert_inline_archive(&fixed);
    for (entry, (name, data, _)) in entries.iter().zip(&inputs) {
        assert_eq!(entry.name, *name);
        assert_eq!(entry.contents(), *data);
    }

    let extracted = extract_with_zip_crate(&fixed);
    assert_eq!(extracted.len(), inputs.len());
    for ((name, contents), (expected_name, data, _)) in extracted.iter().zip(&inputs) {
        assert_eq!(name, expected_name);
        assert_eq!(contents, data);
    }
}
