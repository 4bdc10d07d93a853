use crate::{assert_inline_archive, extract_with_zip_crate, init_logger, read_forward};
use filetime::FileTime;
use std::fs;
use std::path::Path;
use zipfix::{ArchiveOptions, CompressionMethod, DosDateTime};

fn names(entries: &[crate::ForwardEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

fn populate(root: &Path) {
    fs::create_dir_all(root.join("css")).unwrap();
    fs::create_dir_all(root.join("img/icons")).unwrap();
    fs::write(root.join("index.html"), "<html><body>hello</body></html>").unwrap();
    fs::write(root.join("css/site.css"), "body { color: red; }\n".repeat(100)).unwrap();
    fs::write(root.join("img/icons/dot.bin"), [0u8, 1, 2, 3, 255]).unwrap();
}

#[test]
fn test_archive_directory() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("site");
    populate(&source);

    let target = dir.path().join("site.zip");
    zipfix::archive(&source, &target, ArchiveOptions::new()).unwrap();

    let data = fs::read(&target).unwrap();
    let entries = assert_inline_archive(&data);
    assert_eq!(
        names(&entries),
        [
            "site/",
            "site/css/",
            "site/css/site.css",
            "site/img/",
            "site/img/icons/",
            "site/img/icons/dot.bin",
            "site/index.html",
        ]
    );

    for entry in &entries {
        if entry.name.ends_with('/') {
            assert_eq!(entry.compression_method, 0);
            assert_eq!(entry.compressed_size, 0);
        } else {
            assert_eq!(entry.compression_method, 8);
            let relative = entry.name.trim_start_matches("site/");
            assert_eq!(entry.contents(), fs::read(source.join(relative)).unwrap());
        }
    }

    let extracted = extract_with_zip_crate(&data);
    assert_eq!(extracted.len(), entries.len());
    for (name, contents) in &extracted {
        match name.strip_suffix('/') {
            Some(dir) => {
                assert!(contents.is_empty());
                assert!(dir.starts_with("site"), "{}", name);
            }
            None => {
                let relative = name.trim_start_matches("site/");
                assert_eq!(contents, &fs::read(source.join(relative)).unwrap(), "{}", name);
            }
        }
    }
}

#[test]
fn test_archive_exclude_base_dir() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("site");
    populate(&source);

    let target = dir.path().join("site.zip");
    let options = ArchiveOptions::new().exclude_base_dir(true);
    zipfix::archive(&source, &target, options).unwrap();

    let data = fs::read(&target).unwrap();
    let entries = assert_inline_archive(&data);
    assert_eq!(
        names(&entries),
        [
            "css/",
            "css/site.css",
            "img/",
            "img/icons/",
            "img/icons/dot.bin",
            "index.html",
        ]
    );
}

#[test]
fn test_archive_empty_directory() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("emptydir");
    fs::create_dir(&source).unwrap();

    let target = dir.path().join("out.zip");
    zipfix::archive(&source, &target, ArchiveOptions::new()).unwrap();

    let data = fs::read(&target).unwrap();
    let entries = assert_inline_archive(&data);
    assert_eq!(names(&entries), ["emptydir/"]);
    assert_eq!(entries[0].flags & 0x08, 0);
    assert_eq!(entries[0].crc32, 0);
    assert_eq!(entries[0].uncompressed_size, 0);
}

#[test]
fn test_archive_unprocessed_keeps_descriptors() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("site");
    populate(&source);

    let target = dir.path().join("streamed.zip");
    let options = ArchiveOptions::new().exclude_base_dir(true);
    zipfix::archive_unprocessed(&source, &target, options).unwrap();

    let data = fs::read(&target).unwrap();
    let eocd = zipfix::EocdLocator::new().locate(&data).unwrap();
    let central = zipfix::parse_central_directory(&data, &eocd).unwrap();
    let streamed: Vec<bool> = central.iter().map(|e| e.has_data_descriptor()).collect();
    assert_eq!(streamed, [false, true, false, false, true, true]);

    // Local headers of files defer their sizes
    let (entries, _) = read_forward(&data);
    assert_eq!(entries[1].name, "css/site.css");
    assert_eq!(entries[1].compressed_size, 0);

    let fixed = dir.path().join("fixed.zip");
    zipfix::process(&target, &fixed).unwrap();
    let fixed = fs::read(&fixed).unwrap();
    assert_eq!(fixed.len(), data.len() - 3 * 16);
    assert_inline_archive(&fixed);
}

#[test]
fn test_archive_single_file() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("notes.txt");
    fs::write(&source, "remember the milk").unwrap();

    let target = dir.path().join("notes.zip");
    let options = ArchiveOptions::new().compression_method(CompressionMethod::Store);
    zipfix::archive(&source, &target, options).unwrap();

    let data = fs::read(&target).unwrap();
    let entries = assert_inline_archive(&data);
    assert_eq!(names(&entries), ["notes.txt"]);
    assert_eq!(entries[0].compression_method, 0);
    assert_eq!(entries[0].compressed, b"remember the milk");
}

#[test]
fn test_archive_modification_time() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("src");
    fs::create_dir(&source).unwrap();
    let file = source.join("dated.txt");
    fs::write(&file, "dated").unwrap();

    // 2021-03-04 05:06:08 UTC
    let mtime = FileTime::from_unix_time(1614834368, 0);
    filetime::set_file_mtime(&file, mtime).unwrap();

    let target = dir.path().join("dated.zip");
    let options = ArchiveOptions::new().exclude_base_dir(true);
    zipfix::archive(&source, &target, options).unwrap();

    let data = fs::read(&target).unwrap();
    let entries = assert_inline_archive(&data);
    let dos = DosDateTime::new(entries[0].dos_time, entries[0].dos_date);
    assert_eq!(
        (dos.year(), dos.month(), dos.day()),
        (2021, 3, 4)
    );
    assert_eq!((dos.hour(), dos.minute(), dos.second()), (5, 6, 8));
}

#[test]
fn test_archive_replaces_existing_target() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("site");
    populate(&source);

    let target = dir.path().join("site.zip");
    fs::write(&target, "stale").unwrap();
    zipfix::archive(&source, &target, ArchiveOptions::new()).unwrap();
    assert_inline_archive(&fs::read(&target).unwrap());

    // Nothing but the source and the archive remain
    let mut leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    leftovers.sort();
    assert_eq!(leftovers, ["site", "site.zip"]);
}
