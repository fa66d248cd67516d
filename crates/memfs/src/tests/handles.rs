use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Error, ErrorKind};
use crate::{MemFs, OpenOptions, OpenedFile};

#[test]
fn test_read_handle_is_isolated_from_later_writes() {
    let fs = MemFs::new();
    fs.write_file("f", b"A", 0o644).unwrap();

    let mut reader = fs.open("f").unwrap();
    fs.write_file("f", b"B", 0o644).unwrap();

    assert_eq!(reader.read_remaining().unwrap(), b"A");
    assert_eq!(fs.read_file("f").unwrap(), b"B");
}

#[test]
fn test_reader_seek_and_stat() {
    let fs = MemFs::new();
    fs.write_file("f", b"hello world", 0o640).unwrap();

    let mut reader = fs.open("f").unwrap();
    let meta = reader.stat().unwrap();
    assert_eq!(meta.name, "f");
    assert_eq!(meta.size, 11);
    assert_eq!(meta.mode, 0o640);

    reader.seek(SeekFrom::Start(6)).unwrap();
    let mut buf = String::new();
    reader.read_to_string(&mut buf).unwrap();
    assert_eq!(buf, "world");
    assert_eq!(reader.position().unwrap(), 11);

    reader.close().unwrap();
    assert!(matches!(reader.close(), Err(Error::Closed)));
}

#[test]
fn test_writer_bytes_visible_before_close() {
    let fs = MemFs::new();
    let mut writer = fs.create("f").unwrap();
    writer.write_all(b"abc").unwrap();

    assert_eq!(fs.stat("f").unwrap().size, 3);
    assert_eq!(writer.stat().unwrap().size, 3);
    assert_eq!(fs.read_file("f").unwrap(), b"abc");
    assert_eq!(writer.path(), "f");

    writer.write_all(b"def").unwrap();
    writer.flush().unwrap();
    writer.close().unwrap();
    assert_eq!(fs.read_file("f").unwrap(), b"abcdef");
}

#[test]
fn test_writer_after_close() {
    let fs = MemFs::new();
    let mut writer = fs.create("f").unwrap();
    writer.close().unwrap();
    assert!(writer.is_closed());

    assert!(matches!(writer.close(), Err(Error::Closed)));
    assert!(matches!(writer.append(b"x"), Err(Error::Closed)));
    assert!(matches!(writer.stat(), Err(Error::Closed)));

    let err = writer.write(b"x").unwrap_err();
    assert!(matches!(Error::from_io(err), Error::Closed));
    let err = writer.flush().unwrap_err();
    assert!(matches!(Error::from_io(err), Error::Closed));
}

#[test]
fn test_open_missing_file() {
    let fs = MemFs::new();
    assert!(fs.open("nope").unwrap_err().is_not_exist());
    assert!(fs.read_file("dir/nope").unwrap_err().is_not_exist());
}

#[test]
fn test_open_file_read() {
    let fs = MemFs::new();
    fs.mkdir_all("d", 0o755).unwrap();
    fs.write_file("d/f", b"content", 0o644).unwrap();

    let opened = fs.open_file("d/f", &OpenOptions::read_only()).unwrap();
    let mut reader = opened.into_reader().unwrap();
    assert_eq!(reader.read_remaining().unwrap(), b"content");

    let opened = fs.open_file("d", &OpenOptions::read_only()).unwrap();
    assert!(opened.stat().unwrap().is_dir());
    let mut dir = opened.into_dir().unwrap();
    assert_eq!(dir.read_dir(0).unwrap().len(), 1);

    // No flags at all is a plain read.
    let opened = fs.open_file("d/f", &OpenOptions::new()).unwrap();
    assert!(matches!(opened, OpenedFile::Reader(_)));
    assert!(opened.into_writer().is_none());
}

#[test]
fn test_open_file_write_modes() {
    let fs = MemFs::new();

    let err = fs
        .open_file("f", &OpenOptions::new().write(true))
        .unwrap_err();
    assert!(err.is_not_exist());

    let mut opened = fs
        .open_file("f", &OpenOptions::new().write(true).create(true))
        .unwrap();
    let OpenedFile::Writer(writer) = &mut opened else {
        panic!("expected a writer");
    };
    writer.write_all(b"abc").unwrap();
    opened.close().unwrap();
    assert_eq!(fs.read_file("f").unwrap(), b"abc");

    // Without truncate a writer appends to what is there.
    let mut writer = fs
        .open_file("f", &OpenOptions::new().write(true).append(true))
        .unwrap()
        .into_writer()
        .unwrap();
    writer.write_all(b"def").unwrap();
    writer.close().unwrap();
    assert_eq!(fs.read_file("f").unwrap(), b"abcdef");

    let mut writer = fs
        .open_file("f", &OpenOptions::new().read(true).write(true).truncate(true))
        .unwrap()
        .into_writer()
        .unwrap();
    writer.write_all(b"xyz").unwrap();
    writer.close().unwrap();
    assert_eq!(fs.read_file("f").unwrap(), b"xyz");
}

#[test]
fn test_open_file_create_then_read() {
    let fs = MemFs::new();
    let mut reader = fs
        .open_file("new", &OpenOptions::new().create(true))
        .unwrap()
        .into_reader()
        .unwrap();
    assert!(reader.read_remaining().unwrap().is_empty());
    assert_eq!(fs.stat("new").unwrap().mode, 0o666);

    fs.write_file("new", b"filled", 0o644).unwrap();
    let mut reader = fs
        .open_file("new", &OpenOptions::new().create(true))
        .unwrap()
        .into_reader()
        .unwrap();
    assert_eq!(reader.read_remaining().unwrap(), b"filled");
}

#[test]
fn test_open_file_rejections() {
    let fs = MemFs::new();
    fs.mkdir_all("d", 0o755).unwrap();

    let kind = |opts: OpenOptions, path: &str| fs.open_file(path, &opts).unwrap_err().kind();

    assert_eq!(kind(OpenOptions::new().write(true), "d"), ErrorKind::Invalid);
    assert_eq!(kind(OpenOptions::new().create(true), "d"), ErrorKind::Invalid);
    assert_eq!(kind(OpenOptions::new().append(true), "d"), ErrorKind::Unsupported);
    assert_eq!(
        kind(OpenOptions::read_only().truncate(true), "f"),
        ErrorKind::Unsupported
    );
    assert_eq!(
        kind(OpenOptions::new().write(true).create(true), "missing/f"),
        ErrorKind::NotExist
    );
    assert_eq!(kind(OpenOptions::read_only(), "a/../b"), ErrorKind::InvalidPath);
}

#[test]
fn test_open_dir_pagination() {
    let fs = MemFs::new();
    let mut expected = Vec::new();
    for i in 0..10 {
        let name = format!("f{i:02}");
        fs.write_file(&name, b"x", 0o644).unwrap();
        expected.push(name);
    }

    let mut dir = fs.open_dir(".").unwrap();
    let mut sizes = Vec::new();
    let mut seen = Vec::new();
    loop {
        let batch = dir.read_dir(3).unwrap();
        if batch.is_empty() {
            break;
        }
        sizes.push(batch.len());
        seen.extend(batch.iter().map(|e| e.name().to_string()));
    }
    assert_eq!(sizes, vec![3, 3, 3, 1]);
    assert_eq!(seen, expected);

    dir.close().unwrap();
    assert!(dir.is_closed());
}

#[test]
fn test_open_dir_errors() {
    let fs = MemFs::new();
    fs.write_file("f", b"x", 0o644).unwrap();
    assert_eq!(fs.open_dir("f").unwrap_err().kind(), ErrorKind::NotADirectory);
    assert!(fs.open_dir("missing").unwrap_err().is_not_exist());
    assert!(fs.open_dir(".").unwrap().stat().unwrap().is_dir());
}
