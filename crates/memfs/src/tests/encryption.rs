use std::io::Write;

use crate::cipher::NONCE_SIZE;
use crate::error::ErrorKind;
use crate::{MemFs, OpenOptions, Options};

const TAG_SIZE: usize = 16;

fn sealed_len(plain: usize) -> u64 {
    (NONCE_SIZE + plain + TAG_SIZE) as u64
}

fn encrypted(key: &str) -> MemFs {
    MemFs::with_options(Options::new().with_encryption(key))
}

#[test]
fn test_roundtrip_with_key() {
    let fs = encrypted("my-secret-encryption-key");
    assert!(fs.is_encrypted());
    fs.write_file("f", b"secret", 0o644).unwrap();

    assert_eq!(fs.read_file("f").unwrap(), b"secret");

    let stored = fs.read_stored("f").unwrap();
    assert_ne!(stored, b"secret");
    assert_eq!(stored.len() as u64, sealed_len(6));
    assert_eq!(fs.stat("f").unwrap().size, sealed_len(6));
    assert_eq!(fs.used_storage(), sealed_len(6));
}

#[test]
fn test_same_plaintext_seals_differently() {
    let fs = encrypted("k");
    fs.write_file("a", b"same", 0o644).unwrap();
    fs.write_file("b", b"same", 0o644).unwrap();
    assert_ne!(fs.read_stored("a").unwrap(), fs.read_stored("b").unwrap());
}

#[test]
fn test_key_scenario_through_snapshot() {
    let fs = encrypted("K1");
    fs.write_file("f", b"secret", 0o644).unwrap();

    let mut snapshot = Vec::new();
    fs.save_to(&mut snapshot).unwrap();

    // Without a key the stored ciphertext comes back as is.
    let loaded = MemFs::load_from(&snapshot[..]).unwrap();
    assert!(!loaded.is_encrypted());
    let raw = loaded.read_file("f").unwrap();
    assert_ne!(raw, b"secret");
    assert_eq!(raw, fs.read_stored("f").unwrap());

    loaded.set_encryption_key("K1");
    assert_eq!(loaded.read_file("f").unwrap(), b"secret");

    loaded.set_encryption_key("K2");
    let err = loaded.read_file("f").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecryptionFailed);
}

#[test]
fn test_writer_seals_on_close() {
    let fs = encrypted("k");
    let mut writer = fs.create("f").unwrap();
    writer.write_all(b"hello ").unwrap();
    writer.write_all(b"world").unwrap();

    // Appended bytes sit in the node as plaintext until close.
    assert_eq!(fs.read_stored("f").unwrap(), b"hello world");
    assert_eq!(fs.used_storage(), 11);

    writer.close().unwrap();
    assert_eq!(fs.used_storage(), sealed_len(11));
    assert_ne!(fs.read_stored("f").unwrap(), b"hello world");
    assert_eq!(fs.read_file("f").unwrap(), b"hello world");
}

#[test]
fn test_dropped_writer_is_sealed() {
    let fs = encrypted("k");
    {
        let mut writer = fs.create("f").unwrap();
        writer.write_all(b"secret").unwrap();
    }
    assert_eq!(fs.read_stored("f").unwrap().len() as u64, sealed_len(6));
    assert_eq!(fs.read_file("f").unwrap(), b"secret");
}

#[test]
fn test_reopen_for_append_unseals() {
    let fs = encrypted("k");
    fs.write_file("f", b"abc", 0o644).unwrap();

    let mut writer = fs
        .open_file("f", &OpenOptions::new().write(true))
        .unwrap()
        .into_writer()
        .unwrap();
    assert_eq!(fs.read_stored("f").unwrap(), b"abc");
    assert_eq!(fs.used_storage(), 3);

    writer.write_all(b"def").unwrap();
    writer.close().unwrap();
    assert_eq!(fs.read_file("f").unwrap(), b"abcdef");
    assert_eq!(fs.used_storage(), sealed_len(6));
}

#[test]
fn test_reopen_with_wrong_key_fails() {
    let fs = encrypted("k1");
    fs.write_file("f", b"abc", 0o644).unwrap();
    fs.set_encryption_key("k2");

    let err = fs
        .open_file("f", &OpenOptions::new().write(true))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecryptionFailed);
    // Truncating needs no decryption.
    assert!(fs
        .open_file("f", &OpenOptions::new().write(true).truncate(true))
        .is_ok());
}

#[test]
fn test_empty_content_stays_empty() {
    let fs = encrypted("k");
    fs.write_file("e", b"", 0o644).unwrap();
    assert!(fs.read_stored("e").unwrap().is_empty());
    assert!(fs.read_file("e").unwrap().is_empty());

    fs.create("c").unwrap().close().unwrap();
    assert!(fs.read_stored("c").unwrap().is_empty());
    assert_eq!(fs.used_storage(), 0);
}

#[test]
fn test_disabling_key_exposes_ciphertext() {
    let fs = encrypted("k");
    fs.write_file("f", b"plain", 0o644).unwrap();
    let stored = fs.read_stored("f").unwrap();

    fs.set_encryption_key("");
    assert!(!fs.is_encrypted());
    assert_eq!(fs.read_file("f").unwrap(), stored);

    fs.write_file("g", b"plain", 0o644).unwrap();
    assert_eq!(fs.read_stored("g").unwrap(), b"plain");
}

#[test]
fn test_plaintext_too_short_to_decrypt() {
    let fs = MemFs::new();
    fs.write_file("f", b"abc", 0o644).unwrap();
    fs.set_encryption_key("late");
    assert_eq!(
        fs.read_file("f").unwrap_err().kind(),
        ErrorKind::DecryptionFailed
    );
}

#[test]
fn test_sub_view_shares_key() {
    let fs = MemFs::new();
    fs.mkdir_all("s", 0o755).unwrap();
    let sub = fs.sub("s").unwrap();

    fs.set_encryption_key("shared");
    sub.write_file("f", b"data", 0o644).unwrap();
    assert_eq!(fs.read_stored("s/f").unwrap().len() as u64, sealed_len(4));
    assert_eq!(fs.read_file("s/f").unwrap(), b"data");
}
