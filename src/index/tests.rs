use super::*;
use sha1::{Digest, Sha1};
use std::path::Path;

/// builds a well-formed `DIRC` v2 body (header + entries, no extensions)
/// and appends the correct trailing checksum.
fn build_index(version: u32, entries: &[(&str, &[u8; 20])]) -> Vec<u8> {
    let mut body = vec![];
    body.extend_from_slice(b"DIRC");
    body.extend_from_slice(&version.to_be_bytes());
    body.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    for (name, oid) in entries {
        let start = body.len();
        body.extend_from_slice(&0u32.to_be_bytes()); // ctime sec
        body.extend_from_slice(&0u32.to_be_bytes()); // ctime nsec
        body.extend_from_slice(&0u32.to_be_bytes()); // mtime sec
        body.extend_from_slice(&0u32.to_be_bytes()); // mtime nsec
        body.extend_from_slice(&0u32.to_be_bytes()); // dev
        body.extend_from_slice(&0u32.to_be_bytes()); // ino
        body.extend_from_slice(&0o100644u32.to_be_bytes()); // mode
        body.extend_from_slice(&0u32.to_be_bytes()); // uid
        body.extend_from_slice(&0u32.to_be_bytes()); // gid
        body.extend_from_slice(&0u32.to_be_bytes()); // size
        body.extend_from_slice(*oid);
        let flags = (name.len() as u16).min(NAME_MASK);
        body.extend_from_slice(&flags.to_be_bytes());
        body.extend_from_slice(name.as_bytes());
        body.push(0);
        if version != 4 {
            let consumed = body.len() - start;
            let padded = (consumed + 8) & !7;
            body.resize(body.len() + (padded - consumed), 0);
        }
    }

    let checksum = Sha1::digest(&body);
    body.extend_from_slice(&checksum);
    body
}

#[test]
fn parses_v2_entries_with_padding() {
    let oid = [7u8; 20];
    let bytes = build_index(2, &[("src/main.rs", &oid)]);
    let index = Index::parse(&bytes[..], Path::new("<test>")).unwrap();
    assert_eq!(index.version, 2);
    assert_eq!(index.entries().len(), 1);
    let entry = &index.entries()[0];
    assert_eq!(entry.path.as_str(), "src/main.rs");
    assert_eq!(entry.id, ObjectId::new(oid));
    assert_eq!(entry.mode, FileMode::REG);
    assert_eq!(entry.stage(), MergeStage::None);
}

#[test]
fn rejects_bad_checksum() {
    let oid = [1u8; 20];
    let mut bytes = build_index(2, &[("a", &oid)]);
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    assert!(Index::parse(&bytes[..], Path::new("<test>")).is_err());
}

#[test]
fn rejects_unsupported_version() {
    let bytes = build_index(99, &[]);
    let err = Index::parse(&bytes[..], Path::new("<test>")).unwrap_err();
    assert!(matches!(err, Error::MalformedIndex { .. }));
}

#[test]
fn v4_name_compression_shares_prefix() {
    // build a v4 body by hand: two entries, the second reusing a prefix
    // of the first's path via the strip-count varint.
    let mut body = vec![];
    body.extend_from_slice(b"DIRC");
    body.extend_from_slice(&4u32.to_be_bytes());
    body.extend_from_slice(&2u32.to_be_bytes());

    let push_fixed = |body: &mut Vec<u8>, name_len: u16| {
        body.extend_from_slice(&[0u8; 4 * 8]);
        body.extend_from_slice(&0o100644u32.to_be_bytes());
        body.extend_from_slice(&[0u8; 8]);
        body.extend_from_slice(&[9u8; 20]);
        body.extend_from_slice(&name_len.to_be_bytes());
    };

    // entry 1: "src/lib.rs", strip 0 bytes from an empty previous name
    push_fixed(&mut body, 10);
    body.push(0); // strip count varint: 0
    body.extend_from_slice(b"src/lib.rs");
    body.push(0);

    // entry 2: "src/main.rs" - shares "src/" (strip 6 bytes off "lib.rs")
    push_fixed(&mut body, 11);
    body.push(6); // strip count varint: 6 ("lib.rs".len())
    body.extend_from_slice(b"main.rs");
    body.push(0);

    let checksum = Sha1::digest(&body);
    body.extend_from_slice(&checksum);

    let index = Index::parse(&body[..], Path::new("<test>")).unwrap();
    assert_eq!(index.entries()[0].path.as_str(), "src/lib.rs");
    assert_eq!(index.entries()[1].path.as_str(), "src/main.rs");
}

#[test]
fn extensions_are_kept_opaque() {
    let mut body = vec![];
    body.extend_from_slice(b"DIRC");
    body.extend_from_slice(&2u32.to_be_bytes());
    body.extend_from_slice(&0u32.to_be_bytes());
    body.extend_from_slice(b"TREE");
    body.extend_from_slice(&3u32.to_be_bytes());
    body.extend_from_slice(b"abc");

    let checksum = Sha1::digest(&body);
    body.extend_from_slice(&checksum);

    let index = Index::parse(&body[..], Path::new("<test>")).unwrap();
    assert_eq!(index.extensions().len(), 1);
    assert_eq!(index.extension(b"TREE"), Some(&b"abc"[..]));
}
