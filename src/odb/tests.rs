use super::*;
use crate::fs::InMemoryFileSystem;

fn zlib_compress(data: &[u8]) -> Vec<u8> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn insert_loose_object(fs: &InMemoryFileSystem, objects_path: &str, kind: &str, body: &[u8]) -> ObjectId {
    let oid = ObjectId::hash_object(kind, body);
    let hex = oid.to_hex();
    let mut header = format!("{kind} {}", body.len()).into_bytes();
    header.push(0);
    header.extend_from_slice(body);
    let path = format!("{objects_path}/{}/{}", &hex[..2], &hex[2..]);
    fs.insert(path, zlib_compress(&header));
    oid
}

/// encodes a single non-deltified pack entry header: continuation bit
/// clear (payload fits in the first byte's remaining bits plus one
/// continuation byte, which is all these small test bodies need).
fn encode_entry_header(ty: u8, size: u64) -> Vec<u8> {
    let mut rem = size >> 4;
    let mut first = (ty << 4) | (size & 0xF) as u8;
    if rem > 0 {
        first |= 0x80;
    }
    let mut out = vec![first];
    while rem > 0 {
        let mut b = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem > 0 {
            b |= 0x80;
        }
        out.push(b);
    }
    out
}

/// builds a minimal one-object pack + index pair and inserts them under
/// `<objects_path>/pack/pack-test.{pack,idx}`.
fn insert_pack(fs: &InMemoryFileSystem, objects_path: &str, kind: &str, body: &[u8]) -> ObjectId {
    let oid = ObjectId::hash_object(kind, body);
    let ty = match kind {
        "commit" => 1,
        "tree" => 2,
        "blob" => 3,
        "tag" => 4,
        _ => unreachable!(),
    };

    let mut pack_bytes = vec![];
    pack_bytes.extend(crate::pack::PACK_SIGNATURE);
    pack_bytes.extend(2u32.to_be_bytes());
    pack_bytes.extend(1u32.to_be_bytes());
    let offset = pack_bytes.len() as u64;
    let mut entry = encode_entry_header(ty, body.len() as u64);
    entry.extend(zlib_compress(body));
    pack_bytes.extend(&entry);

    let mut fanout = [0u32; 256];
    for b in oid.as_bytes()[0] as usize..256 {
        fanout[b] = 1;
    }
    let mut idx_bytes = vec![];
    idx_bytes.extend(0xff744f63u32.to_be_bytes());
    idx_bytes.extend(2u32.to_be_bytes());
    for f in fanout {
        idx_bytes.extend(f.to_be_bytes());
    }
    idx_bytes.extend(oid.as_bytes());
    idx_bytes.extend(crate::hash::crc_of(&entry).to_be_bytes());
    idx_bytes.extend((offset as u32).to_be_bytes());
    idx_bytes.extend([0u8; HASH_SIZE]);
    idx_bytes.extend([0u8; HASH_SIZE]);

    fs.insert(format!("{objects_path}/pack/pack-test.pack"), pack_bytes);
    fs.insert(format!("{objects_path}/pack/pack-test.idx"), idx_bytes);
    oid
}

#[test]
fn reads_loose_object_header_and_body() {
    let fs = InMemoryFileSystem::new();
    let oid = insert_loose_object(&fs, "/repo/objects", "blob", b"hello world");
    let odb = Odb::new(Arc::new(fs), "/repo/objects", HandleCache::default_capacity(), 50).unwrap();

    let cancel = CancellationToken::new();
    let header = odb.read_header(oid, &cancel).unwrap().unwrap();
    assert_eq!(header.kind, ObjectKind::Blob);
    assert_eq!(header.size, 11);

    let raw = odb.read(oid, &cancel).unwrap().unwrap();
    assert_eq!(raw.bytes, b"hello world");
    assert!(odb.exists(oid, &cancel).unwrap());
}

#[test]
fn falls_back_to_pack_when_object_is_not_loose() {
    let fs = InMemoryFileSystem::new();
    let oid = insert_pack(&fs, "/repo/objects", "blob", b"packed content");
    let odb = Odb::new(Arc::new(fs), "/repo/objects", HandleCache::default_capacity(), 50).unwrap();

    let cancel = CancellationToken::new();
    let raw = odb.read(oid, &cancel).unwrap().unwrap();
    assert_eq!(raw.kind, ObjectKind::Blob);
    assert_eq!(raw.bytes, b"packed content");
}

#[test]
fn missing_object_is_none_not_an_error() {
    let fs = InMemoryFileSystem::new();
    let odb = Odb::new(Arc::new(fs), "/repo/objects", HandleCache::default_capacity(), 50).unwrap();
    let cancel = CancellationToken::new();
    let absent = ObjectId::hash_object("blob", b"never inserted");
    assert!(odb.read(absent, &cancel).unwrap().is_none());
    assert!(!odb.exists(absent, &cancel).unwrap());
}

#[test]
fn streams_a_loose_blob_without_materializing_through_read() {
    let fs = InMemoryFileSystem::new();
    let oid = insert_loose_object(&fs, "/repo/objects", "blob", b"streamed");
    let odb = Odb::new(Arc::new(fs), "/repo/objects", HandleCache::default_capacity(), 50).unwrap();

    let cancel = CancellationToken::new();
    let mut stream = odb.open_blob_stream(oid, &cancel).unwrap().unwrap();
    let mut out = vec![];
    stream.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"streamed");
}

#[test]
fn prefix_matches_combines_loose_and_packed_storage() {
    let fs = InMemoryFileSystem::new();
    let loose_oid = insert_loose_object(&fs, "/repo/objects", "blob", b"loose one");
    let packed_oid = insert_pack(&fs, "/repo/objects", "blob", b"packed one");
    let odb = Odb::new(Arc::new(fs), "/repo/objects", HandleCache::default_capacity(), 50).unwrap();

    let loose_prefix: PartialObjectId = loose_oid.to_hex()[..6].parse().unwrap();
    assert_eq!(odb.prefix_matches(loose_prefix).unwrap(), vec![loose_oid]);

    let packed_prefix: PartialObjectId = packed_oid.to_hex()[..6].parse().unwrap();
    assert_eq!(odb.prefix_matches(packed_prefix).unwrap(), vec![packed_oid]);
}
