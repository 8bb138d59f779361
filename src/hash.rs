use crate::error::{Error, Result};
use rustc_hash::FxHasher;
use sha1::{Digest, Sha1};
use std::fmt::{self, Display, Formatter};
use std::hash::Hasher;
use std::str::FromStr;

pub const HASH_SIZE: usize = 20;

/// a 20-byte SHA-1 object id, the primary key into the object store
#[derive(PartialEq, Eq, Hash, Clone, Ord, PartialOrd, Copy)]
#[repr(transparent)]
pub struct ObjectId([u8; HASH_SIZE]);

impl ObjectId {
    /// hash of an empty file: e69de29bb2d1d6434b8b29ae775ad8c2e48c5391
    pub const EMPTY_BLOB: Self = Self([
        0xe6, 0x9d, 0xe2, 0x9b, 0xb2, 0xd1, 0xd6, 0x43, 0x4b, 0x8b, 0x29, 0xae, 0x77, 0x5a, 0xd8,
        0xc2, 0xe4, 0x8c, 0x53, 0x91,
    ]);
    /// hash of an empty tree: 4b825dc642cb6eb9a060e54bf8d69288fbee4904
    pub const EMPTY_TREE: Self = Self([
        0x4b, 0x82, 0x5d, 0xc6, 0x42, 0xcb, 0x6e, 0xb9, 0xa0, 0x60, 0xe5, 0x4b, 0xf8, 0xd6, 0x92,
        0x88, 0xfb, 0xee, 0x49, 0x04,
    ]);
    /// sentinel for "not yet computed" - extremely unlikely to occur as a
    /// real SHA-1 digest, used the same way libgit2 uses it
    pub const UNKNOWN: Self = Self([0; HASH_SIZE]);

    #[inline]
    pub fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    #[inline]
    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }

    #[inline]
    pub fn is_known(self) -> bool {
        self != Self::UNKNOWN
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn short(&self) -> String {
        self.to_hex()[..7].to_owned()
    }

    /// hashes `"<kind> <size>\0<body>"`, the exact loose-object header
    /// preimage, used to verify an object's claimed id regardless of
    /// whether it was read from a loose file or expanded out of a pack
    pub fn hash_object(kind: &str, body: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(kind.as_bytes());
        hasher.update(b" ");
        hasher.update(body.len().to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(body);
        Self(hasher.finalize().into())
    }
}

impl From<[u8; HASH_SIZE]> for ObjectId {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
impl<'a> From<&'a str> for ObjectId {
    fn from(s: &'a str) -> Self {
        Self::from_str(s).unwrap()
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim_end();
        if s.len() != HASH_SIZE * 2 {
            return Err(Error::malformed_object(
                ObjectId::UNKNOWN,
                format!("`{s}` is not a 40 character hex string"),
            ));
        }
        let mut bytes = [0u8; HASH_SIZE];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::malformed_object(ObjectId::UNKNOWN, format!("invalid hex: {e}")))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        if f.alternate() { write!(f, "{}", &hex[..7]) } else { write!(f, "{hex}") }
    }
}

/// a hex prefix naming a set of possible full object ids, used for
/// short-hash lookups against a pack index's sorted oid table
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PartialObjectId {
    bytes: [u8; HASH_SIZE],
    nibbles: usize,
}

impl PartialObjectId {
    pub fn into_oid(self) -> ObjectId {
        ObjectId(self.bytes)
    }

    pub fn len(&self) -> usize {
        self.nibbles
    }

    /// whether `full` begins with this prefix's nibbles
    pub fn matches(&self, full: &ObjectId) -> bool {
        let whole_bytes = self.nibbles / 2;
        if self.bytes[..whole_bytes] != full.0[..whole_bytes] {
            return false;
        }
        if self.nibbles % 2 == 1 {
            return self.bytes[whole_bytes] & 0xf0 == full.0[whole_bytes] & 0xf0;
        }
        true
    }
}

impl FromStr for PartialObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.len() > HASH_SIZE * 2 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::malformed_object(
                ObjectId::UNKNOWN,
                format!("`{s}` is not a valid partial object id"),
            ));
        }
        let mut padded = s.to_owned();
        padded.push_str(&"0".repeat(HASH_SIZE * 2 - s.len()));
        let mut bytes = [0u8; HASH_SIZE];
        hex::decode_to_slice(&padded, &mut bytes)
            .map_err(|e| Error::malformed_object(ObjectId::UNKNOWN, format!("invalid hex: {e}")))?;
        Ok(Self { bytes, nibbles: s.len() })
    }
}

pub fn crc_of(bytes: impl AsRef<[u8]>) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(bytes.as_ref());
    crc.sum()
}

pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    ObjectId::new(hasher.finalize().into())
}

/// fast, non-cryptographic hash used for in-memory hashmap buckets
/// (pack object caches, odb lookup tables) - never for object identity
pub trait MakeHash {
    fn mk_fx_hash(&self) -> u64;
}

impl<H: std::hash::Hash + ?Sized> MakeHash for H {
    #[inline]
    fn mk_fx_hash(&self) -> u64 {
        let mut state = FxHasher::default();
        self.hash(&mut state);
        state.finish()
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for ObjectId {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Self((0..HASH_SIZE).map(|_| u8::arbitrary(g)).collect::<Vec<_>>().try_into().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_hex() {
        let s = "1205dc34ce48bda28fc543daaf9525a9bb6e6d10";
        // 41 chars - deliberately invalid, exercises the length check
        assert!(ObjectId::from_str(s).is_err());
        let s = "1205dc34ce48bda28fc543daaf9525a9bb6e6d1";
        let oid = ObjectId::from_str(s).unwrap();
        assert_eq!(oid.to_hex(), s);
    }

    #[test]
    fn hashes_object_header_correctly() {
        assert_eq!(ObjectId::hash_object("blob", b""), ObjectId::EMPTY_BLOB);
        assert_eq!(ObjectId::hash_object("tree", b""), ObjectId::EMPTY_TREE);
    }

    #[test]
    fn partial_id_matches_full_prefix() {
        let full = ObjectId::from_str("1205dc34ce48bda28fc543daaf9525a9bb6e6d10").unwrap();
        let partial: PartialObjectId = "1205dc".parse().unwrap();
        assert!(partial.matches(&full));
        let partial: PartialObjectId = "1205dd".parse().unwrap();
        assert!(!partial.matches(&full));
        // odd number of nibbles exercises the half-byte mask path
        let partial: PartialObjectId = "1205d".parse().unwrap();
        assert!(partial.matches(&full));
    }
}
