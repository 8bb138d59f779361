use crate::error::Result;
use std::io::{prelude::*, BufReader};

/// reconstructs an object's exact canonical byte body from its parsed
/// fields. this crate never persists an object through this trait - the
/// only call site is [`crate::obj::Object::verify`], which recomputes
/// `sha1("<kind> <size>\0<body>")` from a parsed record to check it
/// against the id it was looked up by (spec section 8's hashing
/// invariant). kept in-memory only; there is no `write_to_disk` path.
pub trait Serialize {
    fn serialize(&self, writer: &mut dyn Write) -> Result<()>;
}

/// parses `Self` out of a reader whose length is implied by the format
/// itself (a NUL terminator, a fixed-width record, EOF). the write-side
/// counterpart the teacher kept alongside this (`Serialize`) has no
/// counterpart here: this crate never writes objects back out.
pub trait Deserialize {
    fn deserialize(reader: &mut impl BufRead) -> Result<Self>
    where
        Self: Sized;

    fn deserialize_unbuffered(reader: impl Read) -> Result<Self>
    where
        Self: Sized,
    {
        Self::deserialize(&mut BufReader::new(reader))
    }
}

/// deserialize trait for formats where the caller already knows how many
/// bytes the record occupies (a pack entry's declared uncompressed size, a
/// loose object's header size) - the size is not always the literal byte
/// count consumed (e.g. [`crate::obj::RefDelta`]'s size excludes the
/// leading base oid), so this cannot be unified with [`Deserialize`].
pub trait DeserializeSized {
    fn deserialize_sized(reader: &mut impl BufRead, size: u64) -> Result<Self>
    where
        Self: Sized;

    fn deserialize_from_slice(slice: &[u8]) -> Result<Self>
    where
        Self: Sized,
    {
        Self::deserialize_sized_unbuffered(slice, slice.len() as u64)
    }

    fn deserialize_sized_unbuffered(reader: impl Read, size: u64) -> Result<Self>
    where
        Self: Sized,
    {
        Self::deserialize_sized(&mut BufReader::new(reader), size)
    }
}

impl<D: Deserialize> DeserializeSized for D {
    fn deserialize_sized(reader: &mut impl BufRead, _size: u64) -> Result<Self>
    where
        Self: Sized,
    {
        Self::deserialize(reader)
    }
}
