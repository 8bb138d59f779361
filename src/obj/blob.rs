use crate::error::{Error, Result};
use crate::io::ReadExt;
use crate::serialize::{DeserializeSized, Serialize};
use std::fmt::{self, Display, Formatter};
use std::io::prelude::*;

/// a blob's content. the object-store API also exposes blobs as a plain
/// byte stream without ever materializing one into a `Blob` (spec 4.3.4:
/// "blobs stream") - this type exists for callers who explicitly want the
/// whole thing in memory, e.g. to render it.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Blob {
    pub bytes: Vec<u8>,
}

impl Display for Blob {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.bytes) {
            Ok(utf8) => write!(f, "{utf8}"),
            Err(..) => write!(f, "<binary>"),
        }
    }
}

impl Blob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        Ok(Self::new(reader.read_to_vec().map_err(|e| Error::io("<blob>", e))?))
    }
}

impl Serialize for Blob {
    fn serialize(&self, writer: &mut dyn Write) -> Result<()> {
        writer.write_all(&self.bytes).map_err(|e| Error::io("<blob>", e))
    }
}

impl DeserializeSized for Blob {
    fn deserialize_sized(reader: &mut impl BufRead, size: u64) -> Result<Self> {
        let bytes = reader.take(size).read_to_vec().map_err(|e| Error::io("<blob>", e))?;
        Ok(Self::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_utf8_and_falls_back_for_binary() {
        assert_eq!(Blob::new(b"hello".to_vec()).to_string(), "hello");
        assert_eq!(Blob::new(vec![0xff, 0xfe]).to_string(), "<binary>");
    }
}
