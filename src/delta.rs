use crate::error::{Error, Result};
use crate::io::{BufReadExt, BufReadExtSized, ReadExt};
use crate::serialize::{Deserialize, DeserializeSized};
use std::io::BufRead;

/// a parsed delta script (spec section 4.3.3 / GLOSSARY): `expand` applies
/// it against a fully-materialized base to produce the target bytes. the
/// teacher additionally carried a `DeltaIndexCompressor` that *produces* a
/// delta script from two byte slices for pack writing - dropped here, this
/// crate never generates deltas (non-goal: no pack generation).
#[derive(PartialEq, Clone, Debug)]
pub struct Delta {
    pub source_size: u64,
    pub target_size: u64,
    ops: Vec<DeltaOp>,
}

impl Delta {
    pub fn expand(&self, base: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let base = base.as_ref();
        if base.len() as u64 != self.source_size {
            return Err(Error::corrupt_pack(
                "<delta>",
                0,
                format!("delta source size {} does not match base length {}", self.source_size, base.len()),
            ));
        }

        let mut expanded = Vec::with_capacity(self.target_size as usize);
        for op in &self.ops {
            match op {
                &DeltaOp::Copy(offset, size) => {
                    let (offset, size) = (offset as usize, size as usize);
                    let end = offset.checked_add(size).ok_or_else(|| {
                        Error::corrupt_pack("<delta>", 0, "copy instruction overflows base length")
                    })?;
                    if end > base.len() {
                        return Err(Error::corrupt_pack(
                            "<delta>",
                            0,
                            format!(
                                "copy instruction reads past base (offset {offset}, size {size}, base len {})",
                                base.len()
                            ),
                        ));
                    }
                    expanded.extend_from_slice(&base[offset..end]);
                }
                DeltaOp::Insert(slice) => expanded.extend_from_slice(slice),
            }
        }

        if expanded.len() as u64 != self.target_size {
            return Err(Error::corrupt_pack(
                "<delta>",
                0,
                format!("expanded delta target has length {} but script declared {}", expanded.len(), self.target_size),
            ));
        }

        Ok(expanded)
    }
}

#[derive(Clone, Debug, PartialEq)]
enum DeltaOp {
    /// copy (offset, size) from the base
    Copy(u64, u64),
    Insert(Vec<u8>),
}

impl Deserialize for DeltaOp {
    fn deserialize(reader: &mut impl BufRead) -> Result<Self> {
        let byte = reader.read_u8().map_err(|e| Error::io("<delta>", e))?;
        if byte & 0x80 != 0 {
            // copy instruction: low 7 bits select which of 4 offset bytes
            // and 3 size bytes follow, little-endian
            let n = reader.read_le_packed(byte).map_err(|e| Error::io("<delta>", e))?;
            let (offset, mut size) = (n & 0xFFFF_FFFF, n >> 32);
            if size == 0 {
                // a zero-length copy in the script means the default 0x10000
                size = 0x10000;
            }
            Ok(Self::Copy(offset, size))
        } else if byte != 0 {
            // insert instruction: low 7 bits are the literal byte count
            reader.read_vec::<u8>(byte as usize & 0x7f).map(Self::Insert).map_err(|e| Error::io("<delta>", e))
        } else {
            Err(Error::corrupt_pack("<delta>", 0, "delta instruction byte 0x00 is reserved/invalid"))
        }
    }
}

impl DeserializeSized for Delta {
    fn deserialize_sized(r: &mut impl BufRead, size: u64) -> Result<Self> {
        let source_size = r.read_size().map_err(|e| Error::io("<delta>", e))?;
        let target_size = r.read_size().map_err(|e| Error::io("<delta>", e))?;
        let r = &mut r.take(size);
        let mut ops = Vec::new();
        while !r.is_at_eof().map_err(|e| Error::io("<delta>", e))? {
            ops.push(DeltaOp::deserialize(r)?);
        }
        Ok(Self { source_size, target_size, ops })
    }
}

#[cfg(test)]
mod tests;
