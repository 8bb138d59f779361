use crate::hash::ObjectId;
use crate::serialize::Deserialize;
use sha1::Digest;
use std::io::{self, prelude::*, BufReader};

pub type BufferedFileStream = std::io::BufReader<std::fs::File>;

/// all multi-byte fixed-width reads are big-endian, matching the on-disk
/// index/tree/commit formats
pub trait ReadExt: Read {
    #[inline]
    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// the offset encoding used by `OFS_DELTA` pack entries: base offset is
    /// `entry_offset - read_offset()`. see
    /// https://github.com/git/git/blob/master/builtin/pack-objects.c (encodeVarint)
    fn read_offset(&mut self) -> io::Result<u64> {
        let mut byte = self.read_u8()? as u64;
        let mut offset = byte & 0x7f;
        while byte & 0x80 != 0 {
            offset += 1;
            byte = self.read_u8()? as u64;
            offset = (offset << 7) | (byte & 0x7f);
        }
        Ok(offset)
    }

    #[inline]
    /// alias for `read_le_varint` with a more intuitive name at call sites
    /// that are reading an object's inflated size rather than an offset
    fn read_size(&mut self) -> io::Result<u64> {
        self.read_le_varint()
    }

    #[inline]
    // variable-length little-endian integer ("size encoding" in git's docs):
    // continuation bit (MSB) set means another byte follows
    fn read_le_varint(&mut self) -> io::Result<u64> {
        self.read_le_varint_with_shift(0).map(|(_, n)| n)
    }

    /// like `read_le_varint` but the first byte's low `init_shift` bits (after
    /// the continuation bit) are carved off and returned separately - used to
    /// pack a pack entry's object type into the same byte as the low bits of
    /// its size.
    fn read_le_varint_with_shift(&mut self, init_shift: u64) -> io::Result<(u8, u64)> {
        assert!(init_shift < 8);
        let byte = self.read_u8()?;
        let anti_shift = 7 - init_shift;
        let k_mask = ((1u16 << init_shift) - 1) << anti_shift;
        let k = (byte & k_mask as u8) >> anti_shift;

        let mask = (1u8 << anti_shift).wrapping_sub(1);
        let mut n = (byte & mask) as u64;

        if byte & 0x80 != 0 {
            let mut shift = anti_shift;
            loop {
                let byte = self.read_u8()? as u64;
                n |= (byte & 0x7f) << shift;
                shift += 7;
                if byte & 0x80 == 0 {
                    break;
                }
            }
        }

        Ok((k, n))
    }

    /// the delta copy-instruction's packed offset/size encoding:
    /// `1xxxxxxx` header byte, bit `i` present means byte `i` of the
    /// little-endian 7-byte value (4 bytes offset, 3 bytes size) follows.
    fn read_le_packed(&mut self, header: u8) -> io::Result<u64> {
        debug_assert!(header & 0x80 != 0);
        let mut value = 0u64;
        for i in 0..7 {
            if header & (1 << i) == 0 {
                continue;
            }
            let byte = self.read_u8()? as u64;
            value |= byte << (i * 8);
        }
        Ok(value)
    }

    #[inline]
    fn read_u16(&mut self) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    #[inline]
    fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    #[inline]
    fn read_u64(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    #[inline]
    fn read_oid(&mut self) -> io::Result<ObjectId> {
        let mut buf = [0u8; crate::hash::HASH_SIZE];
        self.read_exact(&mut buf)?;
        Ok(ObjectId::new(buf))
    }

    #[inline]
    fn read_to_str(&mut self) -> io::Result<String> {
        let mut buf = String::new();
        self.read_to_string(&mut buf)?;
        Ok(buf)
    }

    #[inline]
    fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![];
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl<R: Read + ?Sized> ReadExt for R {}

impl Deserialize for u64 {
    fn deserialize(reader: &mut impl BufRead) -> crate::error::Result<Self> {
        reader.read_u64().map_err(|e| crate::error::Error::io("<stream>", e))
    }
}

impl Deserialize for u8 {
    fn deserialize(reader: &mut impl BufRead) -> crate::error::Result<Self> {
        reader.read_u8().map_err(|e| crate::error::Error::io("<stream>", e))
    }
}

impl Deserialize for u32 {
    fn deserialize(reader: &mut impl BufRead) -> crate::error::Result<Self> {
        reader.read_u32().map_err(|e| crate::error::Error::io("<stream>", e))
    }
}

impl Deserialize for ObjectId {
    fn deserialize(reader: &mut impl BufRead) -> crate::error::Result<Self> {
        reader.read_oid().map_err(|e| crate::error::Error::io("<stream>", e))
    }
}

/// sized-read helpers built without any nightly features: fixed-size
/// arrays go through a `Vec` then `try_into`, which is stable for all `N`,
/// rather than the `MaybeUninit` + `transmute_copy` dance.
pub trait BufReadExtSized: BufRead + Sized {
    fn read_array<T: Deserialize + std::fmt::Debug, const N: usize>(&mut self) -> crate::error::Result<[T; N]> {
        let mut v = Vec::with_capacity(N);
        for _ in 0..N {
            v.push(T::deserialize(&mut *self)?);
        }
        match v.try_into() {
            Ok(arr) => Ok(arr),
            Err(_) => unreachable!("pushed exactly N elements"),
        }
    }

    fn read_type<T: Deserialize>(&mut self) -> crate::error::Result<T> {
        T::deserialize(self)
    }

    fn read_vec<T: Deserialize>(&mut self, n: usize) -> crate::error::Result<Vec<T>> {
        let mut vec = Vec::with_capacity(n);
        for _ in 0..n {
            vec.push(T::deserialize(&mut *self)?);
        }
        Ok(vec)
    }
}

impl<R: BufRead> BufReadExtSized for R {}

pub trait BufReadExt: BufRead {
    fn as_zlib_decode_stream(&mut self) -> BufReader<flate2::bufread::ZlibDecoder<&mut Self>> {
        BufReader::new(flate2::bufread::ZlibDecoder::new(self))
    }

    /// read bytes up to `sep`, parsing as a base-10 ascii number
    fn read_ascii_num(&mut self, sep: u8) -> crate::error::Result<i64> {
        let mut buf = vec![];
        let i = self.read_until(sep, &mut buf).map_err(|e| crate::error::Error::io("<stream>", e))?;
        std::str::from_utf8(&buf[..i.saturating_sub(1)])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| crate::error::Error::malformed_object(ObjectId::UNKNOWN, "invalid ascii number"))
    }

    /// read bytes up to `sep`, parsing as an ascii string header field
    fn read_ascii_str(&mut self, sep: u8) -> crate::error::Result<String> {
        let mut buf = vec![];
        let i = self.read_until(sep, &mut buf).map_err(|e| crate::error::Error::io("<stream>", e))?;
        std::str::from_utf8(&buf[..i.saturating_sub(1)])
            .map(|s| s.to_owned())
            .map_err(|_| crate::error::Error::malformed_object(ObjectId::UNKNOWN, "invalid utf8 header field"))
    }

    fn read_null_terminated_string(&mut self) -> crate::error::Result<String> {
        let mut buf = vec![];
        self.read_until(0, &mut buf).map_err(|e| crate::error::Error::io("<stream>", e))?;
        buf.pop();
        String::from_utf8(buf)
            .map_err(|_| crate::error::Error::malformed_object(ObjectId::UNKNOWN, "invalid utf8 path"))
    }

    fn is_at_eof(&mut self) -> io::Result<bool> {
        Ok(self.fill_buf()?.is_empty())
    }
}

impl<R: BufRead + ?Sized> BufReadExt for R {}

/// hashes every byte read through it - used to verify an index file's
/// trailing SHA1 matches its contents without a second pass over the file
pub struct HashReader<'a, D> {
    reader: &'a mut dyn BufRead,
    hasher: D,
}

impl<'a, D: Digest> BufRead for HashReader<'a, D> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

impl<'a, D: Digest> Read for HashReader<'a, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

impl<'a, D: Digest> HashReader<'a, D> {
    pub fn new(reader: &'a mut dyn BufRead) -> Self {
        Self { reader, hasher: D::new() }
    }
}

impl<'a> HashReader<'a, sha1::Sha1> {
    pub fn new_sha1(reader: &'a mut dyn BufRead) -> Self {
        Self::new(reader)
    }

    pub fn finalize_sha1_hash(&mut self) -> ObjectId {
        ObjectId::new(self.hasher.finalize_reset().into())
    }
}
