use crate::types::Error;
use crate::types::Result;

/// A read-cursor snapshot that can be used to seek back.
///
/// A plain saved offset plus a restore operation; the building block for
/// peek-and-replay reads. Holding a `Mark` across writes is fine; writes
/// only ever append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mark {
    pos: usize,
}

/// A growable byte container with sequential cursor-based reads and writes.
///
/// Writes append at the end; reads advance an independent cursor from the
/// front. Every `read_*` consumes exactly the bytes its `write_*` counterpart
/// produced: fixed-width big-endian for numerics, u32 length prefix plus
/// UTF-8 payload for strings. Reading past the written length is a fatal
/// decode error (`Error::CorruptBuffer`), never a silent truncation.
#[derive(Debug, Clone, Default)]
pub struct Buf {
    data: Vec<u8>,
    read: usize,
}

impl Buf {
    pub fn new() -> Self {
        Self { data: Vec::new(), read: 0 }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self { data: Vec::with_capacity(cap), read: 0 }
    }

    /// Wraps received bytes for reading.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, read: 0 }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left to read before the cursor hits the written length.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.read)
    }

    /// Snapshot the read cursor.
    pub fn mark(&self) -> Mark {
        Mark { pos: self.read }
    }

    /// Restore the read cursor to a previous snapshot and continue reading
    /// from there. Used to peek a value (e.g. a presence flag) and then
    /// replay the full span.
    pub fn rewind(&mut self, mark: Mark) {
        debug_assert!(mark.pos <= self.data.len());
        self.read = mark.pos;
    }

    #[inline]
    fn need(&self, n: usize) -> Result<()> {
        if self.read + n > self.data.len() {
            return Err(Error::CorruptBuffer {
                wanted: n,
                available: self.data.len() - self.read,
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        self.need(n)?;
        let slice = &self.data[self.read..self.read + n];
        self.read += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn write_bool(&mut self, v: bool) {
        self.data.push(v as u8);
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.take(1)?[0] != 0)
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn write_i32(&mut self, v: i32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn write_i64(&mut self, v: i64) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn write_u64(&mut self, v: u64) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn write_f32(&mut self, v: f32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.take_array()?))
    }

    pub fn write_f64(&mut self, v: f64) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    /// Writes a 128-bit unique id as two big-endian u64 halves.
    pub fn write_unique_id(&mut self, v: u128) {
        self.write_u64((v >> 64) as u64);
        self.write_u64(v as u64);
    }

    pub fn read_unique_id(&mut self) -> Result<u128> {
        let hi = self.read_u64()?;
        let lo = self.read_u64()?;
        Ok(((hi as u128) << 64) | lo as u128)
    }

    pub fn write_str(&mut self, v: &str) {
        self.write_i32(v.len() as i32);
        self.data.extend_from_slice(v.as_bytes());
    }

    pub fn read_str(&mut self) -> Result<String> {
        let len = self.read_len()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8)
    }

    pub fn write_blob(&mut self, v: &[u8]) {
        self.write_i32(v.len() as i32);
        self.data.extend_from_slice(v);
    }

    pub fn read_blob(&mut self) -> Result<Vec<u8>> {
        let len = self.read_len()?;
        Ok(self.take(len)?.to_vec())
    }

    /// Consumes and returns everything left between the cursor and the
    /// written length. For payloads that run to the end of the frame.
    pub fn read_remaining(&mut self) -> Vec<u8> {
        let rest = self.data[self.read..].to_vec();
        self.read = self.data.len();
        rest
    }

    fn read_len(&mut self) -> Result<usize> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(Error::NegativeLength(len));
        }
        Ok(len as usize)
    }

    /// Writes a presence boolean followed by the payload if present.
    ///
    /// Contract: every nullable write begins with exactly one presence
    /// boolean. Higher-level nullable constructs (optionals, nullable
    /// fields) all reuse this single flag.
    pub fn write_nullable<T>(
        &mut self,
        value: Option<&T>,
        write: impl FnOnce(&mut Self, &T) -> Result<()>,
    ) -> Result<()> {
        match value {
            Some(v) => {
                self.write_bool(true);
                write(self, v)
            }
            None => {
                self.write_bool(false);
                Ok(())
            }
        }
    }

    /// Consumes a presence boolean; reads the payload only if present.
    pub fn read_nullable<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<Option<T>> {
        if self.read_bool()? {
            read(self).map(Some)
        } else {
            Ok(None)
        }
    }
}
