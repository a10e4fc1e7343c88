//! Bounds-checked little-endian reader shared by the block and link codecs.

use cairn_core::{CairnError, Result};

/// Cursor over a borrowed frame. Every read either succeeds completely or
/// fails with [`CairnError::Format`]; the cursor never advances past the
/// end of the buffer.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub(crate) fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(CairnError::Format(format!(
                "buffer underflow reading {what}: need {n} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub(crate) fn expect_magic(&mut self, magic: &[u8], what: &str) -> Result<()> {
        let found = self.take(magic.len(), what)?;
        if found != magic {
            return Err(CairnError::Format(format!("bad {what} magic: {found:02x?}")));
        }
        Ok(())
    }

    pub(crate) fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub(crate) fn u16_le(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32_le(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read `n` bytes that must be printable ASCII.
    pub(crate) fn ascii(&mut self, n: usize, what: &str) -> Result<&'a str> {
        let bytes = self.take(n, what)?;
        if !bytes.iter().all(|b| b.is_ascii() && !b.is_ascii_control()) {
            return Err(CairnError::Format(format!("{what} is not printable ASCII")));
        }
        std::str::from_utf8(bytes).map_err(|e| CairnError::Format(format!("{what}: {e}")))
    }
}
