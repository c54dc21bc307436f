//! Byte sources feeding the scanner.
//!
//! A source hands out one byte at a time and signals exhaustion in one of
//! two ways. In complete-input mode the source yields `0` forever once the
//! data ends and the scanner treats that as end of text. In chunked mode
//! the source returns [`EndOfChunk`] instead; the scanner suspends with all
//! of its state intact and the caller resumes it by feeding the next chunk.

/// Signal that the current chunk is exhausted but the document is not.
///
/// Carried as a typed result through the whole scanner call stack; never a
/// panic or unwinding mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfChunk;

/// One-byte-at-a-time input, the scanner's only view of the document.
pub trait ByteSource {
    /// The byte at the current position.
    ///
    /// Complete-input mode returns `0` once exhausted; chunked mode returns
    /// `Err(EndOfChunk)`. Calling `cur` repeatedly without `advance` must
    /// keep returning the same byte.
    fn cur(&mut self) -> Result<u8, EndOfChunk>;

    /// Step to the next byte. Advancing past the end of a chunk is allowed;
    /// the exhaustion is reported by the next `cur`.
    fn advance(&mut self);
}

/// Source over a borrowed byte slice, usable in both input modes.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
    eof: bool,
}

impl<'a> SliceSource<'a> {
    /// Source over the complete document: yields `0` after the last byte.
    pub fn complete(data: &'a [u8]) -> Self {
        SliceSource {
            data,
            pos: 0,
            eof: true,
        }
    }

    /// Source over one chunk of a larger document: signals [`EndOfChunk`]
    /// after the last byte.
    pub fn chunk(data: &'a [u8]) -> Self {
        SliceSource {
            data,
            pos: 0,
            eof: false,
        }
    }

    /// Replace the exhausted chunk with the next one.
    ///
    /// `eof` marks the final chunk; after it the source switches to
    /// complete-input behavior.
    pub fn put_chunk(&mut self, data: &'a [u8], eof: bool) {
        self.data = data;
        self.pos = 0;
        self.eof = eof;
    }

    /// Bytes consumed from the current chunk.
    pub fn position(&self) -> usize {
        self.pos.min(self.data.len())
    }
}

impl ByteSource for SliceSource<'_> {
    #[inline]
    fn cur(&mut self) -> Result<u8, EndOfChunk> {
        match self.data.get(self.pos) {
            Some(&b) => Ok(b),
            None if self.eof => Ok(0),
            None => Err(EndOfChunk),
        }
    }

    #[inline]
    fn advance(&mut self) {
        // Saturate at the end: in complete mode the virtual trailing
        // zeros are infinite, in chunked mode put_chunk rebases.
        if self.pos < self.data.len() {
            self.pos += 1;
        }
    }
}

impl ByteSource for &mut SliceSource<'_> {
    #[inline]
    fn cur(&mut self) -> Result<u8, EndOfChunk> {
        (**self).cur()
    }

    #[inline]
    fn advance(&mut self) {
        (**self).advance()
    }
}
