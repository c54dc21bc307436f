//! Header-stripping byte source.
//!
//! Documents in the wide encodings (UTF-16, UCS-4) interleave the ASCII
//! bytes of the XML declaration with zero bytes. [`HdrSource`] wraps a
//! byte source and collapses those zeros so the first line can be scanned
//! as if it were plain ASCII: up to three leading NULs are swallowed, the
//! symmetric trailing count is remembered, and NULs inside the line are
//! skipped. [`complete`](HdrSource::complete) consumes the trailing
//! padding once the declaration has been parsed and reports a non-NUL
//! byte in it as [`ScanError::IllegalCharacterAtEndOfHeader`].

use super::source::{ByteSource, EndOfChunk};
use crate::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HdrState {
    /// Counting NULs before the first non-zero byte.
    Left0,
    /// First byte seen; counting NULs after it to learn the padding width.
    Right0,
    /// Inside the header line, skipping interior NULs.
    Src,
    /// Line terminator seen; trailing padding still to consume.
    Rest,
    /// Header done, the wrapper yields end of text.
    End,
}

/// Byte-source wrapper that makes a wide-encoded XML declaration readable
/// as ASCII.
#[derive(Debug, Clone)]
pub struct HdrSource<S> {
    inner: S,
    state: HdrState,
    /// Current run of zero bytes.
    cnt0: usize,
    /// Zero bytes expected after the line terminator.
    restc: usize,
    /// Byte already produced for the current position; `cur` stays stable
    /// until `advance`.
    pending: Option<u8>,
    /// Whether `pending` came from the inner source (vs. a virtual zero).
    pending_real: bool,
    error: Option<ScanError>,
}

impl<S: ByteSource> HdrSource<S> {
    pub fn new(inner: S) -> Self {
        HdrSource {
            inner,
            state: HdrState::Left0,
            cnt0: 0,
            restc: 0,
            pending: None,
            pending_real: false,
            error: None,
        }
    }

    /// Padding error observed so far.
    pub fn error(&self) -> Option<ScanError> {
        self.error
    }

    /// Consume the trailing zero padding and finish the header.
    ///
    /// Called by the parser once the declaration's `?>` has been scanned;
    /// also runs implicitly when the line terminator is reached. A
    /// non-NUL byte inside the padding is recorded, not fatal.
    pub fn complete(&mut self) -> Result<(), EndOfChunk> {
        while self.restc > 0 {
            let ch = self.inner.cur()?;
            if ch != 0 {
                self.error = Some(ScanError::IllegalCharacterAtEndOfHeader);
            }
            self.inner.advance();
            self.restc -= 1;
        }
        self.state = HdrState::End;
        Ok(())
    }

    /// Unwrap the inner source, positioned after the header padding.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn produce(&mut self) -> Result<(u8, bool), EndOfChunk> {
        loop {
            match self.state {
                HdrState::End => return Ok((0, false)),
                HdrState::Rest => {
                    self.complete()?;
                    return Ok((0, false));
                }
                _ => {}
            }
            let ch = self.inner.cur()?;
            match self.state {
                HdrState::Left0 => {
                    if ch != 0 {
                        self.state = if self.cnt0 > 0 {
                            // NULs precede each character; no trailing
                            // padding to expect.
                            HdrState::Src
                        } else {
                            HdrState::Right0
                        };
                        self.cnt0 = 0;
                        return Ok((ch, true));
                    }
                    self.cnt0 += 1;
                    if self.cnt0 >= 4 {
                        self.state = HdrState::End;
                        return Ok((0, false));
                    }
                    self.inner.advance();
                }
                HdrState::Right0 => {
                    if ch != 0 {
                        self.restc = self.cnt0;
                        self.cnt0 = 0;
                        self.state = HdrState::Src;
                        return Ok((ch, true));
                    }
                    self.cnt0 += 1;
                    if self.cnt0 >= 4 {
                        self.state = HdrState::End;
                        return Ok((0, false));
                    }
                    self.inner.advance();
                }
                HdrState::Src => {
                    if ch != 0 {
                        return Ok((ch, true));
                    }
                    self.inner.advance();
                }
                HdrState::Rest | HdrState::End => {}
            }
        }
    }
}

impl<S: ByteSource> ByteSource for HdrSource<S> {
    fn cur(&mut self) -> Result<u8, EndOfChunk> {
        if let Some(b) = self.pending {
            return Ok(b);
        }
        let (b, real) = self.produce()?;
        self.pending = Some(b);
        self.pending_real = real;
        Ok(b)
    }

    fn advance(&mut self) {
        if let Some(b) = self.pending.take() {
            if self.pending_real {
                if self.state == HdrState::Src && b == b'\n' {
                    self.state = HdrState::Rest;
                }
                self.inner.advance();
            }
        } else {
            self.inner.advance();
        }
    }
}
