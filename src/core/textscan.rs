//! Character-by-character reader over a byte source.
//!
//! [`TextScanner`] unifies the pluggable character set behind three views
//! of the current character: its ASCII projection, its Unicode scalar, and
//! its coarse [`ControlClass`]. The scratch buffer and fill counter survive
//! an end-of-chunk suspension at any byte, so re-invoking the interrupted
//! operation after feeding more input resumes the decode mid-character.

use super::charset::CharsetCodec;
use super::source::{ByteSource, EndOfChunk};

/// Coarse classification of a source byte, the index into the scanner
/// state machine's transition tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlClass {
    /// Non-ASCII byte; may still be part of a multi-byte sequence.
    Undef = 0,
    EndOfText,
    EndOfLine,
    Cntrl,
    Space,
    Amp,
    Lt,
    Equal,
    Gt,
    Slash,
    Exclam,
    Questm,
    Sq,
    Dq,
    Osb,
    Csb,
    /// Any printable character without a dedicated class.
    Any,
}

/// Number of control classes.
pub const CONTROL_CLASS_COUNT: usize = 17;

/// Byte-to-class map over the ASCII projection (-1 projects to 255).
pub static CONTROL_CLASS: [ControlClass; 256] = build_control_class();

const fn build_control_class() -> [ControlClass; 256] {
    let mut map = [ControlClass::Undef; 256];
    map[0] = ControlClass::EndOfText;
    let mut b = 1;
    while b <= 31 {
        map[b] = ControlClass::Cntrl;
        b += 1;
    }
    map[5] = ControlClass::Undef;
    let mut b = 33;
    while b <= 127 {
        map[b] = ControlClass::Any;
        b += 1;
    }
    map[b'\t' as usize] = ControlClass::Space;
    map[b'\r' as usize] = ControlClass::Space;
    map[b'\n' as usize] = ControlClass::EndOfLine;
    map[b' ' as usize] = ControlClass::Space;
    map[b'&' as usize] = ControlClass::Amp;
    map[b'<' as usize] = ControlClass::Lt;
    map[b'=' as usize] = ControlClass::Equal;
    map[b'>' as usize] = ControlClass::Gt;
    map[b'/' as usize] = ControlClass::Slash;
    map[b'!' as usize] = ControlClass::Exclam;
    map[b'?' as usize] = ControlClass::Questm;
    map[b'\'' as usize] = ControlClass::Sq;
    map[b'"' as usize] = ControlClass::Dq;
    map[b'[' as usize] = ControlClass::Osb;
    map[b']' as usize] = ControlClass::Csb;
    map
}

/// Reader presenting the source one decoded character at a time.
#[derive(Debug, Clone)]
pub struct TextScanner<S, C> {
    src: S,
    codec: C,
    /// Bytes of the character under inspection, already taken from `src`.
    scratch: [u8; 8],
    fill: usize,
    /// Cached scalar of the current character; 0 = not decoded yet.
    val: u32,
}

impl<S: ByteSource, C: CharsetCodec> TextScanner<S, C> {
    pub fn new(src: S, codec: C) -> Self {
        TextScanner {
            src,
            codec,
            scratch: [0; 8],
            fill: 0,
            val: 0,
        }
    }

    /// Replace the underlying source, keeping scratch and fill intact.
    /// This is the resume path after an end-of-chunk suspension.
    pub fn set_source(&mut self, src: S) {
        self.src = src;
    }

    /// Mutable access to the source, for in-place chunk replacement.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.src
    }

    /// Unwrap the source. Only meaningful between characters (nothing in
    /// the scratch), as partially decoded bytes stay behind.
    pub fn into_source(self) -> S {
        self.src
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Pull bytes from the source until `n` are buffered. Leaves the fill
    /// count unchanged when the source suspends.
    #[inline]
    fn fill_to(&mut self, n: usize) -> Result<(), EndOfChunk> {
        while self.fill < n {
            let b = self.src.cur()?;
            self.scratch[self.fill] = b;
            self.fill += 1;
            self.src.advance();
        }
        Ok(())
    }

    /// ASCII projection of the current character (0..=127, or -1).
    #[inline]
    pub fn ascii(&mut self) -> Result<i8, EndOfChunk> {
        self.fill_to(self.codec.header_size())?;
        Ok(self.codec.ascii_char(&self.scratch))
    }

    /// Unicode scalar of the current character.
    #[inline]
    pub fn unicode(&mut self) -> Result<u32, EndOfChunk> {
        if self.val == 0 {
            self.fill_to(self.codec.header_size())?;
            let total = self.codec.total_size(&self.scratch);
            self.fill_to(total)?;
            self.val = self.codec.unicode_value(&self.scratch[..total]);
        }
        Ok(self.val)
    }

    /// Control class of the current character.
    #[inline]
    pub fn control(&mut self) -> Result<ControlClass, EndOfChunk> {
        let ascii = self.ascii()?;
        Ok(CONTROL_CLASS[(ascii as u8) as usize])
    }

    /// Drain the remainder of the current character and reset the caches;
    /// the next access decodes a fresh character.
    #[inline]
    pub fn skip(&mut self) -> Result<(), EndOfChunk> {
        self.fill_to(self.codec.header_size())?;
        let total = self.codec.total_size(&self.scratch);
        while self.fill < total {
            self.src.cur()?;
            self.fill += 1;
            self.src.advance();
        }
        self.fill = 0;
        self.val = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::charset::{Utf16Le, Utf8, ERROR_CHAR};
    use crate::core::source::SliceSource;

    #[test]
    fn test_control_table_entries() {
        assert_eq!(CONTROL_CLASS[0], ControlClass::EndOfText);
        assert_eq!(CONTROL_CLASS[5], ControlClass::Undef);
        assert_eq!(CONTROL_CLASS[b'\t' as usize], ControlClass::Space);
        assert_eq!(CONTROL_CLASS[b'\n' as usize], ControlClass::EndOfLine);
        assert_eq!(CONTROL_CLASS[b'\r' as usize], ControlClass::Space);
        assert_eq!(CONTROL_CLASS[1], ControlClass::Cntrl);
        assert_eq!(CONTROL_CLASS[b'<' as usize], ControlClass::Lt);
        assert_eq!(CONTROL_CLASS[b']' as usize], ControlClass::Csb);
        assert_eq!(CONTROL_CLASS[b'a' as usize], ControlClass::Any);
        assert_eq!(CONTROL_CLASS[200], ControlClass::Undef);
    }

    #[test]
    fn test_ascii_then_skip() {
        let mut ts = TextScanner::new(SliceSource::complete(b"ab"), Utf8);
        assert_eq!(ts.ascii(), Ok(b'a' as i8));
        assert_eq!(ts.control(), Ok(ControlClass::Any));
        ts.skip().unwrap();
        assert_eq!(ts.ascii(), Ok(b'b' as i8));
        ts.skip().unwrap();
        assert_eq!(ts.control(), Ok(ControlClass::EndOfText));
    }

    #[test]
    fn test_multibyte_unicode() {
        // U+20AC euro sign in UTF-8.
        let mut ts = TextScanner::new(SliceSource::complete("€x".as_bytes()), Utf8);
        assert_eq!(ts.ascii(), Ok(-1));
        assert_eq!(ts.unicode(), Ok(0x20AC));
        ts.skip().unwrap();
        assert_eq!(ts.ascii(), Ok(b'x' as i8));
    }

    #[test]
    fn test_suspend_mid_character() {
        // Split the euro sign across two chunks.
        let bytes = "€".as_bytes();
        let mut ts = TextScanner::new(SliceSource::chunk(&bytes[..1]), Utf8);
        assert_eq!(ts.ascii(), Ok(-1));
        assert_eq!(ts.unicode(), Err(EndOfChunk));
        ts.source_mut().put_chunk(&bytes[1..], true);
        assert_eq!(ts.unicode(), Ok(0x20AC));
    }

    #[test]
    fn test_utf16le_stream() {
        let bytes = [b'<', 0x00, b'a', 0x00];
        let mut ts = TextScanner::new(SliceSource::complete(&bytes), Utf16Le);
        assert_eq!(ts.control(), Ok(ControlClass::Lt));
        ts.skip().unwrap();
        assert_eq!(ts.ascii(), Ok(b'a' as i8));
        ts.skip().unwrap();
        assert_eq!(ts.control(), Ok(ControlClass::EndOfText));
    }

    #[test]
    fn test_decode_error_sentinel() {
        let mut ts = TextScanner::new(SliceSource::complete(&[0xC3, 0x28]), Utf8);
        assert_eq!(ts.unicode(), Ok(ERROR_CHAR));
    }
}
