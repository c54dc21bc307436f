//! The XML event scanner.
//!
//! [`XmlScanner`] drives the static state table over a [`TextScanner`],
//! assembling identifiers, content runs and quoted strings into its output
//! buffer, resolving character and named entities on the way, and yielding
//! one typed [`Event`] per call.
//!
//! Every operation is resumable: when the byte source reports an
//! end-of-chunk, the call returns [`EndOfChunk`] with the machine state,
//! token sub-state, entity scratch and output buffer untouched, and the
//! next `next_event` call continues exactly where the previous one left
//! off. No token prefix is ever lost.

use std::collections::HashMap;

use super::charset::{CharsetCodec, Utf8};
use super::event::{Event, EventKind, EventMask};
use super::machine::{Op, State, STATEMACHINE};
use super::source::{ByteSource, EndOfChunk};
use super::textscan::{ControlClass, TextScanner};
use crate::error::ScanError;

/// Read-only map from entity name to Unicode scalar, consulted after the
/// built-in table (`quot amp apos lt gt nbsp`).
#[derive(Debug, Clone, Default)]
pub struct EntityMap {
    map: HashMap<Vec<u8>, u32>,
}

impl EntityMap {
    pub fn new() -> Self {
        EntityMap::default()
    }

    /// Map `name` (without `&` and `;`) to the scalar `ch`.
    pub fn define(&mut self, name: &[u8], ch: u32) {
        self.map.insert(name.to_vec(), ch);
    }

    pub fn get(&self, name: &[u8]) -> Option<u32> {
        self.map.get(name).copied()
    }
}

fn builtin_entity(name: &[u8]) -> Option<u32> {
    match name {
        b"quot" => Some(b'"' as u32),
        b"amp" => Some(b'&' as u32),
        b"apos" => Some(b'\'' as u32),
        b"lt" => Some(b'<' as u32),
        b"gt" => Some(b'>' as u32),
        b"nbsp" => Some(b' ' as u32),
        _ => None,
    }
}

/// Capacity-bounded output buffer.
///
/// Appends are atomic per character: an encoding that does not fit leaves
/// the buffer unchanged so the caller can grow it and resume.
#[derive(Debug)]
struct TokenBuffer {
    bytes: Vec<u8>,
    cap: usize,
}

impl TokenBuffer {
    fn new(cap: usize) -> Self {
        TokenBuffer {
            bytes: Vec::new(),
            cap,
        }
    }

    #[inline]
    fn append(&mut self, bytes: &[u8]) -> bool {
        if self.bytes.len() + bytes.len() > self.cap {
            return false;
        }
        self.bytes.extend_from_slice(bytes);
        true
    }

    #[inline]
    fn clear(&mut self) {
        self.bytes.clear();
    }

    #[inline]
    fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

/// Sub-state of an in-progress token parse, independent of the machine
/// state. Everything needed to restart a parse after a suspension lives
/// here or in the scanner's entity scratch fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSubstate {
    /// No parse in progress.
    Start,
    /// Identifier parse in progress.
    ParsingKey,
    /// Content, string or CDATA run in progress.
    ParsingToken,
    /// `&` consumed, the next character decides the entity form.
    ParsingEntity,
    /// `&#` consumed, the base is still open.
    ParsingNumericEntity,
    /// Accumulating digits of a numeric reference.
    ParsingNumericBaseEntity,
    /// Accumulating the name of a named reference.
    ParsingNamedEntity,
}

/// Token run flavors; each has its own terminator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Identifier,
    Token,
    SqString,
    DqString,
}

impl RunKind {
    /// Whether `cc` ends a run of this kind. `Amp` is never a terminator;
    /// it switches into entity parsing instead.
    #[inline]
    fn terminates(self, cc: ControlClass) -> bool {
        use ControlClass::*;
        match self {
            RunKind::Identifier => !matches!(cc, Any),
            RunKind::Token => matches!(cc, EndOfLine | Cntrl | Space | Lt | EndOfText),
            RunKind::SqString => matches!(cc, Sq | EndOfLine | Cntrl | EndOfText),
            RunKind::DqString => matches!(cc, Dq | EndOfLine | Cntrl | EndOfText),
        }
    }
}

/// Why an action could not complete.
enum Stop {
    /// The source ran out of chunk bytes; resume later.
    Suspend,
    /// Scan error; latch it and emit `ErrorOccurred`.
    Fail(ScanError),
}

impl From<EndOfChunk> for Stop {
    fn from(_: EndOfChunk) -> Stop {
        Stop::Suspend
    }
}

const ENTITY_SCRATCH: usize = 16;

/// Streaming XML scanner over a byte source.
///
/// Generic over the input and output character sets so the default
/// UTF-8/UTF-8 pair is fully monomorphized; use
/// [`AnyCodec`](super::charset::AnyCodec) for encodings chosen at run
/// time.
pub struct XmlScanner<S, IC = Utf8, OC = Utf8> {
    text: TextScanner<S, IC>,
    out_codec: OC,
    state: State,
    /// The current state's action already ran for this visit.
    action_done: bool,
    /// Event produced by the action, returned once the transition lands.
    emitted: Option<EventKind>,
    buf: TokenBuffer,
    err_buf: Vec<u8>,
    substate: TokenSubstate,
    /// Characters produced by the current run, counted even when the mask
    /// suppresses copying.
    run_len: usize,
    /// Raw bytes of the entity under parse, `&` inclusive; doubles as the
    /// literal-fallback source for ill-formed numeric references.
    ent_scratch: [u8; ENTITY_SCRATCH],
    ent_len: usize,
    /// Emit position into `ent_scratch` during a literal fallback.
    ent_emit: usize,
    /// Literal fallback in progress.
    ent_fallback: bool,
    ent_base: u32,
    ent_value: u32,
    ent_digits: usize,
    /// Scalar that did not fit the output buffer; flushed on resume.
    saved_scalar: Option<u32>,
    /// Progress inside an expected literal (`xml`, `CDATA`).
    lit_pos: usize,
    error: Option<ScanError>,
    entities: EntityMap,
}

impl<S: ByteSource> XmlScanner<S> {
    /// Scanner with UTF-8 input and output.
    pub fn new(src: S, output_capacity: usize) -> Self {
        XmlScanner::with_codecs(src, Utf8, Utf8, output_capacity)
    }
}

impl<S: ByteSource, IC: CharsetCodec, OC: CharsetCodec> XmlScanner<S, IC, OC> {
    pub fn with_codecs(src: S, in_codec: IC, out_codec: OC, output_capacity: usize) -> Self {
        XmlScanner {
            text: TextScanner::new(src, in_codec),
            out_codec,
            state: State::Start,
            action_done: false,
            emitted: None,
            buf: TokenBuffer::new(output_capacity),
            err_buf: Vec::new(),
            substate: TokenSubstate::Start,
            run_len: 0,
            ent_scratch: [0; ENTITY_SCRATCH],
            ent_len: 0,
            ent_emit: 0,
            ent_fallback: false,
            ent_base: 10,
            ent_value: 0,
            ent_digits: 0,
            saved_scalar: None,
            lit_pos: 0,
            error: None,
            entities: EntityMap::new(),
        }
    }

    /// Install the user entity map, consulted after the built-ins.
    pub fn set_entity_map(&mut self, map: EntityMap) {
        self.entities = map;
    }

    /// Replace the byte source, keeping all scanner state. This is the
    /// resume path after an end-of-chunk suspension.
    pub fn set_source(&mut self, src: S) {
        self.text.set_source(src);
    }

    /// Mutable access to the source, for in-place chunk replacement.
    pub fn source_mut(&mut self) -> &mut S {
        self.text.source_mut()
    }

    /// Unwrap the byte source; used by the parser front-end to hand the
    /// post-header remainder to a fresh scanner.
    pub fn into_source(self) -> S {
        self.text.into_source()
    }

    /// Bytes of the most recently produced event.
    pub fn content(&self) -> &[u8] {
        if self.error.is_some() {
            &self.err_buf
        } else {
            self.buf.as_slice()
        }
    }

    /// Grow the output buffer, the recovery step after
    /// [`ScanError::OutputBufferTooSmall`].
    pub fn reserve_output(&mut self, additional: usize) {
        self.buf.cap += additional;
    }

    /// Read and clear a latched error. For every error except
    /// `OutputBufferTooSmall` the scanner is terminated afterwards and
    /// yields `Exit`; an output-buffer overflow resumes mid-token once the
    /// buffer has been grown.
    pub fn get_error(&mut self) -> Option<ScanError> {
        let err = self.error.take();
        if let Some(e) = err {
            if e != ScanError::OutputBufferTooSmall {
                self.state = State::Exit;
                self.substate = TokenSubstate::Start;
                self.action_done = false;
                self.emitted = None;
                self.saved_scalar = None;
            }
        }
        err
    }

    /// Begin scanning at document content instead of the prolog; used when
    /// the XML declaration was consumed by a separate header pass.
    pub(crate) fn start_in_content(&mut self) {
        self.state = State::Content;
    }

    /// Produce the next event.
    ///
    /// Bits cleared in `mask` suppress copying of that kind's token bytes;
    /// the event itself is still delivered. `Err(EndOfChunk)` means the
    /// source drained mid-document: feed more bytes and call again.
    pub fn next_event(&mut self, mask: EventMask) -> Result<Event<'_>, EndOfChunk> {
        if self.error.is_some() {
            return Ok(self.error_event());
        }
        if self.substate == TokenSubstate::Start
            && self.emitted.is_none()
            && self.saved_scalar.is_none()
        {
            self.buf.clear();
        }
        loop {
            let descr = STATEMACHINE.get(self.state);
            if !self.action_done {
                if let Some(op) = descr.action {
                    let cdata = matches!(op, Op::ReturnCdataToken(_));
                    match self.run_action(op, mask) {
                        Ok(()) => {}
                        Err(Stop::Suspend) => return Err(EndOfChunk),
                        Err(Stop::Fail(e)) => {
                            self.error = Some(e);
                            return Ok(self.error_event());
                        }
                    }
                    if cdata {
                        // The CDATA run advanced the machine state itself.
                        if let Some(kind) = self.emitted.take() {
                            return Ok(Event {
                                kind,
                                content: self.buf.as_slice(),
                            });
                        }
                        continue;
                    }
                }
                self.action_done = true;
            }

            // Transition on the current control class. After a parse
            // action the terminator character is still buffered, so this
            // read cannot suspend; after a plain action `emitted` and
            // `action_done` survive a suspension and the action is not
            // re-run on resume.
            let cc = self.text.control()?;
            if let Some(next) = descr.next[cc as usize] {
                self.text.skip()?;
                self.state = next;
            } else if let Some(fb) = descr.fallback {
                self.state = fb;
            } else if let Some(e) = descr.miss {
                self.error = Some(e);
                return Ok(self.error_event());
            } else if cc == ControlClass::EndOfText {
                self.error = Some(ScanError::UnexpectedEndOfText);
                return Ok(self.error_event());
            } else {
                self.error = Some(ScanError::Internal);
                return Ok(self.error_event());
            }
            self.action_done = false;

            if let Some(kind) = self.emitted.take() {
                return Ok(Event {
                    kind,
                    content: self.buf.as_slice(),
                });
            }
        }
    }

    fn error_event(&mut self) -> Event<'_> {
        // The error name goes out in the output character set; the token
        // buffer is left alone so an overflow can resume.
        let e = self.error.unwrap_or(ScanError::Internal);
        self.err_buf.clear();
        let mut tmp = [0u8; 8];
        for b in e.name().bytes() {
            let n = self.out_codec.encode(b as u32, &mut tmp);
            self.err_buf.extend_from_slice(&tmp[..n]);
        }
        Event {
            kind: EventKind::ErrorOccurred,
            content: &self.err_buf,
        }
    }

    fn run_action(&mut self, op: Op, mask: EventMask) -> Result<(), Stop> {
        match op {
            Op::Return(kind) => {
                self.emitted = Some(kind);
                Ok(())
            }
            Op::ReturnEof => {
                self.emitted = Some(EventKind::Exit);
                Ok(())
            }
            Op::ReturnToken(kind) => self.finish_run(RunKind::Token, kind, mask),
            Op::ReturnIdentifier(kind) => self.finish_run(RunKind::Identifier, kind, mask),
            Op::ReturnSqString(kind) => self.finish_run(RunKind::SqString, kind, mask),
            Op::ReturnDqString(kind) => self.finish_run(RunKind::DqString, kind, mask),
            Op::ReturnCdataToken(kind) => self.parse_cdata(kind, mask),
            Op::ExpectIdentifierXml => self.run_expect(b"xml"),
            Op::ExpectIdentifierCdata => self.run_expect(b"CDATA"),
        }
    }

    fn finish_run(&mut self, rk: RunKind, kind: EventKind, mask: EventMask) -> Result<(), Stop> {
        self.parse_run(rk, kind, mask)?;
        self.emitted = Some(kind);
        Ok(())
    }

    /// Encode `ch` into the output buffer; on overflow park it in
    /// `saved_scalar` for the resume after the caller grows the buffer.
    fn append_scalar(&mut self, ch: u32) -> bool {
        let mut tmp = [0u8; 8];
        let n = self.out_codec.encode(ch, &mut tmp);
        if self.buf.append(&tmp[..n]) {
            true
        } else {
            self.saved_scalar = Some(ch);
            false
        }
    }

    /// Consume the literal `lit` byte by byte.
    fn run_expect(&mut self, lit: &[u8]) -> Result<(), Stop> {
        while self.lit_pos < lit.len() {
            let cc = self.text.control()?;
            if cc == ControlClass::EndOfText {
                return Err(Stop::Fail(ScanError::UnexpectedEndOfText));
            }
            let a = self.text.ascii()?;
            if a < 0 || a as u8 != lit[self.lit_pos] {
                return Err(Stop::Fail(ScanError::SyntaxToken));
            }
            self.text.skip()?;
            self.lit_pos += 1;
        }
        self.lit_pos = 0;
        Ok(())
    }

    /// Parse one identifier / content / string run, leaving the
    /// terminating character current for the state transition.
    fn parse_run(&mut self, rk: RunKind, kind: EventKind, mask: EventMask) -> Result<(), Stop> {
        let copy = mask.contains(kind);
        if self.substate == TokenSubstate::Start {
            self.run_len = 0;
            self.substate = match rk {
                RunKind::Identifier => TokenSubstate::ParsingKey,
                _ => TokenSubstate::ParsingToken,
            };
        }
        if let Some(s) = self.saved_scalar.take() {
            if copy && !self.append_scalar(s) {
                return Err(Stop::Fail(ScanError::OutputBufferTooSmall));
            }
        }
        loop {
            match self.substate {
                TokenSubstate::ParsingKey | TokenSubstate::ParsingToken => {
                    let cc = self.text.control()?;
                    if cc == ControlClass::Amp {
                        self.text.skip()?;
                        self.ent_scratch[0] = b'&';
                        self.ent_len = 1;
                        self.ent_fallback = false;
                        self.substate = TokenSubstate::ParsingEntity;
                    } else if rk.terminates(cc) {
                        if self.run_len == 0 {
                            match rk {
                                RunKind::Identifier => {
                                    return Err(Stop::Fail(ScanError::ExpectedIdentifier))
                                }
                                RunKind::Token => {
                                    return Err(Stop::Fail(ScanError::ExpectedToken))
                                }
                                _ => {}
                            }
                        }
                        self.substate = TokenSubstate::Start;
                        return Ok(());
                    } else {
                        let ch = self.text.unicode()?;
                        self.text.skip()?;
                        self.run_len += 1;
                        if copy && !self.append_scalar(ch) {
                            return Err(Stop::Fail(ScanError::OutputBufferTooSmall));
                        }
                    }
                }
                _ => self.parse_entity(rk, copy)?,
            }
        }
    }

    /// Restore the run sub-state after an entity completed.
    fn entity_done(&mut self, rk: RunKind) {
        self.substate = match rk {
            RunKind::Identifier => TokenSubstate::ParsingKey,
            _ => TokenSubstate::ParsingToken,
        };
    }

    /// Emit the raw entity bytes instead of a resolved character; the
    /// fallback for ill-formed or overflowing numeric references.
    fn entity_fallback(&mut self, rk: RunKind, copy: bool) -> Result<(), Stop> {
        self.ent_fallback = true;
        while self.ent_emit < self.ent_len {
            let b = self.ent_scratch[self.ent_emit];
            self.ent_emit += 1;
            self.run_len += 1;
            if copy && !self.append_scalar(b as u32) {
                return Err(Stop::Fail(ScanError::OutputBufferTooSmall));
            }
        }
        self.ent_fallback = false;
        self.ent_emit = 0;
        self.entity_done(rk);
        Ok(())
    }

    /// One step of entity parsing; called with `substate` in one of the
    /// four entity states.
    fn parse_entity(&mut self, rk: RunKind, copy: bool) -> Result<(), Stop> {
        if self.ent_fallback {
            // A literal fallback was interrupted by a full output buffer.
            if let Some(s) = self.saved_scalar.take() {
                if copy && !self.append_scalar(s) {
                    return Err(Stop::Fail(ScanError::OutputBufferTooSmall));
                }
            }
            return self.entity_fallback(rk, copy);
        }
        match self.substate {
            TokenSubstate::ParsingEntity => {
                let cc = self.text.control()?;
                if cc == ControlClass::EndOfText {
                    return Err(Stop::Fail(ScanError::UnexpectedEndOfText));
                }
                let a = self.text.ascii()?;
                if a == b'#' as i8 {
                    self.text.skip()?;
                    self.ent_scratch[1] = b'#';
                    self.ent_len = 2;
                    self.ent_base = 10;
                    self.ent_value = 0;
                    self.ent_digits = 0;
                    self.substate = TokenSubstate::ParsingNumericEntity;
                } else {
                    self.substate = TokenSubstate::ParsingNamedEntity;
                }
                Ok(())
            }
            TokenSubstate::ParsingNumericEntity => {
                let cc = self.text.control()?;
                if cc == ControlClass::EndOfText {
                    return Err(Stop::Fail(ScanError::UnexpectedEndOfText));
                }
                let a = self.text.ascii()?;
                if a == b'x' as i8 || a == b'X' as i8 {
                    self.text.skip()?;
                    self.ent_scratch[self.ent_len] = a as u8;
                    self.ent_len += 1;
                    self.ent_base = 16;
                }
                self.substate = TokenSubstate::ParsingNumericBaseEntity;
                Ok(())
            }
            TokenSubstate::ParsingNumericBaseEntity => {
                let cc = self.text.control()?;
                if cc == ControlClass::EndOfText {
                    return Err(Stop::Fail(ScanError::UnexpectedEndOfText));
                }
                let a = self.text.ascii()?;
                if a == b';' as i8 {
                    self.text.skip()?;
                    if self.ent_digits == 0 {
                        // "&#;" or "&#x;": no digits, emit the text as is.
                        if self.ent_len < ENTITY_SCRATCH {
                            self.ent_scratch[self.ent_len] = b';';
                            self.ent_len += 1;
                        }
                        return self.entity_fallback(rk, copy);
                    }
                    let value = self.ent_value;
                    if value < 32 && !matches!(value, 9 | 10 | 13) {
                        return Err(Stop::Fail(ScanError::EntityEncodesCntrlChar));
                    }
                    self.entity_done(rk);
                    self.run_len += 1;
                    if copy && !self.append_scalar(value) {
                        return Err(Stop::Fail(ScanError::OutputBufferTooSmall));
                    }
                    return Ok(());
                }
                match digit_value(a, self.ent_base) {
                    Some(d) if self.ent_len < ENTITY_SCRATCH => {
                        let next = (self.ent_value as u64) * self.ent_base as u64 + d as u64;
                        if next > u32::MAX as u64 {
                            return self.entity_fallback(rk, copy);
                        }
                        self.text.skip()?;
                        self.ent_scratch[self.ent_len] = a as u8;
                        self.ent_len += 1;
                        self.ent_value = next as u32;
                        self.ent_digits += 1;
                        Ok(())
                    }
                    // Bad digit or scratch exhausted: keep the character
                    // for the surrounding run and emit the prefix as text.
                    _ => self.entity_fallback(rk, copy),
                }
            }
            TokenSubstate::ParsingNamedEntity => {
                let cc = self.text.control()?;
                if cc == ControlClass::EndOfText {
                    return Err(Stop::Fail(ScanError::UnexpectedEndOfText));
                }
                let a = self.text.ascii()?;
                if a == b';' as i8 {
                    self.text.skip()?;
                    let name = &self.ent_scratch[1..self.ent_len];
                    let ch = match builtin_entity(name).or_else(|| self.entities.get(name)) {
                        Some(ch) => ch,
                        None => return Err(Stop::Fail(ScanError::UndefinedCharacterEntity)),
                    };
                    if ch < 32 && !matches!(ch, 9 | 10 | 13) {
                        return Err(Stop::Fail(ScanError::EntityEncodesCntrlChar));
                    }
                    self.entity_done(rk);
                    self.run_len += 1;
                    if copy && !self.append_scalar(ch) {
                        return Err(Stop::Fail(ScanError::OutputBufferTooSmall));
                    }
                    return Ok(());
                }
                if a <= 0 || self.ent_len == ENTITY_SCRATCH {
                    // Entity names are ASCII and short; anything else
                    // cannot resolve.
                    return Err(Stop::Fail(ScanError::UndefinedCharacterEntity));
                }
                self.text.skip()?;
                self.ent_scratch[self.ent_len] = a as u8;
                self.ent_len += 1;
                Ok(())
            }
            _ => Err(Stop::Fail(ScanError::Internal)),
        }
    }

    /// CDATA body through `]]>`, emitted as one `Content` event. Drives
    /// the `Cdata1`..`Cdata3` machine states itself so a suspension inside
    /// a half-seen terminator resumes correctly.
    fn parse_cdata(&mut self, kind: EventKind, mask: EventMask) -> Result<(), Stop> {
        let copy = mask.contains(kind);
        if self.substate == TokenSubstate::Start {
            self.run_len = 0;
            self.substate = TokenSubstate::ParsingToken;
        }
        if let Some(s) = self.saved_scalar.take() {
            if copy && !self.append_scalar(s) {
                return Err(Stop::Fail(ScanError::OutputBufferTooSmall));
            }
        }
        loop {
            let cc = self.text.control()?;
            if cc == ControlClass::EndOfText {
                return Err(Stop::Fail(ScanError::UnexpectedEndOfText));
            }
            match self.state {
                State::Cdata1 => {
                    if cc == ControlClass::Csb {
                        self.text.skip()?;
                        self.state = State::Cdata2;
                    } else {
                        let ch = self.text.unicode()?;
                        self.text.skip()?;
                        self.run_len += 1;
                        if copy && !self.append_scalar(ch) {
                            return Err(Stop::Fail(ScanError::OutputBufferTooSmall));
                        }
                    }
                }
                State::Cdata2 => {
                    if cc == ControlClass::Csb {
                        self.text.skip()?;
                        self.state = State::Cdata3;
                    } else {
                        // Lone ']' was data after all; reprocess the
                        // current character in the body state.
                        self.state = State::Cdata1;
                        self.run_len += 1;
                        if copy && !self.append_scalar(b']' as u32) {
                            return Err(Stop::Fail(ScanError::OutputBufferTooSmall));
                        }
                    }
                }
                State::Cdata3 => {
                    if cc == ControlClass::Gt {
                        self.text.skip()?;
                        self.state = State::Content;
                        self.substate = TokenSubstate::Start;
                        self.emitted = Some(kind);
                        return Ok(());
                    } else if cc == ControlClass::Csb {
                        // "]]]": the oldest ']' is data, "]]" stays pending.
                        self.text.skip()?;
                        self.run_len += 1;
                        if copy && !self.append_scalar(b']' as u32) {
                            return Err(Stop::Fail(ScanError::OutputBufferTooSmall));
                        }
                    } else {
                        // "]]" was data; one ']' now, the other through the
                        // Cdata2 reprocessing path.
                        self.state = State::Cdata2;
                        self.run_len += 1;
                        if copy && !self.append_scalar(b']' as u32) {
                            return Err(Stop::Fail(ScanError::OutputBufferTooSmall));
                        }
                    }
                }
                _ => return Err(Stop::Fail(ScanError::Internal)),
            }
        }
    }
}

#[inline]
fn digit_value(a: i8, base: u32) -> Option<u32> {
    if a < 0 {
        return None;
    }
    let d = match a as u8 {
        b @ b'0'..=b'9' => (b - b'0') as u32,
        b @ b'a'..=b'f' => (b - b'a') as u32 + 10,
        b @ b'A'..=b'F' => (b - b'A') as u32 + 10,
        _ => return None,
    };
    if d < base {
        Some(d)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::SliceSource;

    fn collect(doc: &str) -> Vec<(EventKind, String)> {
        let mut scanner = XmlScanner::new(SliceSource::complete(doc.as_bytes()), 1024);
        let mut events = Vec::new();
        loop {
            let ev = scanner.next_event(EventMask::ALL).expect("complete input");
            let text = String::from_utf8_lossy(ev.content).into_owned();
            let kind = ev.kind;
            events.push((kind, text));
            if matches!(kind, EventKind::Exit | EventKind::ErrorOccurred) {
                break;
            }
        }
        events
    }

    #[test]
    fn test_minimal_document() {
        let events = collect("<a/>");
        assert_eq!(
            events,
            vec![
                (EventKind::OpenTag, "a".into()),
                (EventKind::CloseTagIm, "".into()),
                (EventKind::Exit, "".into()),
            ]
        );
    }

    #[test]
    fn test_nested_with_header() {
        let events = collect("<?xml version=\"1.0\"?><a><b>hi</b></a>");
        assert_eq!(
            events,
            vec![
                (EventKind::HeaderAttribName, "version".into()),
                (EventKind::HeaderAttribValue, "1.0".into()),
                (EventKind::HeaderEnd, "".into()),
                (EventKind::OpenTag, "a".into()),
                (EventKind::OpenTag, "b".into()),
                (EventKind::Content, "hi".into()),
                (EventKind::CloseTag, "b".into()),
                (EventKind::CloseTag, "a".into()),
                (EventKind::Exit, "".into()),
            ]
        );
    }

    #[test]
    fn test_attributes_both_quotes() {
        let events = collect("<e a='1' b=\"2\"/>");
        assert_eq!(
            events,
            vec![
                (EventKind::OpenTag, "e".into()),
                (EventKind::TagAttribName, "a".into()),
                (EventKind::TagAttribValue, "1".into()),
                (EventKind::TagAttribName, "b".into()),
                (EventKind::TagAttribValue, "2".into()),
                (EventKind::CloseTagIm, "".into()),
                (EventKind::Exit, "".into()),
            ]
        );
    }

    #[test]
    fn test_unquoted_attribute_value() {
        let events = collect("<note id=1><to>x</to></note>");
        assert_eq!(events[0], (EventKind::OpenTag, "note".into()));
        assert_eq!(events[1], (EventKind::TagAttribName, "id".into()));
        assert_eq!(events[2], (EventKind::TagAttribValue, "1".into()));
    }

    #[test]
    fn test_entities() {
        let events = collect("<r>&amp;&lt;&gt;&apos;&quot;&#65;&#x42;</r>");
        assert_eq!(events[1], (EventKind::Content, "&<>'\"AB".into()));
    }

    #[test]
    fn test_entity_overflow_falls_back_to_literal() {
        let events = collect("<r>&#99999999999;</r>");
        assert_eq!(events[1], (EventKind::Content, "&#99999999999;".into()));
    }

    #[test]
    fn test_entity_control_char_rejected() {
        let events = collect("<r>&#7;</r>");
        assert_eq!(
            events.last().unwrap(),
            &(EventKind::ErrorOccurred, "EntityEncodesCntrlChar".into())
        );
    }

    #[test]
    fn test_entity_tab_allowed() {
        let events = collect("<r>a&#9;b</r>");
        assert_eq!(events[1], (EventKind::Content, "a\tb".into()));
    }

    #[test]
    fn test_undefined_entity() {
        let events = collect("<r>&bogus;</r>");
        assert_eq!(
            events.last().unwrap(),
            &(EventKind::ErrorOccurred, "UndefinedCharacterEntity".into())
        );
    }

    #[test]
    fn test_user_entity_map() {
        let mut scanner = XmlScanner::new(SliceSource::complete(b"<r>&euro;</r>"), 1024);
        let mut map = EntityMap::new();
        map.define(b"euro", 0x20AC);
        scanner.set_entity_map(map);
        let ev = scanner.next_event(EventMask::ALL).unwrap();
        assert_eq!(ev.kind, EventKind::OpenTag);
        let ev = scanner.next_event(EventMask::ALL).unwrap();
        assert_eq!(ev.kind, EventKind::Content);
        assert_eq!(ev.content, "€".as_bytes());
    }

    #[test]
    fn test_cdata_passthrough() {
        let events = collect("<r><![CDATA[raw <b/>]]></r>");
        assert_eq!(
            events,
            vec![
                (EventKind::OpenTag, "r".into()),
                (EventKind::Content, "raw <b/>".into()),
                (EventKind::CloseTag, "r".into()),
                (EventKind::Exit, "".into()),
            ]
        );
    }

    #[test]
    fn test_cdata_embedded_brackets() {
        let events = collect("<r><![CDATA[a]b]]c]]]></r>");
        assert_eq!(events[1], (EventKind::Content, "a]b]]c]".into()));
    }

    #[test]
    fn test_doctype_skipped_coarsely() {
        let events = collect("<!DOCTYPE note><note>x</note>");
        assert_eq!(events[0], (EventKind::OpenTag, "note".into()));
    }

    #[test]
    fn test_content_before_root_is_error() {
        let events = collect("boo<a/>");
        assert_eq!(
            events.last().unwrap(),
            &(EventKind::ErrorOccurred, "ExpectedOpenTag".into())
        );
    }

    #[test]
    fn test_unterminated_string() {
        let events = collect("<e a='1\n'/>");
        assert_eq!(
            events.last().unwrap(),
            &(EventKind::ErrorOccurred, "StringNotTerminated".into())
        );
    }

    #[test]
    fn test_missing_equal() {
        let events = collect("<e a '1'/>");
        assert_eq!(
            events.last().unwrap(),
            &(EventKind::ErrorOccurred, "ExpectedEqual".into())
        );
    }

    #[test]
    fn test_bad_cdata_introducer() {
        let events = collect("<r><![CDAT[x]]></r>");
        assert_eq!(
            events.last().unwrap(),
            &(EventKind::ErrorOccurred, "SyntaxToken".into())
        );
    }

    #[test]
    fn test_error_is_latched_until_read() {
        let mut scanner = XmlScanner::new(SliceSource::complete(b"zzz"), 64);
        let ev = scanner.next_event(EventMask::ALL).unwrap();
        assert_eq!(ev.kind, EventKind::ErrorOccurred);
        let ev = scanner.next_event(EventMask::ALL).unwrap();
        assert_eq!(ev.kind, EventKind::ErrorOccurred);
        assert_eq!(scanner.get_error(), Some(ScanError::ExpectedOpenTag));
        let ev = scanner.next_event(EventMask::ALL).unwrap();
        assert_eq!(ev.kind, EventKind::Exit);
    }

    #[test]
    fn test_mask_skips_content_bytes() {
        let mask = EventMask::ALL.without(EventKind::Content);
        let mut scanner = XmlScanner::new(SliceSource::complete(b"<r>hello</r>"), 64);
        let ev = scanner.next_event(mask).unwrap();
        assert_eq!(ev.kind, EventKind::OpenTag);
        let ev = scanner.next_event(mask).unwrap();
        assert_eq!(ev.kind, EventKind::Content);
        assert!(ev.content.is_empty());
        let ev = scanner.next_event(mask).unwrap();
        assert_eq!(ev.kind, EventKind::CloseTag);
        assert_eq!(ev.content, b"r");
    }

    #[test]
    fn test_chunked_resume_mid_entity() {
        let mut scanner = XmlScanner::new(SliceSource::chunk(b"<r>&amp"), 1024);
        let ev = scanner.next_event(EventMask::ALL).unwrap();
        assert_eq!(ev.kind, EventKind::OpenTag);
        assert_eq!(scanner.next_event(EventMask::ALL).err(), Some(EndOfChunk));
        scanner.source_mut().put_chunk(b";&lt;</r>", true);
        let ev = scanner.next_event(EventMask::ALL).unwrap();
        assert_eq!(ev.kind, EventKind::Content);
        assert_eq!(ev.content, b"&<");
        let ev = scanner.next_event(EventMask::ALL).unwrap();
        assert_eq!(ev.kind, EventKind::CloseTag);
        let ev = scanner.next_event(EventMask::ALL).unwrap();
        assert_eq!(ev.kind, EventKind::Exit);
    }

    #[test]
    fn test_output_buffer_overflow_recovers() {
        let mut scanner = XmlScanner::new(SliceSource::complete(b"<r>abcdefgh</r>"), 4);
        let ev = scanner.next_event(EventMask::ALL).unwrap();
        assert_eq!(ev.kind, EventKind::OpenTag);
        let ev = scanner.next_event(EventMask::ALL).unwrap();
        assert_eq!(ev.kind, EventKind::ErrorOccurred);
        assert_eq!(scanner.get_error(), Some(ScanError::OutputBufferTooSmall));
        scanner.reserve_output(64);
        let ev = scanner.next_event(EventMask::ALL).unwrap();
        assert_eq!(ev.kind, EventKind::Content);
        assert_eq!(ev.content, b"abcdefgh");
    }
}
