//! Charset-generic parser front-end.
//!
//! [`XmlParser`] hides the character-set handling for complete in-memory
//! documents: it detects the input encoding from the byte order mark or
//! zero-byte pattern, parses the XML declaration through the
//! header-stripping source, honors an `encoding` attribute when no BOM
//! decided first, and then scans the document body with the resolved
//! codec. Consumers see one unified event stream in UTF-8.
//!
//! Chunked input keeps using [`XmlScanner`] directly with the codec of
//! the caller's choice.

use super::charset::{AnyCodec, Utf8};
use super::event::{Event, EventKind, EventMask};
use super::header::HdrSource;
use super::scanner::XmlScanner;
use super::source::SliceSource;
use crate::error::ScanError;

enum Phase<'a> {
    /// Scanning the XML declaration through the header stripper.
    Header(XmlScanner<HdrSource<SliceSource<'a>>, Utf8, Utf8>),
    /// Scanning the document body with the resolved codec.
    Doc(XmlScanner<SliceSource<'a>, AnyCodec, Utf8>),
}

/// Outcome of one header-phase step, detached from the scanner borrow.
#[derive(Clone, Copy)]
enum HeaderStep {
    Name(bool),
    Value(Option<AnyCodec>),
    End,
    Other(EventKind),
}

/// Pull parser over a complete document with automatic encoding handling.
pub struct XmlParser<'a> {
    phase: Phase<'a>,
    codec: AnyCodec,
    /// The BOM fixed the encoding; `encoding=` cannot override it.
    codec_pinned: bool,
    /// The last header attribute name was `encoding`.
    want_encoding: bool,
    hdr_error: Option<ScanError>,
    output_capacity: usize,
}

impl<'a> XmlParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        XmlParser::with_capacity(data, 4096)
    }

    pub fn with_capacity(data: &'a [u8], output_capacity: usize) -> Self {
        let codec = AnyCodec::detect(data);
        let bom = codec.bom_len(data);
        let body = &data[bom..];
        let phase = if has_declaration(body) {
            Phase::Header(XmlScanner::new(
                HdrSource::new(SliceSource::complete(body)),
                output_capacity,
            ))
        } else {
            let mut scanner =
                XmlScanner::with_codecs(SliceSource::complete(body), codec, Utf8, output_capacity);
            scanner.start_in_content();
            Phase::Doc(scanner)
        };
        XmlParser {
            phase,
            codec,
            codec_pinned: bom > 0,
            want_encoding: false,
            hdr_error: None,
            output_capacity,
        }
    }

    /// Input encoding in effect.
    pub fn encoding(&self) -> AnyCodec {
        self.codec
    }

    /// Read and clear a latched error; header padding errors first.
    pub fn get_error(&mut self) -> Option<ScanError> {
        if let Some(e) = self.hdr_error.take() {
            return Some(e);
        }
        match &mut self.phase {
            Phase::Header(s) => s.get_error(),
            Phase::Doc(s) => s.get_error(),
        }
    }

    /// Produce the next event. Complete-input sources never suspend, so
    /// there is no chunk signal to handle.
    pub fn next_event(&mut self, mask: EventMask) -> Event<'_> {
        if matches!(self.phase, Phase::Doc(_)) {
            return self.next_doc_event(mask);
        }

        let step = match self.next_header_step(mask) {
            Ok(step) => step,
            Err(exit) => return exit,
        };

        let kind = match step {
            HeaderStep::Name(is_encoding) => {
                self.want_encoding = is_encoding;
                EventKind::HeaderAttribName
            }
            HeaderStep::Value(codec) => {
                if let Some(c) = codec {
                    self.codec = c;
                }
                self.want_encoding = false;
                EventKind::HeaderAttribValue
            }
            HeaderStep::End => {
                self.switch_to_doc();
                return Event {
                    kind: EventKind::HeaderEnd,
                    content: b"",
                };
            }
            HeaderStep::Other(kind) => kind,
        };
        // Re-borrow the unchanged header scanner for the event bytes; its
        // buffer still holds them.
        match &self.phase {
            Phase::Header(scanner) => Event {
                kind,
                content: scanner.content(),
            },
            Phase::Doc(_) => Event { kind, content: b"" },
        }
    }

    /// Pull the next event straight from the document-phase scanner.
    fn next_doc_event(&mut self, mask: EventMask) -> Event<'_> {
        let Phase::Doc(scanner) = &mut self.phase else {
            unreachable!("caller checked for Phase::Doc")
        };
        match scanner.next_event(mask) {
            Ok(ev) => ev,
            Err(_) => Event {
                kind: EventKind::Exit,
                content: b"",
            },
        }
    }

    /// Pull the next event from the header-phase scanner and classify it,
    /// detached from the scanner borrow so the caller can freely mutate
    /// `self` afterwards. `Err` carries an early-exit event.
    fn next_header_step(&mut self, mask: EventMask) -> Result<HeaderStep, Event<'static>> {
        let Phase::Header(scanner) = &mut self.phase else {
            unreachable!("caller checked for Phase::Header")
        };
        let ev = match scanner.next_event(mask) {
            Ok(ev) => ev,
            Err(_) => {
                return Err(Event {
                    kind: EventKind::Exit,
                    content: b"",
                })
            }
        };
        Ok(match ev.kind {
            EventKind::HeaderAttribName => HeaderStep::Name(ev.content == b"encoding"),
            EventKind::HeaderAttribValue => {
                if self.want_encoding && !self.codec_pinned {
                    HeaderStep::Value(AnyCodec::from_name(ev.content))
                } else {
                    HeaderStep::Value(None)
                }
            }
            EventKind::HeaderEnd => HeaderStep::End,
            kind => HeaderStep::Other(kind),
        })
    }

    /// Finish the header strip and restart over the remaining bytes with
    /// the resolved input codec.
    fn switch_to_doc(&mut self) {
        let placeholder = {
            let mut s = XmlScanner::with_codecs(
                SliceSource::complete(b"" as &[u8]),
                self.codec,
                Utf8,
                0,
            );
            s.start_in_content();
            Phase::Doc(s)
        };
        if let Phase::Header(scanner) = std::mem::replace(&mut self.phase, placeholder) {
            let mut hdr = scanner.into_source();
            // Complete-input mode: the padding read cannot suspend.
            let _ = hdr.complete();
            self.hdr_error = hdr.error();
            let mut doc = XmlScanner::with_codecs(
                hdr.into_inner(),
                self.codec,
                Utf8,
                self.output_capacity,
            );
            doc.start_in_content();
            self.phase = Phase::Doc(doc);
        }
    }
}

/// Whether the body opens with an XML declaration: the first two non-NUL
/// bytes are `<?`, whatever padding the encoding interleaves.
fn has_declaration(body: &[u8]) -> bool {
    let mut seen = [0u8; 2];
    let mut n = 0;
    for &b in body.iter().take(12) {
        if b != 0 {
            seen[n] = b;
            n += 1;
            if n == 2 {
                break;
            }
        }
    }
    n == 2 && &seen == b"<?"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(data: &[u8]) -> Vec<(EventKind, Vec<u8>)> {
        let mut parser = XmlParser::new(data);
        let mut events = Vec::new();
        loop {
            let ev = parser.next_event(EventMask::ALL);
            let kind = ev.kind;
            events.push((kind, ev.content.to_vec()));
            if matches!(kind, EventKind::Exit | EventKind::ErrorOccurred) {
                return events;
            }
        }
    }

    fn utf16le(text: &str) -> Vec<u8> {
        let mut out = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_utf8_document() {
        let events = collect(b"<?xml version=\"1.0\"?>\n<a>hi</a>");
        assert_eq!(events[0], (EventKind::HeaderAttribName, b"version".to_vec()));
        assert_eq!(events[2], (EventKind::HeaderEnd, Vec::new()));
        assert_eq!(events[3], (EventKind::OpenTag, b"a".to_vec()));
        assert_eq!(events[4], (EventKind::Content, b"hi".to_vec()));
    }

    #[test]
    fn test_headerless_document() {
        let events = collect(b"<a/>");
        assert_eq!(events[0], (EventKind::OpenTag, b"a".to_vec()));
        assert_eq!(events[1], (EventKind::CloseTagIm, Vec::new()));
    }

    #[test]
    fn test_utf16le_document_matches_utf8() {
        let text = "<?xml version=\"1.0\"?>\n<a>hi</a>";
        let wide = collect(&utf16le(text));
        let narrow = collect(text.as_bytes());
        assert_eq!(wide, narrow);
    }

    #[test]
    fn test_utf16le_multibyte_content() {
        let events = collect(&utf16le("<?xml version=\"1.0\"?>\n<a>h€i</a>"));
        assert_eq!(events[4], (EventKind::Content, "h€i".as_bytes().to_vec()));
    }

    #[test]
    fn test_encoding_attribute_selects_codec() {
        // ISO 8859-1 content: 0xE9 is 'é'.
        let mut data = b"<?xml version='1.0' encoding='ISO-8859-1'?>\n<a>caf".to_vec();
        data.push(0xE9);
        data.extend_from_slice(b"</a>");
        let mut parser = XmlParser::new(&data);
        loop {
            let ev = parser.next_event(EventMask::ALL);
            if ev.kind == EventKind::HeaderEnd {
                break;
            }
            assert_ne!(ev.kind, EventKind::ErrorOccurred);
        }
        assert_eq!(parser.encoding(), AnyCodec::IsoLatin1);
        let ev = parser.next_event(EventMask::ALL);
        assert_eq!(ev.kind, EventKind::OpenTag);
        let ev = parser.next_event(EventMask::ALL);
        assert_eq!(ev.kind, EventKind::Content);
        assert_eq!(ev.content, "café".as_bytes());
    }

    #[test]
    fn test_bom_wins_over_encoding_attribute() {
        let data = utf16le("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a/>");
        let mut parser = XmlParser::new(&data);
        loop {
            let ev = parser.next_event(EventMask::ALL);
            if ev.kind == EventKind::HeaderEnd {
                break;
            }
        }
        assert_eq!(parser.encoding(), AnyCodec::Utf16Le);
        let ev = parser.next_event(EventMask::ALL);
        assert_eq!(ev.kind, EventKind::OpenTag);
        assert_eq!(ev.content, b"a");
    }
}
