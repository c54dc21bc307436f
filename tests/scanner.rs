//! End-to-end scanner scenarios over complete and chunked input.

use proptest::prelude::*;
use xmlscan::{EndOfChunk, EventKind, EventMask, SliceSource, XmlScanner};

/// Scan a complete document into (kind, content) pairs, stopping after
/// `Exit` or an error event.
fn scan_all(doc: &[u8]) -> Vec<(EventKind, Vec<u8>)> {
    let mut scanner = XmlScanner::new(SliceSource::complete(doc), 4096);
    let mut events = Vec::new();
    loop {
        let ev = scanner.next_event(EventMask::ALL).expect("complete input");
        let kind = ev.kind;
        events.push((kind, ev.content.to_vec()));
        if matches!(kind, EventKind::Exit | EventKind::ErrorOccurred) {
            return events;
        }
    }
}

/// Scan the same document delivered in pieces, resuming after every
/// end-of-chunk suspension.
fn scan_chunked(pieces: &[&[u8]]) -> Vec<(EventKind, Vec<u8>)> {
    let mut iter = pieces.iter();
    let first = iter.next().copied().unwrap_or(b"");
    let mut remaining = iter.len();
    let mut scanner = XmlScanner::new(
        if remaining == 0 {
            SliceSource::complete(first)
        } else {
            SliceSource::chunk(first)
        },
        4096,
    );
    let mut events = Vec::new();
    loop {
        match scanner.next_event(EventMask::ALL) {
            Ok(ev) => {
                let kind = ev.kind;
                events.push((kind, ev.content.to_vec()));
                if matches!(kind, EventKind::Exit | EventKind::ErrorOccurred) {
                    return events;
                }
            }
            Err(EndOfChunk) => {
                let next = iter.next().copied().expect("scanner suspended after eof");
                remaining = iter.len();
                scanner.source_mut().put_chunk(next, remaining == 0);
            }
        }
    }
}

fn ev(kind: EventKind, content: &str) -> (EventKind, Vec<u8>) {
    (kind, content.as_bytes().to_vec())
}

#[test]
fn test_minimal_nested_element() {
    let events = scan_all(b"<?xml version=\"1.0\"?><a><b>hi</b></a>");
    assert_eq!(
        events,
        vec![
            ev(EventKind::HeaderAttribName, "version"),
            ev(EventKind::HeaderAttribValue, "1.0"),
            ev(EventKind::HeaderEnd, ""),
            ev(EventKind::OpenTag, "a"),
            ev(EventKind::OpenTag, "b"),
            ev(EventKind::Content, "hi"),
            ev(EventKind::CloseTag, "b"),
            ev(EventKind::CloseTag, "a"),
            ev(EventKind::Exit, ""),
        ]
    );
}

#[test]
fn test_entities_and_predefined() {
    let events = scan_all(b"<r>&amp;&lt;&gt;&apos;&quot;&#65;&#x42;</r>");
    assert_eq!(events[1], ev(EventKind::Content, "&<>'\"AB"));
}

#[test]
fn test_cdata_passthrough() {
    let events = scan_all(b"<r><![CDATA[raw <b/>]]></r>");
    assert_eq!(
        events,
        vec![
            ev(EventKind::OpenTag, "r"),
            ev(EventKind::Content, "raw <b/>"),
            ev(EventKind::CloseTag, "r"),
            ev(EventKind::Exit, ""),
        ]
    );
}

#[test]
fn test_attributes_with_both_quote_styles() {
    let events = scan_all(b"<e a='1' b=\"2\"/>");
    assert_eq!(
        events,
        vec![
            ev(EventKind::OpenTag, "e"),
            ev(EventKind::TagAttribName, "a"),
            ev(EventKind::TagAttribValue, "1"),
            ev(EventKind::TagAttribName, "b"),
            ev(EventKind::TagAttribValue, "2"),
            ev(EventKind::CloseTagIm, ""),
            ev(EventKind::Exit, ""),
        ]
    );
}

#[test]
fn test_chunk_boundary_mid_entity() {
    let events = scan_chunked(&[b"<r>&amp", b";&lt;</r>"]);
    assert_eq!(
        events,
        vec![
            ev(EventKind::OpenTag, "r"),
            ev(EventKind::Content, "&<"),
            ev(EventKind::CloseTag, "r"),
            ev(EventKind::Exit, ""),
        ]
    );
}

#[test]
fn test_chunk_boundary_mid_multibyte_character() {
    let doc = "<r>a€b</r>".as_bytes();
    // Cut inside the three-byte euro sign.
    let cut = 5;
    let events = scan_chunked(&[&doc[..cut], &doc[cut..]]);
    assert_eq!(events[1], (EventKind::Content, "a€b".as_bytes().to_vec()));
}

#[test]
fn test_byte_by_byte_chunking() {
    let doc: &[u8] = b"<?xml version='1.0'?><m k=\"v\"><x>1 2</x><y/></m>";
    let pieces: Vec<&[u8]> = doc.chunks(1).collect();
    assert_eq!(scan_chunked(&pieces), scan_all(doc));
}

#[test]
fn test_balanced_open_close_events() {
    let docs: [&[u8]; 4] = [
        b"<a><b>hi</b></a>",
        b"<a><b/><c><d>x</d></c></a>",
        b"<r><![CDATA[zz]]><e f='1'/></r>",
        b"<?xml version='1.0'?><a>t</a>",
    ];
    for doc in docs {
        let mut depth = 0i64;
        for (kind, _) in scan_all(doc) {
            match kind {
                EventKind::OpenTag => depth += 1,
                EventKind::CloseTag | EventKind::CloseTagIm => depth -= 1,
                EventKind::ErrorOccurred => panic!("scan failed"),
                _ => {}
            }
            assert!(depth >= 0);
        }
        assert_eq!(depth, 0);
    }
}

#[test]
fn test_content_is_valid_utf8() {
    let docs: [&[u8]; 3] = [
        "<a t='\u{fc}ber'>gr\u{fc}n &#x1F600;</a>".as_bytes(),
        b"<r>&amp;&#228;</r>",
        b"<r><![CDATA[\xE2\x82\xAC]]></r>",
    ];
    for doc in docs {
        for (kind, content) in scan_all(doc) {
            assert_ne!(kind, EventKind::ErrorOccurred);
            assert!(std::str::from_utf8(&content).is_ok());
        }
    }
}

/// Documents exercised by the chunk-partition property.
static DOCS: [&[u8]; 6] = [
    b"<?xml version=\"1.0\"?><a><b>hi</b></a>",
    b"<r>&amp;&lt;&gt;&apos;&quot;&#65;&#x42;</r>",
    b"<r><![CDATA[raw <b/>]]> tail</r>",
    b"<e a='1' b=\"2\"/>",
    b"<m><x p='q r'>one two</x><y/><z>&#x20AC;</z></m>",
    b"<?xml version='1.0' encoding='UTF-8'?><doc><item n=\"1\">alpha</item><item n=\"2\">beta</item></doc>",
];

proptest! {
    /// Any partition of a document into chunks produces the identical
    /// event sequence, content bytes included.
    #[test]
    fn test_chunking_is_transparent(
        doc_idx in 0..DOCS.len(),
        raw_cuts in proptest::collection::vec(0usize..200, 0..6),
    ) {
        let doc = DOCS[doc_idx];
        let mut cuts: Vec<usize> = raw_cuts.iter().map(|c| c % (doc.len() + 1)).collect();
        cuts.sort_unstable();
        cuts.dedup();
        let mut pieces = Vec::new();
        let mut prev = 0;
        for &cut in &cuts {
            pieces.push(&doc[prev..cut]);
            prev = cut;
        }
        pieces.push(&doc[prev..]);
        prop_assert_eq!(scan_chunked(&pieces), scan_all(doc));
    }
}
