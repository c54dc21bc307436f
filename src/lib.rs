//! Streaming XML scanning with path selection.
//!
//! `xmlscan` processes XML documents without random access, read-ahead or
//! DOM materialization. Bytes go in; typed events come out: tag opens and
//! closes, attribute names and values, content runs, header fields,
//! errors. On top of the event stream, a precompiled set of abbreviated
//! XPath expressions can be matched in a single forward pass with bounded
//! state.
//!
//! # Scanning events
//!
//! ```
//! use xmlscan::{EventKind, EventMask, SliceSource, XmlScanner};
//!
//! let doc = b"<note id='1'>hello</note>";
//! let mut scanner = XmlScanner::new(SliceSource::complete(doc), 1024);
//! loop {
//!     let ev = scanner.next_event(EventMask::ALL).unwrap();
//!     if ev.kind == EventKind::Exit {
//!         break;
//!     }
//!     println!("{:?}: {}", ev.kind, String::from_utf8_lossy(ev.content));
//! }
//! ```
//!
//! # Chunked input
//!
//! The byte source signals end-of-chunk as a typed result; the scanner
//! suspends with its full state intact, including a partially assembled
//! token, and resumes after the next chunk arrives:
//!
//! ```
//! use xmlscan::{EndOfChunk, EventMask, SliceSource, XmlScanner};
//!
//! let mut scanner = XmlScanner::new(SliceSource::chunk(b"<r>&am"), 1024);
//! let open = scanner.next_event(EventMask::ALL).unwrap();
//! assert_eq!(open.content, b"r");
//! assert_eq!(scanner.next_event(EventMask::ALL), Err(EndOfChunk));
//! scanner.source_mut().put_chunk(b"p;</r>", true);
//! let ev = scanner.next_event(EventMask::ALL).unwrap();
//! assert_eq!(ev.content, b"&");
//! ```
//!
//! # Path selection
//!
//! ```
//! use xmlscan::{PathAutomaton, SelectConfig, SliceSource, Step, XmlPathSelect, XmlScanner};
//!
//! let mut atm = PathAutomaton::new();
//! assert_eq!(atm.add_expression(1, "/doc/item()"), 0);
//!
//! let doc = b"<doc><item>alpha</item><item>beta</item></doc>";
//! let scanner = XmlScanner::new(SliceSource::complete(doc), 1024);
//! let mut select = XmlPathSelect::new(&atm, scanner, SelectConfig::default()).unwrap();
//! let mut found = Vec::new();
//! while let Step::Match(m) = select.next_match().unwrap() {
//!     found.push((m.type_id, m.content.to_vec()));
//! }
//! assert_eq!(found, vec![(1, b"alpha".to_vec()), (1, b"beta".to_vec())]);
//! ```
//!
//! The automaton is immutable after construction and can serve any number
//! of selectors; a scanner lives for one document. Input character sets
//! beyond UTF-8 plug in through [`CharsetCodec`]; [`XmlParser`] wraps the
//! whole arrangement for complete in-memory documents with automatic
//! encoding detection.

pub mod core;
pub mod error;
pub mod xpath;

pub use crate::core::charset::{AnyCodec, CharsetCodec, IsoLatin1, Utf16Be, Utf16Le, Utf8};
pub use crate::core::event::{Event, EventKind, EventMask};
pub use crate::core::header::HdrSource;
pub use crate::core::parser::XmlParser;
pub use crate::core::scanner::{EntityMap, XmlScanner};
pub use crate::core::source::{ByteSource, EndOfChunk, SliceSource};
pub use crate::error::{BuildError, ScanError, SelectError};
pub use crate::xpath::{PathAutomaton, PathExpr, PathMatch, PathSelector, SelectConfig, Step, XmlPathSelect};
