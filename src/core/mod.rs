//! Scanner core: byte sources, character sets, the unified text scanner,
//! the event state machine and the XML event scanner.

pub mod charset;
pub mod event;
pub mod header;
pub mod machine;
pub mod parser;
pub mod scanner;
pub mod source;
pub mod textscan;

pub use charset::{AnyCodec, CharsetCodec};
pub use event::{Event, EventKind, EventMask};
pub use header::HdrSource;
pub use parser::XmlParser;
pub use scanner::{EntityMap, XmlScanner};
pub use source::{ByteSource, EndOfChunk, SliceSource};
pub use textscan::{ControlClass, TextScanner};
