//! Error types for scanning, automaton construction, and path selection.

use std::error::Error;
use std::fmt;

/// Errors reported by the XML scanner.
///
/// The scanner reports an error by emitting one `ErrorOccurred` event whose
/// content bytes are the error name, then keeps re-emitting it until the
/// error is read with [`get_error`](crate::core::scanner::XmlScanner::get_error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    /// Non-whitespace before the first `<` of the document.
    ExpectedOpenTag,
    /// `<?` not followed by the literal `xml`.
    ExpectedXMLTag,
    /// The source ran out mid-construct (complete-input mode only).
    UnexpectedEndOfText,
    /// The encoded character does not fit the remaining output capacity.
    OutputBufferTooSmall,
    /// A required literal (`xml`, `CDATA`) mismatched.
    SyntaxToken,
    /// A quoted string ran into an end of line or a control character.
    StringNotTerminated,
    /// An entity resolved to a control character below 32 (other than
    /// tab, newline, carriage return).
    EntityEncodesCntrlChar,
    /// A named entity is neither built in nor present in the entity map.
    UndefinedCharacterEntity,
    /// Expected `>`.
    ExpectedTagEnd,
    /// Expected `=` between an attribute name and its value.
    ExpectedEqual,
    /// Expected an attribute in a context that requires one.
    ExpectedTagAttribute,
    /// `<![` not followed by `CDATA[`.
    ExpectedCDATATag,
    /// A required identifier was empty.
    ExpectedIdentifier,
    /// A required content token was empty.
    ExpectedToken,
    /// A byte other than NUL appeared inside the zero padding that
    /// terminates an XML declaration in a wide encoding.
    IllegalCharacterAtEndOfHeader,
    /// Unreachable branch of the state machine; indicates a bug.
    Internal,
}

impl ScanError {
    /// Error name delivered as the content of `ErrorOccurred` events.
    pub fn name(&self) -> &'static str {
        match self {
            ScanError::ExpectedOpenTag => "ExpectedOpenTag",
            ScanError::ExpectedXMLTag => "ExpectedXMLTag",
            ScanError::UnexpectedEndOfText => "UnexpectedEndOfText",
            ScanError::OutputBufferTooSmall => "OutputBufferTooSmall",
            ScanError::SyntaxToken => "SyntaxToken",
            ScanError::StringNotTerminated => "StringNotTerminated",
            ScanError::EntityEncodesCntrlChar => "EntityEncodesCntrlChar",
            ScanError::UndefinedCharacterEntity => "UndefinedCharacterEntity",
            ScanError::ExpectedTagEnd => "ExpectedTagEnd",
            ScanError::ExpectedEqual => "ExpectedEqual",
            ScanError::ExpectedTagAttribute => "ExpectedTagAttribute",
            ScanError::ExpectedCDATATag => "ExpectedCDATATag",
            ScanError::ExpectedIdentifier => "ExpectedIdentifier",
            ScanError::ExpectedToken => "ExpectedToken",
            ScanError::IllegalCharacterAtEndOfHeader => "IllegalCharacterAtEndOfHeader",
            ScanError::Internal => "Internal",
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Error for ScanError {}

/// Errors raised while building a path automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The state vector could not grow.
    OutOfMem,
    /// A builder call referenced a state index outside the automaton.
    IllegalState,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::OutOfMem => f.write_str("automaton state allocation failed"),
            BuildError::IllegalState => f.write_str("builder referenced an invalid state"),
        }
    }
}

impl Error for BuildError {}

/// Errors reported by the path selector at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectError {
    /// A preallocated bound (`max_tokens`, `max_follows`, `max_triggers`,
    /// `max_scope_stack`) was exceeded; the configuration does not fit the
    /// automaton and document.
    ArrayBoundsReadWrite,
    /// The scanner signalled `Exit` while element scopes were still open.
    UnexpectedEndOfInput,
    /// The underlying scanner latched an error.
    Scan(ScanError),
}

impl fmt::Display for SelectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectError::ArrayBoundsReadWrite => f.write_str("ArrayBoundsReadWrite"),
            SelectError::UnexpectedEndOfInput => f.write_str("UnexpectedEndOfInput"),
            SelectError::Scan(e) => write!(f, "scanner error: {e}"),
        }
    }
}

impl Error for SelectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SelectError::Scan(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ScanError> for SelectError {
    fn from(e: ScanError) -> Self {
        SelectError::Scan(e)
    }
}
