//! The scanner's deterministic state machine.
//!
//! A static table of 34 states, built once per process. Each state holds an
//! optional action, a per-[`ControlClass`] transition table, an optional
//! fallback (entered without consuming a character), and an optional miss
//! error for when nothing applies.

use std::sync::LazyLock;

use super::event::EventKind;
use super::textscan::{ControlClass, CONTROL_CLASS_COUNT};
use crate::error::ScanError;

/// States of the scanner automaton.
///
/// Clusters: prolog (`Start`, `StartTag`), XML header (`XTag*`), content
/// (`Content`, `Token`), element dispatch (`XmlTag`), open-tag attributes
/// (`OpenTag`, `TagA*`, `TagClim`), close tags (`CloseTag`, `TagClsk`),
/// specials (`EntitySl`, `Entity`, `Cdata*`) and `Exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Start,
    StartTag,
    XTag,
    XTagEnd,
    XTagAisk,
    XTagAnam,
    XTagAesk,
    XTagAvsk,
    XTagAvid,
    XTagAvsq,
    XTagAvdq,
    XTagAvqe,
    Content,
    Token,
    XmlTag,
    OpenTag,
    CloseTag,
    TagClsk,
    TagAisk,
    TagAnam,
    TagAesk,
    TagAvsk,
    TagAvid,
    TagAvsq,
    TagAvdq,
    TagAvqe,
    TagClim,
    EntitySl,
    Entity,
    Cdata,
    Cdata1,
    Cdata2,
    Cdata3,
    Exit,
}

pub const STATE_COUNT: usize = 34;

/// Action operators attached to states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Emit the kind without producing token text.
    Return(EventKind),
    /// Parse a content run into the output buffer and emit the kind.
    ReturnToken(EventKind),
    /// Parse an identifier and emit the kind.
    ReturnIdentifier(EventKind),
    /// Parse a single-quoted string body and emit the kind.
    ReturnSqString(EventKind),
    /// Parse a double-quoted string body and emit the kind.
    ReturnDqString(EventKind),
    /// Parse a CDATA body through `]]>` and emit the kind. The parse
    /// routine advances `Cdata1`..`Cdata3` itself so a suspension inside a
    /// half-seen terminator resumes in the right sub-state.
    ReturnCdataToken(EventKind),
    /// Consume the literal `xml`.
    ExpectIdentifierXml,
    /// Consume the literal `CDATA`.
    ExpectIdentifierCdata,
    /// Emit `Exit`.
    ReturnEof,
}

/// One row of the state table.
#[derive(Debug, Clone, Copy)]
pub struct StateDescr {
    pub action: Option<Op>,
    pub next: [Option<State>; CONTROL_CLASS_COUNT],
    pub fallback: Option<State>,
    pub miss: Option<ScanError>,
}

impl StateDescr {
    const fn empty() -> StateDescr {
        StateDescr {
            action: None,
            next: [None; CONTROL_CLASS_COUNT],
            fallback: None,
            miss: None,
        }
    }
}

/// The full transition table.
pub struct Statemachine {
    states: [StateDescr; STATE_COUNT],
}

/// Fluent configuration of one state row.
struct StateCfg<'a> {
    descr: &'a mut StateDescr,
    id: State,
}

impl StateCfg<'_> {
    fn action(self, op: Op) -> Self {
        self.descr.action = Some(op);
        self
    }

    /// Transition: consume the character, enter `next`.
    fn on(self, cc: ControlClass, next: State) -> Self {
        self.descr.next[cc as usize] = Some(next);
        self
    }

    /// Consume the character and stay in this state.
    fn skip(self, cc: ControlClass) -> Self {
        let id = self.id;
        self.on(cc, id)
    }

    /// Enter `next` without consuming, when no transition matches.
    fn fallback(self, next: State) -> Self {
        self.descr.fallback = Some(next);
        self
    }

    /// Consume the character and enter `next` for every class without an
    /// explicit transition. `EndOfText` stays unset so exhaustion inside a
    /// skipped construct still surfaces as an error.
    fn other(self, next: State) -> Self {
        for (idx, slot) in self.descr.next.iter_mut().enumerate() {
            if slot.is_none() && idx != ControlClass::EndOfText as usize {
                *slot = Some(next);
            }
        }
        self
    }

    /// Error to report when no transition, fallback or default applies.
    fn miss(self, err: ScanError) -> Self {
        self.descr.miss = Some(err);
        self
    }
}

impl Statemachine {
    #[inline]
    pub fn get(&self, state: State) -> &StateDescr {
        &self.states[state as usize]
    }

    fn state(&mut self, id: State) -> StateCfg<'_> {
        StateCfg {
            descr: &mut self.states[id as usize],
            id,
        }
    }

    fn build() -> Statemachine {
        use ControlClass::*;
        use EventKind as Ev;
        use ScanError as Err;
        use State::*;

        let mut m = Statemachine {
            states: [StateDescr::empty(); STATE_COUNT],
        };

        // Prolog: skip whitespace, require '<'.
        m.state(Start)
            .skip(EndOfLine)
            .skip(Cntrl)
            .skip(Space)
            .on(Lt, StartTag)
            .miss(Err::ExpectedOpenTag);
        m.state(StartTag)
            .skip(EndOfLine)
            .skip(Cntrl)
            .skip(Space)
            .on(Questm, XTag)
            .on(Exclam, EntitySl)
            .fallback(OpenTag);

        // XML header: same attribute grammar as tags, terminated by '?>'.
        m.state(XTag)
            .action(Op::ExpectIdentifierXml)
            .on(Space, XTagAisk)
            .on(Questm, XTagEnd)
            .miss(Err::ExpectedXMLTag);
        m.state(XTagEnd)
            .action(Op::Return(Ev::HeaderEnd))
            .on(Gt, Content)
            .miss(Err::ExpectedTagEnd);
        m.state(XTagAisk)
            .skip(Space)
            .on(Questm, XTagEnd)
            .fallback(XTagAnam);
        m.state(XTagAnam)
            .action(Op::ReturnIdentifier(Ev::HeaderAttribName))
            .on(Space, XTagAesk)
            .on(Equal, XTagAvsk)
            .miss(Err::ExpectedEqual);
        m.state(XTagAesk)
            .skip(Space)
            .on(Equal, XTagAvsk)
            .miss(Err::ExpectedEqual);
        m.state(XTagAvsk)
            .skip(Space)
            .on(Sq, XTagAvsq)
            .on(Dq, XTagAvdq)
            .fallback(XTagAvid);
        m.state(XTagAvid)
            .action(Op::ReturnIdentifier(Ev::HeaderAttribValue))
            .on(Space, XTagAisk)
            .on(Questm, XTagEnd)
            .miss(Err::ExpectedTagAttribute);
        m.state(XTagAvsq)
            .action(Op::ReturnSqString(Ev::HeaderAttribValue))
            .on(Sq, XTagAvqe)
            .miss(Err::StringNotTerminated);
        m.state(XTagAvdq)
            .action(Op::ReturnDqString(Ev::HeaderAttribValue))
            .on(Dq, XTagAvqe)
            .miss(Err::StringNotTerminated);
        m.state(XTagAvqe)
            .on(Space, XTagAisk)
            .on(Questm, XTagEnd)
            .miss(Err::ExpectedTagAttribute);

        // Content between tags: whitespace is skipped, text runs go
        // through Token.
        m.state(Content)
            .on(EndOfText, Exit)
            .skip(EndOfLine)
            .skip(Cntrl)
            .skip(Space)
            .on(Lt, XmlTag)
            .fallback(Token);
        m.state(Token)
            .action(Op::ReturnToken(Ev::Content))
            .on(EndOfText, Exit)
            .on(EndOfLine, Content)
            .on(Cntrl, Content)
            .on(Space, Content)
            .on(Lt, XmlTag)
            .fallback(Content);

        // '<' inside the document.
        m.state(XmlTag)
            .on(Questm, XTag)
            .on(Exclam, EntitySl)
            .on(Slash, CloseTag)
            .fallback(OpenTag);

        // Open tag and its attributes.
        m.state(OpenTag)
            .action(Op::ReturnIdentifier(Ev::OpenTag))
            .on(Space, TagAisk)
            .on(Slash, TagClim)
            .on(Gt, Content)
            .miss(Err::ExpectedTagAttribute);
        m.state(TagAisk)
            .skip(Space)
            .on(Gt, Content)
            .on(Slash, TagClim)
            .fallback(TagAnam);
        m.state(TagAnam)
            .action(Op::ReturnIdentifier(Ev::TagAttribName))
            .on(Space, TagAesk)
            .on(Equal, TagAvsk)
            .miss(Err::ExpectedEqual);
        m.state(TagAesk)
            .skip(Space)
            .on(Equal, TagAvsk)
            .miss(Err::ExpectedEqual);
        m.state(TagAvsk)
            .skip(Space)
            .on(Sq, TagAvsq)
            .on(Dq, TagAvdq)
            .fallback(TagAvid);
        m.state(TagAvid)
            .action(Op::ReturnIdentifier(Ev::TagAttribValue))
            .on(Space, TagAisk)
            .on(Slash, TagClim)
            .on(Gt, Content)
            .miss(Err::ExpectedTagAttribute);
        m.state(TagAvsq)
            .action(Op::ReturnSqString(Ev::TagAttribValue))
            .on(Sq, TagAvqe)
            .miss(Err::StringNotTerminated);
        m.state(TagAvdq)
            .action(Op::ReturnDqString(Ev::TagAttribValue))
            .on(Dq, TagAvqe)
            .miss(Err::StringNotTerminated);
        m.state(TagAvqe)
            .on(Space, TagAisk)
            .on(Slash, TagClim)
            .on(Gt, Content)
            .miss(Err::ExpectedTagAttribute);
        m.state(TagClim)
            .action(Op::Return(Ev::CloseTagIm))
            .on(Gt, Content)
            .miss(Err::ExpectedTagEnd);

        // Close tag.
        m.state(CloseTag)
            .action(Op::ReturnIdentifier(Ev::CloseTag))
            .on(Space, TagClsk)
            .on(Gt, Content)
            .miss(Err::ExpectedTagEnd);
        m.state(TagClsk)
            .skip(Space)
            .on(Gt, Content)
            .miss(Err::ExpectedTagEnd);

        // '<!': either a CDATA section or a declaration skipped coarsely.
        m.state(EntitySl).on(Osb, Cdata).fallback(Entity);
        m.state(Entity)
            .on(Exclam, EntitySl)
            .on(Gt, Content)
            .other(Entity);

        // CDATA: the body run owns the Cdata1..Cdata3 progression, so all
        // three states carry the same action as resume entry points.
        m.state(Cdata)
            .action(Op::ExpectIdentifierCdata)
            .on(Osb, Cdata1)
            .miss(Err::ExpectedCDATATag);
        m.state(Cdata1).action(Op::ReturnCdataToken(Ev::Content));
        m.state(Cdata2).action(Op::ReturnCdataToken(Ev::Content));
        m.state(Cdata3).action(Op::ReturnCdataToken(Ev::Content));

        m.state(Exit).action(Op::ReturnEof).on(EndOfText, Exit).other(Exit);

        m
    }
}

/// The process-wide state table.
pub static STATEMACHINE: LazyLock<Statemachine> = LazyLock::new(Statemachine::build);

#[cfg(test)]
mod tests {
    use super::*;
    use ControlClass::*;
    use State::*;

    #[test]
    fn test_prolog_transitions() {
        let m = &*STATEMACHINE;
        assert_eq!(m.get(Start).next[Lt as usize], Some(StartTag));
        assert_eq!(m.get(Start).next[Space as usize], Some(Start));
        assert_eq!(m.get(Start).miss, Some(crate::error::ScanError::ExpectedOpenTag));
        assert_eq!(m.get(Start).next[Any as usize], None);
    }

    #[test]
    fn test_tag_dispatch() {
        let m = &*STATEMACHINE;
        assert_eq!(m.get(XmlTag).next[Questm as usize], Some(XTag));
        assert_eq!(m.get(XmlTag).next[Slash as usize], Some(CloseTag));
        assert_eq!(m.get(XmlTag).next[Exclam as usize], Some(EntitySl));
        assert_eq!(m.get(XmlTag).fallback, Some(OpenTag));
    }

    #[test]
    fn test_every_state_is_handled() {
        let m = &*STATEMACHINE;
        // A state with neither transitions, fallback, miss nor action
        // would be a dead end the event loop turns into Internal.
        for idx in 0..STATE_COUNT {
            let descr = &m.states[idx];
            let has_exit = descr.action.is_some()
                || descr.fallback.is_some()
                || descr.miss.is_some()
                || descr.next.iter().any(|t| t.is_some());
            assert!(has_exit, "state {idx} has no way out");
        }
    }

    #[test]
    fn test_exit_consumes_everything() {
        let m = &*STATEMACHINE;
        assert!(m.get(Exit).next.iter().all(|t| *t == Some(Exit)));
    }
}
