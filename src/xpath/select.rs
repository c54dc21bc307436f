//! Runtime evaluation of the path automaton over an event stream.
//!
//! [`PathSelector`] keeps the per-document matching state: the scope
//! stack mirroring the element nesting, the token working-set of active
//! state activations, the follow list of descendant-mode activations and
//! the trigger queue of deferred emits. All four live in preallocated,
//! budget-bounded vectors; exceeding a bound is a configuration error,
//! never a reallocation.
//!
//! [`XmlPathSelect`] pairs a selector with a scanner for its lifetime and
//! yields matches straight off the byte stream.

use std::mem::size_of;

use super::automaton::{key_hash, Mask, PathAutomaton, StateCore, CNT_UNBOUNDED, NIL};
use crate::core::charset::{CharsetCodec, Utf8};
use crate::core::event::{EventKind, EventMask};
use crate::core::scanner::XmlScanner;
use crate::core::source::{ByteSource, EndOfChunk};
use crate::error::{ScanError, SelectError};

/// Memory budget and depth limit for one selector.
#[derive(Debug, Clone, Copy)]
pub struct SelectConfig {
    /// Bytes available for scopes, tokens, follows and triggers together.
    pub memory_budget: usize,
    /// Maximum element nesting depth.
    pub max_depth: usize,
}

impl Default for SelectConfig {
    fn default() -> Self {
        SelectConfig {
            memory_budget: 3 * 1024,
            max_depth: 32,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Caps {
    max_scope_stack: usize,
    max_tokens: usize,
    max_follows: usize,
    max_triggers: usize,
}

impl Caps {
    fn derive(cfg: &SelectConfig) -> Caps {
        let scopes = cfg.max_depth * size_of::<Scope>();
        let rest = cfg.memory_budget.saturating_sub(scopes);
        Caps {
            max_scope_stack: cfg.max_depth,
            max_tokens: (rest / 2 / size_of::<PathToken>()).max(8),
            max_follows: (rest / 4 / size_of::<usize>()).max(8),
            max_triggers: (rest / 4 / size_of::<u32>()).max(8),
        }
    }
}

/// One element nesting level.
#[derive(Debug, Clone, Copy)]
struct Scope {
    /// Join of the masks of every state active in this scope.
    mask: Mask,
    /// Join of the follow-state masks, inherited by child scopes.
    follow_mask: Mask,
    token_from: usize,
    token_to: usize,
    follow_count: usize,
}

impl Scope {
    fn root() -> Scope {
        Scope {
            mask: Mask::empty().match_kind(EventKind::OpenTag),
            follow_mask: Mask::empty(),
            token_from: 0,
            token_to: 0,
            follow_count: 0,
        }
    }
}

/// Runtime activation of one automaton state inside a scope.
#[derive(Debug, Clone, Copy)]
struct PathToken {
    core: StateCore,
    state: u32,
}

/// Evaluator for one document's event stream.
pub struct PathSelector<'a> {
    atm: &'a PathAutomaton,
    caps: Caps,
    scope: Scope,
    stack: Vec<Scope>,
    tokens: Vec<PathToken>,
    follows: Vec<usize>,
    triggers: Vec<u32>,
    /// Matches produced by the current event, in fetch order.
    matches: Vec<u32>,
    /// The previous event opened a tag; its expansions become the child
    /// visibility window at the next event.
    prev_open: bool,
    /// A close event was processed; the pop runs before the next event so
    /// close-tag selections can still fire on the closing scope.
    pending_pop: bool,
}

impl<'a> PathSelector<'a> {
    pub fn new(atm: &'a PathAutomaton, cfg: SelectConfig) -> Result<Self, SelectError> {
        let caps = Caps::derive(&cfg);
        let mut sel = PathSelector {
            atm,
            caps,
            scope: Scope::root(),
            stack: Vec::with_capacity(caps.max_scope_stack),
            tokens: Vec::with_capacity(caps.max_tokens.min(64)),
            follows: Vec::with_capacity(caps.max_follows.min(64)),
            triggers: Vec::with_capacity(caps.max_triggers.min(64)),
            matches: Vec::new(),
            prev_open: false,
            pending_pop: false,
        };
        sel.expand(sel.atm.root())?;
        sel.scope.token_to = sel.tokens.len();
        sel.scope.follow_count = sel.follows.len();
        // Root activations fire before any event arrives.
        Ok(sel)
    }

    /// Event kinds worth copying token bytes for right now; everything
    /// else the scanner may skip.
    pub fn scan_mask(&self) -> EventMask {
        let mut mask = EventMask::NONE
            .with(EventKind::OpenTag)
            .with(EventKind::CloseTag)
            .with(EventKind::CloseTagIm);
        for kind in [
            EventKind::HeaderAttribName,
            EventKind::HeaderAttribValue,
            EventKind::TagAttribName,
            EventKind::TagAttribValue,
            EventKind::Content,
        ] {
            if self.scope.mask.matches(kind) || self.scope.follow_mask.matches(kind) {
                mask = mask.with(kind);
            }
        }
        mask
    }

    /// Feed one event; returns the emitted type ids in fetch order:
    /// scope-local tokens, inherited follows, then triggers LIFO.
    pub fn process_event(&mut self, kind: EventKind, key: &[u8]) -> Result<&[u32], SelectError> {
        self.matches.clear();
        match kind {
            EventKind::Exit => {
                self.do_pending_pop();
                if self.stack.is_empty() {
                    return Ok(&self.matches);
                }
                return Err(SelectError::UnexpectedEndOfInput);
            }
            EventKind::None | EventKind::ErrorOccurred => return Ok(&self.matches),
            _ => {}
        }
        self.init_process_element(kind)?;
        if self.scope.mask.matches(kind) || self.scope.follow_mask.matches(kind) {
            let mut hash = None;
            let mut idx = self.scope.token_from;
            while idx < self.scope.token_to {
                self.match_token(idx, kind, key, &mut hash)?;
                idx += 1;
            }
            for fi in 0..self.scope.follow_count {
                let token = self.follows[fi];
                // Follows still inside the scope-local window were already
                // matched above.
                if token >= self.scope.token_from && token < self.scope.token_to {
                    continue;
                }
                self.match_token(token, kind, key, &mut hash)?;
            }
            while let Some(id) = self.triggers.pop() {
                self.matches.push(id);
            }
        }
        Ok(&self.matches)
    }

    /// Scope bookkeeping ahead of the matching phase.
    fn init_process_element(&mut self, kind: EventKind) -> Result<(), SelectError> {
        self.do_pending_pop();
        if self.prev_open {
            // Children see only the states the open tag expanded.
            self.scope.token_from = self.scope.token_to;
            self.prev_open = false;
        }
        self.scope.token_to = self.tokens.len();
        self.scope.follow_count = self.follows.len();
        match kind {
            EventKind::OpenTag => {
                if self.stack.len() == self.caps.max_scope_stack {
                    return Err(SelectError::ArrayBoundsReadWrite);
                }
                self.stack.push(self.scope);
                self.scope.mask = self.scope.follow_mask;
                self.scope.mask = self.scope.mask.match_kind(EventKind::OpenTag);
                self.prev_open = true;
            }
            EventKind::CloseTag | EventKind::CloseTagIm => {
                self.pending_pop = true;
            }
            _ => {}
        }
        Ok(())
    }

    fn do_pending_pop(&mut self) {
        if !self.pending_pop {
            return;
        }
        self.pending_pop = false;
        match self.stack.pop() {
            Some(scope) => {
                self.scope = scope;
                self.tokens.truncate(self.scope.token_to);
                self.follows.truncate(self.scope.follow_count);
            }
            None => {
                // Unbalanced close; nothing can match below the root.
                self.scope.mask.reset();
            }
        }
    }

    /// Match one token against the current event.
    fn match_token(
        &mut self,
        idx: usize,
        kind: EventKind,
        key: &[u8],
        hash: &mut Option<u32>,
    ) -> Result<(), SelectError> {
        let core = self.tokens[idx].core;
        if core.mask.matches(kind) {
            let state = &self.atm.states()[self.tokens[idx].state as usize];
            let key_ok = match &state.key {
                Some(k) => {
                    let h = *hash.get_or_insert_with(|| key_hash(key));
                    k.hash == h && k.bytes.as_ref() == key
                }
                None => true,
            };
            if key_ok {
                let next = state.next;
                if self.apply_window(idx) {
                    self.expand(next)?;
                    let type_id = self.tokens[idx].core.type_id;
                    if type_id != 0 {
                        self.matches.push(type_id);
                    }
                }
            }
        } else if core.mask.rejects(kind) {
            // An excluded event arrived first; the activation is dead for
            // the rest of its scope.
            self.tokens[idx].core.mask.reset();
        }
        Ok(())
    }

    /// Count one match against the token's window; whether the token may
    /// act (expand and emit) this time.
    fn apply_window(&mut self, idx: usize) -> bool {
        let core = &mut self.tokens[idx].core;
        if core.cnt_end != CNT_UNBOUNDED {
            core.cnt_end -= 1;
            if core.cnt_end == 0 {
                // Window exhausted once this match is done.
                core.cnt_end = CNT_UNBOUNDED;
                core.mask.reset();
            }
        }
        if core.cnt_start > 0 {
            core.cnt_start -= 1;
            return false;
        }
        true
    }

    /// Activate the `link` chain starting at `idx` in the current scope.
    fn expand(&mut self, mut idx: u32) -> Result<(), SelectError> {
        while idx != NIL {
            let st = &self.atm.states()[idx as usize];
            let core = st.core;
            let link = st.link;
            self.scope.mask.join(&core.mask);
            if core.mask.is_empty() && core.type_id != 0 {
                if self.triggers.len() == self.caps.max_triggers {
                    return Err(SelectError::ArrayBoundsReadWrite);
                }
                self.triggers.push(core.type_id);
            }
            if core.follow {
                self.scope.follow_mask.join(&core.mask);
                if self.follows.len() == self.caps.max_follows {
                    return Err(SelectError::ArrayBoundsReadWrite);
                }
                self.follows.push(self.tokens.len());
            }
            if self.tokens.len() == self.caps.max_tokens {
                return Err(SelectError::ArrayBoundsReadWrite);
            }
            self.tokens.push(PathToken { core, state: idx });
            idx = link;
        }
        Ok(())
    }
}

/// One emitted match; the content borrows the scanner's output buffer and
/// is valid until the next fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathMatch<'b> {
    pub type_id: u32,
    pub content: &'b [u8],
}

/// One step of match fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'b> {
    /// A path expression fired.
    Match(PathMatch<'b>),
    /// The document finished cleanly.
    End,
    /// The source is drained mid-document; feed the next chunk.
    Suspended,
}

/// A selector paired with its scanner for the document's lifetime.
pub struct XmlPathSelect<'a, S, IC = Utf8, OC = Utf8> {
    scanner: XmlScanner<S, IC, OC>,
    selector: PathSelector<'a>,
    pending: Vec<u32>,
    pos: usize,
}

impl<'a, S: ByteSource, IC: CharsetCodec, OC: CharsetCodec> XmlPathSelect<'a, S, IC, OC> {
    pub fn new(
        atm: &'a PathAutomaton,
        scanner: XmlScanner<S, IC, OC>,
        cfg: SelectConfig,
    ) -> Result<Self, SelectError> {
        Ok(XmlPathSelect {
            scanner,
            selector: PathSelector::new(atm, cfg)?,
            pending: Vec::new(),
            pos: 0,
        })
    }

    /// The underlying scanner, e.g. to feed the next chunk after a
    /// [`Step::Suspended`].
    pub fn scanner_mut(&mut self) -> &mut XmlScanner<S, IC, OC> {
        &mut self.scanner
    }

    /// Fetch the next match, pulling scanner events as needed.
    pub fn next_match(&mut self) -> Result<Step<'_>, SelectError> {
        loop {
            if self.pos < self.pending.len() {
                let type_id = self.pending[self.pos];
                self.pos += 1;
                return Ok(Step::Match(PathMatch {
                    type_id,
                    content: self.scanner.content(),
                }));
            }
            let mask = self.selector.scan_mask();
            let ev = match self.scanner.next_event(mask) {
                Ok(ev) => ev,
                Err(EndOfChunk) => return Ok(Step::Suspended),
            };
            match ev.kind {
                EventKind::ErrorOccurred => {
                    let e = self.scanner.get_error().unwrap_or(ScanError::Internal);
                    return Err(SelectError::Scan(e));
                }
                EventKind::Exit => {
                    self.selector.process_event(EventKind::Exit, b"")?;
                    return Ok(Step::End);
                }
                kind => {
                    let ids = self.selector.process_event(kind, ev.content)?;
                    self.pending.clear();
                    self.pending.extend_from_slice(ids);
                    self.pos = 0;
                }
            }
        }
    }
}
