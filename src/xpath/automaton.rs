//! The path-selection automaton.
//!
//! A compiled set of path expressions is a flat vector of [`PathState`]
//! records linked by indices: `next` continues the expression one step
//! deeper, `link` chains the alternatives competing at the same position.
//! The automaton is built once, then shared read-only by any number of
//! selectors.

use crate::core::event::EventKind;
use crate::error::BuildError;

/// Index sentinel for "no state".
pub const NIL: u32 = u32::MAX;

/// Unbounded end of a match-count window.
pub const CNT_UNBOUNDED: u32 = u32::MAX;

/// Must-match and reject sets over [`EventKind`] bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mask {
    pos: u16,
    neg: u16,
}

impl Mask {
    pub const fn empty() -> Mask {
        Mask { pos: 0, neg: 0 }
    }

    #[inline]
    pub fn match_kind(mut self, kind: EventKind) -> Mask {
        self.pos |= kind.bit();
        self
    }

    #[inline]
    pub fn reject_kind(mut self, kind: EventKind) -> Mask {
        self.neg |= kind.bit();
        self
    }

    #[inline]
    pub fn matches(&self, kind: EventKind) -> bool {
        self.pos & kind.bit() != 0
    }

    #[inline]
    pub fn rejects(&self, kind: EventKind) -> bool {
        self.neg & kind.bit() != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Join another mask's must-match set into this one.
    #[inline]
    pub fn join(&mut self, other: &Mask) {
        self.pos |= other.pos;
    }

    /// Clear the must-match set; the owner never fires again.
    #[inline]
    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

/// The per-activation copy of a state: mask, emit id and count window.
#[derive(Debug, Clone, Copy)]
pub struct StateCore {
    pub mask: Mask,
    pub follow: bool,
    /// Emit type id; 0 = no output.
    pub type_id: u32,
    /// Matches still to skip before emitting.
    pub cnt_start: u32,
    /// Matches left in the window; [`CNT_UNBOUNDED`] = no limit.
    pub cnt_end: u32,
}

impl StateCore {
    fn new(mask: Mask, follow: bool) -> StateCore {
        StateCore {
            mask,
            follow,
            type_id: 0,
            cnt_start: 0,
            cnt_end: CNT_UNBOUNDED,
        }
    }
}

/// Key bytes with their precomputed 31-bit hash.
#[derive(Debug, Clone)]
pub struct StateKey {
    pub bytes: Box<[u8]>,
    pub hash: u32,
}

/// One node of the automaton.
#[derive(Debug, Clone)]
pub struct PathState {
    pub core: StateCore,
    pub key: Option<StateKey>,
    /// Matched branch: the expression continues here.
    pub next: u32,
    /// Alternative branch at the same position.
    pub link: u32,
}

impl PathState {
    fn same_transition(&self, mask: &Mask, key: Option<&[u8]>, follow: bool) -> bool {
        self.core.mask == *mask
            && self.core.follow == follow
            && match (&self.key, key) {
                (None, None) => true,
                (Some(a), Some(b)) => a.bytes.as_ref() == b,
                _ => false,
            }
    }
}

/// CRC-32 (reflected, polynomial 0xEDB88320) folded to 31 bits.
pub fn key_hash(bytes: &[u8]) -> u32 {
    const TABLE: [u32; 256] = build_crc_table();
    let mut crc = 0xFFFF_FFFFu32;
    for &b in bytes {
        crc = (crc >> 8) ^ TABLE[((crc ^ b as u32) & 0xFF) as usize];
    }
    !crc & 0x7FFF_FFFF
}

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

fn tag_mask() -> Mask {
    Mask::empty().match_kind(EventKind::OpenTag)
}

fn attribute_mask() -> Mask {
    Mask::empty()
        .match_kind(EventKind::TagAttribName)
        .match_kind(EventKind::HeaderAttribName)
        .reject_kind(EventKind::Content)
}

fn attribute_value_mask() -> Mask {
    Mask::empty()
        .match_kind(EventKind::TagAttribValue)
        .match_kind(EventKind::HeaderAttribValue)
        .reject_kind(EventKind::TagAttribName)
        .reject_kind(EventKind::HeaderAttribName)
        .reject_kind(EventKind::Content)
        .reject_kind(EventKind::OpenTag)
}

fn content_mask() -> Mask {
    Mask::empty().match_kind(EventKind::Content)
}

fn close_tag_mask() -> Mask {
    Mask::empty()
        .match_kind(EventKind::CloseTag)
        .match_kind(EventKind::CloseTagIm)
}

/// Builder cursor: the state whose `next` chain the expression extends.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExprCursor {
    at: u32,
    follow_next: bool,
}

impl ExprCursor {
    fn root() -> ExprCursor {
        ExprCursor {
            at: NIL,
            follow_next: false,
        }
    }
}

/// Compiled path-expression set.
#[derive(Debug, Default)]
pub struct PathAutomaton {
    states: Vec<PathState>,
}

impl PathAutomaton {
    pub fn new() -> Self {
        PathAutomaton { states: Vec::new() }
    }

    pub(crate) fn states(&self) -> &[PathState] {
        &self.states
    }

    /// Head of the root chain, or `NIL` for an empty automaton.
    pub(crate) fn root(&self) -> u32 {
        if self.states.is_empty() {
            NIL
        } else {
            0
        }
    }

    /// Open a fluent expression builder.
    pub fn expr(&mut self) -> PathExpr<'_> {
        PathExpr {
            atm: self,
            cursors: vec![ExprCursor::root()],
            err: None,
        }
    }

    fn push_state(&mut self, mask: Mask, key: Option<&[u8]>, follow: bool) -> Result<u32, BuildError> {
        self.states
            .try_reserve(1)
            .map_err(|_| BuildError::OutOfMem)?;
        let idx = self.states.len() as u32;
        self.states.push(PathState {
            core: StateCore::new(mask, follow),
            key: key.map(|k| StateKey {
                bytes: k.to_vec().into_boxed_slice(),
                hash: key_hash(k),
            }),
            next: NIL,
            link: NIL,
        });
        Ok(idx)
    }

    /// Append (or reuse) the `(mask, key, follow)` transition below `from`
    /// (`NIL` = the root chain), returning the reached state.
    fn define_next(
        &mut self,
        from: u32,
        mask: Mask,
        key: Option<&[u8]>,
        follow: bool,
    ) -> Result<u32, BuildError> {
        let head = if from == NIL {
            self.root()
        } else {
            self.states[from as usize].next
        };
        if head == NIL {
            let idx = self.push_state(mask, key, follow)?;
            if from != NIL {
                self.states[from as usize].next = idx;
            }
            return Ok(idx);
        }
        let mut at = head;
        loop {
            if self.states[at as usize].same_transition(&mask, key, follow) {
                return Ok(at);
            }
            let link = self.states[at as usize].link;
            if link == NIL {
                let idx = self.push_state(mask, key, follow)?;
                self.states[at as usize].link = idx;
                return Ok(idx);
            }
            at = link;
        }
    }

    /// Attach an output below `from` as a mask-less trigger state.
    fn define_output(&mut self, from: u32, type_id: u32) -> Result<(), BuildError> {
        let head = if from == NIL {
            self.root()
        } else {
            self.states[from as usize].next
        };
        let mut attach_to = from;
        let mut at = head;
        while at != NIL {
            let st = &self.states[at as usize];
            if st.core.mask.is_empty() && st.key.is_none() && st.core.type_id == 0 {
                self.states[at as usize].core.type_id = type_id;
                return Ok(());
            }
            attach_to = at;
            at = st.link;
        }
        let idx = self.push_state(Mask::empty(), None, false)?;
        if attach_to == NIL {
            // Empty automaton: the new state became the root chain head.
        } else if attach_to == from {
            self.states[from as usize].next = idx;
        } else {
            self.states[attach_to as usize].link = idx;
        }
        self.states[idx as usize].core.type_id = type_id;
        Ok(())
    }

    /// Install a match-count window on the cursor state.
    fn set_window(&mut self, cur: ExprCursor, start: u32, end: u32) {
        if cur.at != NIL {
            let core = &mut self.states[cur.at as usize].core;
            core.cnt_start = start;
            core.cnt_end = end;
        }
    }

    fn step(
        &mut self,
        cur: ExprCursor,
        mask: Mask,
        key: Option<&[u8]>,
    ) -> Result<ExprCursor, BuildError> {
        let at = self.define_next(cur.at, mask, key, cur.follow_next)?;
        Ok(ExprCursor {
            at,
            follow_next: false,
        })
    }

    /// Assign the emit id to the cursor's terminal state; a conflicting
    /// assignment (two expressions sharing the identical path) goes to a
    /// separate trigger state instead.
    fn finish(&mut self, cur: ExprCursor, type_id: u32) -> Result<(), BuildError> {
        if cur.at != NIL {
            let existing = self.states[cur.at as usize].core.type_id;
            if existing == 0 || existing == type_id {
                self.states[cur.at as usize].core.type_id = type_id;
                return Ok(());
            }
        }
        self.define_output(cur.at, type_id)
    }
}

/// Fluent builder for one path expression.
///
/// Steps latch the first build error; [`assign_type`](PathExpr::assign_type)
/// finalizes the expression and surfaces it.
pub struct PathExpr<'a> {
    atm: &'a mut PathAutomaton,
    cursors: Vec<ExprCursor>,
    err: Option<BuildError>,
}

impl PathExpr<'_> {
    fn apply(mut self, mask: Mask, key: Option<&[u8]>) -> Self {
        if self.err.is_some() {
            return self;
        }
        for cur in self.cursors.iter_mut() {
            match self.atm.step(*cur, mask, key) {
                Ok(c) => *cur = c,
                Err(e) => {
                    self.err = Some(e);
                    break;
                }
            }
        }
        self
    }

    /// Expand the cursor set over a list of alternative keys, the
    /// compiled form of `/{a,b,c}`.
    fn apply_alt(mut self, mask: Mask, keys: &[&[u8]]) -> Self {
        if self.err.is_some() {
            return self;
        }
        let mut expanded = Vec::with_capacity(self.cursors.len() * keys.len());
        'outer: for &key in keys {
            for cur in self.cursors.iter() {
                match self.atm.step(*cur, mask, Some(key)) {
                    Ok(c) => expanded.push(c),
                    Err(e) => {
                        self.err = Some(e);
                        break 'outer;
                    }
                }
            }
        }
        if self.err.is_none() {
            self.cursors = expanded;
        }
        self
    }

    /// Child element selection, `/name`.
    pub fn select_tag(self, name: &[u8]) -> Self {
        self.apply(tag_mask(), Some(name))
    }

    /// Any child element, `/*`.
    pub fn select_any_tag(self) -> Self {
        self.apply(tag_mask(), None)
    }

    /// Alternative child elements, `/{a,b,c}`.
    pub fn select_tag_alt(self, names: &[&[u8]]) -> Self {
        self.apply_alt(tag_mask(), names)
    }

    /// Attribute selection, `/@name`.
    pub fn select_attribute(self, name: &[u8]) -> Self {
        self.apply(attribute_mask(), Some(name))
    }

    /// Any attribute, `/@*`.
    pub fn select_any_attribute(self) -> Self {
        self.apply(attribute_mask(), None)
    }

    /// Alternative attributes, `/@{a,b}`.
    pub fn select_attribute_alt(self, names: &[&[u8]]) -> Self {
        self.apply_alt(attribute_mask(), names)
    }

    /// Attribute predicate, `[@name='value']`.
    pub fn if_attribute(self, name: &[u8], value: &[u8]) -> Self {
        self.select_attribute(name)
            .apply(attribute_value_mask(), Some(value))
    }

    /// Predicate on any attribute carrying `value`.
    pub fn if_any_attribute(self, value: &[u8]) -> Self {
        self.select_any_attribute()
            .apply(attribute_value_mask(), Some(value))
    }

    /// Textual content of the current context, `()`.
    pub fn select_content(self) -> Self {
        self.apply(content_mask(), None)
    }

    /// Close-tag selection, `~`.
    pub fn select_close_tag(self) -> Self {
        self.apply(close_tag_mask(), None)
    }

    /// Descendant selection, `//`: the next step matches at any depth.
    pub fn for_all_descendants(mut self) -> Self {
        for cur in self.cursors.iter_mut() {
            cur.follow_next = true;
        }
        self
    }

    /// Positional filter `[n]` (1-based): only the n-th match of the
    /// preceding step counts.
    pub fn index(self, n: u32) -> Self {
        let n = n.max(1);
        self.range(n, n)
    }

    /// Positional filter `[n,m]`.
    pub fn range(self, from: u32, to: u32) -> Self {
        for cur in &self.cursors {
            self.atm.set_window(*cur, from.max(1) - 1, to);
        }
        self
    }

    /// Positional filter `[n,]`.
    pub fn from_index(self, from: u32) -> Self {
        for cur in &self.cursors {
            self.atm.set_window(*cur, from.max(1) - 1, CNT_UNBOUNDED);
        }
        self
    }

    /// Keep only the first `m` matches of the preceding step.
    pub fn to_index(self, to: u32) -> Self {
        for cur in &self.cursors {
            self.atm.set_window(*cur, 0, to);
        }
        self
    }

    /// Finalize the expression with its emit type id.
    pub fn assign_type(self, type_id: u32) -> Result<(), BuildError> {
        if let Some(e) = self.err {
            return Err(e);
        }
        for cur in &self.cursors {
            self.atm.finish(*cur, type_id)?;
        }
        Ok(())
    }
}
