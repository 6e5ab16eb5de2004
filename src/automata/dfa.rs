//! Deterministic finite automaton with a multi-pattern text scanner.
//!
//! State 0 is always the unique start state. Once built the DFA is never
//! mutated; [`Dfa::search`] takes `&self`, so one automaton can serve any
//! number of concurrent scans.
//!
//! ## Search semantics
//!
//! The text is conceptually bracketed with one space on each end so patterns
//! anchored by word-boundary transitions can match at the true start and end.
//! Candidate start offsets are visited in increasing order; an offset that
//! falls strictly before the end of the previously reported match is skipped,
//! so no two reported matches overlap at their start positions. From each
//! candidate the scanner runs a depth-first walk with an explicit
//! (state, position) stack. A literal symbol transition is pushed after the
//! word-boundary transition, so it is explored first; that ordering is what
//! makes a longer compound label win over the shorter label it contains.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A single DFA state.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct State<A> {
    /// Deterministic transition per character.
    pub(crate) symbol_transitions: FxHashMap<char, usize>,
    /// Taken when the current character is not alphanumeric.
    pub(crate) word_boundary_transition: Option<usize>,
    /// Acceptance labels attached to this state.
    pub(crate) accepts: SmallVec<[A; 1]>,
}

impl<A> State<A> {
    fn new() -> Self {
        State {
            symbol_transitions: FxHashMap::default(),
            word_boundary_transition: None,
            accepts: SmallVec::new(),
        }
    }
}

/// A deterministic automaton produced by subset construction.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Dfa<A> {
    pub(crate) states: Vec<State<A>>,
}

/// One reported occurrence of a label in the scanned text.
///
/// `start` and `end` are 0-indexed character offsets against the original,
/// unbracketed input; `end` is exclusive. `text` is the matched substring
/// exactly as it appears in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'d, 't, A> {
    /// The acceptance label of the pattern that matched.
    pub accept: &'d A,
    /// The matched substring.
    pub text: &'t str,
    /// Character offset of the first matched character.
    pub start: usize,
    /// Character offset one past the last matched character.
    pub end: usize,
}

/// Error raised while reconstructing a [`Dfa`] from its structural form.
///
/// Fatal: a partially decoded automaton is never returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReprError {
    /// The caller-supplied decode function could not resolve a serialized
    /// acceptance label.
    UnknownAcceptance(String),
    /// A transition points past the end of the state array.
    TargetOutOfRange { state: usize, target: usize },
}

impl fmt::Display for ReprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReprError::UnknownAcceptance(label) => {
                write!(f, "unknown acceptance label: {}", label)
            }
            ReprError::TargetOutOfRange { state, target } => {
                write!(f, "state {} has a transition to missing state {}", state, target)
            }
        }
    }
}

impl std::error::Error for ReprError {}

/// Structural form of one DFA state, with acceptance labels already encoded
/// by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRepr<S> {
    pub symbol_transitions: BTreeMap<char, usize>,
    pub word_boundary_transition: Option<usize>,
    pub accepts: Vec<S>,
}

/// Structural form of a whole DFA: one record per state, state 0 first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DfaRepr<S> {
    pub states: Vec<StateRepr<S>>,
}

impl<A> Dfa<A> {
    pub fn new() -> Self {
        Dfa { states: Vec::new() }
    }

    /// Number of states.
    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Creates a new state and returns its index.
    pub fn add_state(&mut self) -> usize {
        let idx = self.states.len();
        self.states.push(State::new());
        idx
    }

    /// Attaches acceptance labels to a state.
    pub fn add_acceptances<I: IntoIterator<Item = A>>(&mut self, idx: usize, accepts: I) {
        self.states[idx].accepts.extend(accepts);
    }

    /// Sets the transition taken from `start_idx` on `symbol`.
    pub fn set_symbol_transition(&mut self, start_idx: usize, end_idx: usize, symbol: char) {
        self.states[start_idx].symbol_transitions.insert(symbol, end_idx);
    }

    /// Sets the transition taken from `start_idx` on any non-alphanumeric
    /// character.
    pub fn set_word_boundary_transition(&mut self, start_idx: usize, end_idx: usize) {
        self.states[start_idx].word_boundary_transition = Some(end_idx);
    }

    /// Scans `text` and lazily yields every match.
    ///
    /// Never fails: characters without a transition simply end the current
    /// walk, and a text without occurrences yields an empty iterator. The
    /// returned iterator borrows the DFA and the text; calling `search` again
    /// restarts from the beginning.
    pub fn search<'d, 't>(&'d self, text: &'t str) -> Matches<'d, 't, A> {
        Matches {
            dfa: self,
            text,
            chars: text.char_indices().collect(),
            next_start: 0,
            last_match_end: 0,
            current_start: 0,
            stack: Vec::new(),
            pending: None,
        }
    }

    /// Converts the DFA into its structural form, encoding every acceptance
    /// label through `encode`.
    pub fn to_repr<S>(&self, mut encode: impl FnMut(&A) -> S) -> DfaRepr<S> {
        DfaRepr {
            states: self
                .states
                .iter()
                .map(|state| StateRepr {
                    symbol_transitions: state
                        .symbol_transitions
                        .iter()
                        .map(|(&symbol, &target)| (symbol, target))
                        .collect(),
                    word_boundary_transition: state.word_boundary_transition,
                    accepts: state.accepts.iter().map(&mut encode).collect(),
                })
                .collect(),
        }
    }

    /// Reconstructs a DFA from its structural form, resolving every encoded
    /// acceptance label through `decode`.
    ///
    /// Fails if `decode` cannot resolve a label or if any transition points
    /// out of range; no partially decoded automaton is ever returned.
    pub fn from_repr<S>(
        repr: DfaRepr<S>,
        mut decode: impl FnMut(S) -> Result<A, ReprError>,
    ) -> Result<Self, ReprError> {
        let state_count = repr.states.len();
        let check = |state: usize, target: usize| {
            if target < state_count {
                Ok(target)
            } else {
                Err(ReprError::TargetOutOfRange { state, target })
            }
        };
        let mut states = Vec::with_capacity(state_count);
        for (idx, record) in repr.states.into_iter().enumerate() {
            let mut symbol_transitions = FxHashMap::default();
            for (symbol, target) in record.symbol_transitions {
                symbol_transitions.insert(symbol, check(idx, target)?);
            }
            let word_boundary_transition = record
                .word_boundary_transition
                .map(|target| check(idx, target))
                .transpose()?;
            let mut accepts = SmallVec::new();
            for encoded in record.accepts {
                accepts.push(decode(encoded)?);
            }
            states.push(State {
                symbol_transitions,
                word_boundary_transition,
                accepts,
            });
        }
        Ok(Dfa { states })
    }
}

/// Lazy iterator over the matches of a scan, returned by [`Dfa::search`].
pub struct Matches<'d, 't, A> {
    dfa: &'d Dfa<A>,
    text: &'t str,
    /// Byte offset and value of every character in the original text.
    chars: Vec<(usize, char)>,
    /// Next candidate start offset in the bracketed text.
    next_start: usize,
    /// End offset of the previously reported match; starts before it are
    /// skipped.
    last_match_end: usize,
    /// Start offset the current walk was launched from.
    current_start: usize,
    /// Depth-first (state, position) stack for the current start offset.
    stack: Vec<(usize, usize)>,
    /// Acceptance labels still to be emitted for the last accepting state.
    pending: Option<Pending>,
}

struct Pending {
    state_idx: usize,
    accept_idx: usize,
    start: usize,
    end: usize,
}

impl<'d, 't, A> Matches<'d, 't, A> {
    /// Character at a position in the bracketed text, where positions 0 and
    /// `chars.len() + 1` are the boundary sentinels.
    #[inline]
    fn bracketed_char(&self, position: usize) -> Option<char> {
        if position == 0 || position == self.chars.len() + 1 {
            Some(' ')
        } else {
            self.chars.get(position - 1).map(|&(_, c)| c)
        }
    }

    /// Byte offset of a character offset into the original text.
    #[inline]
    fn byte_offset(&self, char_offset: usize) -> usize {
        match self.chars.get(char_offset) {
            Some(&(byte, _)) => byte,
            None => self.text.len(),
        }
    }
}

impl<'d, 't, A> Iterator for Matches<'d, 't, A> {
    type Item = Match<'d, 't, A>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(pending) = &self.pending {
                let (state_idx, accept_idx, start, end) = (
                    pending.state_idx,
                    pending.accept_idx,
                    pending.start,
                    pending.end,
                );
                let accepts = &self.dfa.states[state_idx].accepts;
                if accept_idx < accepts.len() {
                    let item = Match {
                        accept: &accepts[accept_idx],
                        text: &self.text[self.byte_offset(start)..self.byte_offset(end)],
                        start,
                        end,
                    };
                    if let Some(pending) = &mut self.pending {
                        pending.accept_idx += 1;
                    }
                    return Some(item);
                }
                self.pending = None;
            }
            if let Some((state_idx, position)) = self.stack.pop() {
                let state = &self.dfa.states[state_idx];
                if !state.accepts.is_empty() {
                    // Greedy: report this acceptance and abandon the rest of
                    // the walk from this start offset. Positions are measured
                    // past the trailing boundary character, hence the
                    // two-step adjustment back into text coordinates.
                    let end = position.saturating_sub(2);
                    self.last_match_end = end;
                    self.pending = Some(Pending {
                        state_idx,
                        accept_idx: 0,
                        start: self.current_start,
                        end,
                    });
                    self.stack.clear();
                    continue;
                }
                let Some(symbol) = self.bracketed_char(position) else {
                    continue;
                };
                // The symbol transition is pushed last so the depth-first walk
                // prefers literal continuation over boundary acceptance.
                if !symbol.is_alphanumeric() {
                    if let Some(target) = state.word_boundary_transition {
                        self.stack.push((target, position + 1));
                    }
                }
                if let Some(&target) = state.symbol_transitions.get(&symbol) {
                    self.stack.push((target, position + 1));
                }
                continue;
            }
            // Advance to the next candidate start offset.
            loop {
                if self.next_start >= self.chars.len() + 2 || self.dfa.is_empty() {
                    return None;
                }
                let start = self.next_start;
                self.next_start += 1;
                if start < self.last_match_end {
                    continue;
                }
                self.current_start = start;
                self.stack.push((0, start));
                break;
            }
        }
    }
}
