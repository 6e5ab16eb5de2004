//! Compiles label patterns into a shared NFA.
//!
//! The pattern language covers literal characters, `(`/`)` groups, `|`
//! alternation, `?` optional, `*` Kleene star, and `\` escapes. There are no
//! character classes, backreferences, or counted repetitions. Every pattern is
//! anchored by word-boundary transitions on both ends, so labels only match as
//! whole words.
//!
//! Each compilation appends to a caller-supplied [`Nfa`], so any number of
//! patterns can share one automaton. The compiler keeps no parse tree; nested
//! groups and alternations are tracked with a handful of stacks that mirror
//! the nesting structure of the pattern.

use std::fmt;

use smallvec::{smallvec, SmallVec};

use super::nfa::Nfa;

/// Error raised when a pattern is malformed.
///
/// Recovered per label: callers are expected to skip the offending label and
/// keep compiling the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// A `)` without a matching `(`. The position is a character offset into
    /// the pattern.
    UnbalancedCloseGroup { position: usize },
    /// One or more `(` were never closed.
    UnclosedGroup { open_groups: usize },
    /// The pattern ends in a bare `\`.
    TrailingEscape,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::UnbalancedCloseGroup { position } => {
                write!(f, "unbalanced ')' at offset {}", position)
            }
            PatternError::UnclosedGroup { open_groups } => {
                write!(f, "{} unclosed '(' at end of pattern", open_groups)
            }
            PatternError::TrailingEscape => write!(f, "pattern ends in a bare escape"),
        }
    }
}

impl std::error::Error for PatternError {}

/// Frontier and anchor sets are almost always a single state.
type StateSet = SmallVec<[usize; 4]>;

/// Compiles one pattern into `graph`, attaching `accept` to every accepting
/// state created for it.
///
/// On success the pattern's start state is registered on the NFA's start list.
/// On error the graph may contain orphan states, but none of them are
/// reachable from a registered start, so matching behavior is unaffected and
/// the caller can simply skip the label.
pub fn add_pattern<A: Clone>(
    graph: &mut Nfa<A>,
    expression: &str,
    accept: A,
) -> Result<(), PatternError> {
    ConstructionState::new(graph, accept).construct(expression)
}

/// Transient per-pattern compiler state.
struct ConstructionState<'g, A> {
    graph: &'g mut Nfa<A>,
    accept: A,
    /// The unregistered start state; added to the NFA's start list on success.
    start: usize,
    /// States that new transitions attach from.
    frontier: StateSet,
    /// Per-nesting-level anchor states, used by `?` and `*` to know where the
    /// preceding atom began.
    anchors: Vec<StateSet>,
    /// Per-nesting-level branch origin, from which every `|` branch forks.
    branch_origins: Vec<usize>,
    /// Pending branch-exit frontiers awaiting merge at group close or pattern
    /// end.
    danglings: Vec<StateSet>,
    escape_next: bool,
}

impl<'g, A: Clone> ConstructionState<'g, A> {
    fn new(graph: &'g mut Nfa<A>, accept: A) -> Self {
        let start = graph.add_state();
        let origin = graph.add_state();
        graph.add_word_boundary_transition(start, origin);
        let branch = graph.add_state();
        graph.add_empty_transition(origin, branch);
        ConstructionState {
            graph,
            accept,
            start,
            frontier: smallvec![branch],
            anchors: vec![smallvec![origin], smallvec![branch]],
            branch_origins: vec![origin],
            danglings: Vec::new(),
            escape_next: false,
        }
    }

    fn construct(mut self, expression: &str) -> Result<(), PatternError> {
        for (position, symbol) in expression.chars().enumerate() {
            self.perform_step(position, symbol)?;
        }
        if self.escape_next {
            return Err(PatternError::TrailingEscape);
        }
        if self.branch_origins.len() > 1 {
            return Err(PatternError::UnclosedGroup {
                open_groups: self.branch_origins.len() - 1,
            });
        }
        let mut ends = self.frontier;
        if let Some(danglings) = self.danglings.pop() {
            ends.extend(danglings);
        }
        for end_idx in ends {
            let acceptance_idx = self.graph.add_state();
            self.graph.add_acceptance(acceptance_idx, self.accept.clone());
            self.graph
                .add_word_boundary_transition(end_idx, acceptance_idx);
        }
        self.graph.add_start(self.start);
        Ok(())
    }

    fn perform_step(&mut self, position: usize, symbol: char) -> Result<(), PatternError> {
        if self.escape_next {
            self.escape_next = false;
            self.process_symbol(symbol);
            return Ok(());
        }
        match symbol {
            '(' => self.process_opening_brace(),
            ')' => self.process_closing_brace(position)?,
            '?' => self.process_optional(),
            '*' => self.process_kleene_closure(),
            '\\' => self.escape_next = true,
            '|' => self.process_alternation(),
            _ => self.process_symbol(symbol),
        }
        Ok(())
    }

    fn process_symbol(&mut self, symbol: char) {
        let new_state_idx = self.graph.add_state();
        for &state_idx in &self.frontier {
            self.graph
                .add_symbol_transition(state_idx, new_state_idx, symbol);
        }
        *self.anchors.last_mut().expect("anchor stack is never empty") =
            std::mem::replace(&mut self.frontier, smallvec![new_state_idx]);
    }

    fn process_opening_brace(&mut self) {
        let new_state_idx = self.graph.add_state();
        for &state_idx in &self.frontier {
            self.graph.add_empty_transition(state_idx, new_state_idx);
        }
        *self.anchors.last_mut().expect("anchor stack is never empty") = self.frontier.clone();
        self.anchors.push(smallvec![new_state_idx]);
        self.branch_origins.push(new_state_idx);
        self.danglings.push(StateSet::new());
        self.frontier = smallvec![new_state_idx];
    }

    fn process_closing_brace(&mut self, position: usize) -> Result<(), PatternError> {
        if self.branch_origins.len() == 1 {
            return Err(PatternError::UnbalancedCloseGroup { position });
        }
        let danglings = self
            .danglings
            .pop()
            .expect("every group open pushes a dangling frame");
        self.frontier.extend(danglings);
        self.anchors.pop();
        self.branch_origins.pop();
        Ok(())
    }

    fn process_alternation(&mut self) {
        let finished_branch = std::mem::take(&mut self.frontier);
        match self.danglings.last_mut() {
            Some(frame) => frame.extend(finished_branch),
            None => self.danglings.push(finished_branch),
        }
        let origin = *self
            .branch_origins
            .last()
            .expect("branch origin stack is never empty");
        let branch = self.graph.add_state();
        self.graph.add_empty_transition(origin, branch);
        self.frontier = smallvec![branch];
        *self.anchors.last_mut().expect("anchor stack is never empty") = smallvec![branch];
    }

    fn process_optional(&mut self) {
        let anchors = self.anchors.last().expect("anchor stack is never empty");
        for &before_idx in anchors {
            for &state_idx in &self.frontier {
                self.graph.add_empty_transition(before_idx, state_idx);
            }
        }
    }

    fn process_kleene_closure(&mut self) {
        let anchors = self
            .anchors
            .last()
            .expect("anchor stack is never empty")
            .clone();
        let bypass_idx = self.graph.add_state();
        for &state_idx in &self.frontier {
            for &before_idx in &anchors {
                self.graph.add_empty_transition(state_idx, before_idx);
            }
            self.graph.add_empty_transition(state_idx, bypass_idx);
        }
        for &before_idx in &anchors {
            self.graph.add_empty_transition(before_idx, bypass_idx);
        }
        self.frontier = smallvec![bypass_idx];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCEPT: &str = "Acceptance!";

    #[test]
    fn test_plain_pattern_graph_shape() {
        let mut graph = Nfa::new();
        add_pattern(&mut graph, "ab", ACCEPT).unwrap();
        // 0 start, 1 origin, 2 branch, 3 after-a, 4 after-b, 5 acceptance.
        assert_eq!(graph.len(), 6);
        assert_eq!(graph.starts, vec![0]);
        assert!(graph.states[0].word_boundary_transitions.contains(&1));
        assert!(graph.states[1].empty_transitions.contains(&2));
        assert!(graph.states[2].symbol_transitions[&'a'].contains(&3));
        assert!(graph.states[3].symbol_transitions[&'b'].contains(&4));
        assert!(graph.states[4].word_boundary_transitions.contains(&5));
        assert_eq!(graph.states[5].accepts.as_slice(), [ACCEPT]);
    }

    #[test]
    fn test_adds_acceptance_per_alternation_branch() {
        let mut graph = Nfa::new();
        add_pattern(&mut graph, "a|b", ACCEPT).unwrap();
        assert_eq!(graph.starts, vec![0]);
        // Branch ends 5 ('b') and 3 ('a') each get their own acceptance state.
        assert_eq!(graph.states[7].accepts.as_slice(), [ACCEPT]);
        assert_eq!(graph.states[6].accepts.as_slice(), [ACCEPT]);
        assert!(graph.states[3].word_boundary_transitions.contains(&7));
        assert!(graph.states[5].word_boundary_transitions.contains(&6));
        assert!(graph.states[1].word_boundary_transitions.is_empty());
        // Each branch forks from the origin through its own epsilon edge.
        assert_eq!(
            graph.states[1].empty_transitions,
            [2, 4].into_iter().collect()
        );
    }

    #[test]
    fn test_handles_multiple_alternations() {
        let mut graph = Nfa::new();
        add_pattern(&mut graph, "a|b|c", ACCEPT).unwrap();
        assert_eq!(graph.starts, vec![0]);
        let accepting = graph
            .states
            .iter()
            .filter(|s| !s.accepts.is_empty())
            .count();
        assert_eq!(accepting, 3);
    }

    #[test]
    fn test_escaped_metacharacter_is_a_literal() {
        let mut graph = Nfa::new();
        add_pattern(&mut graph, "\\?", ACCEPT).unwrap();
        assert!(graph.states[2].symbol_transitions[&'?'].contains(&3));
    }

    #[test]
    fn test_escaped_backslash_is_a_literal() {
        let mut graph = Nfa::new();
        add_pattern(&mut graph, "\\\\", ACCEPT).unwrap();
        assert!(graph.states[2].symbol_transitions[&'\\'].contains(&3));
    }

    #[test]
    fn test_group_open_isolates_nesting_level() {
        let mut graph = Nfa::new();
        add_pattern(&mut graph, "a(b)", ACCEPT).unwrap();
        // After-a state 3 reaches the group state 4 via epsilon.
        assert!(graph.states[3].empty_transitions.contains(&4));
        assert!(graph.states[4].symbol_transitions[&'b'].contains(&5));
    }

    #[test]
    fn test_optional_skips_preceding_atom() {
        let mut graph = Nfa::new();
        add_pattern(&mut graph, "ab?", ACCEPT).unwrap();
        // Anchor after 'a' is state 3; 'b' target is state 4.
        assert!(graph.states[3].empty_transitions.contains(&4));
    }

    #[test]
    fn test_kleene_builds_loop_and_bypass() {
        let mut graph = Nfa::new();
        add_pattern(&mut graph, "a*", ACCEPT).unwrap();
        // 2 branch, 3 after-a, 4 bypass.
        assert!(graph.states[3].empty_transitions.contains(&2));
        assert!(graph.states[3].empty_transitions.contains(&4));
        assert!(graph.states[2].empty_transitions.contains(&4));
        // The bypass carries the acceptance boundary.
        assert!(graph.states[4].word_boundary_transitions.contains(&5));
        assert_eq!(graph.states[5].accepts.as_slice(), [ACCEPT]);
    }

    #[test]
    fn test_unbalanced_close_group() {
        let mut graph = Nfa::new();
        assert_eq!(
            add_pattern(&mut graph, "ab)", ACCEPT),
            Err(PatternError::UnbalancedCloseGroup { position: 2 })
        );
    }

    #[test]
    fn test_unclosed_group() {
        let mut graph = Nfa::new();
        assert_eq!(
            add_pattern(&mut graph, "a(b(c)", ACCEPT),
            Err(PatternError::UnclosedGroup { open_groups: 1 })
        );
    }

    #[test]
    fn test_trailing_escape() {
        let mut graph = Nfa::new();
        assert_eq!(
            add_pattern(&mut graph, "ab\\", ACCEPT),
            Err(PatternError::TrailingEscape)
        );
    }

    #[test]
    fn test_failed_pattern_registers_no_start() {
        let mut graph = Nfa::new();
        add_pattern(&mut graph, "good", ACCEPT).unwrap();
        let before = graph.starts.clone();
        assert!(add_pattern(&mut graph, "bad)", ACCEPT).is_err());
        assert_eq!(graph.starts, before);
    }
}
