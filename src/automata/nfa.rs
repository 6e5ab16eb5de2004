//! Nondeterministic finite automaton over characters.
//!
//! States are addressed by dense indices into an arena vector, so the graph
//! has no reference cycles and is trivially grown in place. Epsilon edges keep
//! a reverse index (`incoming_empty_transitions`) so the elimination pass can
//! walk predecessors without scanning the whole graph.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::heap::BinaryMinHeap;

/// A single NFA state.
#[derive(Debug, Default, Clone)]
pub struct State<A> {
    /// States reachable by consuming one specific character.
    pub(crate) symbol_transitions: FxHashMap<char, FxHashSet<usize>>,
    /// States reachable by consuming one non-alphanumeric character.
    pub(crate) word_boundary_transitions: FxHashSet<usize>,
    /// States reachable without consuming a character.
    pub(crate) empty_transitions: FxHashSet<usize>,
    /// Reverse index of `empty_transitions`, kept symmetric at all times.
    pub(crate) incoming_empty_transitions: FxHashSet<usize>,
    /// Acceptance labels attached to this state.
    pub(crate) accepts: SmallVec<[A; 1]>,
}

impl<A> State<A> {
    fn new() -> Self {
        State {
            symbol_transitions: FxHashMap::default(),
            word_boundary_transitions: FxHashSet::default(),
            empty_transitions: FxHashSet::default(),
            incoming_empty_transitions: FxHashSet::default(),
            accepts: SmallVec::new(),
        }
    }
}

/// Error raised by [`Nfa::remove_empty_transitions`] when the graph contains a
/// cycle of epsilon edges. Elimination has already mutated the graph by then,
/// so the whole automaton must be discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpsilonCycleError;

impl fmt::Display for EpsilonCycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "there is an empty-transition loop in the NFA")
    }
}

impl std::error::Error for EpsilonCycleError {}

/// A mutable NFA shared by all compiled patterns.
///
/// Grown monotonically by the pattern compiler, then made epsilon-free in
/// place, then handed to the determinizer and discarded.
#[derive(Debug, Default, Clone)]
pub struct Nfa<A> {
    /// All states of the NFA's graph.
    pub(crate) states: Vec<State<A>>,
    /// All start states.
    pub(crate) starts: Vec<usize>,
}

impl<A> Nfa<A> {
    pub fn new() -> Self {
        Nfa {
            states: Vec::new(),
            starts: Vec::new(),
        }
    }

    /// Number of states in the graph.
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

    /// Adds a state, by index, to the list of start states.
    pub fn add_start(&mut self, idx: usize) {
        self.starts.push(idx);
    }

    /// Attaches an acceptance label to a state.
    pub fn add_acceptance(&mut self, idx: usize, accept: A) {
        self.states[idx].accepts.push(accept);
    }

    /// Adds a character-consuming transition between two states.
    pub fn add_symbol_transition(&mut self, start: usize, end: usize, symbol: char) {
        self.states[start]
            .symbol_transitions
            .entry(symbol)
            .or_default()
            .insert(end);
    }

    /// Adds an epsilon transition between two states, updating the reverse
    /// index on the target.
    pub fn add_empty_transition(&mut self, start: usize, end: usize) {
        self.states[start].empty_transitions.insert(end);
        self.states[end].incoming_empty_transitions.insert(start);
    }

    /// Adds a transition consuming one non-alphanumeric character.
    pub fn add_word_boundary_transition(&mut self, start: usize, end: usize) {
        self.states[start].word_boundary_transitions.insert(end);
    }

    /// Eliminates every epsilon edge so the graph becomes usable by subset
    /// construction.
    ///
    /// States are processed in ascending order of their outgoing epsilon-edge
    /// count; a state popped while it still has outgoing epsilon edges proves
    /// an epsilon cycle, which is unsupported and fatal. Otherwise each
    /// epsilon-free state pushes its symbol and word-boundary transitions
    /// backwards into every predecessor that could epsilon-reach it.
    pub fn remove_empty_transitions(&mut self) -> Result<(), EpsilonCycleError> {
        let mut queue = BinaryMinHeap::new();
        for idx in 0..self.states.len() {
            if !self.states[idx].incoming_empty_transitions.is_empty() {
                queue.push(idx, self.states[idx].empty_transitions.len());
            }
        }
        while let Some(ptr_idx) = queue.pop() {
            if !self.states[ptr_idx].empty_transitions.is_empty() {
                return Err(EpsilonCycleError);
            }
            let symbol_transitions: Vec<(char, Vec<usize>)> = self.states[ptr_idx]
                .symbol_transitions
                .iter()
                .map(|(&symbol, targets)| (symbol, targets.iter().copied().collect()))
                .collect();
            let word_boundary_transitions: Vec<usize> = self.states[ptr_idx]
                .word_boundary_transitions
                .iter()
                .copied()
                .collect();
            let incoming: Vec<usize> = self.states[ptr_idx]
                .incoming_empty_transitions
                .iter()
                .copied()
                .collect();
            for incoming_idx in incoming {
                let incoming_state = &mut self.states[incoming_idx];
                for (symbol, targets) in &symbol_transitions {
                    incoming_state
                        .symbol_transitions
                        .entry(*symbol)
                        .or_default()
                        .extend(targets.iter().copied());
                }
                incoming_state
                    .word_boundary_transitions
                    .extend(word_boundary_transitions.iter().copied());
                incoming_state.empty_transitions.remove(&ptr_idx);
                let remaining = incoming_state.empty_transitions.len();
                self.states[ptr_idx]
                    .incoming_empty_transitions
                    .remove(&incoming_idx);
                if !self.states[incoming_idx]
                    .incoming_empty_transitions
                    .is_empty()
                {
                    queue.change_priority(incoming_idx, remaining);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYMBOL: char = 's';

    fn two_state_graph() -> Nfa<&'static str> {
        let mut graph = Nfa::new();
        graph.add_state();
        graph.add_state();
        graph
    }

    /// A complete binary tree of depth four where every inner state has
    /// epsilon, symbol, and word-boundary edges to both children.
    fn epsilon_tree() -> Nfa<&'static str> {
        let mut graph = Nfa::new();
        for _ in 0..17 {
            graph.add_state();
        }
        for i in 0..8 {
            graph.add_empty_transition(i, 2 * i + 1);
            graph.add_empty_transition(i, 2 * i + 2);
            graph.add_symbol_transition(i, 2 * i + 1, SYMBOL);
            graph.add_symbol_transition(i, 2 * i + 2, SYMBOL);
            graph.add_word_boundary_transition(i, 2 * i + 1);
            graph.add_word_boundary_transition(i, 2 * i + 2);
        }
        graph
    }

    #[test]
    fn test_add_state() {
        let mut graph = two_state_graph();
        graph.add_state();
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_add_start() {
        let mut graph = two_state_graph();
        graph.add_start(1);
        assert!(graph.starts.contains(&1));
    }

    #[test]
    fn test_add_acceptance() {
        let mut graph = two_state_graph();
        graph.add_acceptance(1, "Acceptance!");
        assert!(graph.states[1].accepts.contains(&"Acceptance!"));
    }

    #[test]
    fn test_add_symbol_transition() {
        let mut graph = two_state_graph();
        graph.add_symbol_transition(0, 1, SYMBOL);
        assert!(graph.states[0].symbol_transitions[&SYMBOL].contains(&1));
    }

    #[test]
    fn test_add_empty_transition_is_symmetric() {
        let mut graph = two_state_graph();
        graph.add_empty_transition(0, 1);
        assert!(graph.states[0].empty_transitions.contains(&1));
        assert!(graph.states[1].incoming_empty_transitions.contains(&0));
    }

    #[test]
    fn test_add_word_boundary_transition() {
        let mut graph = two_state_graph();
        graph.add_word_boundary_transition(0, 1);
        assert!(graph.states[0].word_boundary_transitions.contains(&1));
    }

    #[test]
    fn test_remove_epsilons() {
        let mut graph = epsilon_tree();
        graph.remove_empty_transitions().unwrap();
        for idx in 1..=16 {
            // The root can reach every descendant by a single consumption.
            assert!(graph.states[0].symbol_transitions[&SYMBOL].contains(&idx));
            assert!(graph.states[0].word_boundary_transitions.contains(&idx));
        }
        for state in &graph.states {
            assert!(state.empty_transitions.is_empty());
            assert!(state.incoming_empty_transitions.is_empty());
        }
    }

    #[test]
    fn test_recognizes_empty_loops() {
        let mut graph = epsilon_tree();
        graph.add_empty_transition(16, 3);
        assert_eq!(graph.remove_empty_transitions(), Err(EpsilonCycleError));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let mut graph = two_state_graph();
        graph.add_empty_transition(0, 0);
        assert_eq!(graph.remove_empty_transitions(), Err(EpsilonCycleError));
    }
}
