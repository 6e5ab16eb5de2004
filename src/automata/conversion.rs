//! NFA to DFA conversion by subset construction.

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};

use super::dfa::Dfa;
use super::nfa::Nfa;

/// Converts a nondeterministic finite automaton into a deterministic one.
///
/// The NFA must be free of empty transitions (run
/// [`Nfa::remove_empty_transitions`] first). Acceptance labels from all NFA
/// states represented by a DFA state are merged onto it.
pub struct NfaToDfaConverter<'n, A> {
    /// The input automaton.
    nfa: &'n Nfa<A>,
    /// The resulting automaton.
    dfa: Dfa<A>,
    /// Work queue of DFA states awaiting expansion.
    queue: VecDeque<usize>,
    /// Maps a DFA state index to the sorted set of NFA state indices it
    /// represents.
    state_represents: Vec<Vec<usize>>,
    /// Maps a sorted set of NFA state indices to a DFA state index.
    state_cache: FxHashMap<Vec<usize>, usize>,
}

impl<'n, A: Clone + Eq> NfaToDfaConverter<'n, A> {
    pub fn new(nfa: &'n Nfa<A>) -> Self {
        let mut dfa = Dfa::new();
        let idx0 = dfa.add_state();
        let mut start_states: Vec<usize> = nfa.starts.clone();
        start_states.sort_unstable();
        start_states.dedup();
        let mut state_cache = FxHashMap::default();
        state_cache.insert(start_states.clone(), idx0);
        NfaToDfaConverter {
            nfa,
            dfa,
            queue: VecDeque::from([idx0]),
            state_represents: vec![start_states],
            state_cache,
        }
    }

    /// Runs the conversion to completion and returns the DFA.
    ///
    /// Terminates because the number of distinct reachable NFA-state subsets
    /// is finite and every subset is cached before re-expansion.
    pub fn convert(mut self) -> Dfa<A> {
        while let Some(dfa_idx) = self.queue.pop_front() {
            self.perform_step(dfa_idx);
        }
        self.dfa
    }

    fn perform_step(&mut self, dfa_start_idx: usize) {
        let (symbol_transitions, word_boundary_transitions, accepts) =
            self.collect_nfa_transitions(&self.state_represents[dfa_start_idx]);
        self.create_dfa_transitions(
            dfa_start_idx,
            symbol_transitions,
            word_boundary_transitions,
            accepts,
        );
    }

    /// Unions the outgoing transitions and acceptance labels of a set of NFA
    /// states. Characters are grouped in sorted order so the resulting DFA is
    /// deterministic for a given NFA.
    #[allow(clippy::type_complexity)]
    fn collect_nfa_transitions(
        &self,
        states: &[usize],
    ) -> (BTreeMap<char, FxHashSet<usize>>, FxHashSet<usize>, Vec<A>) {
        let mut symbol_transitions: BTreeMap<char, FxHashSet<usize>> = BTreeMap::new();
        let mut word_boundary_transitions = FxHashSet::default();
        let mut accepts: Vec<A> = Vec::new();
        for &nfa_idx in states {
            let state = &self.nfa.states[nfa_idx];
            for (&symbol, targets) in &state.symbol_transitions {
                symbol_transitions
                    .entry(symbol)
                    .or_default()
                    .extend(targets.iter().copied());
            }
            word_boundary_transitions.extend(state.word_boundary_transitions.iter().copied());
            for accept in &state.accepts {
                if !accepts.contains(accept) {
                    accepts.push(accept.clone());
                }
            }
        }
        (symbol_transitions, word_boundary_transitions, accepts)
    }

    fn create_dfa_transitions(
        &mut self,
        dfa_start_idx: usize,
        symbol_transitions: BTreeMap<char, FxHashSet<usize>>,
        word_boundary_transitions: FxHashSet<usize>,
        accepts: Vec<A>,
    ) {
        for (symbol, nfa_targets) in symbol_transitions {
            let dfa_end_idx = self.get_or_create_dfa_state(&nfa_targets);
            self.dfa
                .set_symbol_transition(dfa_start_idx, dfa_end_idx, symbol);
        }
        if !word_boundary_transitions.is_empty() {
            let dfa_end_idx = self.get_or_create_dfa_state(&word_boundary_transitions);
            self.dfa
                .set_word_boundary_transition(dfa_start_idx, dfa_end_idx);
        }
        if !accepts.is_empty() {
            self.dfa.add_acceptances(dfa_start_idx, accepts);
        }
    }

    /// Retrieves the DFA state representing a set of NFA states, allocating
    /// and enqueueing a fresh one on a cache miss.
    fn get_or_create_dfa_state(&mut self, nfa_targets: &FxHashSet<usize>) -> usize {
        let mut key: Vec<usize> = nfa_targets.iter().copied().collect();
        key.sort_unstable();
        if let Some(&dfa_idx) = self.state_cache.get(&key) {
            return dfa_idx;
        }
        let dfa_idx = self.dfa.add_state();
        self.queue.push_back(dfa_idx);
        self.state_represents.push(key.clone());
        self.state_cache.insert(key, dfa_idx);
        dfa_idx
    }
}
