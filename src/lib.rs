//! termscan: multi-pattern whole-word text matching for thesaurus labels
//!
//! Compiles a set of label patterns into a single deterministic finite
//! automaton and scans texts for all labels in one pass. Patterns support
//! literals, `(`/`)` groups, `|` alternation, `?`, `*`, and `\` escapes, and
//! only ever match whole words.
//!
//! ```
//! use termscan::TermSetBuilder;
//!
//! let mut builder = TermSetBuilder::new();
//! builder.add_term("id_color", "colou?r").unwrap();
//! builder.add_term("id_crisis", "economic crisis").unwrap();
//! let dfa = builder.build().unwrap();
//!
//! let matches: Vec<_> = dfa.search("the colour of the economic crisis").collect();
//! assert_eq!(matches.len(), 2);
//! assert_eq!(matches[0].accept, &"id_color");
//! assert_eq!(matches[1].text, "economic crisis");
//! ```
//!
//! The built [`Dfa`] is immutable; searching takes `&self`, so wrap it in an
//! `Arc` for concurrent scans. Labels are an opaque type parameter and travel
//! through the automaton unchanged.

pub mod automata;

use std::fmt;

use tracing::{debug, warn};

pub use automata::{
    add_pattern, Dfa, DfaRepr, EpsilonCycleError, Match, Matches, Nfa, NfaToDfaConverter,
    PatternError, ReprError, StateRepr,
};

/// Accumulates label patterns and compiles them into one [`Dfa`].
///
/// A malformed pattern is a per-label problem: [`TermSetBuilder::add_term`]
/// returns the error and leaves every other label intact, and
/// [`TermSetBuilder::add_terms`] logs and skips it. An epsilon cycle found at
/// [`TermSetBuilder::build`] time is fatal because the shared graph has
/// already been partially rewritten by then.
///
/// ```
/// use termscan::TermSetBuilder;
///
/// let mut builder = TermSetBuilder::new();
/// let added = builder.add_terms(vec![
///     ("id_a", "valid"),
///     ("id_b", "broken)"),
/// ]);
/// assert_eq!(added, 1);
/// ```
#[derive(Debug, Default)]
pub struct TermSetBuilder<A = String> {
    nfa: Nfa<A>,
    term_count: usize,
}

impl<A: Clone + Eq + fmt::Debug> TermSetBuilder<A> {
    pub fn new() -> Self {
        TermSetBuilder {
            nfa: Nfa::new(),
            term_count: 0,
        }
    }

    /// Number of successfully added terms.
    #[inline]
    pub fn len(&self) -> usize {
        self.term_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.term_count == 0
    }

    /// Compiles one label pattern into the shared automaton.
    ///
    /// On error the label is simply not added; previously added labels are
    /// unaffected.
    pub fn add_term(&mut self, label: A, pattern: &str) -> Result<(), PatternError> {
        add_pattern(&mut self.nfa, pattern, label)?;
        self.term_count += 1;
        Ok(())
    }

    /// Compiles a batch of `(label, pattern)` pairs, skipping malformed ones.
    ///
    /// Each skipped pattern is logged at warn level together with its label.
    /// Returns the number of terms added.
    pub fn add_terms<I, P>(&mut self, terms: I) -> usize
    where
        I: IntoIterator<Item = (A, P)>,
        P: AsRef<str>,
    {
        let mut added = 0;
        for (label, pattern) in terms {
            let pattern = pattern.as_ref();
            match self.add_term(label.clone(), pattern) {
                Ok(()) => added += 1,
                Err(err) => {
                    warn!(?label, pattern, %err, "skipping malformed term pattern");
                }
            }
        }
        added
    }

    /// Eliminates epsilon transitions and determinizes the accumulated
    /// automaton.
    ///
    /// Consumes the builder. Fails if the patterns produced an epsilon cycle,
    /// in which case nothing can be salvaged and the whole term set must be
    /// rebuilt.
    pub fn build(mut self) -> Result<Dfa<A>, EpsilonCycleError> {
        self.nfa.remove_empty_transitions()?;
        let dfa = NfaToDfaConverter::new(&self.nfa).convert();
        debug!(
            terms = self.term_count,
            nfa_states = self.nfa.len(),
            dfa_states = dfa.len(),
            "built term automaton"
        );
        Ok(dfa)
    }
}
