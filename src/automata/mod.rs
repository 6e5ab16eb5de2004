//! Finite-automata pipeline for multi-pattern whole-word matching.
//!
//! The pipeline has three stages:
//!
//! - [`construction::add_pattern`] compiles each label pattern into a shared
//!   [`Nfa`], one start state per pattern.
//! - [`Nfa::remove_empty_transitions`] eliminates the epsilon edges the
//!   compiler introduced.
//! - [`NfaToDfaConverter`] runs subset construction, producing an immutable
//!   [`Dfa`] whose [`Dfa::search`] scans text for all labels at once.
//!
//! Acceptance labels are an opaque type parameter; the automata never inspect
//! them beyond equality and cloning.

pub mod construction;
pub mod conversion;
pub mod dfa;
mod heap;
pub mod nfa;

pub use construction::{add_pattern, PatternError};
pub use conversion::NfaToDfaConverter;
pub use dfa::{Dfa, DfaRepr, Match, Matches, ReprError, StateRepr};
pub use nfa::{EpsilonCycleError, Nfa};
