//! Structural equivalence of grammars up to renaming of non-terminals.
//!
//! Two grammars are isomorphic when a one-to-one renaming of the
//! non-terminals reachable from the start turns one into the other. The
//! search pairs up productions of corresponding non-terminals one at a time,
//! extending a partial renaming and backtracking on conflicts. Non-terminals
//! already being matched are trusted, which lets recursive grammars finish.

use crate::grammar::ContextFreeGrammar;
use crate::template::Template;
use crate::token::Slot;
use ahash::AHashSet as HashSet;
use indexmap::IndexSet;
use std::collections::BTreeMap;

/// A one-to-one mapping from the non-terminals of one grammar to another's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SlotRenaming {
    forward: BTreeMap<Slot, Slot>,
    backward: BTreeMap<Slot, Slot>,
}

impl SlotRenaming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: &Slot) -> Option<&Slot> {
        self.forward.get(slot)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Slot, &Slot)> + '_ {
        self.forward.iter()
    }

    /// Adds `from -> to` unless it contradicts the mapping so far. Returns
    /// whether the mapping is still consistent.
    pub fn insert(&mut self, from: &Slot, to: &Slot) -> bool {
        match (self.forward.get(from), self.backward.get(to)) {
            (Some(mapped), _) if mapped != to => false,
            (_, Some(source)) if source != from => false,
            (Some(_), Some(_)) => true,
            _ => {
                self.forward.insert(from.clone(), to.clone());
                self.backward.insert(to.clone(), from.clone());
                true
            }
        }
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for SlotRenaming {
    /// Builds a renaming between named slots. Conflicting pairs are dropped.
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut renaming = SlotRenaming::new();
        for (from, to) in iter {
            renaming.insert(&Slot::named(from), &Slot::named(to));
        }
        renaming
    }
}

/// Pairing of the productions of one non-terminal with those of its image.
#[derive(Debug, Clone)]
struct Matching {
    own: Slot,
    other: Slot,
    next: usize,
    used: Vec<bool>,
}

#[derive(Debug, Clone)]
struct SearchState {
    renaming: SlotRenaming,
    /// Renamed pairs whose productions still have to be matched.
    pending: Vec<(Slot, Slot)>,
    expanded: HashSet<Slot>,
    matching: Option<Matching>,
}

/// Depth-first enumeration of every renaming that maps one grammar onto
/// another.
pub struct IsomorphismSearch<'g> {
    own: &'g ContextFreeGrammar,
    other: &'g ContextFreeGrammar,
    stack: Vec<SearchState>,
}

impl<'g> IsomorphismSearch<'g> {
    pub fn new(own: &'g ContextFreeGrammar, other: &'g ContextFreeGrammar) -> Self {
        let mut stack = Vec::new();
        if own.len() == other.len() {
            let mut renaming = SlotRenaming::new();
            renaming.insert(own.start(), other.start());
            stack.push(SearchState {
                renaming,
                pending: vec![(own.start().clone(), other.start().clone())],
                expanded: HashSet::new(),
                matching: None,
            });
        }
        Self { own, other, stack }
    }

    /// Advances `state` to its next decision point. Returns the finished
    /// renaming, pushes the branches of the next production to pair, or
    /// drops the state when it turns out inconsistent.
    fn step(&mut self, mut state: SearchState) -> Option<SlotRenaming> {
        loop {
            if let Some(matching) = state.matching.take() {
                self.branch(state, matching);
                return None;
            }

            let Some((own_slot, other_slot)) = state.pending.pop() else {
                return Some(state.renaming);
            };
            if !state.expanded.insert(own_slot.clone()) {
                continue;
            }

            let own_productions = self.own.productions(&own_slot).ok();
            let other_productions = self.other.productions(&other_slot).ok();
            match (own_productions, other_productions) {
                (None, None) => continue,
                (Some(own), Some(other)) if own.len() == other.len() => {
                    state.matching = Some(Matching {
                        own: own_slot,
                        other: other_slot,
                        next: 0,
                        used: vec![false; other.len()],
                    });
                }
                _ => return None,
            }
        }
    }

    /// Pushes one state per way to pair the next production of `matching`.
    fn branch(&mut self, state: SearchState, matching: Matching) {
        let (Ok(own), Ok(other)) = (
            self.own.productions(&matching.own),
            self.other.productions(&matching.other),
        ) else {
            return;
        };

        let Some(production) = own.get(matching.next) else {
            self.stack.push(state);
            return;
        };

        let mut branches = Vec::new();
        for (index, candidate) in other.iter().enumerate() {
            if matching.used[index] || !production.same_shape(candidate) {
                continue;
            }
            let mut renaming = state.renaming.clone();
            let mut pending = state.pending.clone();
            if !pair_slots(production, candidate, &mut renaming, &mut pending) {
                continue;
            }

            let mut used = matching.used.clone();
            used[index] = true;
            branches.push(SearchState {
                renaming,
                pending,
                expanded: state.expanded.clone(),
                matching: Some(Matching {
                    own: matching.own.clone(),
                    other: matching.other.clone(),
                    next: matching.next + 1,
                    used,
                }),
            });
        }
        // Earlier candidates are explored first.
        self.stack.extend(branches.into_iter().rev());
    }
}

/// Extends `renaming` with the positional slot correspondence of two
/// productions of the same shape, queueing every new pair.
fn pair_slots(
    own: &Template,
    other: &Template,
    renaming: &mut SlotRenaming,
    pending: &mut Vec<(Slot, Slot)>,
) -> bool {
    for (own_slot, other_slot) in own.slots().zip(other.slots()) {
        let known = renaming.get(own_slot) == Some(other_slot);
        if !renaming.insert(own_slot, other_slot) {
            return false;
        }
        if !known {
            pending.push((own_slot.clone(), other_slot.clone()));
        }
    }
    true
}

impl Iterator for IsomorphismSearch<'_> {
    type Item = SlotRenaming;

    fn next(&mut self) -> Option<SlotRenaming> {
        while let Some(state) = self.stack.pop() {
            if let Some(renaming) = self.step(state) {
                return Some(renaming);
            }
        }
        None
    }
}

impl ContextFreeGrammar {
    /// Every distinct renaming of this grammar's reachable non-terminals that
    /// yields `other`.
    pub fn isomorphic_renamings(&self, other: &ContextFreeGrammar) -> Vec<SlotRenaming> {
        let unique: IndexSet<SlotRenaming> = IsomorphismSearch::new(self, other).collect();
        unique.into_iter().collect()
    }

    /// True iff the grammars only differ in the names of their non-terminals.
    pub fn is_isomorphic_with(&self, other: &ContextFreeGrammar) -> bool {
        IsomorphismSearch::new(self, other).next().is_some()
    }
}
