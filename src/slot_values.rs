//! Value sets of non-terminals and the similarity merge that unifies them.
//!
//! [`SlotValues`] maps every slot to the set of templates observed in its
//! position, next to a table of replacements recording which slots were
//! unified into which. A replaced slot keeps exactly one value: a template
//! holding only its replacement target.
//!
//! [`SlotValues::merge_slots`] runs the alias/absorb reduction to a fixed
//! point. Two slots are similar when their value sets are equal (threshold
//! `1.0`) or, below that, when their Jaccard overlap reaches the threshold.
//! The empty filler is left out of the overlap when both sides contain it.

use crate::error::{GrammarError, Result};
use crate::template::{SlotAssignment, Template};
use crate::token::Slot;
use ahash::AHashMap as HashMap;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use log::{debug, trace};
use std::collections::BTreeSet;
use std::fmt;

/// Fixed-point rounds allowed per slot before the merge is considered stuck.
const MAX_ROUNDS_PER_SLOT: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct SlotValues {
    values: IndexMap<Slot, IndexSet<Template>>,
    replacements: IndexMap<Slot, Slot>,
}

impl SlotValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects `(slot, value)` pairs, unioning values of repeated slots.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Slot, Template)>) -> Self {
        let mut slot_values = Self::new();
        for (slot, value) in pairs {
            slot_values.add_values(slot, [value]);
        }
        slot_values
    }

    pub fn get(&self, slot: &Slot) -> Option<&IndexSet<Template>> {
        self.values.get(slot)
    }

    pub fn contains_slot(&self, slot: &Slot) -> bool {
        self.values.contains_key(slot)
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> + '_ {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Slot, &IndexSet<Template>)> + '_ {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replaces the value set of `slot`.
    pub fn insert(&mut self, slot: Slot, values: IndexSet<Template>) {
        self.values.insert(slot, values);
    }

    /// Unions `values` into the value set of `slot`.
    pub fn add_values(&mut self, slot: Slot, values: impl IntoIterator<Item = Template>) {
        self.values.entry(slot).or_default().extend(values);
    }

    /// Unions every value set of `other` into this one.
    pub fn add_all(&mut self, other: &SlotValues) {
        for (slot, values) in other.iter() {
            self.add_values(slot.clone(), values.iter().cloned());
        }
    }

    pub(crate) fn add_mapping(&mut self, mapping: IndexMap<Slot, IndexSet<Template>>) {
        for (slot, values) in mapping {
            self.add_values(slot, values);
        }
    }

    // REPLACEMENTS

    /// Records that `from` is unified into `to`; `from` keeps `{<to>}` as its
    /// only value.
    pub fn add_replacement(&mut self, from: Slot, to: Slot) {
        let mut residual = IndexSet::new();
        residual.insert(Template::from_slot(to.clone()));
        self.values.insert(from.clone(), residual);
        self.replacements.insert(from, to);
    }

    pub fn replacements(&self) -> &IndexMap<Slot, Slot> {
        &self.replacements
    }

    pub fn replacement(&self, slot: &Slot) -> Option<&Slot> {
        self.replacements.get(slot)
    }

    pub fn has_replacement(&self, slot: &Slot) -> bool {
        self.replacements.contains_key(slot)
    }

    /// The value sets of every slot that has not been replaced.
    pub fn non_replaced(&self) -> SlotValues {
        SlotValues {
            values: self
                .values
                .iter()
                .filter(|(slot, _)| !self.has_replacement(slot))
                .map(|(slot, values)| (slot.clone(), values.clone()))
                .collect(),
            replacements: IndexMap::new(),
        }
    }

    pub fn unreplaced_slots(&self) -> Vec<Slot> {
        self.values
            .keys()
            .filter(|slot| !self.has_replacement(slot))
            .cloned()
            .collect()
    }

    // GENERATING

    /// Every combination of values for `slots`, one tuple per combination in
    /// the order of `slots`. Repeated slots vary independently.
    pub fn all_possible_tuples(&self, slots: &[Slot]) -> Result<Vec<Vec<Template>>> {
        if slots.is_empty() {
            return Ok(vec![Vec::new()]);
        }
        let lists = slots
            .iter()
            .map(|slot| {
                self.values
                    .get(slot)
                    .map(|values| values.iter().cloned().collect::<Vec<_>>())
                    .ok_or_else(|| GrammarError::UnknownNonTerminal(slot.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(lists.into_iter().multi_cartesian_product().collect())
    }

    /// Like [`SlotValues::all_possible_tuples`], keyed by slot. Fails with
    /// [`GrammarError::DuplicateSlot`] when `slots` repeats a slot.
    pub fn all_possible_assignments(&self, slots: &[Slot]) -> Result<Vec<SlotAssignment>> {
        self.all_possible_tuples(slots)?
            .into_iter()
            .map(|tuple| SlotAssignment::from_pairs(slots.iter().cloned().zip(tuple)))
            .collect()
    }

    // MERGING

    /// Unifies slots with similar value sets and removes redundant
    /// indirections, returning the reduced copy.
    pub fn merge_slots(&self, relative_similarity_threshold: f64) -> Result<SlotValues> {
        let mut merged = self.clone();
        let slot_list: Vec<Slot> = self.values.keys().cloned().collect();
        let indices: HashMap<Slot, usize> = slot_list
            .iter()
            .enumerate()
            .map(|(index, slot)| (slot.clone(), index))
            .collect();

        let max_rounds = (slot_list.len() + 1) * MAX_ROUNDS_PER_SLOT;
        let mut dirty: BTreeSet<Slot> = slot_list.iter().cloned().collect();
        let mut round = 0;
        while !dirty.is_empty() {
            round += 1;
            if round > max_rounds {
                return Err(GrammarError::InvariantViolated(format!(
                    "slot merging did not converge after {max_rounds} rounds"
                )));
            }
            trace!("slot merge round {round}: {} dirty slots", dirty.len());
            dirty = merged.merge_round(
                &dirty,
                &slot_list,
                &indices,
                relative_similarity_threshold,
            )?;
        }

        merged.compress_all_replacements()?;
        merged.inline_single_use_slots();
        merged.compress_all_replacements()?;

        debug!(
            "merged {} slots into {} after {round} rounds",
            slot_list.len(),
            merged.unreplaced_slots().len()
        );
        Ok(merged)
    }

    fn merge_round(
        &mut self,
        dirty: &BTreeSet<Slot>,
        slot_list: &[Slot],
        indices: &HashMap<Slot, usize>,
        threshold: f64,
    ) -> Result<BTreeSet<Slot>> {
        let mut updated = BTreeSet::new();

        for i_slot in dirty {
            let Some(&i) = indices.get(i_slot) else {
                continue;
            };
            let mut changed = false;

            if self.has_replacement(i_slot) {
                changed |= self.compress_replacement(i_slot, slot_list.len())?;
            } else {
                let mut i_vals = self.values.get(i_slot).cloned().unwrap_or_default();

                for j_slot in &slot_list[i + 1..] {
                    if self.absorb_if_similar(i_slot, &mut i_vals, j_slot, threshold) {
                        updated.insert(j_slot.clone());
                        changed = true;
                    }
                }

                changed |= self.drop_values_provided_by_later_slots(i, &mut i_vals, indices);
                changed |= self.drop_covered_slot_references(&mut i_vals);
                changed |= self.rename_replaced_references(&mut i_vals);
                changed |= drop_self_references(i_slot, &mut i_vals);

                if i_vals.len() == 1 {
                    if let Some(target) = i_vals[0].as_single_slot().cloned() {
                        self.add_replacement(i_slot.clone(), target);
                        changed = true;
                    }
                }

                self.values.insert(i_slot.clone(), i_vals);
            }

            if changed {
                updated.insert(i_slot.clone());
            }
        }

        Ok(updated)
    }

    /// `j` is replaced by `i` when their values are similar; `i` is replaced
    /// by `j` when its only value is a reference to `j`.
    fn absorb_if_similar(
        &mut self,
        i_slot: &Slot,
        i_vals: &mut IndexSet<Template>,
        j_slot: &Slot,
        threshold: f64,
    ) -> bool {
        let mut changed = false;

        if !self.has_replacement(j_slot) {
            let j_vals = self.values.get(j_slot).cloned().unwrap_or_default();
            if has_similar_content(i_vals, &j_vals, threshold) {
                trace!("slot {j_slot} absorbed into {i_slot}");
                self.add_replacement(j_slot.clone(), i_slot.clone());
                i_vals.extend(j_vals);
                changed = true;
            }
        }

        if !self.has_replacement(i_slot)
            && i_vals.len() == 1
            && i_vals[0].as_single_slot() == Some(j_slot)
        {
            self.add_replacement(i_slot.clone(), j_slot.clone());
            changed = true;
        }

        changed
    }

    /// Removes values of slot `i` that an ordinally later slot referenced by
    /// `i` already provides.
    fn drop_values_provided_by_later_slots(
        &self,
        i: usize,
        i_vals: &mut IndexSet<Template>,
        indices: &HashMap<Slot, usize>,
    ) -> bool {
        let references: Vec<Slot> = pure_slot_references(i_vals).cloned().collect();
        let mut changed = false;
        for k_slot in references {
            if !indices.get(&k_slot).is_some_and(|&k| k > i) {
                continue;
            }
            let Some(k_vals) = self.values.get(&k_slot) else {
                continue;
            };
            let before = i_vals.len();
            i_vals.retain(|value| !k_vals.contains(value));
            changed |= i_vals.len() != before;
        }
        changed
    }

    /// Removes single-slot references whose values are already provided by
    /// the other references and the literal values.
    fn drop_covered_slot_references(&self, i_vals: &mut IndexSet<Template>) -> bool {
        let literal_values: Vec<Template> = i_vals
            .iter()
            .filter(|value| !value.has_slots())
            .cloned()
            .collect();
        let references: Vec<Slot> = pure_slot_references(i_vals).cloned().collect();
        let mut removed = vec![false; references.len()];
        let mut changed = false;

        for (index, slot) in references.iter().enumerate() {
            let Some(slot_vals) = self.values.get(slot) else {
                continue;
            };
            let mut other_content: IndexSet<&Template> = literal_values.iter().collect();
            for (other_index, other_slot) in references.iter().enumerate() {
                if other_index == index || removed[other_index] {
                    continue;
                }
                if let Some(other_vals) = self.values.get(other_slot) {
                    other_content.extend(other_vals.iter());
                }
            }

            if slot_vals.iter().all(|value| other_content.contains(value)) {
                let reference = Template::from_slot(slot.clone());
                i_vals.retain(|value| value != &reference);
                removed[index] = true;
                changed = true;
            }
        }
        changed
    }

    /// Points every reference to a replaced slot at its replacement.
    fn rename_replaced_references(&self, i_vals: &mut IndexSet<Template>) -> bool {
        let needs_renaming = i_vals
            .iter()
            .flat_map(Template::slots)
            .any(|slot| self.has_replacement(slot));
        if needs_renaming {
            *i_vals = i_vals
                .iter()
                .map(|value| value.rename_slots(&self.replacements))
                .collect();
        }
        needs_renaming
    }

    /// Follows the replacement chain of `slot` to its end and points `slot`
    /// straight at it.
    fn compress_replacement(&mut self, slot: &Slot, limit: usize) -> Result<bool> {
        let Some(mut target) = self.replacements.get(slot).cloned() else {
            return Ok(false);
        };
        let mut steps = 0;
        while let Some(next) = self.replacements.get(&target) {
            steps += 1;
            if steps > limit || next == slot {
                return Err(GrammarError::InvariantViolated(format!(
                    "replacement cycle through slot {slot}"
                )));
            }
            target = next.clone();
        }
        self.add_replacement(slot.clone(), target);
        Ok(steps > 0)
    }

    fn compress_all_replacements(&mut self) -> Result<()> {
        let replaced: Vec<Slot> = self.replacements.keys().cloned().collect();
        let limit = self.values.len() + replaced.len();
        for slot in replaced {
            self.compress_replacement(&slot, limit)?;
        }
        Ok(())
    }

    /// Inlines slots that are referenced as a whole value by exactly one
    /// other slot, one at a time until none is left.
    fn inline_single_use_slots(&mut self) {
        self.point_references_at_targets();
        while let Some((redundant, container)) = self.single_use_slot() {
            trace!("inlining slot {redundant} into {container}");
            let inlined = self.values.get(&redundant).cloned().unwrap_or_default();
            let reference = Template::from_slot(redundant.clone());
            let own = Template::from_slot(container.clone());

            let values = self.values.entry(container.clone()).or_default();
            values.retain(|value| value != &reference);
            values.extend(inlined.into_iter().filter(|value| value != &own));
            self.add_replacement(redundant, container);
        }
    }

    /// Renames references to replaced slots in every unreplaced value set.
    /// Expects compressed replacements.
    fn point_references_at_targets(&mut self) {
        for slot in self.unreplaced_slots() {
            let Some(mut values) = self.values.get(&slot).cloned() else {
                continue;
            };
            if self.rename_replaced_references(&mut values) {
                drop_self_references(&slot, &mut values);
                self.values.insert(slot, values);
            }
        }
    }

    /// The first unreplaced slot whose only whole-value reference comes from
    /// one other unreplaced slot, paired with that slot.
    fn single_use_slot(&self) -> Option<(Slot, Slot)> {
        let mut containers: IndexMap<&Slot, IndexSet<&Slot>> = IndexMap::new();
        for (container, values) in &self.values {
            if self.has_replacement(container) {
                continue;
            }
            for referenced in pure_slot_references(values) {
                containers.entry(referenced).or_default().insert(container);
            }
        }

        containers
            .into_iter()
            .find(|(redundant, containing)| {
                containing.len() == 1
                    && !containing.contains(redundant)
                    && !self.has_replacement(redundant)
                    && self.values.contains_key(*redundant)
            })
            .and_then(|(redundant, containing)| {
                containing
                    .first()
                    .map(|container| (redundant.clone(), (*container).clone()))
            })
    }
}

/// Slots referenced by values consisting of exactly one slot.
fn pure_slot_references(values: &IndexSet<Template>) -> impl Iterator<Item = &Slot> + '_ {
    values.iter().filter_map(Template::as_single_slot)
}

fn drop_self_references(slot: &Slot, values: &mut IndexSet<Template>) -> bool {
    let before = values.len();
    values.retain(|value| value.as_single_slot() != Some(slot));
    values.len() != before
}

/// True iff two value sets are similar enough to denote the same slot.
pub fn has_similar_content(
    first: &IndexSet<Template>,
    second: &IndexSet<Template>,
    threshold: f64,
) -> bool {
    if threshold >= 1.0 {
        return first == second;
    }

    let empty = Template::empty();
    let first_empty = first.contains(&empty);
    let second_empty = second.contains(&empty);

    let intersection =
        first.intersection(second).count() - usize::from(first_empty && second_empty);
    let union = first.union(second).count() - usize::from(first_empty || second_empty);
    if union == 0 {
        return first == second;
    }
    intersection as f64 / union as f64 >= threshold
}

impl PartialEq for SlotValues {
    /// Compares value sets only; the replacement table is bookkeeping.
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl FromIterator<(Slot, IndexSet<Template>)> for SlotValues {
    fn from_iter<I: IntoIterator<Item = (Slot, IndexSet<Template>)>>(iter: I) -> Self {
        let mut slot_values = SlotValues::new();
        for (slot, values) in iter {
            slot_values.add_values(slot, values);
        }
        slot_values
    }
}

impl fmt::Display for SlotValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (slot, values) in &self.values {
            let mut rendered: Vec<String> = values.iter().map(Template::to_string).collect();
            rendered.sort();
            writeln!(f, "{slot} -> {}", rendered.join(" | "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a() -> Slot {
        Slot::named("A")
    }
    fn b() -> Slot {
        Slot::named("B")
    }
    fn c() -> Slot {
        Slot::named("C")
    }

    fn set(values: &[&str]) -> IndexSet<Template> {
        values.iter().map(|v| Template::parse(v)).collect()
    }

    fn contents(range: std::ops::Range<usize>) -> IndexSet<Template> {
        range.map(|i| Template::parse(&i.to_string())).collect()
    }

    fn values(entries: Vec<(Slot, IndexSet<Template>)>) -> SlotValues {
        entries.into_iter().collect()
    }

    fn replacements(entries: &[(Slot, Slot)]) -> IndexMap<Slot, Slot> {
        entries.iter().cloned().collect()
    }

    #[test]
    fn test_all_possible_assignments() {
        let slot_values = values(vec![(a(), set(&["<C>", "hello"])), (c(), set(&["hello", "hi"]))]);
        let assignments = slot_values.all_possible_assignments(&[c()]).unwrap();
        assert_eq!(assignments.len(), 2);
        let assigned: Vec<&Template> = assignments.iter().filter_map(|a| a.get(&c())).collect();
        assert!(assigned.contains(&&Template::parse("hello")));
        assert!(assigned.contains(&&Template::parse("hi")));

        assert!(matches!(
            slot_values.all_possible_assignments(&[c(), c()]),
            Err(GrammarError::DuplicateSlot(_))
        ));
        assert!(matches!(
            slot_values.all_possible_tuples(&[b()]),
            Err(GrammarError::UnknownNonTerminal(_))
        ));
    }

    #[test]
    fn test_all_possible_tuples_repeated_slot() {
        let slot_values = values(vec![(c(), set(&["x", "y"]))]);
        assert_eq!(slot_values.all_possible_tuples(&[c(), c()]).unwrap().len(), 4);
        assert_eq!(slot_values.all_possible_tuples(&[]).unwrap(), vec![Vec::<Template>::new()]);
    }

    #[test]
    fn test_merge_basic() {
        let e123 = set(&["hello", "hi", "hey"]);
        let e456 = set(&["world", "earth", "everyone"]);
        let slot_values = values(vec![
            (a(), e123.clone()),
            (b(), e123.clone()),
            (c(), e456.clone()),
        ]);

        let merged = slot_values.merge_slots(1.0).unwrap();

        assert_eq!(&replacements(&[(b(), a())]), merged.replacements());
        assert_eq!(values(vec![(a(), e123), (b(), set(&["<A>"])), (c(), e456)]), merged);
    }

    #[test]
    fn test_merge_small_overlap() {
        let slot_values = values(vec![(a(), set(&["hello", "hi"])), (b(), set(&["hi", "hey"]))]);

        let merged = slot_values.merge_slots(0.3).unwrap();

        assert_eq!(&replacements(&[(b(), a())]), merged.replacements());
        assert_eq!(
            values(vec![(a(), set(&["hello", "hi", "hey"])), (b(), set(&["<A>"]))]),
            merged
        );
    }

    #[test]
    fn test_merge_containing_slot() {
        let e123 = set(&["hello", "hi", "hey"]);
        let e456 = set(&["world", "earth", "everyone"]);
        let slot_values = values(vec![
            (a(), set(&["<B>", "hello", "hi", "hey"])),
            (b(), e123.clone()),
            (c(), e456.clone()),
        ]);

        let merged = slot_values.merge_slots(1.0).unwrap();

        assert_eq!(&replacements(&[(a(), b())]), merged.replacements());
        assert_eq!(values(vec![(a(), set(&["<B>"])), (b(), e123), (c(), e456)]), merged);
    }

    #[test]
    fn test_merge_containing_slot_second() {
        let e123 = set(&["hello", "hi", "hey"]);
        let slot_values = values(vec![
            (a(), set(&["<C>", "hello", "hi", "hey"])),
            (b(), e123.clone()),
            (c(), e123.clone()),
        ]);

        let merged = slot_values.merge_slots(1.0).unwrap();

        assert_eq!(merged.replacement(&a()), Some(&b()));
        assert_eq!(merged.replacement(&c()), Some(&b()));
        assert_eq!(merged.replacements().len(), 2);
        assert_eq!(
            values(vec![(a(), set(&["<B>"])), (b(), e123), (c(), set(&["<B>"]))]),
            merged
        );
    }

    #[test]
    fn test_merge_containing_multiple_slots() {
        let e123 = set(&["hello", "hi", "hey"]);
        let e12 = set(&["hello", "hi"]);
        let slot_values = values(vec![
            (a(), set(&["<B>", "<C>", "hello", "hi"])),
            (b(), e123.clone()),
            (c(), e12.clone()),
        ]);

        let merged = slot_values.merge_slots(1.0).unwrap();

        assert_eq!(&replacements(&[(a(), b())]), merged.replacements());
        assert_eq!(values(vec![(a(), set(&["<B>"])), (b(), e123), (c(), e12)]), merged);
    }

    #[test]
    fn test_merge_containing_multiple_slots_completely() {
        let e123 = set(&["hello", "hi", "hey"]);
        let slot_values = values(vec![
            (a(), set(&["<B>", "<C>", "hello", "hi"])),
            (b(), e123.clone()),
            (c(), e123.clone()),
        ]);

        let merged = slot_values.merge_slots(1.0).unwrap();

        assert_eq!(merged.replacement(&a()), Some(&b()));
        assert_eq!(merged.replacement(&c()), Some(&b()));
        assert_eq!(
            values(vec![(a(), set(&["<B>"])), (b(), e123), (c(), set(&["<B>"]))]),
            merged
        );
    }

    #[test]
    fn test_merge_relative_overlap_values() {
        let slot_values = values(vec![(a(), contents(0..10)), (b(), contents(0..2))]);

        for threshold in [1.0, 0.9, 0.5] {
            assert_eq!(slot_values, slot_values.merge_slots(threshold).unwrap());
        }

        let expected = values(vec![(a(), contents(0..10)), (b(), set(&["<A>"]))]);
        for threshold in [0.2, 0.1] {
            assert_eq!(expected, slot_values.merge_slots(threshold).unwrap());
        }
    }

    #[test]
    fn test_merge_relative_overlap_three_variables() {
        let slot_values = values(vec![
            (a(), contents(0..10)),
            (b(), contents(0..2)),
            (c(), contents(5..8)),
        ]);

        for threshold in [1.0, 0.5] {
            assert_eq!(slot_values, slot_values.merge_slots(threshold).unwrap());
        }

        assert_eq!(
            values(vec![
                (a(), contents(0..10)),
                (b(), contents(0..2)),
                (c(), set(&["<A>"])),
            ]),
            slot_values.merge_slots(0.3).unwrap()
        );

        let full_merge = values(vec![
            (a(), contents(0..10)),
            (b(), set(&["<A>"])),
            (c(), set(&["<A>"])),
        ]);
        for threshold in [0.2, 0.1] {
            assert_eq!(full_merge, slot_values.merge_slots(threshold).unwrap());
        }
    }

    #[test]
    fn test_merge_relative_overlap_growing_slot() {
        let slot_values = values(vec![
            (a(), contents(1..5)),
            (b(), contents(0..2)),
            (c(), contents(2..6)),
        ]);

        assert_eq!(slot_values, slot_values.merge_slots(0.61).unwrap());

        let first_merged = values(vec![
            (a(), contents(1..6)),
            (b(), contents(0..2)),
            (c(), set(&["<A>"])),
        ]);
        assert_eq!(first_merged, slot_values.merge_slots(0.6).unwrap());
        assert_eq!(first_merged, slot_values.merge_slots(0.21).unwrap());

        let full_merge = values(vec![
            (a(), contents(0..6)),
            (b(), set(&["<A>"])),
            (c(), set(&["<A>"])),
        ]);
        assert_eq!(full_merge, slot_values.merge_slots(0.2).unwrap());
    }

    #[test]
    fn test_similarity_ignores_shared_empty_filler() {
        let first = set(&["", "x"]);
        let second = set(&["", "y"]);
        assert!(!has_similar_content(&first, &second, 0.1));
        assert!(has_similar_content(&set(&[""]), &set(&[""]), 0.5));
        assert!(!has_similar_content(&set(&["x"]), &set(&["y"]), 1.0));
    }

    #[test]
    fn test_single_use_slot_is_inlined() {
        let slot_values = values(vec![
            (Slot::named("D"), set(&["<E>", "hello"])),
            (Slot::named("E"), set(&["hi", "bonjour"])),
        ]);
        let merged = slot_values.merge_slots(1.0).unwrap();
        assert_eq!(merged.replacement(&Slot::named("E")), Some(&Slot::named("D")));
        assert_eq!(merged.get(&Slot::named("D")), Some(&set(&["hello", "hi", "bonjour"])));
    }

    #[test]
    fn test_chained_single_use_slots_are_inlined() {
        let slot_values = values(vec![
            (Slot::named("D"), set(&["<E>", "hello"])),
            (Slot::named("E"), set(&["<F>", "hi"])),
            (Slot::named("F"), set(&["x", "y"])),
        ]);
        let merged = slot_values.merge_slots(1.0).unwrap();
        assert_eq!(merged.unreplaced_slots(), vec![Slot::named("D")]);
        assert_eq!(merged.get(&Slot::named("D")), Some(&set(&["hello", "hi", "x", "y"])));
        assert_eq!(merged.replacement(&Slot::named("E")), Some(&Slot::named("D")));
        assert_eq!(merged.replacement(&Slot::named("F")), Some(&Slot::named("D")));
        assert_eq!(merged.get(&Slot::named("F")), Some(&set(&["<D>"])));
    }

    #[test]
    fn test_slot_shared_through_alias_is_not_inlined() {
        let d = Slot::named("D");
        let slot_values = values(vec![
            (a(), set(&["<B>", "a"])),
            (b(), set(&["<D>"])),
            (c(), set(&["<D>", "b"])),
            (d.clone(), set(&["c"])),
        ]);
        let merged = slot_values.merge_slots(1.0).unwrap();
        assert_eq!(merged.replacement(&b()), Some(&d));
        assert!(!merged.has_replacement(&d));
        assert_eq!(merged.get(&a()), Some(&set(&["a", "<D>"])));
        assert_eq!(merged.get(&c()), Some(&set(&["b", "<D>"])));
        assert_eq!(merged.get(&d), Some(&set(&["c"])));
    }

    #[test]
    fn test_non_replaced() {
        let e123 = set(&["hello", "hi", "hey"]);
        let slot_values = values(vec![(a(), e123.clone()), (b(), e123.clone())]);
        let merged = slot_values.merge_slots(1.0).unwrap();
        assert_eq!(merged.unreplaced_slots(), vec![a()]);
        assert_eq!(values(vec![(a(), e123)]), merged.non_replaced());
    }
}
