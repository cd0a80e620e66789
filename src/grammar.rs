//! Context-free grammars over templates.
//!
//! A [`ContextFreeGrammar`] maps every non-terminal (a [`Slot`]) to its
//! productions, each a [`Template`] whose slots refer to other non-terminals.
//! Slots that are referenced but never defined behave like terminals: they
//! are left in place by generation and count as leaves everywhere else.
//!
//! ```
//! use gitta_rs::ContextFreeGrammar;
//!
//! let grammar = ContextFreeGrammar::from_strings([
//!     ("origin", vec!["<hello> <world>"]),
//!     ("hello", vec!["hello", "hi"]),
//!     ("world", vec!["world", "universe"]),
//! ]);
//!
//! assert_eq!(grammar.number_of_generations(), Some(4));
//! assert_eq!(grammar.depth(), Some(2));
//! assert!(!grammar.is_recursive());
//! ```

use crate::error::{GrammarError, Result};
use crate::slot_values::SlotValues;
use crate::template::Template;
use crate::token::Slot;
use crate::tokenizer::{Detokenizer, WordDetokenizer};
use crate::tree::{NodeKey, TreeArena};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use indexmap::{IndexMap, IndexSet};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::collections::VecDeque;
use std::fmt;

/// Expansion depth used when none is given.
pub const DEFAULT_DEPTH: usize = 100;

/// Name of the default start non-terminal.
pub const ORIGIN: &str = "origin";

#[derive(Debug, Clone)]
pub struct ContextFreeGrammar {
    rules: IndexMap<Slot, Vec<Template>>,
    start: Slot,
}

/// Productions of one non-terminal in a grammar document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Productions {
    One(String),
    Many(Vec<String>),
}

impl Productions {
    fn into_vec(self) -> Vec<String> {
        match self {
            Productions::One(production) => vec![production],
            Productions::Many(productions) => productions,
        }
    }
}

/// Visit state of a non-terminal during a depth-first walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Open,
    Done,
}

impl ContextFreeGrammar {
    /// A grammar starting at `<origin>`.
    pub fn new(rules: IndexMap<Slot, Vec<Template>>) -> Self {
        Self::with_start(rules, Slot::named(ORIGIN))
    }

    pub fn with_start(rules: IndexMap<Slot, Vec<Template>>, start: Slot) -> Self {
        Self { rules, start }
    }

    /// Builds a grammar from named productions written in `<name>` notation.
    pub fn from_strings<K, V, S>(rules: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_strings_with(rules, Template::parse)
    }

    /// Like [`ContextFreeGrammar::from_strings`] with a custom template parser.
    pub fn from_strings_with<K, V, S>(
        rules: impl IntoIterator<Item = (K, V)>,
        parser: impl Fn(&str) -> Template,
    ) -> Self
    where
        K: Into<String>,
        V: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed: IndexMap<Slot, Vec<Template>> = IndexMap::new();
        for (name, productions) in rules {
            parsed
                .entry(Slot::named(name))
                .or_default()
                .extend(productions.into_iter().map(|production| parser(production.as_ref())));
        }
        Self::new(parsed)
    }

    /// Parses a JSON object mapping names to one production or a list of them.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_json_str_with(json, Template::parse)
    }

    pub(crate) fn from_json_str_with(
        json: &str,
        parser: impl Fn(&str) -> Template,
    ) -> Result<Self> {
        let document: IndexMap<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|err| match err.classify() {
                serde_json::error::Category::Data => GrammarError::InvalidGrammarShape(
                    "expected an object of productions".to_string(),
                ),
                _ => GrammarError::Json(err),
            })?;

        let mut rules = Vec::with_capacity(document.len());
        for (name, value) in document {
            let productions = Productions::deserialize(value).map_err(|_| {
                GrammarError::InvalidGrammarShape(format!(
                    "productions of \"{name}\" must be a string or a list of strings"
                ))
            })?;
            rules.push((name, productions.into_vec()));
        }
        Ok(Self::from_strings_with(rules, parser))
    }

    /// Renders the grammar as a JSON object with four-space indentation.
    /// Non-terminals follow [`ContextFreeGrammar::slots_sorted`] and every
    /// production list is sorted.
    pub fn to_json(&self) -> Result<String> {
        self.to_json_with(|template| template.flat_string(&WordDetokenizer))
    }

    pub(crate) fn to_json_with(&self, render: impl Fn(&Template) -> String) -> Result<String> {
        let mut document: IndexMap<String, Vec<String>> = IndexMap::new();
        for slot in self.slots_sorted() {
            let Some(productions) = self.rules.get(&slot) else {
                continue;
            };
            let mut rendered: Vec<String> = productions.iter().map(&render).collect();
            rendered.sort();
            document.insert(slot_key(&slot), rendered);
        }

        let mut out = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        document.serialize(&mut serializer)?;
        // serde_json only ever writes valid UTF-8.
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Turns merged slot values into rules. A root that is a single slot is
    /// inlined as the start symbol; any other root becomes its only
    /// production.
    pub fn from_slot_values(root: &Template, slot_values: &SlotValues) -> Self {
        let mut rules: IndexMap<Slot, Vec<Template>> = slot_values
            .non_replaced()
            .iter()
            .map(|(slot, values)| {
                let productions = values
                    .iter()
                    .filter(|value| value.as_single_slot() != Some(slot))
                    .cloned()
                    .collect();
                (slot.clone(), productions)
            })
            .collect();

        let start = Slot::named(ORIGIN);
        let origin = match root.as_single_slot() {
            Some(root_slot) => {
                let inlined = rules.shift_remove(root_slot);
                let renaming: IndexMap<Slot, Slot> =
                    [(root_slot.clone(), start.clone())].into_iter().collect();
                for productions in rules.values_mut() {
                    for production in productions.iter_mut() {
                        *production = production.rename_slots(&renaming);
                    }
                }
                match inlined {
                    Some(productions) => productions
                        .iter()
                        .map(|p| p.rename_slots(&renaming))
                        .collect(),
                    None => vec![root.clone()],
                }
            }
            None => vec![root.clone()],
        };

        let mut ordered = IndexMap::with_capacity(rules.len() + 1);
        ordered.insert(start.clone(), origin);
        ordered.extend(rules);
        Self::with_start(ordered, start)
    }

    /// Derives a grammar from a learned and named tree: the tree is
    /// collapsed, its slot values merged under `relative_similarity_threshold`,
    /// and nodes made redundant by those values are spliced out.
    pub fn from_template_tree(
        arena: &mut TreeArena,
        root: NodeKey,
        relative_similarity_threshold: f64,
    ) -> Result<Self> {
        let collapsed = arena.collapse(root);
        let slot_values = arena
            .slot_values(collapsed)?
            .merge_slots(relative_similarity_threshold)?;
        let simplified = arena.collapse_using_slot_values(collapsed, &slot_values);
        Ok(Self::from_slot_values(arena.template(simplified), &slot_values))
    }

    pub fn start(&self) -> &Slot {
        &self.start
    }

    /// Defined non-terminals in definition order.
    pub fn slots(&self) -> impl Iterator<Item = &Slot> + '_ {
        self.rules.keys()
    }

    pub fn rules(&self) -> impl Iterator<Item = (&Slot, &[Template])> + '_ {
        self.rules.iter().map(|(slot, productions)| (slot, productions.as_slice()))
    }

    pub fn productions(&self, slot: &Slot) -> Result<&[Template]> {
        self.rules
            .get(slot)
            .map(Vec::as_slice)
            .ok_or_else(|| GrammarError::UnknownNonTerminal(slot.to_string()))
    }

    pub fn is_defined(&self, slot: &Slot) -> bool {
        self.rules.contains_key(slot)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Total number of productions, as if every alternative were its own rule.
    pub fn size(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    /// Defined non-terminals breadth-first from the start, followed by the
    /// unreachable ones in definition order.
    pub fn slots_sorted(&self) -> Vec<Slot> {
        let mut sorted: IndexSet<Slot> = IndexSet::new();
        let mut seen: HashSet<&Slot> = HashSet::new();
        let mut queue = VecDeque::from([&self.start]);
        seen.insert(&self.start);
        while let Some(slot) = queue.pop_front() {
            let Some(productions) = self.rules.get(slot) else {
                continue;
            };
            sorted.insert(slot.clone());
            for referenced in productions.iter().flat_map(Template::slots) {
                if seen.insert(referenced) {
                    queue.push_back(referenced);
                }
            }
        }
        for slot in self.rules.keys() {
            if !sorted.contains(slot) {
                sorted.insert(slot.clone());
            }
        }
        sorted.into_iter().collect()
    }

    /// Slots referenced by a production without a definition of their own.
    pub fn undefined_slots(&self) -> IndexSet<Slot> {
        self.rules
            .values()
            .flatten()
            .flat_map(Template::slots)
            .filter(|slot| !self.rules.contains_key(*slot))
            .cloned()
            .collect()
    }

    pub fn unreachable_slots(&self) -> IndexSet<Slot> {
        let reachable: HashSet<&Slot> = self.reachable().into_iter().collect();
        self.rules
            .keys()
            .filter(|slot| !reachable.contains(slot))
            .cloned()
            .collect()
    }

    fn reachable(&self) -> Vec<&Slot> {
        let mut seen: IndexSet<&Slot> = IndexSet::new();
        let mut stack = vec![&self.start];
        while let Some(slot) = stack.pop() {
            if !seen.insert(slot) {
                continue;
            }
            if let Some(productions) = self.rules.get(slot) {
                stack.extend(productions.iter().flat_map(Template::slots));
            }
        }
        seen.into_iter().collect()
    }

    fn referenced_definitions<'a>(&'a self, slot: &Slot) -> impl Iterator<Item = &'a Slot> + 'a {
        self.rules
            .get(slot)
            .into_iter()
            .flatten()
            .flat_map(Template::slots)
            .filter(|referenced| self.rules.contains_key(*referenced))
    }

    /// Defined non-terminals reachable from the start, every one after all
    /// non-terminals it refers to, or `None` when a cycle is reachable.
    fn dependency_order(&self) -> Option<Vec<&Slot>> {
        if !self.rules.contains_key(&self.start) {
            return Some(Vec::new());
        }
        let mut visits: HashMap<&Slot, Visit> = HashMap::new();
        let mut order = Vec::new();
        let mut stack: Vec<(&Slot, bool)> = vec![(&self.start, false)];
        while let Some((slot, finished)) = stack.pop() {
            if finished {
                visits.insert(slot, Visit::Done);
                order.push(slot);
                continue;
            }
            match visits.get(slot) {
                Some(Visit::Done) => continue,
                Some(Visit::Open) => return None,
                None => {}
            }
            visits.insert(slot, Visit::Open);
            stack.push((slot, true));
            for referenced in self.referenced_definitions(slot) {
                match visits.get(referenced) {
                    Some(Visit::Open) => return None,
                    Some(Visit::Done) => {}
                    None => stack.push((referenced, false)),
                }
            }
        }
        Some(order)
    }

    /// True iff some non-terminal reachable from the start can expand into
    /// itself.
    pub fn is_recursive(&self) -> bool {
        self.dependency_order().is_none()
    }

    /// Length of the longest chain of expansions from the start, or `None`
    /// for recursive grammars.
    pub fn depth(&self) -> Option<usize> {
        let order = self.dependency_order()?;
        let mut depths: HashMap<&Slot, usize> = HashMap::new();
        for slot in order {
            let deepest = self
                .referenced_definitions(slot)
                .filter_map(|referenced| depths.get(referenced))
                .max()
                .copied()
                .unwrap_or(0);
            depths.insert(slot, deepest + 1);
        }
        Some(depths.get(&self.start).copied().unwrap_or(0))
    }

    /// Number of derivations from the start, counting every occurrence of a
    /// slot separately. `None` for recursive grammars; saturates at
    /// `u64::MAX`.
    pub fn number_of_generations(&self) -> Option<u64> {
        let order = self.dependency_order()?;
        let mut counts: HashMap<&Slot, u64> = HashMap::new();
        for slot in order {
            let total = self.rules[slot]
                .iter()
                .map(|production| {
                    production
                        .slots()
                        .map(|referenced| counts.get(referenced).copied().unwrap_or(1))
                        .fold(1u64, u64::saturating_mul)
                })
                .fold(0u64, u64::saturating_add);
            counts.insert(slot, total);
        }
        Some(counts.get(&self.start).copied().unwrap_or(1))
    }

    // GENERATION

    /// One random expansion of the start symbol.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Template> {
        self.generate_from(&self.start, DEFAULT_DEPTH, rng)
    }

    /// One random expansion of `slot`, expanding every slot occurrence
    /// independently. Slots still present after `max_depth` levels are left
    /// unexpanded.
    pub fn generate_from<R: Rng + ?Sized>(
        &self,
        slot: &Slot,
        max_depth: usize,
        rng: &mut R,
    ) -> Result<Template> {
        self.productions(slot)?;
        self.expand_randomly(slot, max_depth, rng)
    }

    fn expand_randomly<R: Rng + ?Sized>(
        &self,
        slot: &Slot,
        max_depth: usize,
        rng: &mut R,
    ) -> Result<Template> {
        if max_depth == 0 {
            return Ok(Template::from_slot(slot.clone()));
        }
        let chosen = self
            .rules
            .get(slot)
            .and_then(|productions| productions.choose(rng));
        let Some(chosen) = chosen else {
            return Ok(Template::from_slot(slot.clone()));
        };
        let values = chosen
            .slots()
            .map(|referenced| self.expand_randomly(referenced, max_depth - 1, rng))
            .collect::<Result<Vec<_>>>()?;
        chosen.fill_with_tuple(&values)
    }

    /// Every distinct expansion of `slot` within `max_depth` levels, where
    /// repeated occurrences of a slot are expanded independently.
    pub fn generate_all(&self, slot: &Slot, max_depth: usize) -> Result<IndexSet<Template>> {
        self.productions(slot)?;
        self.expand_all(slot, max_depth, &mut HashMap::new())
    }

    /// [`ContextFreeGrammar::generate_all`] from the start symbol.
    pub fn generate_all_from_start(&self) -> Result<IndexSet<Template>> {
        self.generate_all(&self.start, DEFAULT_DEPTH)
    }

    fn expand_all(
        &self,
        slot: &Slot,
        max_depth: usize,
        memo: &mut HashMap<(Slot, usize), IndexSet<Template>>,
    ) -> Result<IndexSet<Template>> {
        let unexpanded =
            || -> IndexSet<Template> { [Template::from_slot(slot.clone())].into_iter().collect() };
        if max_depth == 0 {
            return Ok(unexpanded());
        }
        let Some(productions) = self.rules.get(slot) else {
            return Ok(unexpanded());
        };
        if let Some(done) = memo.get(&(slot.clone(), max_depth)) {
            return Ok(done.clone());
        }

        let mut results = IndexSet::new();
        for production in productions {
            let occurrences: Vec<Slot> = production.slots().cloned().collect();
            if occurrences.is_empty() {
                results.insert(production.clone());
                continue;
            }
            let mut values = SlotValues::new();
            for referenced in &occurrences {
                if !values.contains_slot(referenced) {
                    let expansions = self.expand_all(referenced, max_depth - 1, memo)?;
                    values.insert(referenced.clone(), expansions);
                }
            }
            for tuple in values.all_possible_tuples(&occurrences)? {
                results.insert(production.fill_with_tuple(&tuple)?);
            }
        }

        memo.insert((slot.clone(), max_depth), results.clone());
        Ok(results)
    }

    /// Every expansion of `slot` within `max_depth` levels, where all
    /// occurrences of the same slot in a production share one value.
    pub fn generate_all_unique_slot(&self, slot: &Slot, max_depth: usize) -> Result<Vec<Template>> {
        self.productions(slot)?;
        self.expand_all_unique(slot, max_depth)
    }

    fn expand_all_unique(&self, slot: &Slot, max_depth: usize) -> Result<Vec<Template>> {
        if max_depth == 0 {
            return Ok(vec![Template::from_slot(slot.clone())]);
        }
        let Some(productions) = self.rules.get(slot) else {
            return Ok(vec![Template::from_slot(slot.clone())]);
        };

        let mut results = Vec::new();
        for production in productions {
            let distinct: IndexSet<Slot> = production.slots().cloned().collect();
            let distinct: Vec<Slot> = distinct.into_iter().collect();
            if distinct.is_empty() {
                results.push(production.clone());
                continue;
            }
            let mut values = SlotValues::new();
            for referenced in &distinct {
                let expansions = self.expand_all_unique(referenced, max_depth - 1)?;
                values.add_values(referenced.clone(), expansions);
            }
            for assignment in values.all_possible_assignments(&distinct)? {
                results.push(production.fill(&assignment));
            }
        }
        Ok(results)
    }

    /// All expansions of the start symbol rendered through `detokenizer`.
    pub fn generate_all_strings(&self, detokenizer: &dyn Detokenizer) -> Result<Vec<String>> {
        Ok(self
            .generate_all_from_start()?
            .iter()
            .map(|template| template.flat_string(detokenizer))
            .collect())
    }
}

/// JSON key of a non-terminal: its name, or the anonymous marker.
pub(crate) fn slot_key(slot: &Slot) -> String {
    match slot.name() {
        Some(name) => name.to_string(),
        None => slot.to_string(),
    }
}

impl Default for ContextFreeGrammar {
    fn default() -> Self {
        Self::new(IndexMap::new())
    }
}

/// Grammars are equal when they share a start symbol and define the same
/// non-terminals with the same productions, in any order.
impl PartialEq for ContextFreeGrammar {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start
            && self.rules.len() == other.rules.len()
            && self.rules.iter().all(|(slot, productions)| {
                other
                    .rules
                    .get(slot)
                    .is_some_and(|others| same_multiset(productions, others))
            })
    }
}

impl Eq for ContextFreeGrammar {}

fn same_multiset(first: &[Template], second: &[Template]) -> bool {
    if first.len() != second.len() {
        return false;
    }
    let mut counts: HashMap<&Template, isize> = HashMap::new();
    for template in first {
        *counts.entry(template).or_default() += 1;
    }
    for template in second {
        *counts.entry(template).or_default() -= 1;
    }
    counts.values().all(|&count| count == 0)
}

impl fmt::Display for ContextFreeGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::notation::to_arrow_notation(self, &WordDetokenizer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn hello_world() -> ContextFreeGrammar {
        ContextFreeGrammar::from_strings([
            ("origin", vec!["<hello> <world>"]),
            ("hello", vec!["hello", "hi", "hey"]),
            ("world", vec!["world", "universe"]),
        ])
    }

    fn flat_strings(templates: impl IntoIterator<Item = Template>) -> IndexSet<String> {
        templates.into_iter().map(|t| t.flat_string(&WordDetokenizer)).collect()
    }

    fn strings(values: &[&str]) -> IndexSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_from_strings() {
        let grammar = ContextFreeGrammar::from_strings([
            ("A", vec!["<B>, world", "hi"]),
            ("B", vec!["hello"]),
        ]);

        let mut rules = IndexMap::new();
        rules.insert(
            Slot::named("A"),
            vec![
                Template::new(vec![
                    crate::token::Token::named_slot("B"),
                    crate::token::Token::literal(","),
                    crate::token::Token::literal("world"),
                ]),
                Template::parse("hi"),
            ],
        );
        rules.insert(Slot::named("B"), vec![Template::parse("hello")]);
        assert_eq!(ContextFreeGrammar::new(rules), grammar);
    }

    #[test]
    fn test_equality_ignores_order() {
        let first =
            ContextFreeGrammar::from_strings([("origin", vec!["<a>", "b"]), ("a", vec!["x"])]);
        let second =
            ContextFreeGrammar::from_strings([("a", vec!["x"]), ("origin", vec!["b", "<a>"])]);
        let third =
            ContextFreeGrammar::from_strings([("a", vec!["x"]), ("origin", vec!["b", "b"])]);
        assert_eq!(first, second);
        assert_ne!(first, third);
    }

    #[test]
    fn test_depth() {
        let simple =
            ContextFreeGrammar::from_strings([("origin", vec!["expands only to one texts"])]);
        assert_eq!(Some(1), simple.depth());
        assert_eq!(Some(2), hello_world().depth());

        let chain = ContextFreeGrammar::from_strings([
            ("origin", vec!["<A>"]),
            ("A", vec!["<B>"]),
            ("B", vec!["<C>"]),
            ("C", vec!["hi"]),
        ]);
        assert_eq!(Some(4), chain.depth());

        let recursive = ContextFreeGrammar::from_strings([
            ("origin", vec!["<a>", "a <origin>"]),
            ("a", vec!["world"]),
        ]);
        assert_eq!(None, recursive.depth());
        assert!(recursive.is_recursive());
        assert!(!chain.is_recursive());
    }

    #[test]
    fn test_number_of_generations() {
        assert_eq!(Some(6), hello_world().number_of_generations());

        let same_name = ContextFreeGrammar::from_strings([
            ("origin", vec!["I like <X> and <X>"]),
            ("X", vec!["cats", "dogs", "pandas"]),
        ]);
        assert_eq!(Some(9), same_name.number_of_generations());

        let recursive = ContextFreeGrammar::from_strings([("origin", vec!["a <origin>", "b"])]);
        assert_eq!(None, recursive.number_of_generations());
    }

    #[test]
    fn test_generate_flat() {
        let single = ContextFreeGrammar::from_strings([
            ("origin", vec!["<hello> <world>"]),
            ("hello", vec!["hello"]),
            ("world", vec!["world"]),
        ]);
        let mut rng = StdRng::seed_from_u64(123);
        let generated = single.generate(&mut rng).unwrap();
        assert_eq!("hello world", generated.flat_string(&WordDetokenizer));
    }

    #[test]
    fn test_generate_more() {
        let grammar = hello_world();
        let mut rng = StdRng::seed_from_u64(123);
        let generated = flat_strings((0..200).map(|_| grammar.generate(&mut rng).unwrap()));
        let expected = strings(&[
            "hello world",
            "hi world",
            "hey world",
            "hello universe",
            "hi universe",
            "hey universe",
        ]);
        assert_eq!(expected, generated);
    }

    #[test]
    fn test_generate_same_name() {
        let grammar = ContextFreeGrammar::from_strings([
            ("origin", vec!["I like <X> and <X>"]),
            ("X", vec!["cats", "dogs", "pandas"]),
        ]);
        let mut possibilities = IndexSet::new();
        for first in ["cats", "dogs", "pandas"] {
            for second in ["cats", "dogs", "pandas"] {
                possibilities.insert(format!("I like {first} and {second}"));
            }
        }

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let generated = grammar.generate(&mut rng).unwrap().flat_string(&WordDetokenizer);
            assert!(possibilities.contains(&generated));
        }
        assert_eq!(possibilities, flat_strings(grammar.generate_all_from_start().unwrap()));

        let unique = grammar
            .generate_all_unique_slot(grammar.start(), DEFAULT_DEPTH)
            .unwrap();
        assert_eq!(
            flat_strings(unique),
            strings(&[
                "I like cats and cats",
                "I like dogs and dogs",
                "I like pandas and pandas",
            ])
        );
    }

    #[test]
    fn test_generate_all() {
        let generated = flat_strings(hello_world().generate_all_from_start().unwrap());
        let expected = strings(&[
            "hello world",
            "hi world",
            "hey world",
            "hello universe",
            "hi universe",
            "hey universe",
        ]);
        assert_eq!(expected, generated);
    }

    #[test]
    fn test_depth_limit_leaves_slots() {
        let recursive = ContextFreeGrammar::from_strings([("origin", vec!["a <origin>", "b"])]);
        let generated = flat_strings(recursive.generate_all(recursive.start(), 2).unwrap());
        assert_eq!(generated, strings(&["a a <origin>", "a b", "b"]));

        let zero = recursive.generate_all(recursive.start(), 0).unwrap();
        assert_eq!(zero.len(), 1);
        assert_eq!(zero[0], Template::parse("<origin>"));
    }

    #[test]
    fn test_unknown_start() {
        let grammar = hello_world();
        let missing = Slot::named("missing");
        assert!(matches!(
            grammar.generate_all(&missing, 3),
            Err(GrammarError::UnknownNonTerminal(_))
        ));
        let mut rng = StdRng::seed_from_u64(1);
        assert!(grammar.generate_from(&missing, 3, &mut rng).is_err());
    }

    #[test]
    fn test_undefined_slots_are_leaves() {
        let grammar = ContextFreeGrammar::from_strings([("origin", vec!["hello <name>", "bye"])]);
        let undefined: IndexSet<Slot> = [Slot::named("name")].into_iter().collect();
        assert_eq!(grammar.undefined_slots(), undefined);
        assert_eq!(Some(1), grammar.depth());
        assert_eq!(Some(2), grammar.number_of_generations());
        let generated = flat_strings(grammar.generate_all_from_start().unwrap());
        assert_eq!(generated, strings(&["hello <name>", "bye"]));
    }

    #[test]
    fn test_slots_sorted_and_unreachable() {
        let grammar = ContextFreeGrammar::from_strings([
            ("lonely", vec!["nobody"]),
            ("world", vec!["world"]),
            ("origin", vec!["<hello> <world>"]),
            ("hello", vec!["hi"]),
        ]);
        let sorted: Vec<String> = grammar.slots_sorted().iter().map(slot_key).collect();
        assert_eq!(sorted, vec!["origin", "hello", "world", "lonely"]);
        let unreachable: IndexSet<Slot> = [Slot::named("lonely")].into_iter().collect();
        assert_eq!(grammar.unreachable_slots(), unreachable);
        assert_eq!(grammar.size(), 4);
    }

    #[test]
    fn test_json_round_trip() {
        let grammar = hello_world();
        let json = grammar.to_json().unwrap();
        assert!(json.starts_with("{\n    \"origin\": [\n        \"<hello> <world>\"\n    ],"));
        assert!(json.contains("\"hello\",\n        \"hey\",\n        \"hi\""));
        assert_eq!(grammar, ContextFreeGrammar::from_json_str(&json).unwrap());
    }

    #[test]
    fn test_json_single_string_production() {
        let grammar =
            ContextFreeGrammar::from_json_str(r#"{"origin": "<a> b", "a": ["x", "y"]}"#).unwrap();
        assert_eq!(
            grammar.productions(&Slot::named("origin")).unwrap(),
            &[Template::parse("<a> b")]
        );
        assert_eq!(grammar.size(), 3);
    }

    #[test]
    fn test_json_invalid_shape() {
        assert!(matches!(
            ContextFreeGrammar::from_json_str(r#"["origin"]"#),
            Err(GrammarError::InvalidGrammarShape(_))
        ));
        assert!(matches!(
            ContextFreeGrammar::from_json_str(r#"{"origin": [1, 2]}"#),
            Err(GrammarError::InvalidGrammarShape(_))
        ));
        assert!(matches!(ContextFreeGrammar::from_json_str("{"), Err(GrammarError::Json(_))));
    }

    #[test]
    fn test_from_slot_values_inlines_root_slot() {
        let a_values: IndexSet<Template> = [Template::parse("<B> world"), Template::parse("<A>")]
            .into_iter()
            .collect();
        let b_values: IndexSet<Template> = [Template::parse("hello"), Template::parse("hi")]
            .into_iter()
            .collect();
        let values: SlotValues = [(Slot::named("A"), a_values), (Slot::named("B"), b_values)]
            .into_iter()
            .collect();

        let grammar = ContextFreeGrammar::from_slot_values(&Template::parse("<A>"), &values);
        let expected = ContextFreeGrammar::from_strings([
            ("origin", vec!["<B> world"]),
            ("B", vec!["hello", "hi"]),
        ]);
        assert_eq!(expected, grammar);
        assert_eq!(grammar.slots().next(), Some(&Slot::named("origin")));
    }

    #[test]
    fn test_from_slot_values_keeps_template_root() {
        let values = SlotValues::from_pairs([
            (Slot::named("A"), Template::parse("hello")),
            (Slot::named("A"), Template::parse("hi")),
        ]);
        let grammar = ContextFreeGrammar::from_slot_values(&Template::parse("<A> world"), &values);
        let expected = ContextFreeGrammar::from_strings([
            ("origin", vec!["<A> world"]),
            ("A", vec!["hello", "hi"]),
        ]);
        assert_eq!(expected, grammar);
    }

    #[test]
    fn test_from_template_tree() {
        let mut arena = TreeArena::new();
        let lines = ["hello world", "hi world"];
        let leaves: Vec<NodeKey> = lines
            .iter()
            .map(|line| arena.leaf(Template::parse(line)))
            .collect();
        let root = arena.node(Template::parse("<A> world"), leaves);

        let grammar = ContextFreeGrammar::from_template_tree(&mut arena, root, 1.0).unwrap();
        let expected = ContextFreeGrammar::from_strings([
            ("origin", vec!["<A> world"]),
            ("A", vec!["hello", "hi"]),
        ]);
        assert_eq!(expected, grammar);
    }
}
