//! Templates: immutable sequences of literal tokens and slots.
//!
//! Template equality is positional: literals must match by content, named
//! slots by name, and any anonymous slot equals any other anonymous slot at the
//! same position. The hash only covers literal tokens, so templates that differ
//! in where their slots sit land in the same bucket and are told apart by
//! equality.
//!
//! # Example
//!
//! ```
//! use gitta_rs::{MergeOptions, Template};
//!
//! let first = Template::parse("a b c d");
//! let second = Template::parse("a e c d");
//! let merged = Template::merge_by_alignment(&first, &second, &MergeOptions::default());
//!
//! assert_eq!(merged[0], Template::parse("a [SLOT] c d"));
//! assert!(merged[0].covers(&first));
//! ```

use crate::alignment::{EditOp, EditTable};
use crate::error::{GrammarError, Result};
use crate::slot_values::SlotValues;
use crate::token::{Slot, Token};
use crate::tokenizer::{self, Detokenizer, SlotSyntax, Tokenizer, WordDetokenizer, WordTokenizer};
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Upper bound on the number of optimal alignments explored per merge.
pub const DEFAULT_MAX_ALIGNMENTS: usize = 4096;

/// An immutable sequence of tokens.
#[derive(Debug, Clone)]
pub struct Template {
    tokens: Rc<[Token]>,
}

/// A filling of a template's slots, one value per distinct slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotAssignment {
    values: IndexMap<Slot, Template>,
}

/// Knobs for [`Template::merge_by_alignment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Collapse adjacent slots and let named slots absorb new anonymous ones.
    pub minimal_variables: bool,
    /// Keep merges longer than both inputs.
    pub allow_longer: bool,
    /// Reject merges with fewer literal tokens than this.
    pub min_literals: Option<usize>,
    /// Stop after this many optimal alignments.
    pub max_alignments: Option<usize>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            minimal_variables: true,
            allow_longer: false,
            min_literals: None,
            max_alignments: Some(DEFAULT_MAX_ALIGNMENTS),
        }
    }
}

impl Template {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// A template consisting of nothing but `slot`.
    pub fn from_slot(slot: Slot) -> Self {
        Self::new(vec![Token::Slot(slot)])
    }

    /// Parses text with `<name>` slots using the default word tokenizer.
    pub fn parse(text: &str) -> Self {
        Self::parse_with(text, &WordTokenizer, SlotSyntax::Angle)
    }

    pub fn parse_with(text: &str, tokenizer: &dyn Tokenizer, syntax: SlotSyntax) -> Self {
        Self::new(tokenizer::parse_tokens(text, tokenizer, syntax))
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Slots in positional order, repeated slots included.
    pub fn slots(&self) -> impl Iterator<Item = &Slot> + '_ {
        self.tokens.iter().filter_map(Token::as_slot)
    }

    pub fn number_of_slots(&self) -> usize {
        self.slots().count()
    }

    pub fn number_of_literals(&self) -> usize {
        self.tokens.len() - self.number_of_slots()
    }

    pub fn has_slots(&self) -> bool {
        self.tokens.iter().any(Token::is_slot)
    }

    /// Returns the slot if this template is exactly one slot.
    pub fn as_single_slot(&self) -> Option<&Slot> {
        match &*self.tokens {
            [Token::Slot(slot)] => Some(slot),
            _ => None,
        }
    }

    /// Same length with literals equal and slots at the same positions,
    /// regardless of slot names.
    pub fn same_shape(&self, other: &Template) -> bool {
        self.len() == other.len()
            && self
                .tokens
                .iter()
                .zip(other.tokens.iter())
                .all(|(a, b)| match (a, b) {
                    (Token::Slot(_), Token::Slot(_)) => true,
                    (Token::Literal(x), Token::Literal(y)) => x == y,
                    _ => false,
                })
    }

    pub fn flat_string(&self, detokenizer: &dyn Detokenizer) -> String {
        let rendered: Vec<String> = self.tokens.iter().map(Token::to_string).collect();
        detokenizer.detokenize(&rendered)
    }

    /// Renders with `#name#` slots, the way Tracery writes them.
    pub fn hash_notation(&self, detokenizer: &dyn Detokenizer) -> String {
        let rendered: Vec<String> = self.tokens.iter().map(Token::to_hash_notation).collect();
        detokenizer.detokenize(&rendered)
    }

    pub(crate) fn default_flat_string(&self) -> String {
        self.flat_string(&WordDetokenizer)
    }

    // COVERING

    /// True iff some filling of this template's slots with zero or more
    /// tokens each reproduces `other` exactly.
    pub fn covers(&self, other: &Template) -> bool {
        CoverTable::new(&self.tokens, &other.tokens).covers(0, 0)
    }

    /// Every slot filling that turns this template into `other`, one
    /// template per slot occurrence in positional order.
    pub fn extract_content_all(&self, other: &Template) -> Result<Vec<Vec<Template>>> {
        let table = CoverTable::new(&self.tokens, &other.tokens);
        if !table.covers(0, 0) {
            return Err(self.not_covered(other));
        }

        let main = &self.tokens;
        let test = &other.tokens;
        let mut results: IndexSet<Vec<Template>> = IndexSet::new();

        // (main index, test index, fillers so far, whether the last filler is still open)
        let mut stack: Vec<(usize, usize, Vec<Vec<Token>>, bool)> = vec![(0, 0, Vec::new(), false)];
        while let Some((i, j, mut fillers, open)) = stack.pop() {
            if i == main.len() {
                if j == test.len() {
                    results.insert(fillers.into_iter().map(Template::new).collect());
                }
                continue;
            }

            match &main[i] {
                Token::Slot(_) => {
                    if !open {
                        fillers.push(Vec::new());
                    }
                    let consume = j < test.len() && table.covers(i, j + 1);
                    let skip = table.covers(i + 1, j);
                    // Pushed first so that "consumes nothing" is explored first.
                    if consume {
                        let mut extended = if skip {
                            fillers.clone()
                        } else {
                            std::mem::take(&mut fillers)
                        };
                        if let Some(last) = extended.last_mut() {
                            last.push(test[j].clone());
                        }
                        stack.push((i, j + 1, extended, true));
                    }
                    if skip {
                        stack.push((i + 1, j, fillers, false));
                    }
                }
                Token::Literal(_) => {
                    if table.literal_matches(i, j) && table.covers(i + 1, j + 1) {
                        stack.push((i + 1, j + 1, fillers, false));
                    }
                }
            }
        }

        Ok(results.into_iter().collect())
    }

    /// The slot filling producing `other` whose filler lengths have the lowest
    /// variance; the first such filling wins ties.
    pub fn extract_content(&self, other: &Template) -> Result<Vec<Template>> {
        let mut best: Option<(f64, Vec<Template>)> = None;
        for option in self.extract_content_all(other)? {
            let variance = length_variance(&option);
            match &best {
                Some((lowest, _)) if *lowest <= variance => {}
                _ => best = Some((variance, option)),
            }
        }
        best.map(|(_, option)| option)
            .ok_or_else(|| self.not_covered(other))
    }

    /// Pairs this template's slots with `values`, rejecting repeated slots.
    pub fn slot_assignment(&self, values: Vec<Template>) -> Result<SlotAssignment> {
        let slots: Vec<&Slot> = self.slots().collect();
        if slots.len() != values.len() {
            return Err(GrammarError::ArityMismatch {
                expected: slots.len(),
                found: values.len(),
            });
        }
        SlotAssignment::from_pairs(slots.into_iter().cloned().zip(values))
    }

    /// The value set each slot takes to produce `other`; repeated slots
    /// collect every value they were assigned.
    pub fn slot_values_mapping(
        &self,
        other: &Template,
    ) -> Result<IndexMap<Slot, IndexSet<Template>>> {
        let extracted = self.extract_content(other)?;
        let mut mapping: IndexMap<Slot, IndexSet<Template>> = IndexMap::new();
        for (slot, value) in self.slots().zip(extracted) {
            mapping.entry(slot.clone()).or_default().insert(value);
        }
        Ok(mapping)
    }

    /// True iff this template covers `other` through a filling where every
    /// slot maps onto itself or onto one of its known values.
    pub fn encompasses(&self, other: &Template, slot_values: &SlotValues) -> bool {
        let Ok(options) = self.extract_content_all(other) else {
            return false;
        };
        let slots: Vec<&Slot> = self.slots().collect();
        options.iter().any(|option| {
            slots.iter().zip(option).all(|(slot, value)| {
                value.as_single_slot() == Some(*slot)
                    || slot_values
                        .get(slot)
                        .is_some_and(|allowed| allowed.contains(value))
            })
        })
    }

    // SUBSTITUTION

    pub fn fill(&self, assignment: &SlotAssignment) -> Template {
        let mut tokens = Vec::with_capacity(self.len());
        for token in self.tokens.iter() {
            match token.as_slot().and_then(|slot| assignment.get(slot)) {
                Some(value) => tokens.extend(value.tokens.iter().cloned()),
                None => tokens.push(token.clone()),
            }
        }
        Template::new(tokens)
    }

    /// Fills slot occurrences positionally, so a repeated slot can receive
    /// different values.
    pub fn fill_with_tuple(&self, values: &[Template]) -> Result<Template> {
        let expected = self.number_of_slots();
        if expected != values.len() {
            return Err(GrammarError::ArityMismatch {
                expected,
                found: values.len(),
            });
        }
        let mut values = values.iter();
        let mut tokens = Vec::with_capacity(self.len());
        for token in self.tokens.iter() {
            match (token, token.is_slot().then(|| values.next()).flatten()) {
                (_, Some(value)) => tokens.extend(value.tokens.iter().cloned()),
                (token, None) => tokens.push(token.clone()),
            }
        }
        Ok(Template::new(tokens))
    }

    pub fn fill_with_strings(&self, values: &[&str]) -> Result<Template> {
        let parsed: Vec<Template> = values.iter().map(|value| Template::parse(value)).collect();
        self.fill_with_tuple(&parsed)
    }

    /// Replaces every slot that has an entry in `renaming`.
    pub fn rename_slots(&self, renaming: &IndexMap<Slot, Slot>) -> Template {
        if !self.slots().any(|slot| renaming.contains_key(slot)) {
            return self.clone();
        }
        Template::new(
            self.tokens
                .iter()
                .map(|token| match token.as_slot().and_then(|slot| renaming.get(slot)) {
                    Some(renamed) => Token::Slot(renamed.clone()),
                    None => token.clone(),
                })
                .collect(),
        )
    }

    // MERGING

    /// Generalizes two templates: one candidate per optimal alignment, with
    /// unequal positions replaced by anonymous slots. Duplicates are dropped.
    pub fn merge_by_alignment(
        first: &Template,
        second: &Template,
        options: &MergeOptions,
    ) -> Vec<Template> {
        let mut candidates: IndexSet<Template> = IndexSet::new();
        for merged in Self::merges(first, second, options) {
            candidates.insert(merged);
        }
        candidates.into_iter().collect()
    }

    fn merges<'t>(
        first: &'t Template,
        second: &Template,
        options: &'t MergeOptions,
    ) -> impl Iterator<Item = Template> + 't {
        let table = EditTable::new(&first.tokens, &second.tokens);
        let limit = options.max_alignments.unwrap_or(usize::MAX);
        let second_len = second.len();
        let alignments: Vec<Vec<EditOp>> = table.alignments().take(limit).collect();
        alignments.into_iter().filter_map(move |alignment| {
            let merged = Template::new(apply_alignment(
                &first.tokens,
                &alignment,
                options.minimal_variables,
            ));
            let short_enough = options.allow_longer
                || merged.len() <= first.len()
                || merged.len() <= second_len;
            let literal_enough = options
                .min_literals
                .map_or(true, |min| merged.number_of_literals() >= min);
            (short_enough && literal_enough).then_some(merged)
        })
    }

    /// Left fold of [`Template::merge_by_alignment`] over `templates`, taking
    /// the first candidate each step. With a `default` that already
    /// generalizes everything, stops as soon as the running merge has the
    /// default's shape and returns the default.
    pub fn merge_all(
        templates: &[Template],
        minimal_variables: bool,
        default: Option<&Template>,
    ) -> Option<Template> {
        let Some((first, rest)) = templates.split_first() else {
            return default.cloned();
        };
        let options = MergeOptions {
            minimal_variables,
            min_literals: default.map(Template::number_of_literals),
            ..MergeOptions::default()
        };

        let mut current = first.clone();
        for next in rest {
            // No candidate as specific as the default keeps the running merge.
            let candidate = Self::merges(&current, next, &options).next();
            if let Some(merged) = candidate {
                current = merged;
            }
            if let Some(default) = default {
                if default.same_shape(&current) {
                    return Some(default.clone());
                }
            }
        }
        Some(current)
    }

    fn not_covered(&self, other: &Template) -> GrammarError {
        GrammarError::NotCovered {
            template: self.to_string(),
            target: other.to_string(),
        }
    }
}

fn ends_with_anonymous_slot(tokens: &[Token]) -> bool {
    matches!(tokens.last(), Some(Token::Slot(Slot::Anonymous(_))))
}

fn ends_with_slot(tokens: &[Token]) -> bool {
    matches!(tokens.last(), Some(Token::Slot(_)))
}

/// Builds the merged token sequence for one alignment, walking the first
/// template's tokens.
fn apply_alignment(tokens: &[Token], alignment: &[EditOp], minimal_variables: bool) -> Vec<Token> {
    let mut merged: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut index = 0;
    for op in alignment {
        match op {
            EditOp::Match => {
                let token = &tokens[index];
                index += 1;
                let absorbed = minimal_variables
                    && matches!(token, Token::Slot(Slot::Anonymous(_)))
                    && ends_with_slot(&merged);
                if !absorbed {
                    merged.push(token.clone());
                }
            }
            EditOp::Substitute => {
                index += 1;
                if !(minimal_variables && ends_with_anonymous_slot(&merged)) {
                    merged.push(Token::anonymous_slot());
                }
            }
            EditOp::Delete => {
                index += 1;
                if !ends_with_anonymous_slot(&merged) {
                    merged.push(Token::anonymous_slot());
                }
            }
            EditOp::Insert => {
                if !ends_with_anonymous_slot(&merged) {
                    merged.push(Token::anonymous_slot());
                }
            }
        }
    }
    merged
}

fn length_variance(option: &[Template]) -> f64 {
    if option.is_empty() {
        return 0.0;
    }
    let count = option.len() as f64;
    let mean = option.iter().map(|t| t.len() as f64).sum::<f64>() / count;
    option
        .iter()
        .map(|t| {
            let delta = t.len() as f64 - mean;
            delta * delta
        })
        .sum::<f64>()
        / count
}

/// `covers[i][j]`: does `main[i..]` cover `test[j..]`.
struct CoverTable<'a> {
    main: &'a [Token],
    test: &'a [Token],
    columns: usize,
    covers: Vec<bool>,
}

impl<'a> CoverTable<'a> {
    fn new(main: &'a [Token], test: &'a [Token]) -> Self {
        let columns = test.len() + 1;
        let mut covers = vec![false; (main.len() + 1) * columns];
        covers[main.len() * columns + test.len()] = true;

        let mut table = Self {
            main,
            test,
            columns,
            covers: Vec::new(),
        };
        for i in (0..main.len()).rev() {
            for j in (0..=test.len()).rev() {
                let value = match &main[i] {
                    Token::Slot(_) => {
                        covers[(i + 1) * columns + j]
                            || (j < test.len() && covers[i * columns + j + 1])
                    }
                    Token::Literal(_) => {
                        table.literal_matches(i, j) && covers[(i + 1) * columns + j + 1]
                    }
                };
                covers[i * columns + j] = value;
            }
        }
        table.covers = covers;
        table
    }

    fn covers(&self, i: usize, j: usize) -> bool {
        self.covers[i * self.columns + j]
    }

    fn literal_matches(&self, i: usize, j: usize) -> bool {
        match (&self.main[i], self.test.get(j)) {
            (Token::Literal(a), Some(Token::Literal(b))) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .tokens
                .iter()
                .zip(other.tokens.iter())
                .all(|(a, b)| match (a, b) {
                    (Token::Literal(x), Token::Literal(y)) => x == y,
                    (Token::Slot(Slot::Named(x)), Token::Slot(Slot::Named(y))) => x == y,
                    (Token::Slot(Slot::Anonymous(_)), Token::Slot(Slot::Anonymous(_))) => true,
                    _ => false,
                })
    }
}

impl Eq for Template {}

impl Hash for Template {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for token in self.tokens.iter() {
            if let Token::Literal(content) = token {
                content.hash(state);
            }
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, token) in self.tokens.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            token.fmt(f)?;
        }
        Ok(())
    }
}

impl From<Vec<Token>> for Template {
    fn from(tokens: Vec<Token>) -> Self {
        Template::new(tokens)
    }
}

impl FromIterator<Token> for Template {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Template::new(iter.into_iter().collect())
    }
}

impl SlotAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Slot, Template)>) -> Result<Self> {
        let mut assignment = Self::new();
        for (slot, value) in pairs {
            assignment.insert(slot, value)?;
        }
        Ok(assignment)
    }

    /// Adds a value for `slot`, failing if the slot already has one.
    pub fn insert(&mut self, slot: Slot, value: Template) -> Result<()> {
        if self.values.contains_key(&slot) {
            return Err(GrammarError::DuplicateSlot(slot.to_string()));
        }
        self.values.insert(slot, value);
        Ok(())
    }

    pub fn get(&self, slot: &Slot) -> Option<&Template> {
        self.values.get(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Slot, &Template)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains_empty_value(&self) -> bool {
        self.values.values().any(Template::is_empty)
    }
}
