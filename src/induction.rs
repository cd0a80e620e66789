//! The induction pipeline: learn a template tree from a corpus, simplify it
//! until it stops changing and read a grammar off the result.
//!
//! ```
//! use gitta_rs::{induce_grammar, ContextFreeGrammar, InductionConfig};
//!
//! let config = InductionConfig::default();
//! let grammar = induce_grammar(&["hello world", "hi world"], &config).unwrap();
//! let expected = ContextFreeGrammar::from_strings([
//!     ("origin", vec!["<A> world"]),
//!     ("A", vec!["hello", "hi"]),
//! ]);
//! assert!(grammar.is_isomorphic_with(&expected));
//! ```

use crate::error::{GrammarError, Result};
use crate::grammar::ContextFreeGrammar;
use crate::learner::LatticeLearner;
use crate::slot_names::SlotNameGenerator;
use crate::slot_values::SlotValues;
use crate::template::DEFAULT_MAX_ALIGNMENTS;
use crate::tokenizer::{Tokenizer, WordTokenizer};
use crate::tree::{NodeKey, TemplateTree, TreeArena};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Rounds of recalculation allowed when no explicit bound is configured.
const UNBOUNDED_RECALCULATION_LIMIT: usize = 256;

/// Options of the induction pipeline. Missing fields take their defaults
/// when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InductionConfig {
    /// Minimum Jaccard similarity for two slots to be unified; `1.0` only
    /// unifies slots with identical values.
    pub relative_similarity_threshold: f64,
    pub minimal_variables: bool,
    pub words_per_slot: usize,
    pub prune_redundant: bool,
    pub max_recalculation: Option<usize>,
    pub use_best_merge_candidate: bool,
    pub max_depth: Option<usize>,
    pub max_alignments: Option<usize>,
}

impl Default for InductionConfig {
    fn default() -> Self {
        Self {
            relative_similarity_threshold: 1.0,
            minimal_variables: true,
            words_per_slot: 1,
            prune_redundant: true,
            max_recalculation: None,
            use_best_merge_candidate: true,
            max_depth: None,
            max_alignments: Some(DEFAULT_MAX_ALIGNMENTS),
        }
    }
}

impl InductionConfig {
    /// The tree learner these options describe.
    pub fn learner(&self) -> LatticeLearner {
        LatticeLearner {
            minimal_variables: self.minimal_variables,
            words_per_slot: self.words_per_slot,
            use_best_merge_candidate: self.use_best_merge_candidate,
            max_alignments: self.max_alignments,
        }
    }
}

type Observer<'o> = Box<dyn FnMut(&str, TemplateTree<'_>) + 'o>;

/// Runs the induction pipeline with a configurable tokenizer and an optional
/// observer that sees the intermediate tree after every stage.
pub struct GrammarInducer<'o> {
    config: InductionConfig,
    tokenizer: Box<dyn Tokenizer>,
    observer: Option<Observer<'o>>,
}

impl<'o> GrammarInducer<'o> {
    pub fn new(config: InductionConfig) -> Self {
        Self {
            config,
            tokenizer: Box::new(WordTokenizer),
            observer: None,
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: impl Tokenizer + 'static) -> Self {
        self.tokenizer = Box::new(tokenizer);
        self
    }

    /// Registers `observer`, called with a stage label and the tree that
    /// stage produced.
    pub fn with_observer(mut self, observer: impl FnMut(&str, TemplateTree<'_>) + 'o) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn config(&self) -> &InductionConfig {
        &self.config
    }

    pub fn induce<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<ContextFreeGrammar> {
        let mut arena = TreeArena::new();
        let minimal_variables = self.config.minimal_variables;

        let mut root = self
            .config
            .learner()
            .learn_lines(&mut arena, lines, self.tokenizer.as_ref())?;
        info!(
            "learned a tree of {} nodes from {} lines",
            arena.descendants(root).len(),
            lines.len()
        );
        self.observe("1. Learned", &arena, root);

        if self.config.prune_redundant {
            root = arena.prune_redundant_abstractions(root);
            debug!("pruned tree to {} nodes", arena.descendants(root).len());
            self.observe("2. Pruned", &arena, root);
        }

        let (mut derived, simplified) = self.name_and_simplify(&mut arena, root)?;
        self.observe("3. Simplified", &arena, simplified);

        let mut simplified = arena.collapse_using_slot_values(simplified, &derived);
        self.observe("4. Collapsed simplified", &arena, simplified);

        let mut recalculated: Option<NodeKey> = None;
        let mut iteration = 0;
        while recalculated != Some(simplified)
            && self.config.max_recalculation.map_or(true, |max| iteration < max)
        {
            if let Some(next) = recalculated {
                simplified = next;
                self.observe(&format!("5 ({iteration}). Recalculated"), &arena, simplified);
            }
            if self.config.max_recalculation.is_none()
                && iteration >= UNBOUNDED_RECALCULATION_LIMIT
            {
                return Err(GrammarError::InvariantViolated(format!(
                    "templates still changing after {iteration} recalculations"
                )));
            }
            let next = arena.recalculate_templates(simplified, minimal_variables);
            let (values, next) = self.name_and_simplify(&mut arena, next)?;
            derived = values;
            recalculated = Some(next);
            iteration += 1;
        }
        debug!("recalculation stopped after {iteration} rounds");

        let mut collapsed = arena.collapse_using_slot_values(simplified, &derived);
        self.observe("6. Collapsed final", &arena, collapsed);

        if let Some(max_depth) = self.config.max_depth {
            collapsed = arena.reduce_depth(collapsed, max_depth);
            debug!("reduced tree to depth {}", arena.depth(collapsed));
            self.observe("7. Reduced depth", &arena, collapsed);
        }

        let final_values = arena.slot_values(collapsed)?;
        let grammar =
            ContextFreeGrammar::from_slot_values(arena.template(collapsed), &final_values);
        info!(
            "induced a grammar with {} non-terminals and {} productions",
            grammar.len(),
            grammar.size()
        );
        Ok(grammar)
    }

    /// Names every anonymous slot, merges similar slots and renames the tree
    /// after the merged slots.
    fn name_and_simplify(
        &self,
        arena: &mut TreeArena,
        root: NodeKey,
    ) -> Result<(SlotValues, NodeKey)> {
        let taken: Vec<String> = arena
            .all_slots_breadth_first(root)
            .iter()
            .filter_map(|slot| slot.name().map(str::to_string))
            .collect();
        let mut names = SlotNameGenerator::skipping(taken);
        let named = arena.name_slots_automatically(root, &mut names);

        let merged = arena
            .slot_values(named)?
            .merge_slots(self.config.relative_similarity_threshold)?;
        let renamed = arena.rename_slots(named, merged.replacements());
        debug!(
            "simplified {} slots down to {}",
            merged.len(),
            merged.unreplaced_slots().len()
        );
        Ok((merged, renamed))
    }

    fn observe(&mut self, label: &str, arena: &TreeArena, root: NodeKey) {
        if let Some(observer) = self.observer.as_mut() {
            observer(label, arena.view(root));
        }
    }
}

/// Induces a grammar from `lines` using the default tokenizer.
pub fn induce_grammar<S: AsRef<str>>(
    lines: &[S],
    config: &InductionConfig,
) -> Result<ContextFreeGrammar> {
    GrammarInducer::new(config.clone()).induce(lines)
}
