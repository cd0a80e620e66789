//! Agglomerative learning of a generalization tree from example lines.
//!
//! Every line starts out as an active leaf template. The learner keeps a
//! min-heap of [`MergeCandidate`]s ordered by how much specificity a merge
//! gives up, repeatedly merges the cheapest batch and queues candidates for
//! the merged templates, until a single active template is left. That
//! template becomes the root of the learned tree.

use crate::error::{GrammarError, Result};
use crate::template::{MergeOptions, Template, DEFAULT_MAX_ALIGNMENTS};
use crate::token::Slot;
use crate::tokenizer::{SlotSyntax, Tokenizer};
use crate::tree::{NodeKey, TreeArena};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A pair of templates that could be generalized into one.
#[derive(Debug, Clone)]
pub struct MergeCandidate {
    first: Template,
    second: Template,
    distance: i64,
    merged: Option<Template>,
    sequence: u64,
}

impl MergeCandidate {
    pub fn templates(&self) -> [&Template; 2] {
        [&self.first, &self.second]
    }

    pub fn distance(&self) -> i64 {
        self.distance
    }

    /// The merge this candidate stands for, computed on first use when the
    /// candidate was created from its distance alone.
    fn merged_template(&mut self, learner: &LatticeLearner) -> Template {
        if let Some(merged) = &self.merged {
            return merged.clone();
        }
        let merged = learner.first_merge(&self.first, &self.second);
        self.merged = Some(merged.clone());
        merged
    }
}

// BinaryHeap is a max-heap: the smallest distance, then the oldest candidate,
// must compare greatest.
impl Ord for MergeCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .cmp(&self.distance)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for MergeCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MergeCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeCandidate {}

/// Specificity lost by a merge: literals dropped from the larger input plus
/// slots added over the input with fewer slots.
fn distance_of_merged(merged: &Template, max_literals: usize, min_slots: usize) -> i64 {
    let literal_loss = max_literals as i64 - merged.number_of_literals() as i64;
    let slot_gain = merged.number_of_slots() as i64 - min_slots as i64;
    literal_loss + slot_gain
}

/// Active templates plus the parent to children relation built so far.
#[derive(Debug, Clone, Default)]
pub struct LearnerState {
    active: IndexSet<Template>,
    children: IndexMap<Template, IndexSet<Template>>,
}

impl LearnerState {
    pub fn new(templates: impl IntoIterator<Item = Template>) -> Self {
        Self {
            active: templates.into_iter().collect(),
            children: IndexMap::new(),
        }
    }

    pub fn active_templates(&self) -> &IndexSet<Template> {
        &self.active
    }

    pub fn has_multiple_active_templates(&self) -> bool {
        self.active.len() > 1
    }

    pub fn is_valid_candidate(&self, candidate: &MergeCandidate) -> bool {
        self.active.contains(&candidate.first) && self.active.contains(&candidate.second)
    }

    /// Records `parent` as the generalization of `children`. A parent seen
    /// for the first time becomes active; children other than the parent
    /// itself stop being active.
    pub fn add_parent(&mut self, parent: Template, children: impl IntoIterator<Item = Template>) {
        if !self.children.contains_key(&parent) {
            self.active.insert(parent.clone());
            self.children.insert(parent.clone(), IndexSet::new());
        }
        for child in children {
            if child == parent {
                continue;
            }
            self.active.shift_remove(&child);
            if let Some(known) = self.children.get_mut(&parent) {
                known.insert(child);
            }
        }
    }

    /// Interns the learned tree rooted at the one remaining active template.
    pub fn build_tree(&self, arena: &mut TreeArena) -> Result<NodeKey> {
        if self.active.len() != 1 {
            return Err(GrammarError::InvariantViolated(format!(
                "a learned tree needs exactly one active template, found {}",
                self.active.len()
            )));
        }
        let root = &self.active[0];
        Ok(self.build_node(root, arena, &mut HashMap::new(), &mut HashSet::new()))
    }

    fn build_node(
        &self,
        template: &Template,
        arena: &mut TreeArena,
        built: &mut HashMap<Template, NodeKey>,
        in_progress: &mut HashSet<Template>,
    ) -> NodeKey {
        if let Some(&key) = built.get(template) {
            return key;
        }
        let Some(child_templates) = self.children.get(template) else {
            let key = arena.leaf(template.clone());
            built.insert(template.clone(), key);
            return key;
        };

        in_progress.insert(template.clone());
        let mut children: IndexSet<NodeKey> = IndexSet::new();
        for child in child_templates {
            if !in_progress.contains(child) {
                children.insert(self.build_node(child, arena, built, in_progress));
            }
        }
        in_progress.remove(template);

        let covered: HashSet<NodeKey> = children
            .iter()
            .flat_map(|&child| arena.strict_descendants(child))
            .collect();
        let direct: Vec<NodeKey> = children
            .into_iter()
            .filter(|child| !covered.contains(child))
            .collect();

        let key = arena.node(template.clone(), direct);
        built.insert(template.clone(), key);
        key
    }
}

/// Learns a generalization lattice by repeatedly merging the closest pair of
/// templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatticeLearner {
    pub minimal_variables: bool,
    /// Width of the tolerance window for the first batch of merges, so that
    /// slots covering this many words can form among the leaves.
    pub words_per_slot: usize,
    /// Rank later candidates by their best merge instead of the first one.
    pub use_best_merge_candidate: bool,
    pub max_alignments: Option<usize>,
}

impl Default for LatticeLearner {
    fn default() -> Self {
        Self {
            minimal_variables: true,
            words_per_slot: 1,
            use_best_merge_candidate: true,
            max_alignments: Some(DEFAULT_MAX_ALIGNMENTS),
        }
    }
}

impl LatticeLearner {
    pub fn new(minimal_variables: bool, words_per_slot: usize) -> Self {
        Self {
            minimal_variables,
            words_per_slot,
            ..Self::default()
        }
    }

    /// Trims and parses every line, then learns from the resulting templates.
    pub fn learn_lines<S: AsRef<str>>(
        &self,
        arena: &mut TreeArena,
        lines: &[S],
        tokenizer: &dyn Tokenizer,
    ) -> Result<NodeKey> {
        let templates: Vec<Template> = lines
            .iter()
            .map(|line| Template::parse_with(line.as_ref().trim(), tokenizer, SlotSyntax::Angle))
            .collect();
        self.learn(arena, &templates)
    }

    pub fn learn(&self, arena: &mut TreeArena, templates: &[Template]) -> Result<NodeKey> {
        if templates.is_empty() {
            return Err(GrammarError::EmptyCorpus);
        }

        let mut state = LearnerState::new(templates.iter().cloned());
        let mut queue = BinaryHeap::new();
        let mut sequence = 0u64;
        for mut candidate in self.initial_candidates(state.active_templates()) {
            candidate.sequence = sequence;
            sequence += 1;
            queue.push(candidate);
        }
        debug!(
            "learning from {} distinct templates with {} initial candidates",
            state.active.len(),
            queue.len()
        );

        let mut first_iteration = true;
        while state.has_multiple_active_templates() {
            let Some(top) = queue.pop() else {
                return Err(GrammarError::InvariantViolated(format!(
                    "merge queue ran dry with {} templates still active",
                    state.active.len()
                )));
            };
            if !state.is_valid_candidate(&top) {
                continue;
            }

            let mut batch = vec![top];
            let top_distance = batch[0].distance;
            while let Some(next) = queue.peek() {
                if !self.is_allowed_distance(top_distance, next.distance, first_iteration) {
                    break;
                }
                if let Some(next) = queue.pop() {
                    if state.is_valid_candidate(&next) {
                        batch.push(next);
                    }
                }
            }
            first_iteration = false;

            let mut new_templates: IndexSet<Template> = IndexSet::new();
            for candidate in &mut batch {
                let merged = candidate.merged_template(self);
                trace!(
                    "merging \"{}\" and \"{}\" into \"{merged}\"",
                    candidate.first,
                    candidate.second
                );
                let sources = [candidate.first.clone(), candidate.second.clone()];
                state.add_parent(merged.clone(), sources);
                new_templates.insert(merged);
            }

            let new_candidates =
                self.candidates_for_new_templates(&new_templates, state.active_templates());
            debug!(
                "merged {} candidates at distance {top_distance}, \
                 {} active templates, {} new candidates",
                batch.len(),
                state.active.len(),
                new_candidates.len()
            );
            for mut candidate in new_candidates {
                candidate.sequence = sequence;
                sequence += 1;
                queue.push(candidate);
            }
        }

        state.build_tree(arena)
    }

    fn merge_options(&self, allow_longer: bool) -> MergeOptions {
        MergeOptions {
            minimal_variables: self.minimal_variables,
            allow_longer,
            min_literals: None,
            max_alignments: self.max_alignments,
        }
    }

    /// All distinct merges of two templates, allowing longer ones only when
    /// nothing else is possible.
    fn merges(&self, first: &Template, second: &Template) -> Vec<Template> {
        let merges = Template::merge_by_alignment(first, second, &self.merge_options(false));
        if !merges.is_empty() {
            return merges;
        }
        let merges = Template::merge_by_alignment(first, second, &self.merge_options(true));
        if merges.is_empty() {
            vec![Template::from_slot(Slot::anonymous())]
        } else {
            merges
        }
    }

    fn first_merge(&self, first: &Template, second: &Template) -> Template {
        self.merges(first, second)
            .into_iter()
            .next()
            .unwrap_or_else(|| Template::from_slot(Slot::anonymous()))
    }

    /// The lowest-distance merge of two templates as a candidate.
    pub fn best_merge_candidate(&self, first: &Template, second: &Template) -> MergeCandidate {
        let max_literals = first.number_of_literals().max(second.number_of_literals());
        let min_slots = first.number_of_slots().min(second.number_of_slots());
        let best = self
            .merges(first, second)
            .into_iter()
            .map(|merged| (distance_of_merged(&merged, max_literals, min_slots), merged))
            .min_by_key(|(distance, _)| *distance);
        let (distance, merged) = match best {
            Some((distance, merged)) => (distance, Some(merged)),
            None => (0, None),
        };
        MergeCandidate {
            first: first.clone(),
            second: second.clone(),
            distance,
            merged,
            sequence: 0,
        }
    }

    fn any_merge_candidate(&self, first: &Template, second: &Template) -> MergeCandidate {
        let max_literals = first.number_of_literals().max(second.number_of_literals());
        let min_slots = first.number_of_slots().min(second.number_of_slots());
        let merged = self.first_merge(first, second);
        MergeCandidate {
            first: first.clone(),
            second: second.clone(),
            distance: distance_of_merged(&merged, max_literals, min_slots),
            merged: Some(merged),
            sequence: 0,
        }
    }

    fn within_leaf_window(&self, min_distance: i64, distance: i64) -> bool {
        distance <= min_distance + self.words_per_slot as i64 - 1
    }

    fn is_allowed_distance(&self, min_distance: i64, distance: i64, first_iteration: bool) -> bool {
        if first_iteration {
            self.within_leaf_window(min_distance, distance)
        } else {
            distance == min_distance
        }
    }

    /// For every template, candidates towards its closest later templates.
    /// The merged template is left to be computed when the candidate is used.
    fn initial_candidates(&self, templates: &IndexSet<Template>) -> Vec<MergeCandidate> {
        let mut result = Vec::new();
        for (index, template) in templates.iter().enumerate() {
            let mut min_distance: Option<i64> = None;
            let mut closest: Vec<(i64, &Template)> = Vec::new();

            for other in templates.iter().skip(index + 1) {
                if other == template {
                    continue;
                }
                let distance = self.best_merge_candidate(template, other).distance;
                match min_distance {
                    Some(min) if distance >= min => {
                        if self.within_leaf_window(min, distance) {
                            closest.push((distance, other));
                        }
                    }
                    _ => {
                        min_distance = Some(distance);
                        closest.retain(|&(kept, _)| self.within_leaf_window(distance, kept));
                        closest.insert(0, (distance, other));
                    }
                }
            }

            result.extend(closest.into_iter().map(|(distance, other)| MergeCandidate {
                first: template.clone(),
                second: other.clone(),
                distance,
                merged: None,
                sequence: 0,
            }));
        }
        result
    }

    /// Candidates from every new template to its exactly-closest partners
    /// among the later new templates and the active ones.
    fn candidates_for_new_templates(
        &self,
        new_templates: &IndexSet<Template>,
        active: &IndexSet<Template>,
    ) -> Vec<MergeCandidate> {
        let mut result = Vec::new();
        for (index, template) in new_templates.iter().enumerate() {
            let others: IndexSet<&Template> = new_templates
                .iter()
                .skip(index + 1)
                .chain(active.iter())
                .filter(|other| *other != template)
                .collect();

            let mut min_distance: Option<i64> = None;
            let mut closest: Vec<MergeCandidate> = Vec::new();
            for other in others {
                let candidate = if self.use_best_merge_candidate {
                    self.best_merge_candidate(template, other)
                } else {
                    self.any_merge_candidate(template, other)
                };
                match min_distance {
                    Some(min) if candidate.distance > min => {}
                    Some(min) if candidate.distance == min => closest.push(candidate),
                    _ => {
                        min_distance = Some(candidate.distance);
                        closest.clear();
                        closest.push(candidate);
                    }
                }
            }
            result.extend(closest);
        }
        result
    }
}
