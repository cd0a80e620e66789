//! Generalization trees stored in a hash-consed arena.
//!
//! Every node holds a [`Template`] and a set of children whose templates it
//! covers. Nodes are interned on `(template, children)`, so two structurally
//! equal subtrees always share one [`NodeKey`] and tree equality is key
//! equality. Transformations never change existing nodes: they intern new
//! ones and return the key of the new root, leaving the old tree intact.
//!
//! ```
//! use gitta_rs::{Template, TreeArena};
//!
//! let mut arena = TreeArena::new();
//! let hello = arena.leaf(Template::parse("hello world"));
//! let hi = arena.leaf(Template::parse("hi world"));
//! let inner = arena.node(Template::parse("[SLOT] world"), [hello, hi]);
//! let root = arena.node(Template::parse("[SLOT] world"), [inner]);
//!
//! let collapsed = arena.collapse(root);
//! assert_eq!(collapsed, inner);
//! assert_eq!(arena.depth(collapsed), 1);
//! ```

use crate::error::Result;
use crate::slot_names::SlotNameGenerator;
use crate::slot_values::SlotValues;
use crate::template::Template;
use crate::token::Slot;
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use indexmap::{IndexMap, IndexSet};
use slotmap::{new_key_type, SlotMap};
use std::collections::VecDeque;
use std::fmt;

new_key_type! {
    /// Handle of a node in a [`TreeArena`].
    pub struct NodeKey;
}

#[derive(Debug, Clone)]
struct TreeNode {
    template: Template,
    /// Sorted and free of duplicates.
    children: Vec<NodeKey>,
}

/// Owner of all tree nodes built during one induction.
#[derive(Debug, Clone, Default)]
pub struct TreeArena {
    nodes: SlotMap<NodeKey, TreeNode>,
    interned: HashMap<(Template, Vec<NodeKey>), NodeKey>,
}

impl TreeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaf(&mut self, template: Template) -> NodeKey {
        self.node(template, [])
    }

    /// Returns the node for `template` with `children`, creating it unless a
    /// structurally equal node exists.
    pub fn node(
        &mut self,
        template: Template,
        children: impl IntoIterator<Item = NodeKey>,
    ) -> NodeKey {
        let mut children: Vec<NodeKey> = children.into_iter().collect();
        children.sort_unstable();
        children.dedup();

        let lookup = (template, children);
        if let Some(&key) = self.interned.get(&lookup) {
            return key;
        }
        let key = self.nodes.insert(TreeNode {
            template: lookup.0.clone(),
            children: lookup.1.clone(),
        });
        self.interned.insert(lookup, key);
        key
    }

    pub fn template(&self, key: NodeKey) -> &Template {
        &self.nodes[key].template
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        &self.nodes[key].children
    }

    pub fn is_leaf(&self, key: NodeKey) -> bool {
        self.nodes[key].children.is_empty()
    }

    /// Number of nodes ever interned in this arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Read-only view of the tree rooted at `root`.
    pub fn view(&self, root: NodeKey) -> TemplateTree<'_> {
        TemplateTree { arena: self, root }
    }

    // QUERIES

    /// `root` followed by every node below it, each once, in depth-first order.
    pub fn descendants(&self, root: NodeKey) -> IndexSet<NodeKey> {
        let mut seen = IndexSet::new();
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            if seen.insert(key) {
                stack.extend(self.children(key).iter().rev());
            }
        }
        seen
    }

    pub fn strict_descendants(&self, root: NodeKey) -> IndexSet<NodeKey> {
        let mut descendants = self.descendants(root);
        descendants.shift_remove(&root);
        descendants
    }

    pub fn leaves(&self, root: NodeKey) -> IndexSet<NodeKey> {
        self.descendants(root)
            .into_iter()
            .filter(|&key| self.is_leaf(key))
            .collect()
    }

    /// Length of the longest path from `root` down to a leaf.
    pub fn depth(&self, root: NodeKey) -> usize {
        self.depths(root)[&root]
    }

    fn depths(&self, root: NodeKey) -> HashMap<NodeKey, usize> {
        let mut depths = HashMap::new();
        // Children are always finished before their parent is revisited.
        let mut stack = vec![(root, false)];
        while let Some((key, expanded)) = stack.pop() {
            if depths.contains_key(&key) {
                continue;
            }
            let children = self.children(key);
            if expanded || children.is_empty() {
                let depth = children
                    .iter()
                    .filter_map(|child| depths.get(child))
                    .max()
                    .map_or(0, |deepest| deepest + 1);
                depths.insert(key, depth);
            } else {
                stack.push((key, true));
                stack.extend(children.iter().map(|&child| (child, false)));
            }
        }
        depths
    }

    /// Every slot occurrence of every node, visiting nodes breadth-first.
    pub fn all_slots_breadth_first(&self, root: NodeKey) -> Vec<Slot> {
        let mut slots = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(key) = queue.pop_front() {
            if !seen.insert(key) {
                continue;
            }
            slots.extend(self.template(key).slots().cloned());
            queue.extend(self.children(key).iter().copied());
        }
        slots
    }

    /// Values each slot takes in the children of its node, assuming the
    /// values of different slots are independent.
    pub fn slot_values(&self, root: NodeKey) -> Result<SlotValues> {
        let mut slot_values = SlotValues::new();
        let mut visited = HashSet::new();
        self.collect_slot_values(root, &mut visited, &mut slot_values)?;
        Ok(slot_values)
    }

    fn collect_slot_values(
        &self,
        key: NodeKey,
        visited: &mut HashSet<NodeKey>,
        slot_values: &mut SlotValues,
    ) -> Result<()> {
        if !visited.insert(key) {
            return Ok(());
        }
        let template = self.template(key);
        for &child in self.children(key) {
            slot_values.add_mapping(template.slot_values_mapping(self.template(child))?);
            self.collect_slot_values(child, visited, slot_values)?;
        }
        Ok(())
    }

    // TRANSFORMATIONS

    /// Merges every child carrying its parent's template into the parent.
    pub fn collapse(&mut self, root: NodeKey) -> NodeKey {
        self.collapse_node(root, &mut HashMap::new())
    }

    fn collapse_node(&mut self, key: NodeKey, memo: &mut HashMap<NodeKey, NodeKey>) -> NodeKey {
        if let Some(&done) = memo.get(&key) {
            return done;
        }
        if self.is_leaf(key) {
            return key;
        }

        let template = self.template(key).clone();
        let mut grouped: IndexMap<Template, IndexSet<NodeKey>> = IndexMap::new();
        for child in self.children(key).to_vec() {
            let child = self.collapse_node(child, memo);
            if self.template(child) == &template {
                for grandchild in self.children(child).to_vec() {
                    grouped
                        .entry(self.template(grandchild).clone())
                        .or_default()
                        .insert(grandchild);
                }
            } else {
                grouped.entry(self.template(child).clone()).or_default().insert(child);
            }
        }

        let mut new_children = Vec::with_capacity(grouped.len());
        for (child_template, group) in grouped {
            if group.len() == 1 {
                new_children.push(group[0]);
            } else {
                let merged: Vec<NodeKey> = group
                    .iter()
                    .flat_map(|&node| self.children(node).to_vec())
                    .collect();
                new_children.push(self.node(child_template, merged));
            }
        }

        let collapsed = self.node(template, new_children);
        memo.insert(key, collapsed);
        collapsed
    }

    /// Splices out children that share a slot with their parent and add
    /// nothing beyond what `slot_values` already says about that parent.
    pub fn collapse_using_slot_values(
        &mut self,
        root: NodeKey,
        slot_values: &SlotValues,
    ) -> NodeKey {
        self.collapse_with_values(root, slot_values, &mut HashMap::new())
    }

    fn collapse_with_values(
        &mut self,
        key: NodeKey,
        slot_values: &SlotValues,
        memo: &mut HashMap<NodeKey, NodeKey>,
    ) -> NodeKey {
        if let Some(&done) = memo.get(&key) {
            return done;
        }
        if self.is_leaf(key) {
            return key;
        }

        let template = self.template(key).clone();
        let own_slots: HashSet<&Slot> = template.slots().collect();
        let mut new_children = Vec::new();
        for child in self.children(key).to_vec() {
            let child = self.collapse_with_values(child, slot_values, memo);
            let child_template = self.template(child);
            let shares_slot = child_template.slots().any(|slot| own_slots.contains(slot));
            if shares_slot && template.encompasses(child_template, slot_values) {
                new_children.extend_from_slice(self.children(child));
            } else {
                new_children.push(child);
            }
        }

        let collapsed = self.node(template.clone(), new_children);
        memo.insert(key, collapsed);
        collapsed
    }

    /// Drops children whose leaves are all reachable through their siblings,
    /// smallest leaf sets first.
    pub fn prune_redundant_abstractions(&mut self, root: NodeKey) -> NodeKey {
        self.prune_node(root, &mut HashMap::new())
    }

    fn prune_node(&mut self, key: NodeKey, memo: &mut HashMap<NodeKey, NodeKey>) -> NodeKey {
        if let Some(&done) = memo.get(&key) {
            return done;
        }
        if self.is_leaf(key) {
            return key;
        }

        let mut children: Vec<(NodeKey, IndexSet<NodeKey>)> = Vec::new();
        for child in self.children(key).to_vec() {
            let pruned = self.prune_node(child, memo);
            children.push((pruned, self.leaves(pruned)));
        }
        children.sort_by_key(|(_, leaves)| leaves.len());

        let mut removed = vec![false; children.len()];
        for index in 0..children.len() {
            let covered_elsewhere: HashSet<NodeKey> = children
                .iter()
                .enumerate()
                .filter(|&(other, _)| other != index && !removed[other])
                .flat_map(|(_, (_, leaves))| leaves.iter().copied())
                .collect();
            if children[index].1.iter().all(|leaf| covered_elsewhere.contains(leaf)) {
                removed[index] = true;
            }
        }

        let kept: Vec<NodeKey> = children
            .iter()
            .zip(&removed)
            .filter_map(|((child, _), gone)| (!gone).then_some(*child))
            .collect();
        let pruned = self.node(self.template(key).clone(), kept);
        memo.insert(key, pruned);
        pruned
    }

    /// Adds an extra parent edge from every node that is the most specific
    /// cover of a descendant elsewhere in the tree, turning it into a DAG.
    pub fn to_lattice(&mut self, root: NodeKey) -> NodeKey {
        let mut extra: IndexMap<NodeKey, Vec<NodeKey>> = IndexMap::new();

        for descendant in self.descendants(root) {
            let target = self.template(descendant);
            let mut stack = vec![root];
            while let Some(current) = stack.pop() {
                let covering: Vec<NodeKey> = self
                    .children(current)
                    .iter()
                    .copied()
                    .filter(|&child| self.template(child).covers(target))
                    .collect();
                if !covering.is_empty() {
                    stack.extend(covering);
                } else if current != descendant
                    && !self.descendants(descendant).contains(&current)
                {
                    let added = extra.entry(current).or_default();
                    if !added.contains(&descendant) {
                        added.push(descendant);
                    }
                }
            }
        }

        self.attach_children(root, &extra, &mut HashMap::new(), &mut HashSet::new())
    }

    fn attach_children(
        &mut self,
        key: NodeKey,
        extra: &IndexMap<NodeKey, Vec<NodeKey>>,
        memo: &mut HashMap<NodeKey, NodeKey>,
        in_progress: &mut HashSet<NodeKey>,
    ) -> NodeKey {
        if let Some(&done) = memo.get(&key) {
            return done;
        }
        in_progress.insert(key);

        let mut originals = self.children(key).to_vec();
        if let Some(added) = extra.get(&key) {
            originals.extend(added.iter().copied());
        }
        let mut children = Vec::with_capacity(originals.len());
        for child in originals {
            // An edge back into the current path would close a cycle.
            if !in_progress.contains(&child) {
                children.push(self.attach_children(child, extra, memo, in_progress));
            }
        }

        in_progress.remove(&key);
        let attached = self.node(self.template(key).clone(), children);
        memo.insert(key, attached);
        attached
    }

    /// Gives every anonymous slot a fresh name from `names`, skipping names
    /// already used in the tree.
    pub fn name_slots_automatically(
        &mut self,
        root: NodeKey,
        names: &mut SlotNameGenerator,
    ) -> NodeKey {
        let all_slots = self.all_slots_breadth_first(root);
        for name in all_slots.iter().filter_map(Slot::name) {
            names.reserve(name);
        }

        let mut renaming: IndexMap<Slot, Slot> = IndexMap::new();
        for slot in all_slots.into_iter().filter(|slot| !slot.is_named()) {
            if !renaming.contains_key(&slot) {
                renaming.insert(slot, Slot::named(names.fresh_name()));
            }
        }
        self.rename_slots(root, &renaming)
    }

    pub fn rename_slots(&mut self, root: NodeKey, renaming: &IndexMap<Slot, Slot>) -> NodeKey {
        if renaming.is_empty() {
            return root;
        }
        self.rename_node(root, renaming, &mut HashMap::new())
    }

    fn rename_node(
        &mut self,
        key: NodeKey,
        renaming: &IndexMap<Slot, Slot>,
        memo: &mut HashMap<NodeKey, NodeKey>,
    ) -> NodeKey {
        if let Some(&done) = memo.get(&key) {
            return done;
        }
        let children: Vec<NodeKey> = self
            .children(key)
            .to_vec()
            .into_iter()
            .map(|child| self.rename_node(child, renaming, memo))
            .collect();
        let renamed = self.node(self.template(key).rename_slots(renaming), children);
        memo.insert(key, renamed);
        renamed
    }

    /// Recomputes every internal template bottom-up as the merge of its
    /// children's templates, stopping early at the current template's shape.
    pub fn recalculate_templates(&mut self, root: NodeKey, minimal_variables: bool) -> NodeKey {
        self.recalculate_node(root, minimal_variables, &mut HashMap::new())
    }

    fn recalculate_node(
        &mut self,
        key: NodeKey,
        minimal_variables: bool,
        memo: &mut HashMap<NodeKey, NodeKey>,
    ) -> NodeKey {
        if let Some(&done) = memo.get(&key) {
            return done;
        }
        if self.is_leaf(key) {
            return key;
        }

        let children: Vec<NodeKey> = self
            .children(key)
            .to_vec()
            .into_iter()
            .map(|child| self.recalculate_node(child, minimal_variables, memo))
            .collect();
        let current = self.template(key).clone();
        let child_templates: Vec<Template> = children
            .iter()
            .map(|&child| self.template(child).clone())
            .collect();
        let template = Template::merge_all(&child_templates, minimal_variables, Some(&current))
            .unwrap_or(current);

        let recalculated = self.node(template, children);
        memo.insert(key, recalculated);
        recalculated
    }

    /// Keeps only nodes at most `depth - 1` levels above the leaves as
    /// children of the root, lifting deeper nodes' descendants up.
    pub fn reduce_depth(&mut self, root: NodeKey, depth: usize) -> NodeKey {
        let depths = self.depths(root);
        let mut kept = Vec::new();
        if let Some(max_child_depth) = depth.checked_sub(1) {
            let mut stack: Vec<NodeKey> = self.children(root).iter().rev().copied().collect();
            while let Some(key) = stack.pop() {
                if depths[&key] <= max_child_depth {
                    kept.push(key);
                } else {
                    stack.extend(self.children(key).iter().rev());
                }
            }
        }
        self.node(self.template(root).clone(), kept)
    }

    // RENDERING

    /// Indented multi-line rendering of the tree below `root`.
    pub fn render(&self, root: NodeKey) -> String {
        let mut out = String::new();
        self.render_node(root, "", "", &mut out);
        out
    }

    fn render_node(&self, key: NodeKey, own_prefix: &str, child_prefix: &str, out: &mut String) {
        out.push_str(own_prefix);
        out.push_str(&self.template(key).default_flat_string());
        out.push('\n');

        let mut children: Vec<(String, NodeKey)> = self
            .children(key)
            .iter()
            .map(|&child| (self.sorted_string(child), child))
            .collect();
        children.sort();
        let count = children.len();
        for (index, (_, child)) in children.into_iter().enumerate() {
            let last = index + 1 == count;
            let branch = if last { "└── " } else { "├── " };
            let continuation = if last { "    " } else { "│   " };
            self.render_node(
                child,
                &format!("{child_prefix}{branch}"),
                &format!("{child_prefix}{continuation}"),
                out,
            );
        }
    }

    /// `template {child | child}` with children sorted by their own string.
    fn sorted_string(&self, key: NodeKey) -> String {
        let template = self.template(key).to_string();
        if self.is_leaf(key) {
            return template;
        }
        let mut children: Vec<String> = self
            .children(key)
            .iter()
            .map(|&child| self.sorted_string(child))
            .collect();
        children.sort();
        format!("{template} {{{}}}", children.join(" | "))
    }
}

/// A borrowed view of one tree in a [`TreeArena`].
#[derive(Clone, Copy)]
pub struct TemplateTree<'a> {
    arena: &'a TreeArena,
    root: NodeKey,
}

impl<'a> TemplateTree<'a> {
    pub fn arena(&self) -> &'a TreeArena {
        self.arena
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn template(&self) -> &'a Template {
        self.arena.template(self.root)
    }

    pub fn children(&self) -> impl Iterator<Item = TemplateTree<'a>> + 'a {
        let arena = self.arena;
        arena.children(self.root).iter().map(move |&child| arena.view(child))
    }

    pub fn depth(&self) -> usize {
        self.arena.depth(self.root)
    }

    pub fn number_of_leaves(&self) -> usize {
        self.arena.leaves(self.root).len()
    }

    pub fn slot_values(&self) -> Result<SlotValues> {
        self.arena.slot_values(self.root)
    }

    pub fn render(&self) -> String {
        self.arena.render(self.root)
    }
}

impl PartialEq for TemplateTree<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.arena, other.arena) && self.root == other.root
    }
}

impl Eq for TemplateTree<'_> {}

impl fmt::Display for TemplateTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.arena.sorted_string(self.root))
    }
}

impl fmt::Debug for TemplateTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TemplateTree({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        arena: TreeArena,
        s: [NodeKey; 5],
        u1: NodeKey,
        u2: NodeKey,
        u3: NodeKey,
        u4: NodeKey,
        t1: NodeKey,
        t2: NodeKey,
        t3: NodeKey,
    }

    fn fixture() -> Fixture {
        let mut arena = TreeArena::new();
        let s = ["a b c d", "a b e d", "a b f d", "g b h d", "h i j d"]
            .map(|text| arena.leaf(Template::parse(text)));

        let u1 = arena.node(Template::parse("a b [SLOT] d"), [s[0], s[1]]);
        let u2 = arena.node(Template::parse("a b [SLOT] d"), [s[2], u1]);
        let u3 = arena.node(Template::parse("[SLOT] b [SLOT] d"), [s[3], u2]);
        let u4 = arena.node(Template::parse("[SLOT] d"), [s[4], u3]);

        let t1 = arena.node(Template::parse("a b [SLOT] d"), [s[0], s[1], s[2]]);
        let t2 = arena.node(Template::parse("[SLOT] b [SLOT] d"), [s[3], t1]);
        let t3 = arena.node(Template::parse("[SLOT] d"), [s[4], t2]);

        Fixture {
            arena,
            s,
            u1,
            u2,
            u3,
            u4,
            t1,
            t2,
            t3,
        }
    }

    fn leaf_set(keys: &[NodeKey]) -> IndexSet<NodeKey> {
        keys.iter().copied().collect()
    }

    #[test]
    fn test_equals() {
        let mut f = fixture();
        let e1 = f.arena.node(Template::parse("a b [SLOT] d"), [f.s[0], f.s[1]]);
        assert_eq!(e1, f.u1);
        assert_ne!(e1, f.u2);
        assert_ne!(e1, f.t1);

        let fresh = f.arena.leaf(Template::parse("a b c d"));
        assert_eq!(fresh, f.s[0]);
        assert_eq!(f.arena.view(f.t3), f.arena.view(f.t3));
    }

    #[test]
    fn test_collapse() {
        let mut f = fixture();
        assert_eq!(f.t1, f.arena.collapse(f.u2));
        assert_eq!(f.t2, f.arena.collapse(f.u3));
        assert_eq!(f.t3, f.arena.collapse(f.u4));
    }

    #[test]
    fn test_collapse_same_children() {
        let mut arena = TreeArena::new();
        let ss = ["a b c c d", "c b e e d", "h h h b f d", "i i i b g d", "j k l l d"]
            .map(|text| arena.leaf(Template::parse(text)));

        let us1 = arena.node(Template::parse("[SLOT] b [SLOT] d"), [ss[0], ss[1]]);
        let us2 = arena.node(Template::parse("[SLOT] b [SLOT] d"), [ss[2], ss[3]]);
        let us3 = arena.node(Template::parse("[SLOT] d"), [us1, us2, ss[4]]);

        let ts1 = arena.node(Template::parse("[SLOT] b [SLOT] d"), [ss[0], ss[1], ss[2], ss[3]]);
        let ts2 = arena.node(Template::parse("[SLOT] d"), [ts1, ss[4]]);

        assert_eq!(ts2, arena.collapse(us3));
    }

    #[test]
    fn test_leaves() {
        let f = fixture();
        assert_eq!(leaf_set(&[f.s[0], f.s[1]]), f.arena.leaves(f.u1));
        assert_eq!(
            leaf_set(&[f.s[0], f.s[1], f.s[2]]),
            f.arena.leaves(f.u2).into_iter().collect::<IndexSet<_>>()
        );
        assert_eq!(leaf_set(&f.s), f.arena.leaves(f.u4));
        assert_eq!(leaf_set(&f.s), f.arena.leaves(f.t3));
        assert_eq!(f.arena.leaves(f.s[0]), leaf_set(&[f.s[0]]));
    }

    #[test]
    fn test_depth() {
        let f = fixture();
        assert_eq!(0, f.arena.depth(f.s[0]));
        assert_eq!(1, f.arena.depth(f.u1));
        assert_eq!(4, f.arena.depth(f.u4));
        assert_eq!(3, f.arena.depth(f.t3));
    }

    #[test]
    fn test_reduce_depth() {
        let mut f = fixture();
        let u4_template = f.arena.template(f.u4).clone();
        let s = f.s;

        let reduced = f.arena.reduce_depth(f.u4, 1);
        assert_eq!(1, f.arena.depth(reduced));
        assert_eq!(f.arena.node(u4_template.clone(), s), reduced);

        let reduced = f.arena.reduce_depth(f.u4, 2);
        assert_eq!(2, f.arena.depth(reduced));
        assert_eq!(f.arena.node(u4_template.clone(), [f.u1, s[2], s[3], s[4]]), reduced);

        let reduced = f.arena.reduce_depth(f.u4, 3);
        assert_eq!(3, f.arena.depth(reduced));
        assert_eq!(f.arena.node(u4_template.clone(), [f.u2, s[3], s[4]]), reduced);

        let reduced = f.arena.reduce_depth(f.u4, 4);
        assert_eq!(4, f.arena.depth(reduced));
        assert_eq!(f.u4, reduced);

        let t3_template = f.arena.template(f.t3).clone();
        let reduced = f.arena.reduce_depth(f.t3, 1);
        assert_eq!(f.arena.node(t3_template.clone(), s), reduced);

        let reduced = f.arena.reduce_depth(f.t3, 2);
        assert_eq!(2, f.arena.depth(reduced));
        assert_eq!(f.arena.node(t3_template, [f.t1, s[3], s[4]]), reduced);
    }

    #[test]
    fn test_all_slots_breadth_first() {
        let f = fixture();
        assert_eq!(1, f.arena.all_slots_breadth_first(f.u1).len());
        assert_eq!(2, f.arena.all_slots_breadth_first(f.u2).len());
        assert_eq!(4, f.arena.all_slots_breadth_first(f.u3).len());
        assert_eq!(5, f.arena.all_slots_breadth_first(f.u4).len());
        assert_eq!(4, f.arena.all_slots_breadth_first(f.t3).len());
    }

    #[test]
    fn test_slot_values_of_children() {
        let f = fixture();
        let slot = f.arena.template(f.t1).slots().next().cloned().unwrap();
        let values = f.arena.slot_values(f.t1).unwrap();
        let expected: IndexSet<Template> =
            ["c", "e", "f"].iter().map(|v| Template::parse(v)).collect();
        assert_eq!(Some(&expected), values.get(&slot));
    }

    #[test]
    fn test_collapse_using_slot_values() {
        let mut arena = TreeArena::new();
        let h = ["hello world", "hey world", "hello universe", "hey universe"]
            .map(|text| arena.leaf(Template::parse(text)));

        let expected = arena.node(Template::parse("<A> <B>"), h);
        let expected_values: SlotValues = [
            (Slot::named("A"), ["hello", "hey"].iter().map(|v| Template::parse(v)).collect()),
            (Slot::named("B"), ["world", "universe"].iter().map(|v| Template::parse(v)).collect()),
        ]
        .into_iter()
        .collect();

        let hello_tt = arena.node(Template::parse("hello <B>"), [h[0], h[2]]);
        let hey_tt = arena.node(Template::parse("hey <B>"), [h[1], h[3]]);
        let greeting_tt = arena.node(Template::parse("<A> <B>"), [hello_tt, hey_tt]);

        let greeting = Template::parse("<A> <B>");
        assert!(greeting.encompasses(&Template::parse("hey <B>"), &expected_values));
        assert!(greeting.encompasses(&Template::parse("hello <B>"), &expected_values));
        assert!(!Template::parse("hello <B>").encompasses(&greeting, &expected_values));

        let derived = arena.slot_values(greeting_tt).unwrap().merge_slots(1.0).unwrap();
        assert_eq!(expected_values, derived);
        assert_eq!(expected, arena.collapse_using_slot_values(greeting_tt, &expected_values));

        let world_tt = arena.node(Template::parse("<A> world"), [h[0], h[1]]);
        let universe_tt = arena.node(Template::parse("<A> universe"), [h[2], h[3]]);
        let place_tt = arena.node(Template::parse("<A> <B>"), [world_tt, universe_tt]);
        let derived = arena.slot_values(place_tt).unwrap().merge_slots(1.0).unwrap();
        assert_eq!(expected_values, derived);
        assert_eq!(expected, arena.collapse_using_slot_values(place_tt, &expected_values));

        let mix_tt = arena.node(Template::parse("<A> <B>"), [world_tt, hey_tt, h[2]]);
        let derived = arena.slot_values(mix_tt).unwrap().merge_slots(1.0).unwrap();
        assert_eq!(expected_values, derived);
        assert_eq!(expected, arena.collapse_using_slot_values(mix_tt, &expected_values));

        let noise_tt = arena.leaf(Template::parse("noise"));
        let full_noise_tt = arena.node(Template::parse("<C>"), [greeting_tt, noise_tt]);
        let mut noise_values = expected_values.clone();
        noise_values.add_values(
            Slot::named("C"),
            [Template::parse("<A> <B>"), Template::parse("noise")],
        );

        let derived = arena.slot_values(full_noise_tt).unwrap().merge_slots(1.0).unwrap();
        assert_eq!(noise_values, derived);
        let collapsed = arena.collapse_using_slot_values(full_noise_tt, &noise_values);
        assert_eq!(arena.node(Template::parse("<C>"), [expected, noise_tt]), collapsed);
    }

    #[test]
    fn test_prune_redundant_abstractions() {
        let mut arena = TreeArena::new();
        let l1 = arena.leaf(Template::parse("a b"));
        let l2 = arena.leaf(Template::parse("a c"));
        let abstraction = arena.node(Template::parse("a [SLOT]"), [l1, l2]);
        let root = arena.node(Template::parse("[SLOT]"), [abstraction, l1, l2]);

        let pruned = arena.prune_redundant_abstractions(root);
        assert_eq!(arena.children(pruned), &[abstraction]);
    }

    #[test]
    fn test_to_lattice() {
        let mut arena = TreeArena::new();
        let l1 = arena.leaf(Template::parse("a b"));
        let l2 = arena.leaf(Template::parse("a c"));
        let abstraction = arena.node(Template::parse("a [SLOT]"), [l1]);
        let root = arena.node(Template::parse("[SLOT]"), [abstraction, l2]);

        let lattice = arena.to_lattice(root);
        let widened = arena.node(Template::parse("a [SLOT]"), [l1, l2]);
        assert_eq!(lattice, arena.node(Template::parse("[SLOT]"), [widened, l2]));
        assert_eq!(arena.leaves(lattice).len(), 2);
    }

    #[test]
    fn test_name_slots_automatically() {
        let mut arena = TreeArena::new();
        let leaf = arena.leaf(Template::parse("y x z"));
        let root = arena.node(Template::parse("[SLOT] x <A>"), [leaf]);

        let named = arena.name_slots_automatically(root, &mut SlotNameGenerator::new());
        assert_eq!(arena.template(named), &Template::parse("<B> x <A>"));
        assert_eq!(arena.children(named), &[leaf]);
    }

    #[test]
    fn test_recalculate_templates() {
        let mut arena = TreeArena::new();
        let l1 = arena.leaf(Template::parse("a b"));
        let l2 = arena.leaf(Template::parse("a c"));
        let root = arena.node(Template::parse("[SLOT]"), [l1, l2]);

        let recalculated = arena.recalculate_templates(root, true);
        assert_eq!(arena.template(recalculated), &Template::parse("a [SLOT]"));
        assert_eq!(arena.leaves(recalculated), arena.leaves(root));
    }

    #[test]
    fn test_display_and_render() {
        let f = fixture();
        assert_eq!(
            f.arena.view(f.t1).to_string(),
            "a b [SLOT] d {a b c d | a b e d | a b f d}"
        );
        let rendered = f.arena.render(f.t2);
        assert!(rendered.starts_with("[SLOT] b [SLOT] d\n"));
        assert_eq!(rendered.lines().count(), 6);
        assert!(rendered.contains("└── "));
    }
}
