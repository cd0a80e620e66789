//! # Gitta - Grammar Induction using Template Tree Approach
//!
//! Induces a context-free grammar from a corpus of example lines.
//!
//! Lines are tokenized into [`Template`]s and repeatedly merged pairwise by
//! minimum-cost alignment, building a tree of ever more abstract templates.
//! The tree is then pruned, its slots are named and unified when they take
//! similar values, and the result is read off as a [`ContextFreeGrammar`]
//! that generates (at least) every line of the corpus.
//!
//! ## Example
//!
//! ```
//! use gitta_rs::{induce_grammar, InductionConfig, WordDetokenizer};
//!
//! let lines = ["hello world", "hi world", "hello universe", "hi universe"];
//! let grammar = induce_grammar(&lines, &InductionConfig::default()).unwrap();
//!
//! // Every line of the corpus can be generated again
//! let mut generated = grammar.generate_all_strings(&WordDetokenizer).unwrap();
//! generated.sort();
//! assert_eq!(generated, vec!["hello universe", "hello world", "hi universe", "hi world"]);
//!
//! println!("{grammar}");
//! ```
//!
//! ## Notation
//!
//! - Anonymous slots render as `[SLOT]`, named ones as `<name>`
//! - Grammars serialize to JSON objects mapping non-terminals to productions
//! - Tracery documents (`#name#` references) can be read and written

mod alignment;
mod error;
mod grammar;
mod induction;
mod isomorphism;
mod learner;
mod notation;
mod slot_names;
mod slot_values;
mod template;
mod token;
mod tokenizer;
mod tree;


pub use alignment::{Alignments, EditOp, EditTable};
pub use error::{GrammarError, Result};
pub use grammar::{ContextFreeGrammar, DEFAULT_DEPTH, ORIGIN};
pub use induction::{induce_grammar, GrammarInducer, InductionConfig};
pub use isomorphism::{IsomorphismSearch, SlotRenaming};
pub use learner::{LatticeLearner, LearnerState, MergeCandidate};
pub use notation::{from_tracery_str, strip_tracery_modifiers, to_arrow_notation, to_tracery};
pub use slot_names::{alphabetic_slot_name, SlotNameGenerator};
pub use slot_values::{has_similar_content, SlotValues};
pub use template::{MergeOptions, SlotAssignment, Template, DEFAULT_MAX_ALIGNMENTS};
pub use token::{Slot, Token, ANONYMOUS_SLOT_MARKER};
pub use tokenizer::{
    parse_tokens, Detokenizer, SlotSyntax, SpaceDetokenizer, Tokenizer, WordDetokenizer,
    WordTokenizer,
};
pub use tree::{NodeKey, TemplateTree, TreeArena};
