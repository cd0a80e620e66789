//! Error types for grammar induction and grammar queries.

use thiserror::Error;

/// Errors raised by template algebra, grammar construction and induction.
#[derive(Debug, Error)]
pub enum GrammarError {
    /// Induction was asked to learn from zero lines.
    #[error("cannot induce a grammar from an empty corpus")]
    EmptyCorpus,

    /// A positional filling had the wrong number of values.
    #[error("cannot fill {expected} slots using {found} values")]
    ArityMismatch { expected: usize, found: usize },

    /// A slot assignment was built with the same slot twice.
    #[error("slot {0} occurs more than once in a slot assignment")]
    DuplicateSlot(String),

    /// Tracery input uses syntax the grammar model cannot represent.
    #[error("unsupported tracery syntax: {0}")]
    UnsupportedTracery(String),

    /// A grammar document has the wrong shape.
    #[error("invalid grammar document: {0}")]
    InvalidGrammarShape(String),

    /// Content extraction was requested for a template that is not covered.
    #[error("template \"{template}\" does not cover \"{target}\"")]
    NotCovered { template: String, target: String },

    /// A non-terminal was queried that the grammar does not define.
    #[error("there is no non-terminal named {0} in the grammar")]
    UnknownNonTerminal(String),

    /// An internal fixed-point or search loop broke one of its own guarantees.
    #[error("internal invariant violated: {0}")]
    InvariantViolated(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = GrammarError> = std::result::Result<T, E>;
