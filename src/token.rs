use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Marker written for an anonymous slot in template text.
pub const ANONYMOUS_SLOT_MARKER: &str = "[SLOT]";

static NEXT_ANONYMOUS_SLOT: AtomicU32 = AtomicU32::new(0);

/// A non-terminal placeholder inside a template.
///
/// Named slots are identified by their name. Anonymous slots are identified by
/// the instance id handed out when they were created, so two anonymous slots
/// created separately are never the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    /// A positional placeholder that has not been named yet.
    Anonymous(u32),

    /// A slot referring to a non-terminal by name.
    Named(String),
}

impl Slot {
    /// Creates a fresh anonymous slot, distinct from every slot created before.
    pub fn anonymous() -> Self {
        Slot::Anonymous(NEXT_ANONYMOUS_SLOT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Slot::Named(name.into())
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Slot::Named(_))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Slot::Named(name) => Some(name),
            Slot::Anonymous(_) => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Anonymous(_) => f.write_str(ANONYMOUS_SLOT_MARKER),
            Slot::Named(name) => write!(f, "<{name}>"),
        }
    }
}

/// One element of a template: literal text or a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {
    Literal(String),
    Slot(Slot),
}

impl Token {
    pub fn literal(content: impl Into<String>) -> Self {
        Token::Literal(content.into())
    }

    pub fn anonymous_slot() -> Self {
        Token::Slot(Slot::anonymous())
    }

    pub fn named_slot(name: impl Into<String>) -> Self {
        Token::Slot(Slot::named(name))
    }

    pub fn is_slot(&self) -> bool {
        matches!(self, Token::Slot(_))
    }

    pub fn as_slot(&self) -> Option<&Slot> {
        match self {
            Token::Slot(slot) => Some(slot),
            Token::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Token::Literal(content) => Some(content),
            Token::Slot(_) => None,
        }
    }

    /// Renders the token with `#name#` slot syntax instead of `<name>`.
    pub(crate) fn to_hash_notation(&self) -> String {
        match self {
            Token::Slot(Slot::Named(name)) => format!("#{name}#"),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(content) => f.write_str(content),
            Token::Slot(slot) => slot.fmt(f),
        }
    }
}

impl From<Slot> for Token {
    fn from(slot: Slot) -> Self {
        Token::Slot(slot)
    }
}
