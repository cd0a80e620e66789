use ahash::AHashSet as HashSet;

const LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Alphabetic name for the `index`-th slot: `A`..`Z`, then `BA`, `BB`, ...
///
/// Names are base-26 numerals with `A` as the zero digit.
pub fn alphabetic_slot_name(mut index: usize) -> String {
    if index == 0 {
        return "A".to_string();
    }
    let mut digits = Vec::new();
    while index > 0 {
        digits.push(LETTERS[index % LETTERS.len()]);
        index /= LETTERS.len();
    }
    digits.iter().rev().map(|&d| d as char).collect()
}

/// Endless source of fresh slot names that skips reserved ones.
#[derive(Debug, Clone, Default)]
pub struct SlotNameGenerator {
    next: usize,
    reserved: HashSet<String>,
}

impl SlotNameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator that never yields any of `reserved`.
    pub fn skipping<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            next: 0,
            reserved: reserved.into_iter().map(Into::into).collect(),
        }
    }

    pub fn reserve(&mut self, name: impl Into<String>) {
        self.reserved.insert(name.into());
    }

    /// The next name that is not reserved.
    pub fn fresh_name(&mut self) -> String {
        loop {
            let name = alphabetic_slot_name(self.next);
            self.next += 1;
            if !self.reserved.contains(&name) {
                return name;
            }
        }
    }
}

impl Iterator for SlotNameGenerator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        Some(self.fresh_name())
    }
}
