//! Edit-distance alignment of token sequences.
//!
//! [`EditTable`] fills the classic Wagner-Fischer table (match costs 0,
//! substitute/insert/delete cost 1) and remembers, per cell, every move that
//! reaches the cell's minimum. [`Alignments`] walks those moves back from the
//! final cell and yields each minimum-cost path as a sequence of [`EditOp`]s
//! read from the start of the first sequence.
//!
//! At every backtracking step the diagonal move is tried first, then delete,
//! then insert, so the first alignment produced is stable for given inputs.

use crate::token::Token;

/// One step of an alignment, relative to the first sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditOp {
    /// Both tokens are equal; consumes one token of each sequence.
    Match,
    /// The tokens differ; consumes one token of each sequence.
    Substitute,
    /// Consumes one token of the first sequence only.
    Delete,
    /// Consumes one token of the second sequence only.
    Insert,
}

const MATCH: u8 = 1;
const SUBSTITUTE: u8 = 1 << 1;
const DELETE: u8 = 1 << 2;
const INSERT: u8 = 1 << 3;

/// Edit-distance table between two token sequences.
#[derive(Debug, Clone)]
pub struct EditTable {
    rows: usize,
    columns: usize,
    costs: Vec<usize>,
    moves: Vec<u8>,
}

impl EditTable {
    pub fn new(first: &[Token], second: &[Token]) -> Self {
        let rows = first.len() + 1;
        let columns = second.len() + 1;
        let mut costs = vec![0usize; rows * columns];
        let mut moves = vec![0u8; rows * columns];

        for i in 0..rows {
            for j in 0..columns {
                if i == 0 && j == 0 {
                    continue;
                }
                let mut best = usize::MAX;
                let mut best_moves = 0u8;
                let mut consider = |cost: usize, flag: u8| {
                    if cost < best {
                        best = cost;
                        best_moves = flag;
                    } else if cost == best {
                        best_moves |= flag;
                    }
                };

                if i > 0 && j > 0 {
                    let diagonal = costs[(i - 1) * columns + (j - 1)];
                    if first[i - 1] == second[j - 1] {
                        consider(diagonal, MATCH);
                    } else {
                        consider(diagonal + 1, SUBSTITUTE);
                    }
                }
                if i > 0 {
                    consider(costs[(i - 1) * columns + j] + 1, DELETE);
                }
                if j > 0 {
                    consider(costs[i * columns + (j - 1)] + 1, INSERT);
                }

                costs[i * columns + j] = best;
                moves[i * columns + j] = best_moves;
            }
        }

        Self {
            rows,
            columns,
            costs,
            moves,
        }
    }

    /// Minimum number of edits turning the first sequence into the second.
    pub fn distance(&self) -> usize {
        self.costs[self.rows * self.columns - 1]
    }

    /// Iterates over every minimum-cost alignment.
    pub fn alignments(&self) -> Alignments<'_> {
        Alignments {
            table: self,
            stack: vec![(self.rows - 1, self.columns - 1, Vec::new())],
        }
    }

    fn moves_at(&self, i: usize, j: usize) -> u8 {
        self.moves[i * self.columns + j]
    }
}

/// Depth-first enumeration of the optimal backtracking paths of an [`EditTable`].
pub struct Alignments<'t> {
    table: &'t EditTable,
    /// Pending cells with the reversed path that led to them.
    stack: Vec<(usize, usize, Vec<EditOp>)>,
}

impl Iterator for Alignments<'_> {
    type Item = Vec<EditOp>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((i, j, mut path)) = self.stack.pop() {
            if i == 0 && j == 0 {
                path.reverse();
                return Some(path);
            }

            let moves = self.table.moves_at(i, j);
            // Pushed in reverse preference order: the diagonal is popped first.
            if moves & INSERT != 0 {
                let mut next = path.clone();
                next.push(EditOp::Insert);
                self.stack.push((i, j - 1, next));
            }
            if moves & DELETE != 0 {
                let mut next = path.clone();
                next.push(EditOp::Delete);
                self.stack.push((i - 1, j, next));
            }
            if moves & (MATCH | SUBSTITUTE) != 0 {
                let op = if moves & MATCH != 0 {
                    EditOp::Match
                } else {
                    EditOp::Substitute
                };
                path.push(op);
                self.stack.push((i - 1, j - 1, path));
            }
        }
        None
    }
}
