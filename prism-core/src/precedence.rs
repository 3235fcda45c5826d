//! Binary operator binding strengths.
//!
//! The table is runtime-mutable: defining a binary operator installs
//! its precedence before the operator's body is generated, and a failed
//! definition takes the entry back out. Parsing consults whatever the
//! table holds at that moment, which is why an operator is only usable
//! from the first form after its definition succeeded.

use crate::token::Token;
use std::collections::HashMap;

/// Precedence assigned to a user binary operator that omits the literal.
pub const DEFAULT_BINARY_PRECEDENCE: i32 = 30;

/// Inclusive range accepted for an explicit precedence literal.
pub const PRECEDENCE_RANGE: std::ops::RangeInclusive<i32> = 1..=100;

const BUILTIN_PRECEDENCES: &[(char, i32)] = &[
    ('=', 2),
    ('<', 10),
    ('+', 20),
    ('-', 20),
    ('*', 40),
];

#[derive(Debug, Clone)]
pub struct PrecedenceTable {
    entries: HashMap<char, i32>,
}

impl Default for PrecedenceTable {
    fn default() -> Self {
        PrecedenceTable {
            entries: BUILTIN_PRECEDENCES.iter().copied().collect(),
        }
    }
}

impl PrecedenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, op: char) -> Option<i32> {
        self.entries.get(&op).copied()
    }

    /// Binding strength of the token at the head of the input, or -1 if
    /// it is not a registered binary operator. The parser's climbing
    /// loop stops on any negative value.
    pub fn token_precedence(&self, token: &Token) -> i32 {
        match token.as_char() {
            Some(c) => self.get(c).unwrap_or(-1),
            None => -1,
        }
    }

    /// Install or update an operator, returning the previous strength
    /// so a failed definition can restore it.
    pub fn install(&mut self, op: char, precedence: i32) -> Option<i32> {
        self.entries.insert(op, precedence)
    }

    pub fn remove(&mut self, op: char) -> Option<i32> {
        self.entries.remove(&op)
    }
}
