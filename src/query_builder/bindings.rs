//! # Binding Sequence
//!
//! Positional values keyed by the clause that owns them. The compiler emits
//! WHERE placeholders before HAVING placeholders, so [`BindingSequence::flatten`]
//! concatenates in that order.

use serde::Serialize;
use serde_json::Value;

/// Clause groups that carry bound values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    Where,
    Having,
}

impl ClauseKind {
    /// Compile order
    pub const ALL: [ClauseKind; 2] = [ClauseKind::Where, ClauseKind::Having];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BindingSequence {
    #[serde(rename = "where")]
    wheres: Vec<Value>,
    #[serde(rename = "having")]
    havings: Vec<Value>,
}

impl BindingSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: ClauseKind) -> &[Value] {
        match kind {
            ClauseKind::Where => &self.wheres,
            ClauseKind::Having => &self.havings,
        }
    }

    /// Replace one clause's values wholesale
    pub fn set(&mut self, kind: ClauseKind, values: Vec<Value>) {
        match kind {
            ClauseKind::Where => self.wheres = values,
            ClauseKind::Having => self.havings = values,
        }
    }

    pub fn len(&self) -> usize {
        self.wheres.len() + self.havings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All values in compile order
    pub fn flatten(&self) -> Vec<Value> {
        ClauseKind::ALL
            .iter()
            .flat_map(|kind| self.get(*kind).iter().cloned())
            .collect()
    }
}
