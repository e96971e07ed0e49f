//! # Predicate Tree
//!
//! Leaf conditions and nested groups that make up a WHERE (or HAVING) clause.
//!
//! Every member of a group carries the [`Connector`] that joins it to the
//! member before it. Members are only ever appended; the one structural edit
//! allowed after the fact is replacing a whole nested group addressed by a
//! [`GroupHandle`], which is how a separately-owned subtree is refreshed by
//! value inside its parent.

use super::builder::QueryBuilder;
use crate::error::{Result, TenantQueryError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boolean connector joining a member to its previous sibling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn to_sql(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

/// A single leaf condition
#[derive(Debug, Clone)]
pub enum Condition {
    Basic {
        column: String,
        operator: String,
        value: Value,
    },
    Column {
        first: String,
        operator: String,
        second: String,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    NotIn {
        column: String,
        values: Vec<Value>,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
    },
    NotBetween {
        column: String,
        low: Value,
        high: Value,
    },
    IsNull {
        column: String,
    },
    IsNotNull {
        column: String,
    },
    /// Raw fragment; each `?` in `sql` consumes one value from `bindings`
    Raw {
        sql: String,
        bindings: Vec<Value>,
    },
    Exists {
        query: Box<QueryBuilder>,
    },
    NotExists {
        query: Box<QueryBuilder>,
    },
}

impl Condition {
    /// Append this leaf's bound values in placeholder order
    pub fn collect_bindings(&self, out: &mut Vec<Value>) {
        match self {
            Condition::Basic { value, .. } => out.push(value.clone()),
            Condition::In { values, .. } | Condition::NotIn { values, .. } => {
                out.extend(values.iter().cloned())
            }
            Condition::Between { low, high, .. } | Condition::NotBetween { low, high, .. } => {
                out.push(low.clone());
                out.push(high.clone());
            }
            Condition::Raw { bindings, .. } => out.extend(bindings.iter().cloned()),
            Condition::Exists { query } | Condition::NotExists { query } => {
                out.extend(query.get_bindings())
            }
            Condition::Column { .. } | Condition::IsNull { .. } | Condition::IsNotNull { .. } => {}
        }
    }
}

/// Either a leaf condition or a nested group
#[derive(Debug, Clone)]
pub enum Predicate {
    Leaf(Condition),
    Group(PredicateGroup),
}

impl Predicate {
    /// True when compiling this predicate would emit nothing
    pub fn is_empty(&self) -> bool {
        match self {
            Predicate::Leaf(_) => false,
            Predicate::Group(group) => group.is_empty(),
        }
    }
}

/// One entry in a group: the predicate plus how it joins its previous sibling
#[derive(Debug, Clone)]
pub struct Member {
    pub connector: Connector,
    pub predicate: Predicate,
}

/// Handle to a nested group created by [`PredicateGroup::wrap`] or
/// [`PredicateGroup::append_group`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupHandle(usize);

/// Ordered sequence of leaves and nested groups
#[derive(Debug, Clone, Default)]
pub struct PredicateGroup {
    members: Vec<Member>,
}

impl PredicateGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Number of members that would actually be emitted
    pub fn effective_len(&self) -> usize {
        self.members
            .iter()
            .filter(|member| !member.predicate.is_empty())
            .count()
    }

    /// True when the group emits nothing, at any depth
    pub fn is_empty(&self) -> bool {
        self.effective_len() == 0
    }

    /// True when the group needs parentheses once nested in a parent
    ///
    /// A raw fragment may carry its own OR, so a group holding nothing but
    /// one raw leaf counts as compound too.
    pub fn is_compound(&self) -> bool {
        let mut emitted = self
            .members
            .iter()
            .filter(|member| !member.predicate.is_empty());
        match (emitted.next(), emitted.next()) {
            (Some(_), Some(_)) => true,
            (Some(member), None) => {
                matches!(member.predicate, Predicate::Leaf(Condition::Raw { .. }))
            }
            (None, _) => false,
        }
    }

    pub fn append(&mut self, predicate: Predicate, connector: Connector) {
        self.members.push(Member {
            connector,
            predicate,
        });
    }

    pub fn append_condition(&mut self, condition: Condition, connector: Connector) {
        self.append(Predicate::Leaf(condition), connector);
    }

    /// Append an existing group as one nested member
    pub fn append_group(&mut self, group: PredicateGroup, connector: Connector) -> GroupHandle {
        self.append(Predicate::Group(group), connector);
        GroupHandle(self.members.len() - 1)
    }

    /// Materialize a new, empty child group and return its handle
    pub fn wrap(&mut self, connector: Connector) -> GroupHandle {
        self.append_group(PredicateGroup::new(), connector)
    }

    /// Mutable access to a nested group previously returned as a handle
    pub fn group_mut(&mut self, handle: GroupHandle) -> Result<&mut PredicateGroup> {
        let len = self.members.len();
        match self.members.get_mut(handle.0) {
            Some(Member {
                predicate: Predicate::Group(group),
                ..
            }) => Ok(group),
            Some(_) => Err(TenantQueryError::GroupingInvariant {
                reason: format!("member {} is a leaf, not a group", handle.0),
            }),
            None => Err(TenantQueryError::GroupingInvariant {
                reason: format!(
                    "group handle {} is stale (group has {len} members)",
                    handle.0
                ),
            }),
        }
    }

    /// Replace the whole content of a nested group
    pub fn replace_group(&mut self, handle: GroupHandle, group: PredicateGroup) -> Result<()> {
        *self.group_mut(handle)? = group;
        Ok(())
    }

    /// Detach every member from `at` onwards into a new group
    pub fn split_off(&mut self, at: usize) -> Result<PredicateGroup> {
        if at > self.members.len() {
            return Err(TenantQueryError::GroupingInvariant {
                reason: format!(
                    "cannot split at {at}: group shrank to {} members",
                    self.members.len()
                ),
            });
        }
        Ok(PredicateGroup {
            members: self.members.split_off(at),
        })
    }

    /// True when every member after the first joins with AND
    pub fn is_conjunction(&self) -> bool {
        self.members
            .iter()
            .skip(1)
            .all(|member| member.connector == Connector::And)
    }

    /// Append all members of a conjunction directly, the first one with AND
    ///
    /// Callers must only hand over conjunctions; anything else has to be
    /// appended as a nested group instead.
    pub fn extend_conjunction(&mut self, other: PredicateGroup) -> Result<()> {
        if !other.is_conjunction() {
            return Err(TenantQueryError::GroupingInvariant {
                reason: "only AND-only groups may be flattened into a parent".to_string(),
            });
        }
        for member in other.members {
            self.append(member.predicate, Connector::And);
        }
        Ok(())
    }

    /// Drop top-level leaves matching `predicate`, returning how many went
    pub fn remove_leaves<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Condition) -> bool,
    {
        let before = self.members.len();
        self.members.retain(|member| match &member.predicate {
            Predicate::Leaf(condition) => !predicate(condition),
            Predicate::Group(_) => true,
        });
        before - self.members.len()
    }

    /// Bound values in depth-first insertion order
    pub fn bindings(&self) -> Vec<Value> {
        let mut out = Vec::new();
        self.collect_bindings(&mut out);
        out
    }

    pub fn collect_bindings(&self, out: &mut Vec<Value>) {
        for member in &self.members {
            match &member.predicate {
                Predicate::Leaf(condition) => condition.collect_bindings(out),
                Predicate::Group(group) => group.collect_bindings(out),
            }
        }
    }
}
