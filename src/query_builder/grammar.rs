//! # SQL Grammar
//!
//! Compiles a [`QueryBuilder`] into parameterized SQL text. Placeholders are
//! emitted in the same depth-first order [`PredicateGroup::bindings`] walks
//! the tree, so the Nth placeholder always lines up with the Nth binding.
//!
//! Grouping rule: a nested group with more than one emitted member is wrapped
//! in parentheses, as is a group whose only member is a raw fragment. Any
//! other single-member group compiles to that member, and a group that emits
//! nothing is skipped together with its connector.

use super::builder::QueryBuilder;
use super::conditions::{Condition, Predicate, PredicateGroup};
use crate::config::TenantQueryConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How positional parameters are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// PostgreSQL style `$1, $2, ...`
    #[default]
    Dollar,
    /// `?` for every parameter
    Question,
}

/// Compiled SQL text with its positional values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub bindings: Vec<Value>,
}

impl Statement {
    /// Number of placeholders the text expects
    pub fn placeholder_count(&self) -> usize {
        self.placeholder_numbers().len()
    }

    /// Parameter number of every marker in text order, skipping quoted literals
    ///
    /// `$n` markers report `n`; `?` markers are numbered by position.
    pub fn placeholder_numbers(&self) -> Vec<usize> {
        let mut numbers = Vec::new();
        let mut quoted = false;
        let mut chars = self.sql.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '\'' => quoted = !quoted,
                '?' if !quoted => numbers.push(numbers.len() + 1),
                '$' if !quoted => {
                    let mut digits = String::new();
                    while let Some(digit) = chars.next_if(char::is_ascii_digit) {
                        digits.push(digit);
                    }
                    if let Ok(number) = digits.parse() {
                        numbers.push(number);
                    }
                }
                _ => {}
            }
        }
        numbers
    }
}

/// Writes SQL while numbering placeholders across nested sub-queries
struct SqlWriter {
    sql: String,
    style: PlaceholderStyle,
    next: usize,
}

impl SqlWriter {
    fn new(style: PlaceholderStyle) -> Self {
        Self {
            sql: String::new(),
            style,
            next: 1,
        }
    }

    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    fn placeholder(&mut self) {
        match self.style {
            PlaceholderStyle::Dollar => {
                self.sql.push('$');
                self.sql.push_str(&self.next.to_string());
            }
            PlaceholderStyle::Question => self.sql.push('?'),
        }
        self.next += 1;
    }

    fn placeholders(&mut self, count: usize) {
        for index in 0..count {
            if index > 0 {
                self.push(", ");
            }
            self.placeholder();
        }
    }

    /// Copy a raw fragment, renumbering its `?` markers outside quoted literals
    fn raw(&mut self, sql: &str) {
        let mut quoted = false;
        for ch in sql.chars() {
            match ch {
                '?' if !quoted => self.placeholder(),
                '\'' => {
                    quoted = !quoted;
                    self.sql.push(ch);
                }
                _ => self.sql.push(ch),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Grammar {
    placeholder: PlaceholderStyle,
}

impl Grammar {
    pub fn new(placeholder: PlaceholderStyle) -> Self {
        Self { placeholder }
    }

    pub fn from_config(config: &TenantQueryConfig) -> Self {
        Self::new(config.placeholder_style)
    }

    pub fn placeholder_style(&self) -> PlaceholderStyle {
        self.placeholder
    }

    /// Compile a SELECT statement
    pub fn compile_select(&self, query: &QueryBuilder) -> Statement {
        let mut writer = SqlWriter::new(self.placeholder);
        self.write_select(query, &mut writer);
        Statement {
            sql: writer.sql,
            bindings: query.get_bindings(),
        }
    }

    /// Compile `SELECT COUNT(*)` over the same filters, ignoring order and paging
    pub fn compile_count(&self, query: &QueryBuilder) -> Statement {
        let counted = query
            .clone()
            .select(&["COUNT(*) AS aggregate"])
            .without_ordering()
            .without_pagination();
        self.compile_select(&counted)
    }

    /// Compile `SELECT EXISTS (...)`
    pub fn compile_exists(&self, query: &QueryBuilder) -> Statement {
        let inner = self.compile_select(query);
        Statement {
            sql: format!("SELECT EXISTS ({}) AS \"exists\"", inner.sql),
            bindings: inner.bindings,
        }
    }

    /// Compile an INSERT; NULL values are written as literals like in UPDATE
    pub fn compile_insert(&self, query: &QueryBuilder, attributes: &Map<String, Value>) -> Statement {
        let mut writer = SqlWriter::new(self.placeholder);
        let columns: Vec<&str> = attributes.keys().map(String::as_str).collect();
        writer.push(&format!(
            "INSERT INTO {} ({}) VALUES (",
            query.table(),
            columns.join(", ")
        ));
        let mut bindings = Vec::new();
        for (index, value) in attributes.values().enumerate() {
            if index > 0 {
                writer.push(", ");
            }
            if value.is_null() {
                writer.push("NULL");
            } else {
                writer.placeholder();
                bindings.push(value.clone());
            }
        }
        writer.push(")");
        Statement {
            sql: writer.sql,
            bindings,
        }
    }

    /// Compile an UPDATE; SET values are bound before the WHERE values
    ///
    /// A NULL value is written as a literal so the column's own type applies.
    pub fn compile_update(&self, query: &QueryBuilder, values: &Map<String, Value>) -> Statement {
        let mut writer = SqlWriter::new(self.placeholder);
        let mut bindings = Vec::new();
        writer.push(&format!("UPDATE {} SET ", query.from_clause()));
        for (index, (column, value)) in values.iter().enumerate() {
            if index > 0 {
                writer.push(", ");
            }
            writer.push(column);
            writer.push(" = ");
            if value.is_null() {
                writer.push("NULL");
            } else {
                writer.placeholder();
                bindings.push(value.clone());
            }
        }
        self.finish_update(query, writer, bindings)
    }

    /// Compile an UPDATE setting one `timestamptz` column to `stamp`
    pub fn compile_timestamp_update(
        &self,
        query: &QueryBuilder,
        column: &str,
        stamp: DateTime<Utc>,
    ) -> Statement {
        let mut writer = SqlWriter::new(self.placeholder);
        writer.push(&format!("UPDATE {} SET {column} = ", query.from_clause()));
        writer.placeholder();
        writer.push("::timestamptz");
        self.finish_update(query, writer, vec![Value::String(stamp.to_rfc3339())])
    }

    fn finish_update(
        &self,
        query: &QueryBuilder,
        mut writer: SqlWriter,
        mut bindings: Vec<Value>,
    ) -> Statement {
        self.write_where(query.wheres(), &mut writer);
        bindings.extend(query.get_raw_bindings().get(super::ClauseKind::Where).iter().cloned());
        Statement {
            sql: writer.sql,
            bindings,
        }
    }

    pub fn compile_delete(&self, query: &QueryBuilder) -> Statement {
        let mut writer = SqlWriter::new(self.placeholder);
        writer.push(&format!("DELETE FROM {}", query.from_clause()));
        self.write_where(query.wheres(), &mut writer);
        Statement {
            sql: writer.sql,
            bindings: query
                .get_raw_bindings()
                .get(super::ClauseKind::Where)
                .to_vec(),
        }
    }

    fn write_select(&self, query: &QueryBuilder, writer: &mut SqlWriter) {
        writer.push("SELECT ");
        if query.is_distinct() {
            writer.push("DISTINCT ");
        }
        if query.columns().is_empty() {
            writer.push("*");
        } else {
            writer.push(&query.columns().join(", "));
        }
        writer.push(" FROM ");
        writer.push(&query.from_clause());

        for join in query.joins() {
            writer.push(" ");
            writer.push(&join.to_sql());
        }

        self.write_where(query.wheres(), writer);

        if !query.groups().is_empty() {
            writer.push(" GROUP BY ");
            writer.push(&query.groups().join(", "));
        }

        if !query.havings().is_empty() {
            writer.push(" HAVING ");
            self.write_group(query.havings(), writer);
        }

        if !query.orders().is_empty() {
            writer.push(" ORDER BY ");
            writer.push(&query.orders().join(", "));
        }

        writer.push(&query.pagination().to_sql());
    }

    fn write_where(&self, group: &PredicateGroup, writer: &mut SqlWriter) {
        if !group.is_empty() {
            writer.push(" WHERE ");
            self.write_group(group, writer);
        }
    }

    fn write_group(&self, group: &PredicateGroup, writer: &mut SqlWriter) {
        let mut first = true;
        for member in group.members() {
            if member.predicate.is_empty() {
                continue;
            }
            if !first {
                writer.push(" ");
                writer.push(member.connector.to_sql());
                writer.push(" ");
            }
            first = false;
            self.write_predicate(&member.predicate, writer);
        }
    }

    fn write_predicate(&self, predicate: &Predicate, writer: &mut SqlWriter) {
        match predicate {
            Predicate::Leaf(condition) => self.write_condition(condition, writer),
            Predicate::Group(group) => {
                let parenthesize = group.is_compound();
                if parenthesize {
                    writer.push("(");
                }
                self.write_group(group, writer);
                if parenthesize {
                    writer.push(")");
                }
            }
        }
    }

    fn write_condition(&self, condition: &Condition, writer: &mut SqlWriter) {
        match condition {
            Condition::Basic {
                column, operator, ..
            } => {
                writer.push(&format!("{column} {operator} "));
                writer.placeholder();
            }
            Condition::Column {
                first,
                operator,
                second,
            } => writer.push(&format!("{first} {operator} {second}")),
            Condition::In { column, values } => {
                if values.is_empty() {
                    writer.push("0 = 1");
                } else {
                    writer.push(&format!("{column} IN ("));
                    writer.placeholders(values.len());
                    writer.push(")");
                }
            }
            Condition::NotIn { column, values } => {
                if values.is_empty() {
                    writer.push("1 = 1");
                } else {
                    writer.push(&format!("{column} NOT IN ("));
                    writer.placeholders(values.len());
                    writer.push(")");
                }
            }
            Condition::Between { column, .. } => {
                writer.push(&format!("{column} BETWEEN "));
                writer.placeholder();
                writer.push(" AND ");
                writer.placeholder();
            }
            Condition::NotBetween { column, .. } => {
                writer.push(&format!("{column} NOT BETWEEN "));
                writer.placeholder();
                writer.push(" AND ");
                writer.placeholder();
            }
            Condition::IsNull { column } => writer.push(&format!("{column} IS NULL")),
            Condition::IsNotNull { column } => writer.push(&format!("{column} IS NOT NULL")),
            Condition::Raw { sql, .. } => writer.raw(sql),
            Condition::Exists { query } => {
                writer.push("EXISTS (");
                self.write_select(query, writer);
                writer.push(")");
            }
            Condition::NotExists { query } => {
                writer.push("NOT EXISTS (");
                self.write_select(query, writer);
                writer.push(")");
            }
        }
    }
}
