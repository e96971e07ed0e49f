//! # Call Dispatch
//!
//! The closed set of operations a builder understands, plus the parser that
//! turns a method name and JSON arguments into one of them. Predicate calls
//! are [`WhereCall`]s, clause-shaping calls are [`StructuralCall`]s and calls
//! that end a chain are [`TerminalCall`]s.
//!
//! Method names are matched case- and underscore-insensitively, so
//! `orWhereBetween` and `or_where_between` are the same call. Anything that
//! starts with `where` and is not a known predicate is parsed as a dynamic
//! compound condition (`whereBazOrBar(6, 7)` is `baz = 6 OR bar = 7`).

use super::builder::QueryBuilder;
use super::conditions::Connector;
use super::joins::{Join, JoinType};
use crate::error::{Result, TenantQueryError};
use serde_json::{Map, Value};

/// One `column = value` piece of a dynamic where
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicClause {
    pub connector: Connector,
    pub column: String,
    pub value: Value,
}

/// Predicate-construction operations
#[derive(Debug, Clone)]
pub enum WhereCall {
    Basic {
        column: String,
        operator: String,
        value: Value,
        connector: Connector,
    },
    Column {
        first: String,
        operator: String,
        second: String,
        connector: Connector,
    },
    In {
        column: String,
        values: Vec<Value>,
        connector: Connector,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
        connector: Connector,
        negated: bool,
    },
    Null {
        column: String,
        connector: Connector,
        negated: bool,
    },
    Raw {
        sql: String,
        bindings: Vec<Value>,
        connector: Connector,
    },
    /// Closure-form group, already evaluated against a fresh builder
    Nested {
        query: QueryBuilder,
        connector: Connector,
    },
    Exists {
        query: QueryBuilder,
        connector: Connector,
        negated: bool,
    },
    Dynamic {
        clauses: Vec<DynamicClause>,
    },
}

impl WhereCall {
    /// Replay this call against a base query
    pub fn apply(self, mut query: QueryBuilder) -> QueryBuilder {
        match self {
            WhereCall::Basic {
                column,
                operator,
                value,
                connector,
            } => query.add_where(&column, &operator, value, connector),
            WhereCall::Column {
                first,
                operator,
                second,
                connector,
            } => query.add_where_column(&first, &operator, &second, connector),
            WhereCall::In {
                column,
                values,
                connector,
                negated,
            } => query.add_where_in(&column, values, connector, negated),
            WhereCall::Between {
                column,
                low,
                high,
                connector,
                negated,
            } => query.add_where_between(&column, low, high, connector, negated),
            WhereCall::Null {
                column,
                connector,
                negated,
            } => query.add_where_null(&column, connector, negated),
            WhereCall::Raw {
                sql,
                bindings,
                connector,
            } => query.add_where_raw(&sql, bindings, connector),
            WhereCall::Nested {
                query: nested,
                connector,
            } => {
                if !nested.wheres().is_empty() {
                    query.add_nested_where_query(&nested, connector);
                }
            }
            WhereCall::Exists {
                query: subquery,
                connector,
                negated,
            } => query.add_where_exists(subquery, connector, negated),
            WhereCall::Dynamic { clauses } => {
                for clause in clauses {
                    query.add_where(&clause.column, "=", clause.value, clause.connector);
                }
            }
        }
        query
    }
}

/// Clause-shaping operations passed straight through to the base query
#[derive(Debug, Clone, PartialEq)]
pub enum StructuralCall {
    Select(Vec<String>),
    AddSelect(Vec<String>),
    Distinct,
    From(String),
    Join(Join),
    OrderBy { column: String, direction: String },
    GroupBy(Vec<String>),
    Having {
        column: String,
        operator: String,
        value: Value,
        connector: Connector,
    },
    Limit(u64),
    Offset(u64),
    ForPage { page: u64, per_page: u64 },
}

impl StructuralCall {
    pub fn apply(self, query: QueryBuilder) -> QueryBuilder {
        match self {
            StructuralCall::Select(columns) => query.select(&as_strs(&columns)),
            StructuralCall::AddSelect(columns) => query.add_select(&as_strs(&columns)),
            StructuralCall::Distinct => query.distinct(),
            StructuralCall::From(table) => query.from(&table),
            StructuralCall::Join(join) => query.join(join),
            StructuralCall::OrderBy { column, direction } => query.order_by(&column, &direction),
            StructuralCall::GroupBy(columns) => query.group_by(&as_strs(&columns)),
            StructuralCall::Having {
                column,
                operator,
                value,
                connector: Connector::And,
            } => query.having(&column, &operator, value),
            StructuralCall::Having {
                column,
                operator,
                value,
                connector: Connector::Or,
            } => query.or_having(&column, &operator, value),
            StructuralCall::Limit(limit) => query.limit(limit),
            StructuralCall::Offset(offset) => query.offset(offset),
            StructuralCall::ForPage { page, per_page } => query.for_page(page, per_page),
        }
    }
}

/// Operations whose native result replaces the builder as return value
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalCall {
    ToSql,
    GetBindings,
    Get,
    First,
    Find(Value),
    Count,
    Exists,
    Insert(Map<String, Value>),
    Update(Map<String, Value>),
    Delete,
}

impl TerminalCall {
    pub fn name(&self) -> &'static str {
        match self {
            TerminalCall::ToSql => "to_sql",
            TerminalCall::GetBindings => "get_bindings",
            TerminalCall::Get => "get",
            TerminalCall::First => "first",
            TerminalCall::Find(_) => "find",
            TerminalCall::Count => "count",
            TerminalCall::Exists => "exists",
            TerminalCall::Insert(_) => "insert",
            TerminalCall::Update(_) => "update",
            TerminalCall::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone)]
pub enum QueryCall {
    Where(WhereCall),
    Structural(StructuralCall),
    Terminal(TerminalCall),
}

impl QueryCall {
    /// Resolve a method name; `Ok(None)` means the name is unknown
    pub fn parse(method: &str, args: &[Value]) -> Result<Option<QueryCall>> {
        let key = normalize_method(method);
        let args = Args::new(method, args);

        let call = match key.as_str() {
            "where" => QueryCall::Where(args.basic(Connector::And)?),
            "orwhere" => QueryCall::Where(args.basic(Connector::Or)?),
            "wherecolumn" => QueryCall::Where(args.column(Connector::And)?),
            "orwherecolumn" => QueryCall::Where(args.column(Connector::Or)?),
            "wherein" => QueryCall::Where(args.in_list(Connector::And, false)?),
            "orwherein" => QueryCall::Where(args.in_list(Connector::Or, false)?),
            "wherenotin" => QueryCall::Where(args.in_list(Connector::And, true)?),
            "orwherenotin" => QueryCall::Where(args.in_list(Connector::Or, true)?),
            "wherebetween" => QueryCall::Where(args.between(Connector::And, false)?),
            "orwherebetween" => QueryCall::Where(args.between(Connector::Or, false)?),
            "wherenotbetween" => QueryCall::Where(args.between(Connector::And, true)?),
            "orwherenotbetween" => QueryCall::Where(args.between(Connector::Or, true)?),
            "wherenull" => QueryCall::Where(args.null(Connector::And, false)?),
            "orwherenull" => QueryCall::Where(args.null(Connector::Or, false)?),
            "wherenotnull" => QueryCall::Where(args.null(Connector::And, true)?),
            "orwherenotnull" => QueryCall::Where(args.null(Connector::Or, true)?),
            "whereraw" => QueryCall::Where(args.raw(Connector::And)?),
            "orwhereraw" => QueryCall::Where(args.raw(Connector::Or)?),
            "wheregroup" | "orwheregroup" | "whereexists" | "orwhereexists" | "wherenotexists"
            | "orwherenotexists" => {
                return Err(args.invalid("closure-form predicates need the typed builder API"))
            }

            "select" => QueryCall::Structural(StructuralCall::Select(args.strings()?)),
            "addselect" => QueryCall::Structural(StructuralCall::AddSelect(args.strings()?)),
            "distinct" => QueryCall::Structural(StructuralCall::Distinct),
            "from" => QueryCall::Structural(StructuralCall::From(args.string(0)?)),
            "join" | "innerjoin" => QueryCall::Structural(args.join(JoinType::Inner)?),
            "leftjoin" => QueryCall::Structural(args.join(JoinType::Left)?),
            "rightjoin" => QueryCall::Structural(args.join(JoinType::Right)?),
            "crossjoin" => {
                QueryCall::Structural(StructuralCall::Join(Join::cross(&args.string(0)?)))
            }
            "orderby" => QueryCall::Structural(StructuralCall::OrderBy {
                column: args.string(0)?,
                direction: args.optional_string(1)?.unwrap_or_else(|| "asc".to_string()),
            }),
            "orderbydesc" => QueryCall::Structural(StructuralCall::OrderBy {
                column: args.string(0)?,
                direction: "desc".to_string(),
            }),
            "groupby" => QueryCall::Structural(StructuralCall::GroupBy(args.strings()?)),
            "having" => QueryCall::Structural(args.having(Connector::And)?),
            "orhaving" => QueryCall::Structural(args.having(Connector::Or)?),
            "limit" | "take" => QueryCall::Structural(StructuralCall::Limit(args.unsigned(0)?)),
            "offset" | "skip" => QueryCall::Structural(StructuralCall::Offset(args.unsigned(0)?)),
            "forpage" => QueryCall::Structural(StructuralCall::ForPage {
                page: args.unsigned(0)?,
                per_page: args.unsigned(1)?,
            }),

            "tosql" => QueryCall::Terminal(TerminalCall::ToSql),
            "getbindings" => QueryCall::Terminal(TerminalCall::GetBindings),
            "get" => QueryCall::Terminal(TerminalCall::Get),
            "first" => QueryCall::Terminal(TerminalCall::First),
            "find" => QueryCall::Terminal(TerminalCall::Find(args.value(0)?)),
            "count" => QueryCall::Terminal(TerminalCall::Count),
            "exists" => QueryCall::Terminal(TerminalCall::Exists),
            "insert" => QueryCall::Terminal(TerminalCall::Insert(args.object(0)?)),
            "update" => QueryCall::Terminal(TerminalCall::Update(args.object(0)?)),
            "delete" => QueryCall::Terminal(TerminalCall::Delete),

            _ if key.len() > "where".len() && key.starts_with("where") => {
                QueryCall::Where(WhereCall::Dynamic {
                    clauses: parse_dynamic_where(method, args.values)?,
                })
            }
            _ => return Ok(None),
        };

        Ok(Some(call))
    }
}

/// Lowercase a method name and drop underscores
pub fn normalize_method(method: &str) -> String {
    method
        .chars()
        .filter(|ch| *ch != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Build the clauses of a dynamic where such as `whereBazOrBar` / `where_baz_or_bar`
pub fn parse_dynamic_where(method: &str, params: &[Value]) -> Result<Vec<DynamicClause>> {
    let invalid = |reason: String| TenantQueryError::InvalidArguments {
        method: method.to_string(),
        reason,
    };

    let finder = method
        .get(..5)
        .filter(|prefix| prefix.eq_ignore_ascii_case("where"))
        .map(|_| method[5..].trim_start_matches('_'))
        .ok_or_else(|| invalid("dynamic where must start with `where`".to_string()))?;

    let segments = split_dynamic_finder(finder);
    if segments.is_empty() {
        return Err(invalid("no columns in dynamic where".to_string()));
    }
    if params.len() < segments.len() {
        return Err(invalid(format!(
            "expected {} values, got {}",
            segments.len(),
            params.len()
        )));
    }

    Ok(segments
        .into_iter()
        .zip(params.iter().cloned())
        .map(|((connector, column), value)| DynamicClause {
            connector,
            column,
            value,
        })
        .collect())
}

/// Split a finder into `(connector, snake_case column)` segments
pub fn split_dynamic_finder(finder: &str) -> Vec<(Connector, String)> {
    if finder.contains('_') {
        split_snake_finder(finder)
    } else {
        split_camel_finder(finder)
    }
}

fn split_camel_finder(finder: &str) -> Vec<(Connector, String)> {
    let chars: Vec<char> = finder.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut connector = Connector::And;
    let mut index = 0;

    while index < chars.len() {
        let rest = &chars[index..];
        let delimiter = if word_at(rest, "And") {
            Some((Connector::And, 3))
        } else if word_at(rest, "Or") {
            Some((Connector::Or, 2))
        } else {
            None
        };

        match delimiter {
            Some((next, width)) if !current.is_empty() => {
                segments.push((connector, snake_case(&current)));
                current.clear();
                connector = next;
                index += width;
            }
            _ => {
                current.push(chars[index]);
                index += 1;
            }
        }
    }

    if !current.is_empty() {
        segments.push((connector, snake_case(&current)));
    }
    segments
}

fn split_snake_finder(finder: &str) -> Vec<(Connector, String)> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut connector = Connector::And;

    for token in finder.split('_').filter(|token| !token.is_empty()) {
        let delimiter = match token.to_ascii_lowercase().as_str() {
            "and" => Some(Connector::And),
            "or" => Some(Connector::Or),
            _ => None,
        };
        match delimiter {
            Some(next) if !current.is_empty() => {
                segments.push((connector, current.join("_").to_ascii_lowercase()));
                current.clear();
                connector = next;
            }
            _ => current.push(token),
        }
    }

    if !current.is_empty() {
        segments.push((connector, current.join("_").to_ascii_lowercase()));
    }
    segments
}

/// `And`/`Or` followed by an uppercase letter
fn word_at(chars: &[char], word: &str) -> bool {
    let width = word.chars().count();
    chars.len() > width
        && word.chars().zip(chars.iter()).all(|(a, b)| a == *b)
        && chars[width].is_uppercase()
}

fn snake_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() + 4);
    for (index, ch) in segment.chars().enumerate() {
        if ch.is_uppercase() {
            if index > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

/// Positional JSON arguments of a name-dispatched call
struct Args<'a> {
    method: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    fn new(method: &'a str, values: &'a [Value]) -> Self {
        Self { method, values }
    }

    fn invalid(&self, reason: impl Into<String>) -> TenantQueryError {
        TenantQueryError::InvalidArguments {
            method: self.method.to_string(),
            reason: reason.into(),
        }
    }

    fn value(&self, index: usize) -> Result<Value> {
        self.values
            .get(index)
            .cloned()
            .ok_or_else(|| self.invalid(format!("missing argument {index}")))
    }

    fn string(&self, index: usize) -> Result<String> {
        match self.values.get(index) {
            Some(Value::String(value)) => Ok(value.clone()),
            Some(other) => Err(self.invalid(format!("argument {index} must be a string, got {other}"))),
            None => Err(self.invalid(format!("missing argument {index}"))),
        }
    }

    fn optional_string(&self, index: usize) -> Result<Option<String>> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.string(index).map(Some),
        }
    }

    /// All arguments as column names; a single array argument is flattened
    fn strings(&self) -> Result<Vec<String>> {
        let values: &[Value] = match self.values {
            [Value::Array(items)] => items,
            other => other,
        };
        values
            .iter()
            .map(|value| match value {
                Value::String(column) => Ok(column.clone()),
                other => Err(self.invalid(format!("expected column name, got {other}"))),
            })
            .collect()
    }

    fn list(&self, index: usize) -> Result<Vec<Value>> {
        match self.values.get(index) {
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(other) => Err(self.invalid(format!("argument {index} must be an array, got {other}"))),
            None => Err(self.invalid(format!("missing argument {index}"))),
        }
    }

    fn unsigned(&self, index: usize) -> Result<u64> {
        self.values
            .get(index)
            .and_then(Value::as_u64)
            .ok_or_else(|| self.invalid(format!("argument {index} must be a non-negative integer")))
    }

    fn object(&self, index: usize) -> Result<Map<String, Value>> {
        match self.values.get(index) {
            Some(Value::Object(map)) => Ok(map.clone()),
            _ => Err(self.invalid(format!("argument {index} must be an object"))),
        }
    }

    /// Optional trailing `"and"`/`"or"` argument
    fn connector_at(&self, index: usize, default: Connector) -> Result<Connector> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::String(name)) if name.eq_ignore_ascii_case("and") => Ok(Connector::And),
            Some(Value::String(name)) if name.eq_ignore_ascii_case("or") => Ok(Connector::Or),
            Some(other) => Err(self.invalid(format!("unknown boolean connector {other}"))),
        }
    }

    /// `(column, value)` or `(column, operator, value[, boolean])`
    fn basic(&self, connector: Connector) -> Result<WhereCall> {
        let column = self.string(0)?;
        match self.values.len() {
            2 => Ok(WhereCall::Basic {
                column,
                operator: "=".to_string(),
                value: self.value(1)?,
                connector,
            }),
            3 | 4 => Ok(WhereCall::Basic {
                column,
                operator: self.string(1)?,
                value: self.value(2)?,
                connector: self.connector_at(3, connector)?,
            }),
            count => Err(self.invalid(format!("expected 2 to 4 arguments, got {count}"))),
        }
    }

    fn column(&self, connector: Connector) -> Result<WhereCall> {
        match self.values.len() {
            2 => Ok(WhereCall::Column {
                first: self.string(0)?,
                operator: "=".to_string(),
                second: self.string(1)?,
                connector,
            }),
            _ => Ok(WhereCall::Column {
                first: self.string(0)?,
                operator: self.string(1)?,
                second: self.string(2)?,
                connector,
            }),
        }
    }

    fn in_list(&self, connector: Connector, negated: bool) -> Result<WhereCall> {
        Ok(WhereCall::In {
            column: self.string(0)?,
            values: self.list(1)?,
            connector,
            negated,
        })
    }

    /// `(column, [low, high])` or `(column, low, high)`
    fn between(&self, connector: Connector, negated: bool) -> Result<WhereCall> {
        let column = self.string(0)?;
        let (low, high) = match self.values.get(1) {
            Some(Value::Array(range)) if range.len() == 2 => (range[0].clone(), range[1].clone()),
            Some(Value::Array(_)) => return Err(self.invalid("range must have exactly two values")),
            _ => (self.value(1)?, self.value(2)?),
        };
        Ok(WhereCall::Between {
            column,
            low,
            high,
            connector,
            negated,
        })
    }

    fn null(&self, connector: Connector, negated: bool) -> Result<WhereCall> {
        Ok(WhereCall::Null {
            column: self.string(0)?,
            connector,
            negated,
        })
    }

    fn raw(&self, connector: Connector) -> Result<WhereCall> {
        let bindings = match self.values.get(1) {
            None | Some(Value::Null) => Vec::new(),
            Some(_) => self.list(1)?,
        };
        Ok(WhereCall::Raw {
            sql: self.string(0)?,
            bindings,
            connector,
        })
    }

    fn join(&self, join_type: JoinType) -> Result<StructuralCall> {
        Ok(StructuralCall::Join(Join::on(
            join_type,
            &self.string(0)?,
            &self.string(1)?,
            &self.string(2)?,
            &self.string(3)?,
        )))
    }

    fn having(&self, connector: Connector) -> Result<StructuralCall> {
        Ok(StructuralCall::Having {
            column: self.string(0)?,
            operator: self.string(1)?,
            value: self.value(2)?,
            connector,
        })
    }
}
