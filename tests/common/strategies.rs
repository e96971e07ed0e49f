use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::iter::Peekable;
use tenant_query::query_builder::{
    Condition, Connector, Filterable, Predicate, PredicateGroup, QueryBuilder,
};

pub const COLUMNS: [&str; 3] = ["a", "b", "c"];

/// One caller predicate call, replayable against any [`Filterable`]
#[derive(Debug, Clone)]
pub enum UserPredicate {
    Eq { column: String, value: i64, or: bool },
    Null { column: String, or: bool },
    In { column: String, values: Vec<i64>, or: bool },
    /// Closure group of OR-ed equalities
    Group { terms: Vec<(String, i64)>, or: bool },
    /// Raw fragment with its own OR: `x = ? OR y = ?`
    Raw { left: (String, i64), right: (String, i64), or: bool },
}

impl UserPredicate {
    pub fn apply<B: Filterable>(self, builder: B) -> B {
        match self {
            UserPredicate::Eq { column, value, or } if or => builder.or_where(&column, "=", value),
            UserPredicate::Eq { column, value, .. } => builder.where_(&column, "=", value),
            UserPredicate::Null { column, or } if or => builder.or_where_null(&column),
            UserPredicate::Null { column, .. } => builder.where_null(&column),
            UserPredicate::In { column, values, or } if or => builder.or_where_in(&column, values),
            UserPredicate::In { column, values, .. } => builder.where_in(&column, values),
            UserPredicate::Raw { left, right, or } => {
                let sql = format!("{} = ? OR {} = ?", left.0, right.0);
                let bindings = vec![json!(left.1), json!(right.1)];
                if or {
                    builder.or_where_raw(&sql, bindings)
                } else {
                    builder.where_raw(&sql, bindings)
                }
            }
            UserPredicate::Group { terms, or } => {
                let group = move |query: QueryBuilder| {
                    terms
                        .into_iter()
                        .fold(query, |q, (column, value)| q.or_where(&column, "=", value))
                };
                if or {
                    builder.or_where_group(group)
                } else {
                    builder.where_group(group)
                }
            }
        }
    }
}

pub fn column_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(COLUMNS.to_vec()).prop_map(str::to_string)
}

pub fn user_predicate_strategy() -> impl Strategy<Value = UserPredicate> {
    prop_oneof![
        (column_strategy(), 0i64..3, any::<bool>())
            .prop_map(|(column, value, or)| UserPredicate::Eq { column, value, or }),
        (column_strategy(), any::<bool>()).prop_map(|(column, or)| UserPredicate::Null { column, or }),
        (column_strategy(), prop::collection::vec(0i64..3, 1..4), any::<bool>())
            .prop_map(|(column, values, or)| UserPredicate::In { column, values, or }),
        (
            prop::collection::vec((column_strategy(), 0i64..3), 1..4),
            any::<bool>()
        )
            .prop_map(|(terms, or)| UserPredicate::Group { terms, or }),
        (
            (column_strategy(), 0i64..3),
            (column_strategy(), 0i64..3),
            any::<bool>()
        )
            .prop_map(|(left, right, or)| UserPredicate::Raw { left, right, or }),
    ]
}

pub fn user_predicates_strategy() -> impl Strategy<Value = Vec<UserPredicate>> {
    prop::collection::vec(user_predicate_strategy(), 1..8)
}

/// Column values for one row; `None` is SQL NULL
pub type Row = HashMap<String, Option<i64>>;

pub fn row_strategy() -> impl Strategy<Value = Row> {
    (
        prop::option::of(0i64..3),
        prop::option::of(0i64..3),
        prop::option::of(0i64..3),
        1i64..3,
    )
        .prop_map(|(a, b, c, tenant)| {
            let mut row = Row::new();
            row.insert("a".to_string(), a);
            row.insert("b".to_string(), b);
            row.insert("c".to_string(), c);
            row.insert("invoices.tenant_id".to_string(), Some(tenant));
            row
        })
}

/// Evaluate a predicate group against a row with SQL precedence, AND before OR
///
/// Only the positive conditions the strategies generate are supported, so a
/// comparison with NULL can be treated as false.
pub fn evaluate(group: &PredicateGroup, row: &Row) -> bool {
    let mut disjuncts = Vec::new();
    let mut current: Option<bool> = None;
    for member in group.members() {
        if member.predicate.is_empty() {
            continue;
        }
        let value = evaluate_predicate(&member.predicate, row);
        current = Some(match (current, member.connector) {
            (None, _) => value,
            (Some(acc), Connector::And) => acc && value,
            (Some(acc), Connector::Or) => {
                disjuncts.push(acc);
                value
            }
        });
    }
    disjuncts.extend(current);
    disjuncts.is_empty() || disjuncts.into_iter().any(|value| value)
}

fn evaluate_predicate(predicate: &Predicate, row: &Row) -> bool {
    match predicate {
        Predicate::Group(group) => evaluate(group, row),
        Predicate::Leaf(condition) => evaluate_condition(condition, row),
    }
}

fn evaluate_condition(condition: &Condition, row: &Row) -> bool {
    let cell = |column: &str| row.get(column).copied().flatten();
    match condition {
        Condition::Basic {
            column,
            operator,
            value,
        } if operator == "=" => cell(column).is_some_and(|cell| value.as_i64() == Some(cell)),
        Condition::IsNull { column } => cell(column).is_none(),
        Condition::In { column, values } => cell(column)
            .is_some_and(|cell| values.iter().any(|value| value.as_i64() == Some(cell))),
        Condition::Raw { sql, bindings } => evaluate_sql(sql, bindings, row),
        other => panic!("evaluator does not support {other:?}"),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Comma,
    Param,
    Word(String),
}

fn tokenize(sql: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' => {
                chars.next();
            }
            '(' | ')' | ',' | '?' => {
                chars.next();
                tokens.push(match ch {
                    '(' => Token::Open,
                    ')' => Token::Close,
                    ',' => Token::Comma,
                    _ => Token::Param,
                });
            }
            _ => {
                let mut word = String::new();
                while let Some(next) = chars.next_if(|c| !matches!(*c, ' ' | '(' | ')' | ',' | '?')) {
                    word.push(next);
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    tokens
}

/// Evaluate compiled `?`-style SQL predicate text against a row
///
/// Parses the text as written, so precedence comes from the emitted
/// parentheses and connectors rather than from the predicate tree. Values
/// are taken from `bindings` in placeholder order.
pub fn evaluate_sql(sql: &str, bindings: &[Value], row: &Row) -> bool {
    let mut tokens = tokenize(sql).into_iter().peekable();
    let mut values = bindings.iter();
    let result = disjunction(&mut tokens, &mut values, row);
    assert!(tokens.next().is_none(), "trailing tokens in {sql}");
    assert!(values.next().is_none(), "unused bindings for {sql}");
    result
}

type Tokens = Peekable<std::vec::IntoIter<Token>>;

fn disjunction<'a>(
    tokens: &mut Tokens,
    values: &mut impl Iterator<Item = &'a Value>,
    row: &Row,
) -> bool {
    let mut result = conjunction(tokens, values, row);
    while tokens.next_if_eq(&Token::Word("OR".to_string())).is_some() {
        let next = conjunction(tokens, values, row);
        result = result || next;
    }
    result
}

fn conjunction<'a>(
    tokens: &mut Tokens,
    values: &mut impl Iterator<Item = &'a Value>,
    row: &Row,
) -> bool {
    let mut result = factor(tokens, values, row);
    while tokens.next_if_eq(&Token::Word("AND".to_string())).is_some() {
        let next = factor(tokens, values, row);
        result = result && next;
    }
    result
}

fn factor<'a>(
    tokens: &mut Tokens,
    values: &mut impl Iterator<Item = &'a Value>,
    row: &Row,
) -> bool {
    if tokens.next_if_eq(&Token::Open).is_some() {
        let result = disjunction(tokens, values, row);
        assert_eq!(tokens.next(), Some(Token::Close));
        return result;
    }

    let Some(Token::Word(column)) = tokens.next() else {
        panic!("expected a column");
    };
    let cell = row.get(&column).copied().flatten();
    let mut next_value = || {
        values
            .next()
            .and_then(Value::as_i64)
            .expect("a bound integer for every placeholder")
    };
    match tokens.next() {
        Some(Token::Word(operator)) if operator == "=" => {
            assert_eq!(tokens.next(), Some(Token::Param));
            let value = next_value();
            cell == Some(value)
        }
        Some(Token::Word(keyword)) if keyword == "IS" => {
            assert_eq!(tokens.next(), Some(Token::Word("NULL".to_string())));
            cell.is_none()
        }
        Some(Token::Word(keyword)) if keyword == "IN" => {
            assert_eq!(tokens.next(), Some(Token::Open));
            let mut matched = false;
            loop {
                assert_eq!(tokens.next(), Some(Token::Param));
                let value = next_value();
                matched |= cell == Some(value);
                match tokens.next() {
                    Some(Token::Comma) => continue,
                    Some(Token::Close) => break,
                    other => panic!("unexpected {other:?} in IN list"),
                }
            }
            matched
        }
        other => panic!("unexpected {other:?} after {column}"),
    }
}
