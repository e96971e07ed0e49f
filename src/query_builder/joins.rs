/// Represents different types of SQL JOINs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinType {
    pub fn to_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }
}

/// Column comparison used in a JOIN's ON clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinConstraint {
    pub first: String,
    pub operator: String,
    pub second: String,
}

/// Represents a SQL JOIN clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: String,
    pub on: Option<JoinConstraint>,
}

impl Join {
    /// Create a join of the given type comparing two columns
    pub fn on(join_type: JoinType, table: &str, first: &str, operator: &str, second: &str) -> Self {
        Self {
            join_type,
            table: table.to_string(),
            on: Some(JoinConstraint {
                first: first.to_string(),
                operator: operator.to_string(),
                second: second.to_string(),
            }),
        }
    }

    /// Create an INNER JOIN
    pub fn inner(table: &str, first: &str, operator: &str, second: &str) -> Self {
        Self::on(JoinType::Inner, table, first, operator, second)
    }

    /// Create a LEFT JOIN
    pub fn left(table: &str, first: &str, operator: &str, second: &str) -> Self {
        Self::on(JoinType::Left, table, first, operator, second)
    }

    /// Create a RIGHT JOIN
    pub fn right(table: &str, first: &str, operator: &str, second: &str) -> Self {
        Self::on(JoinType::Right, table, first, operator, second)
    }

    /// Create a CROSS JOIN
    pub fn cross(table: &str) -> Self {
        Self {
            join_type: JoinType::Cross,
            table: table.to_string(),
            on: None,
        }
    }

    /// Convert to SQL string
    pub fn to_sql(&self) -> String {
        match &self.on {
            Some(on) => format!(
                "{} {} ON {} {} {}",
                self.join_type.to_sql(),
                self.table,
                on.first,
                on.operator,
                on.second
            ),
            None => format!("{} {}", self.join_type.to_sql(), self.table),
        }
    }
}
