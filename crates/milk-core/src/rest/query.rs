//! PostgREST query builder

/// Sort direction for an `order` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A single row filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
    /// `column = value`
    Eq { column: String, value: String },
    /// Case-insensitive substring containment on one column
    Contains { column: String, term: String },
    /// Case-insensitive substring containment on any of several columns
    AnyContains { columns: Vec<String>, term: String },
}

/// Filters, ordering and paging for one request against a table or view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Query {
    select: Option<String>,
    filters: Vec<Filter>,
    order: Vec<(String, Direction)>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = Some(columns.into());
        self
    }

    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Eq {
            column: column.into(),
            value: value.to_string(),
        });
        self
    }

    #[must_use]
    pub fn is_true(self, column: impl Into<String>) -> Self {
        self.eq(column, true)
    }

    /// Case-insensitive substring match (`ilike.*term*`).
    #[must_use]
    pub fn contains(mut self, column: impl Into<String>, term: &str) -> Self {
        self.filters.push(Filter::Contains {
            column: column.into(),
            term: sanitize_term(term),
        });
        self
    }

    /// Substring match against any of `columns` (`or=(a.ilike.*t*,b.ilike.*t*)`).
    #[must_use]
    pub fn any_contains(mut self, columns: &[&str], term: &str) -> Self {
        self.filters.push(Filter::AnyContains {
            columns: columns.iter().map(|column| (*column).to_string()).collect(),
            term: sanitize_or_term(term),
        });
        self
    }

    #[must_use]
    pub fn order(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn ordering(&self) -> &[(String, Direction)] {
        &self.order
    }

    pub const fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub const fn offset_value(&self) -> Option<usize> {
        self.offset
    }

    /// Render as PostgREST query-string pairs.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![(
            "select".to_string(),
            self.select.clone().unwrap_or_else(|| "*".to_string()),
        )];

        for filter in &self.filters {
            match filter {
                Filter::Eq { column, value } => {
                    pairs.push((column.clone(), format!("eq.{value}")));
                }
                Filter::Contains { column, term } => {
                    pairs.push((column.clone(), format!("ilike.*{term}*")));
                }
                Filter::AnyContains { columns, term } => {
                    let clauses = columns
                        .iter()
                        .map(|column| format!("{column}.ilike.*{term}*"))
                        .collect::<Vec<_>>()
                        .join(",");
                    pairs.push(("or".to_string(), format!("({clauses})")));
                }
            }
        }

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(column, direction)| format!("{column}.{}", direction.as_str()))
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("order".to_string(), order));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        pairs
    }

    /// Stable key identifying this request against `table`.
    pub fn cache_key(&self, table: &str) -> String {
        let rendered = self
            .to_pairs()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{table}?{rendered}")
    }
}

/// Strip wildcard and quoting characters from a substring term.
pub(crate) fn sanitize_term(term: &str) -> String {
    term.chars()
        .filter(|c| !matches!(c, '*' | '%' | '"' | '\\'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Inside an `or=(...)` group commas and parentheses are separators as well.
fn sanitize_or_term(term: &str) -> String {
    sanitize_term(term)
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')'))
        .collect()
}
