//! Explorer query language
//!
//! Two input forms are recognized:
//!
//! - a tolerant SQL-like form, `… FROM Logs|Traces|Metrics [WHERE k = "v" [AND|OR k > 10]…] [ORDER …] [LIMIT n]`
//! - a native provider selector (`{app="api"} |= "error"`), passed through as a logs query
//!
//! Conditions are extracted by pattern matching, not by a grammar: text after
//! `WHERE` that does not look like a condition is ignored rather than rejected.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static FROM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bFROM\s+(logs?|traces?|metrics?)\b").unwrap()
});

static WHERE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\bWHERE\s+(.*?)(?:\s+ORDER\s+BY\b.*|\s+LIMIT\b.*)?$").unwrap()
});

static LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+(\d+)\b").unwrap());

static CONDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<key>[A-Za-z_][A-Za-z0-9_.]*)\s*(?P<op>>=|<=|=|>|<)\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<num>-?\d+)\b)"#,
    )
    .unwrap()
});

static OR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bOR\b").unwrap());

/// Kind of result a query produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Logs,
    Traces,
    Metrics,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logs => "logs",
            Self::Traces => "traces",
            Self::Metrics => "metrics",
        }
    }

    /// Singular and plural `FROM` targets alias to the same source
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "log" | "logs" => Some(Self::Logs),
            "trace" | "traces" => Some(Self::Traces),
            "metric" | "metrics" => Some(Self::Metrics),
            _ => None,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator of a numeric condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    fn parse(op: &str) -> Option<Self> {
        match op {
            "=" => Some(Self::Eq),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            _ => None,
        }
    }
}

/// Value side of a parsed condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Number { op: Comparison, value: i64 },
}

impl FilterValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number { .. } => None,
        }
    }
}

/// Abstract query plan produced by [`parse`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub data_source: DataSource,
    /// Lower-cased condition keys; a repeated key keeps its last value
    pub filters: BTreeMap<String, FilterValue>,
    /// Caller's native selector, or one synthesized from the conditions
    pub raw_query: String,
    /// `LIMIT n` when given
    pub limit: Option<usize>,
    /// `OR` appeared between conditions and was read as `AND`
    pub coerced_disjunction: bool,
}

impl ParsedQuery {
    pub fn filter_str(&self, key: &str) -> Option<&str> {
        self.filters.get(key).and_then(FilterValue::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("query is empty")]
    Empty,
    #[error("unknown data source: expected FROM Logs|Traces|Metrics or a native selector")]
    UnknownSource,
}

/// Parse explorer query text into a plan. Pure: same input, same output.
pub fn parse(input: &str) -> Result<ParsedQuery, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some(data_source) = FROM_RE
        .captures(trimmed)
        .and_then(|caps| DataSource::from_keyword(&caps[1]))
    {
        return Ok(parse_sql_like(trimmed, data_source));
    }

    if trimmed.starts_with('{') || trimmed.contains("=\"") {
        return Ok(ParsedQuery {
            data_source: DataSource::Logs,
            filters: BTreeMap::new(),
            raw_query: input.to_string(),
            limit: None,
            coerced_disjunction: false,
        });
    }

    Err(ParseError::UnknownSource)
}

fn parse_sql_like(input: &str, data_source: DataSource) -> ParsedQuery {
    let mut filters = BTreeMap::new();
    let mut terms = Vec::new();
    let mut coerced_disjunction = false;

    if let Some(clause) = WHERE_RE.captures(input).and_then(|caps| caps.get(1)) {
        let clause = clause.as_str();
        let mut last_end = 0;

        for caps in CONDITION_RE.captures_iter(clause) {
            let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
            if OR_RE.is_match(&clause[last_end..whole.0]) {
                coerced_disjunction = true;
            }
            last_end = whole.1;

            let key = caps["key"].to_ascii_lowercase();
            let Some(op) = Comparison::parse(&caps["op"]) else {
                continue;
            };

            let text = caps.name("dq").or_else(|| caps.name("sq"));
            if let Some(text) = text {
                // Strings only compare for equality
                if op != Comparison::Eq {
                    continue;
                }
                let value = text.as_str().to_string();
                terms.push(format!("{}={}", key, quote_selector_value(&value)));
                filters.insert(key, FilterValue::Text(value));
            } else if let Some(num) = caps.name("num") {
                let Ok(value) = num.as_str().parse::<i64>() else {
                    continue;
                };
                terms.push(format!("{}{}{}", key, op.as_str(), value));
                filters.insert(key, FilterValue::Number { op, value });
            }
        }
    }

    let raw_query = if terms.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", terms.join(","))
    };

    let limit = LIMIT_RE
        .captures(input)
        .and_then(|caps| caps[1].parse::<usize>().ok());

    ParsedQuery {
        data_source,
        filters,
        raw_query,
        limit,
        coerced_disjunction,
    }
}

/// Double-quote a selector value, escaping backslashes and quotes
pub fn quote_selector_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
