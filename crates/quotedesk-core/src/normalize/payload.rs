use serde::{Deserialize, Serialize};

/// One cell of provider output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Number(f64),
    Text(String),
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Option<f64>> for RawValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Column header, possibly spanning several levels (`["Close", "INFY.NS"]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnHeader {
    levels: Vec<String>,
}

impl ColumnHeader {
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            levels: vec![name.into()],
        }
    }

    pub fn multi<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            levels: levels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Lower-cased, trimmed levels joined by `_`, whitespace runs collapsed to `_`.
    ///
    /// `["Adj Close", "INFY.NS"]` becomes `adj_close_infy.ns`.
    pub fn flattened(&self) -> String {
        self.levels
            .iter()
            .map(|level| level.trim())
            .filter(|level| !level.is_empty())
            .map(|level| {
                level
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join("_")
                    .to_lowercase()
            })
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Tabular output of one provider fetch for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPayload {
    pub headers: Vec<ColumnHeader>,
    pub rows: Vec<Vec<RawValue>>,
}

impl RawPayload {
    pub fn new(headers: Vec<ColumnHeader>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Payload with single-level headers.
    pub fn with_columns(names: &[&str]) -> Self {
        Self::new(names.iter().copied().map(ColumnHeader::single).collect())
    }

    pub fn push_row(&mut self, row: Vec<RawValue>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn flattened_headers(&self) -> Vec<String> {
        self.headers.iter().map(ColumnHeader::flattened).collect()
    }
}
