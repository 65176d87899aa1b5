use super::NormalizeError;

/// Positions of the canonical fields within a payload's columns.
///
/// `open`, `high` and `low` point at the close column when the payload has no
/// column of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub close: usize,
    pub adj_close: Option<usize>,
    pub volume: Option<usize>,
}

fn first_containing(headers: &[String], keyword: &str) -> Option<usize> {
    headers.iter().position(|name| name.contains(keyword))
}

/// Resolves canonical fields against flattened header names.
///
/// Every field takes the first header containing its keyword. The date axis
/// prefers a header named exactly `date`.
pub fn resolve_columns(headers: &[String]) -> Result<ColumnMap, NormalizeError> {
    let close = first_containing(headers, "close").ok_or(NormalizeError::MissingCloseColumn)?;
    let date = headers
        .iter()
        .position(|name| name == "date")
        .or_else(|| first_containing(headers, "date"))
        .ok_or(NormalizeError::MissingDateColumn)?;

    Ok(ColumnMap {
        date,
        open: first_containing(headers, "open").unwrap_or(close),
        high: first_containing(headers, "high").unwrap_or(close),
        low: first_containing(headers, "low").unwrap_or(close),
        close,
        adj_close: first_containing(headers, "adj_close")
            .or_else(|| first_containing(headers, "adjclose")),
        volume: first_containing(headers, "volume"),
    })
}
