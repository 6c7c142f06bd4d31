//! Dataset file naming: one file per symbol, year, exchange and record kind,
//! `<root>/<SYMBOL>_<YEAR>_<EXCHANGE>.<trades|quotes>`.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::date::Date;
use crate::record::RecordKind;
use crate::store::TasStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    EmptyComponent { field: &'static str },
    InvalidComponent { field: &'static str, value: String },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::EmptyComponent { field } => {
                write!(f, "empty path component: {field}")
            }
            LayoutError::InvalidComponent { field, value } => {
                write!(f, "invalid path component for {field}: {value}")
            }
        }
    }
}

impl std::error::Error for LayoutError {}

type Result<T> = std::result::Result<T, LayoutError>;

#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, symbol: &str, year: u16, exchange: &str, kind: RecordKind) -> Result<PathBuf> {
        validate_component("symbol", symbol)?;
        validate_component("exchange", exchange)?;
        Ok(self
            .root
            .join(format!("{symbol}_{year:04}_{exchange}.{}", kind.extension())))
    }

    pub fn trades_path(&self, symbol: &str, year: u16, exchange: &str) -> Result<PathBuf> {
        self.path(symbol, year, exchange, RecordKind::Trades)
    }

    pub fn quotes_path(&self, symbol: &str, year: u16, exchange: &str) -> Result<PathBuf> {
        self.path(symbol, year, exchange, RecordKind::Quotes)
    }
}

/// Dates present in every store, ascending. Used to join trades and quotes files
/// (or several symbols) day by day.
pub fn common_dates(stores: &[&TasStore]) -> Vec<Date> {
    let Some((first, rest)) = stores.split_first() else {
        return Vec::new();
    };
    let mut dates: BTreeSet<Date> = first.dates().collect();
    for store in rest {
        dates.retain(|date| store.contains(*date));
    }
    dates.into_iter().collect()
}

fn validate_component(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(LayoutError::EmptyComponent { field });
    }
    if value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\')
        || value.contains('_')
        || value.contains('\0')
    {
        return Err(LayoutError::InvalidComponent {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
