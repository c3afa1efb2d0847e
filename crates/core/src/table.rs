//! Raw record batches as handed over by file decoders.
//!
//! A [`RawBatch`] wraps a polars [`DataFrame`] whose column types are whatever the
//! decoder produced; [`Schema`] states what the pipeline expects. On the JSON
//! hand-off a batch is an array of row records, e.g.
//! `[{"xltime": 40344.5, "bid-price": "10.0", ...}]`.

use std::io::Cursor;

use polars::prelude::{
    concat, DataFrame, DataType, IntoLazy, JsonFormat, JsonReader, LazyFrame, SerReader,
    UnionArgs,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Column names of the vendor quote and trade files.
pub mod columns {
    pub const TIME: &str = "xltime";
    pub const BID_PRICE: &str = "bid-price";
    pub const BID_VOLUME: &str = "bid-volume";
    pub const ASK_PRICE: &str = "ask-price";
    pub const ASK_VOLUME: &str = "ask-volume";
    pub const TRADE_PRICE: &str = "trade-price";
    pub const TRADE_VOLUME: &str = "trade-volume";
    pub const TRADE_STRING_FLAG: &str = "trade-stringflag";
    pub const TRADE_RAW_FLAG: &str = "trade-rawflag";
}

/// Semantic type a column is expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Float,
    Integer,
    Text,
}

impl ColumnType {
    /// Physical polars type this semantic type maps to.
    pub fn physical(self) -> DataType {
        match self {
            ColumnType::Float => DataType::Float64,
            ColumnType::Integer => DataType::Int32,
            ColumnType::Text => DataType::String,
        }
    }
}

/// One decoded batch of a vendor file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Vec<Value>")]
pub struct RawBatch(DataFrame);

impl Default for RawBatch {
    fn default() -> Self {
        Self(DataFrame::empty())
    }
}

impl RawBatch {
    pub fn new(frame: DataFrame) -> Self {
        Self(frame)
    }

    /// A batch without columns or rows.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.0
    }

    pub fn into_frame(self) -> DataFrame {
        self.0
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.0.height()
    }

    pub fn is_empty(&self) -> bool {
        self.0.height() == 0
    }

    pub fn num_columns(&self) -> usize {
        self.0.width()
    }

    /// Physical type of a column, `None` if the batch has no such column.
    pub fn dtype(&self, name: &str) -> Option<&DataType> {
        self.0.column(name).ok().map(|c| c.dtype())
    }

    pub fn column_names(&self) -> Vec<String> {
        self.0
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect()
    }

    /// Vertically concatenate batches that share column names and types.
    pub fn vstack(batches: impl IntoIterator<Item = RawBatch>) -> Result<RawBatch> {
        let frames: Vec<LazyFrame> = batches.into_iter().map(|b| b.0.lazy()).collect();
        if frames.is_empty() {
            return Ok(RawBatch::empty());
        }
        let stacked = concat(
            frames,
            UnionArgs {
                rechunk: true,
                ..Default::default()
            },
        )?
        .collect()?;
        Ok(RawBatch(stacked))
    }

    /// Read a batch from row records.
    pub fn from_records(records: Vec<Value>) -> Result<Self> {
        if records.is_empty() {
            return Ok(RawBatch::empty());
        }
        if let Some(bad) = records.iter().find(|r| !r.is_object()) {
            return Err(Error::data(format!("batch record is not an object: {bad}")));
        }
        let bytes = serde_json::to_vec(&Value::Array(records))?;
        let frame = JsonReader::new(Cursor::new(bytes))
            .with_json_format(JsonFormat::Json)
            .finish()?;
        Ok(RawBatch(frame))
    }
}

impl From<DataFrame> for RawBatch {
    fn from(frame: DataFrame) -> Self {
        Self(frame)
    }
}

impl TryFrom<Vec<Value>> for RawBatch {
    type Error = Error;

    fn try_from(records: Vec<Value>) -> Result<Self> {
        Self::from_records(records)
    }
}

/// Ordered mapping of column name to expected semantic type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<(String, ColumnType)>,
}

impl Schema {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = (S, ColumnType)>) -> Self {
        Self {
            columns: columns.into_iter().map(|(n, t)| (n.into(), t)).collect(),
        }
    }

    /// Best bid/offer quote files.
    pub fn quote() -> Self {
        Self::new([
            (columns::TIME, ColumnType::Float),
            (columns::BID_PRICE, ColumnType::Float),
            (columns::BID_VOLUME, ColumnType::Integer),
            (columns::ASK_PRICE, ColumnType::Float),
            (columns::ASK_VOLUME, ColumnType::Integer),
        ])
    }

    /// Trade print files.
    pub fn trade() -> Self {
        Self::new([
            (columns::TIME, ColumnType::Float),
            (columns::TRADE_PRICE, ColumnType::Float),
            (columns::TRADE_VOLUME, ColumnType::Integer),
            (columns::TRADE_STRING_FLAG, ColumnType::Text),
            (columns::TRADE_RAW_FLAG, ColumnType::Text),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(n, t)| (n.as_str(), *t))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
