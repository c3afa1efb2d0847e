//! Schema validation and best-effort repair of raw batches.
//!
//! Vendor files are not consistent about column types: volumes show up as strings,
//! prices as `"()"` placeholders, and so on. A numeric column of the wrong type is
//! cast to text, null markers become null, every character that cannot be part of
//! the number is stripped, and the rest is cast non-strictly so anything that still
//! does not parse becomes null.

use polars::prelude::{col, lit, when, DataType, Expr, IntoLazy, NamedFrom, Series, NULL};
use quotegrid_core::{ColumnType, Error, RawBatch, Result, Schema};
use tracing::debug;

/// Cell contents treated as missing once surrounding whitespace is trimmed.
const NULL_MARKERS: [&str; 2] = ["", "()"];

const NON_DECIMAL: &str = r"[^\d.]";
const NON_DIGIT: &str = r"[^\d]";

/// Coerces raw batches into an expected schema.
#[derive(Debug, Clone)]
pub struct SchemaCoercer {
    schema: Schema,
}

impl SchemaCoercer {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Return a batch holding exactly the schema's columns, in schema order, with
    /// their declared types.
    pub fn coerce(&self, batch: &RawBatch) -> Result<RawBatch> {
        let mut exprs = Vec::with_capacity(self.schema.len());
        let mut repaired = Vec::new();
        for (name, expected) in self.schema.iter() {
            let dtype = batch.dtype(name).ok_or_else(|| Error::missing_column(name))?;
            if matches_type(dtype, expected) {
                exprs.push(col(name));
            } else {
                debug!(column = name, from = ?dtype, to = ?expected, "repairing column type");
                exprs.push(repair(name, expected));
                repaired.push(name);
            }
        }

        let frame = batch
            .frame()
            .clone()
            .lazy()
            .select(exprs)
            .collect()
            .map_err(|e| Error::coercion(repaired.join(", "), e.to_string()))?;
        Ok(RawBatch::new(frame))
    }
}

fn repair(name: &str, expected: ColumnType) -> Expr {
    match expected {
        ColumnType::Float => repair_numeric(name, NON_DECIMAL, DataType::Float64),
        ColumnType::Integer => repair_numeric(name, NON_DIGIT, DataType::Int32),
        // Bytes that are not valid UTF-8 fail the batch
        ColumnType::Text => col(name).strict_cast(DataType::String),
    }
}

/// Text form of the column, null markers nulled, `strip` removed, cast to `target`.
fn repair_numeric(name: &str, strip: &str, target: DataType) -> Expr {
    let text = col(name).cast(DataType::String);
    let marker = text
        .clone()
        .str()
        .strip_chars(lit(NULL))
        .is_in(null_markers(), false);
    when(marker)
        .then(lit(NULL))
        .otherwise(text)
        .str()
        .replace_all(lit(strip), lit(""), false)
        .cast(target)
        .alias(name)
}

fn null_markers() -> Expr {
    lit(Series::new("null_markers".into(), NULL_MARKERS)).implode()
}

/// Whether a column already has the physical type a semantic type maps to.
pub fn matches_type(dtype: &DataType, expected: ColumnType) -> bool {
    *dtype == expected.physical()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{Column, DataFrame};
    use quotegrid_core::columns;

    fn quote_batch(bid_volume: Column) -> RawBatch {
        let n = bid_volume.len();
        let frame = DataFrame::new(vec![
            Column::new(columns::TIME.into(), vec![Some(40344.5); n]),
            Column::new(columns::BID_PRICE.into(), vec![Some(10.0); n]),
            bid_volume.with_name(columns::BID_VOLUME.into()),
            Column::new(columns::ASK_PRICE.into(), vec![Some(10.2); n]),
            Column::new(columns::ASK_VOLUME.into(), vec![Some(100i32); n]),
        ])
        .unwrap();
        RawBatch::new(frame)
    }

    fn column(name: &str, values: Column) -> RawBatch {
        RawBatch::new(DataFrame::new(vec![values.with_name(name.into())]).unwrap())
    }

    fn ints(batch: &RawBatch, name: &str) -> Vec<Option<i32>> {
        batch.frame().column(name).unwrap().i32().unwrap().into_iter().collect()
    }

    fn floats(batch: &RawBatch, name: &str) -> Vec<Option<f64>> {
        batch.frame().column(name).unwrap().f64().unwrap().into_iter().collect()
    }

    #[test]
    fn test_matching_batch_passes_through() {
        let batch = quote_batch(Column::new("".into(), [Some(100i32), None]));
        let out = SchemaCoercer::new(Schema::quote()).coerce(&batch).unwrap();
        assert_eq!(out, batch);
    }

    #[test]
    fn test_missing_column() {
        let batch = column(columns::TIME, Column::new("".into(), [1.0]));
        let err = SchemaCoercer::new(Schema::quote()).coerce(&batch).unwrap_err();
        match err {
            Error::MissingColumn(name) => assert_eq!(name, columns::BID_PRICE),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_string_volumes_are_repaired() {
        let batch = quote_batch(Column::new(
            "".into(),
            [Some("1,200"), Some(" () "), Some(""), None, Some("abc"), Some(" 300 ")],
        ));
        let out = SchemaCoercer::new(Schema::quote()).coerce(&batch).unwrap();
        assert_eq!(
            ints(&out, columns::BID_VOLUME),
            vec![Some(1200), None, None, None, None, Some(300)]
        );
    }

    #[test]
    fn test_string_prices_keep_decimal_point() {
        let schema = Schema::new([("p", ColumnType::Float)]);
        let batch = column("p", Column::new("".into(), [Some("$10.25"), Some("1.2.3"), Some("()")]));
        let out = SchemaCoercer::new(schema).coerce(&batch).unwrap();
        assert_eq!(floats(&out, "p"), vec![Some(10.25), None, None]);
    }

    #[test]
    fn test_int64_volume_narrowed() {
        let batch = quote_batch(Column::new("".into(), [Some(500i64), Some(i64::MAX)]));
        let out = SchemaCoercer::new(Schema::quote()).coerce(&batch).unwrap();
        // Values that overflow the target type become null
        assert_eq!(ints(&out, columns::BID_VOLUME), vec![Some(500), None]);
    }

    #[test]
    fn test_all_null_column_repaired() {
        let schema = Schema::new([("p", ColumnType::Float)]);
        let batch = column("p", Column::new("".into(), [None::<&str>, None]));
        let out = SchemaCoercer::new(schema).coerce(&batch).unwrap();
        assert_eq!(floats(&out, "p"), vec![None, None]);
    }

    #[test]
    fn test_output_has_exactly_schema_columns() {
        let mut frame = quote_batch(Column::new("".into(), [Some(1i32)])).into_frame();
        frame.with_column(Column::new("extra".into(), [Some(true)])).unwrap();
        // Schema order wins over batch order
        let batch = RawBatch::new(
            frame
                .select(["ask-volume", "extra", "xltime", "bid-price", "bid-volume", "ask-price"])
                .unwrap(),
        );

        let out = SchemaCoercer::new(Schema::quote()).coerce(&batch).unwrap();
        assert_eq!(
            out.column_names(),
            vec!["xltime", "bid-price", "bid-volume", "ask-price", "ask-volume"]
        );
        for (name, expected) in Schema::quote().iter() {
            assert!(matches_type(out.dtype(name).unwrap(), expected));
        }
    }

    #[test]
    fn test_text_cast() {
        let schema = Schema::new([("flag", ColumnType::Text)]);
        let batch = column("flag", Column::new("".into(), [Some(7i64), None]));
        let out = SchemaCoercer::new(schema).coerce(&batch).unwrap();
        let flags: Vec<_> = out
            .frame()
            .column("flag")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();
        assert_eq!(flags, vec![Some("7".to_string()), None]);
    }

    #[test]
    fn test_invalid_utf8_is_fatal() {
        let schema = Schema::new([(columns::TRADE_STRING_FLAG, ColumnType::Text)]);
        let bytes: &[u8] = &[0xff, 0xfe];
        let batch = column(columns::TRADE_STRING_FLAG, Column::new("".into(), [Some(bytes)]));
        let err = SchemaCoercer::new(schema).coerce(&batch).unwrap_err();
        assert!(matches!(err, Error::Coercion { .. }));
        assert!(err.is_batch_local());
    }
}
