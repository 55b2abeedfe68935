//! Consumer-facing frames
//!
//! A frame is a named, single record batch: the shape live consumers and
//! query callers receive. Converting a [`RowBatch`] into a frame is pure and
//! stateless.

use crate::client::RowBatch;
use crate::error::Result;
use arrow::compute::concat_batches;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use arrow_array::RecordBatch;
use arrow_json::ArrayWriter;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

/// A named batch of rows ready to forward to a consumer
#[derive(Debug, Clone)]
pub struct Frame {
    name: String,
    batch: RecordBatch,
}

impl Frame {
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Self {
        Self {
            name: name.into(),
            batch,
        }
    }

    /// Flatten all record batches of `rows` into one frame
    pub fn from_row_batch(name: impl Into<String>, rows: &RowBatch) -> Result<Self> {
        let batch = concat_batches(rows.schema(), rows.batches())?;
        Ok(Self::new(name, batch))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Render as `{"name", "fields": [{"name", "type"}], "rows": [...]}`
    pub fn to_json(&self) -> Result<Value> {
        let schema = self.batch.schema();
        let fields: Vec<Value> = schema
            .fields()
            .iter()
            .map(|f| json!({ "name": f.name(), "type": f.data_type().to_string() }))
            .collect();

        let rows = if self.batch.num_rows() == 0 {
            Value::Array(vec![])
        } else {
            let mut writer = ArrayWriter::new(Vec::new());
            writer.write(&self.batch)?;
            writer.finish()?;
            serde_json::from_slice(&writer.into_inner())?
        };

        Ok(json!({
            "name": self.name,
            "fields": fields,
            "rows": rows,
        }))
    }

    /// Format as a text table for display
    pub fn to_table(&self) -> Result<String> {
        use std::fmt::Write;

        let schema = self.batch.schema();
        let options = FormatOptions::default().with_null("NULL");
        let formatters = self
            .batch
            .columns()
            .iter()
            .map(|col| ArrayFormatter::try_new(col.as_ref(), &options))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut cells: Vec<Vec<String>> = Vec::with_capacity(self.batch.num_rows());
        for row_idx in 0..self.batch.num_rows() {
            let row = formatters
                .iter()
                .map(|f| f.value(row_idx).try_to_string())
                .collect::<std::result::Result<Vec<_>, _>>()?;
            cells.push(row);
        }

        // Widths count characters, matching how `{:width$}` pads.
        let mut widths: Vec<usize> = schema.fields().iter().map(|f| f.name().chars().count()).collect();
        for row in &cells {
            for (col_idx, value) in row.iter().enumerate() {
                widths[col_idx] = widths[col_idx].max(value.chars().count());
            }
        }

        let mut output = String::new();

        let header: Vec<String> = schema
            .fields()
            .iter()
            .zip(&widths)
            .map(|(f, w)| format!("{:width$}", f.name(), width = *w))
            .collect();
        let _ = writeln!(output, "| {} |", header.join(" | "));

        let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        let _ = writeln!(output, "|-{}-|", sep.join("-|-"));

        for row in &cells {
            let row: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(value, w)| format!("{:width$}", value, width = *w))
                .collect();
            let _ = writeln!(output, "| {} |", row.join(" | "));
        }

        let _ = writeln!(output, "\n({} rows)", self.batch.num_rows());
        Ok(output)
    }
}

impl Serialize for Frame {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(<S::Error as serde::ser::Error>::custom)?
            .serialize(serializer)
    }
}
