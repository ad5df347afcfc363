use serde_json::Value;

use crate::error::CodecError;

pub const NANOS_PER_MILLI: i64 = 1_000_000;

/// A table of samples keyed by nanosecond timestamps.
///
/// Rows keep insertion order. Every row carries exactly one value per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    index: Vec<i64>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    /// Create an empty frame with the given columns
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            index: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Append a row stamped with `timestamp_ns`.
    pub fn push_row(&mut self, timestamp_ns: i64, values: Vec<Value>) -> Result<(), CodecError> {
        if values.len() != self.columns.len() {
            return Err(CodecError::RowLength {
                expected: self.columns.len(),
                found: values.len(),
            });
        }
        self.index.push(timestamp_ns);
        self.rows.push(values);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row timestamps in nanoseconds
    pub fn index(&self) -> &[i64] {
        &self.index
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate `(timestamp_ns, row)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &[Value])> {
        self.index
            .iter()
            .copied()
            .zip(self.rows.iter().map(Vec::as_slice))
    }

    /// Look up a single cell by row position and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_row_rejects_wrong_width() {
        let mut frame = Frame::new(vec!["a".into(), "b".into()]);
        let err = frame.push_row(0, vec![json!(1)]).unwrap_err();
        assert_eq!(
            err,
            CodecError::RowLength {
                expected: 2,
                found: 1
            }
        );
        assert!(frame.is_empty());
    }

    #[test]
    fn test_value_lookup() {
        let mut frame = Frame::new(vec!["a".into(), "b".into()]);
        frame.push_row(10, vec![json!(1), json!("x")]).unwrap();
        assert_eq!(frame.value(0, "b"), Some(&json!("x")));
        assert_eq!(frame.value(0, "c"), None);
        assert_eq!(frame.value(1, "a"), None);
        assert_eq!(frame.len(), 1);
    }
}
