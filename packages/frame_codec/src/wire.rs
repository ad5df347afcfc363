use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::trace;

use crate::error::CodecError;
use crate::frame::{Frame, NANOS_PER_MILLI};

/// Wire form of a frame: millisecond timestamp string -> `{column: value}`.
pub type WireData = Map<String, Value>;

/// Encode a frame for the wire.
///
/// Timestamps are truncated to milliseconds (integer division toward zero).
/// When several rows collapse into the same millisecond only the last one in
/// frame order is kept. Records are emitted in ascending millisecond order.
pub fn encode(frame: &Frame) -> WireData {
    let mut latest: BTreeMap<i64, usize> = BTreeMap::new();
    for (position, timestamp_ns) in frame.index().iter().enumerate() {
        latest.insert(timestamp_ns / NANOS_PER_MILLI, position);
    }

    if latest.len() < frame.len() {
        trace!(
            rows = frame.len(),
            kept = latest.len(),
            "collapsed rows sharing a millisecond"
        );
    }

    latest
        .into_iter()
        .map(|(millis, position)| {
            let record: Map<String, Value> = frame
                .columns()
                .iter()
                .cloned()
                .zip(frame.rows()[position].iter().cloned())
                .collect();
            (millis.to_string(), Value::Object(record))
        })
        .collect()
}

/// Parse a wire timestamp (milliseconds since the epoch).
///
/// Integer strings are taken as-is; finite decimal strings are truncated
/// toward zero.
pub fn parse_timestamp(raw: &str) -> Result<i64, CodecError> {
    let trimmed = raw.trim();
    if let Ok(millis) = trimmed.parse::<i64>() {
        return Ok(millis);
    }
    match trimmed.parse::<f64>() {
        Ok(millis) if millis.is_finite() => {
            let millis = millis.trunc();
            if millis < i64::MIN as f64 || millis >= i64::MAX as f64 {
                Err(CodecError::TimestampOutOfRange(raw.to_string()))
            } else {
                Ok(millis as i64)
            }
        }
        _ => Err(CodecError::InvalidTimestamp(raw.to_string())),
    }
}

/// Decode wire data back into a frame.
///
/// Rows are sorted by timestamp. The first row fixes the column set and
/// order; any row with a different key set, any unparsable timestamp, or any
/// non-object row fails the whole conversion.
pub fn decode(data: &WireData) -> Result<Frame, CodecError> {
    let mut records: Vec<(i64, &String, &Map<String, Value>)> = Vec::with_capacity(data.len());
    for (key, record) in data {
        let millis = parse_timestamp(key)?;
        let Value::Object(record) = record else {
            return Err(CodecError::NotARecord {
                timestamp: key.clone(),
            });
        };
        records.push((millis, key, record));
    }
    records.sort_by_key(|(millis, _, _)| *millis);

    let columns: Vec<String> = match records.first() {
        Some((_, _, first)) => first.keys().cloned().collect(),
        None => return Ok(Frame::default()),
    };

    let mut frame = Frame::new(columns.clone());
    for (millis, key, record) in records {
        let consistent =
            record.len() == columns.len() && columns.iter().all(|c| record.contains_key(c));
        if !consistent {
            return Err(CodecError::InconsistentColumns {
                timestamp: key.clone(),
                expected: columns,
                found: record.keys().cloned().collect(),
            });
        }
        let timestamp_ns = millis
            .checked_mul(NANOS_PER_MILLI)
            .ok_or_else(|| CodecError::TimestampOutOfRange(key.clone()))?;
        let values = columns.iter().map(|c| record[c.as_str()].clone()).collect();
        frame.push_row(timestamp_ns, values)?;
    }
    Ok(frame)
}

/// Decode an arbitrary JSON value: `null` is an empty frame, objects go
/// through [`decode`], anything else is rejected.
pub fn decode_value(data: &Value) -> Result<Frame, CodecError> {
    match data {
        Value::Null => Ok(Frame::default()),
        Value::Object(map) => decode(map),
        _ => Err(CodecError::NotAnObject),
    }
}
