use proptest::prelude::*;
use serde_json::{Value, json};

use frame_codec::{Frame, NANOS_PER_MILLI, decode, encode};

/// Strictly increasing millisecond stamps, each with a sub-millisecond offset.
fn arb_distinct_rows() -> impl Strategy<Value = Vec<(i64, i64, i64)>> {
    prop::collection::vec((1i64..5_000, 0i64..NANOS_PER_MILLI, -1_000i64..1_000), 1..40).prop_map(
        |steps| {
            let mut millis = 1_600_000_000_000i64;
            steps
                .into_iter()
                .map(|(step, sub, value)| {
                    millis += step;
                    (millis, sub, value)
                })
                .collect()
        },
    )
}

fn build(columns: &[&str], rows: &[(i64, Vec<Value>)]) -> Frame {
    let mut frame = Frame::new(columns.iter().map(|c| c.to_string()).collect());
    for (ts, values) in rows {
        frame.push_row(*ts, values.clone()).unwrap();
    }
    frame
}

// --- Round trip ---

proptest! {
    #[test]
    fn roundtrip_preserves_rows_up_to_truncation(rows in arb_distinct_rows()) {
        let source: Vec<(i64, Vec<Value>)> = rows
            .iter()
            .map(|(millis, sub, value)| {
                (millis * NANOS_PER_MILLI + sub, vec![json!(value), json!(value * 2)])
            })
            .collect();
        let frame = build(&["a", "b"], &source);

        let decoded = decode(&encode(&frame)).unwrap();

        prop_assert_eq!(decoded.columns(), frame.columns());
        prop_assert_eq!(decoded.rows(), frame.rows());
        let expected_index: Vec<i64> = rows.iter().map(|(millis, _, _)| millis * NANOS_PER_MILLI).collect();
        prop_assert_eq!(decoded.index(), expected_index.as_slice());
    }

    #[test]
    fn encode_never_emits_more_rows_than_source(rows in arb_distinct_rows(), repeat in 1usize..4) {
        let mut source = Vec::new();
        for (millis, sub, value) in &rows {
            for copy in 0..repeat {
                source.push((millis * NANOS_PER_MILLI + (sub + copy as i64) % NANOS_PER_MILLI, vec![json!(value)]));
            }
        }
        let frame = build(&["x"], &source);
        prop_assert_eq!(encode(&frame).len(), rows.len());
    }
}

// --- Dedup ---

proptest! {
    #[test]
    fn dedup_keeps_later_row(millis in 0i64..1_000_000_000, first in 0i64..NANOS_PER_MILLI, second in 0i64..NANOS_PER_MILLI) {
        let frame = build(
            &["v"],
            &[
                (millis * NANOS_PER_MILLI + first, vec![json!("early")]),
                (millis * NANOS_PER_MILLI + second, vec![json!("late")]),
            ],
        );
        let encoded = encode(&frame);
        prop_assert_eq!(encoded.len(), 1);
        prop_assert_eq!(&encoded[&millis.to_string()], &json!({"v": "late"}));
    }
}
