//! Frame Codec - time-indexed tables and their JSON wire form
//!
//! A [`Frame`] is a table of samples keyed by nanosecond timestamps. On the
//! wire the same table travels as a JSON object mapping millisecond
//! timestamp strings to `{column: value}` records.
//!
//! # Example
//!
//! ```
//! use frame_codec::{Frame, decode, encode};
//! use serde_json::json;
//!
//! let mut frame = Frame::new(vec!["x".to_string(), "y".to_string()]);
//! frame.push_row(1_500_000, vec![json!(1), json!(2)]).unwrap();
//! frame.push_row(1_900_000, vec![json!(3), json!(4)]).unwrap();
//!
//! // Both rows land in millisecond 1: only the later one survives.
//! let wire = encode(&frame);
//! assert_eq!(wire.len(), 1);
//! assert_eq!(wire["1"], json!({"x": 3, "y": 4}));
//!
//! let back = decode(&wire).unwrap();
//! assert_eq!(back.index(), &[1_000_000]);
//! ```

mod error;
mod frame;
mod wire;

pub use error::CodecError;
pub use frame::{Frame, NANOS_PER_MILLI};
pub use wire::{WireData, decode, decode_value, encode, parse_timestamp};
