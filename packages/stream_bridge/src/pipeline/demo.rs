use chrono::Utc;
use frame_codec::{CodecError, Frame};
use serde_json::json;
use std::f64::consts::TAU;

use super::port::{Port, Ports};
use crate::error::BridgeError;

/// Upper bound on samples emitted per poll, so a stalled driver does not
/// produce one enormous frame when it resumes.
const MAX_SAMPLES_PER_POLL: i64 = 1000;

/// Synthetic stream with `sine` and `cosine` channels, sampled on wall-clock
/// time.
#[derive(Debug, Clone)]
pub struct SineSource {
    name: String,
    frequency_hz: f64,
    period_ns: i64,
    next_ns: Option<i64>,
}

impl SineSource {
    pub fn new(name: &str, frequency_hz: f64, sample_rate_hz: u32) -> Self {
        Self {
            name: name.to_string(),
            frequency_hz,
            period_ns: 1_000_000_000 / i64::from(sample_rate_hz.max(1)),
            next_ns: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Samples due up to and including `now_ns`. The first call yields a
    /// single sample at `now_ns`.
    pub fn frame_until(&mut self, now_ns: i64) -> Result<Frame, CodecError> {
        let mut frame = Frame::new(vec!["sine".to_string(), "cosine".to_string()]);
        let oldest = now_ns - (MAX_SAMPLES_PER_POLL - 1) * self.period_ns;
        let mut t = self.next_ns.unwrap_or(now_ns).max(oldest);
        while t <= now_ns {
            let phase = TAU * self.frequency_hz * (t as f64 / 1e9);
            frame.push_row(t, vec![json!(phase.sin()), json!(phase.cos())])?;
            t += self.period_ns;
        }
        self.next_ns = Some(t);
        Ok(frame)
    }

    /// Put the samples due now on the input port named after this source.
    pub fn feed(&mut self, ports: &mut Ports) -> Result<(), BridgeError> {
        let now_ns = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let frame = self.frame_until(now_ns)?;
        ports.set_input(&self.name, Port::with_data(frame));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_poll_is_single_sample() {
        let mut source = SineSource::new("demo", 1.0, 10);
        let frame = source.frame_until(1_000_000_000).unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.columns(), &["sine".to_string(), "cosine".to_string()]);
    }

    #[test]
    fn test_samples_follow_rate() {
        let mut source = SineSource::new("demo", 1.0, 10);
        source.frame_until(0).unwrap();
        let frame = source.frame_until(500_000_000).unwrap();
        assert_eq!(
            frame.index(),
            &[100_000_000, 200_000_000, 300_000_000, 400_000_000, 500_000_000]
        );
    }

    #[test]
    fn test_stall_is_capped() {
        let mut source = SineSource::new("demo", 1.0, 1000);
        source.frame_until(0).unwrap();
        let frame = source.frame_until(3_600_000_000_000).unwrap();
        assert_eq!(frame.len() as i64, MAX_SAMPLES_PER_POLL);
    }

    #[test]
    fn test_feed_sets_input() {
        let mut source = SineSource::new("demo", 2.0, 50);
        let mut ports = Ports::default();
        source.feed(&mut ports).unwrap();
        assert!(ports.input("demo").and_then(|p| p.data.as_ref()).is_some());
    }
}
