//! Cue storage and time-indexed lookup.
//!
//! Cues are grouped into fixed 10 second buckets keyed by
//! `floor(start / 10) ..= floor(end / 10)`, so a lookup only scans the
//! handful of cues whose spans touch the bucket of the queried position.
//! Within a bucket, cues keep their insertion order and the first cue whose
//! inclusive span contains the position wins.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Width of one lookup bucket in seconds. Fixed rather than tunable: cue
/// data indexed under one width cannot be queried under another.
pub const BUCKET_WIDTH_SECS: f64 = 10.0;

/// Longest span one cue may cover, in seconds (one day). The bucket walk
/// grows linearly with the span, so longer or non-finite spans are treated
/// as corrupt timing data and dropped at build time.
pub const MAX_SPAN_SECS: f64 = 86_400.0;

/// A single caption with an inclusive display span in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Bucket key for a playback position.
#[must_use]
pub fn bucket(seconds: f64) -> i64 {
    (seconds / BUCKET_WIDTH_SECS).floor() as i64
}

/// Interval-bucketed cue index. Cheap to rebuild, cheap to query.
#[derive(Debug, Clone, Default)]
pub struct CueIndex {
    buckets: HashMap<i64, Vec<Arc<Cue>>>,
}

impl CueIndex {
    /// Builds the index, inserting each cue into every bucket between the
    /// bucket of `start` and the bucket of `end`. Cues with non-finite
    /// bounds or spans past [`MAX_SPAN_SECS`] are dropped outright. A cue
    /// whose `end` bucket precedes its `start` bucket spans nothing and is
    /// dropped; an inverted span within one bucket is stored but can never
    /// match.
    #[must_use]
    pub fn build(cues: Vec<Cue>) -> Self {
        let mut buckets: HashMap<i64, Vec<Arc<Cue>>> = HashMap::new();
        for cue in cues {
            if !cue.start.is_finite()
                || !cue.end.is_finite()
                || cue.end - cue.start > MAX_SPAN_SECS
            {
                tracing::warn!(
                    start = cue.start,
                    end = cue.end,
                    "dropping cue with an unusable span"
                );
                continue;
            }
            let shared = Arc::new(cue);
            for key in bucket(shared.start)..=bucket(shared.end) {
                buckets.entry(key).or_default().push(Arc::clone(&shared));
            }
        }
        Self { buckets }
    }

    /// The cue to display at `seconds`, if any. Overlapping cues resolve to
    /// the one loaded first.
    #[must_use]
    pub fn cue_at(&self, seconds: f64) -> Option<&Cue> {
        let entries = self.buckets.get(&bucket(seconds))?;
        entries
            .iter()
            .find(|cue| cue.start <= seconds && seconds <= cue.end)
            .map(Arc::as_ref)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    #[cfg(test)]
    fn bucket_texts(&self, key: i64) -> Vec<&str> {
        self.buckets
            .get(&key)
            .map(|entries| entries.iter().map(|cue| cue.text.as_str()).collect())
            .unwrap_or_default()
    }
}
