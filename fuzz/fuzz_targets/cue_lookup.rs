#![no_main]

use capsync::schedule::{Cue, CueIndex};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let mut numbers: Vec<f64> = input
            .split_whitespace()
            .filter_map(|token| token.parse().ok())
            .collect();
        let Some(seconds) = numbers.pop() else { return };
        // Non-finite and day-plus spans must be shed by `build` itself.
        let cues: Vec<Cue> = numbers
            .chunks_exact(2)
            .enumerate()
            .map(|(position, pair)| Cue {
                start: pair[0],
                end: pair[1],
                text: format!("cue {position}"),
            })
            .collect();
        let index = CueIndex::build(cues);
        if let Some(cue) = index.cue_at(seconds) {
            debug_assert!(cue.start <= seconds && seconds <= cue.end);
        }
    }
});
