#![no_main]

use capsync::sim::scenario::{Action, Scenario};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(scenario) = Scenario::from_toml(input) {
            debug_assert!(scenario.validate().is_ok());
            let frames = scenario.frames.len();
            for step in &scenario.steps {
                let referenced = match &step.action {
                    Action::Play { frame }
                    | Action::Pause { frame }
                    | Action::End { frame }
                    | Action::Seek { frame, .. }
                    | Action::Destroy { frame } => Some(*frame),
                    Action::Fullscreen { frame } => *frame,
                    Action::ApiReady => None,
                };
                if let Some(frame) = referenced {
                    debug_assert!(frame < frames);
                }
            }
        }
    }
});
