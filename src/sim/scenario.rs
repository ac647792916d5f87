//! Declarative demo scenarios.
//!
//! A scenario file describes a simulated page (frames, their cue sets and
//! player geometry) plus a timed script of playback and page happenings.
//! The demo binary materializes the page, attaches an overlay per frame
//! and then replays the script in real time while the engine reacts.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigOverrides;
use crate::engine::Engine;
use crate::error::{AppResult, Error};
use crate::host::{FrameRect, FullscreenProbe, PlaybackPhase, PlayerApi};
use crate::overlay::Overlay;
use crate::schedule::Cue;
use crate::sim::{ScriptedPlayer, SimPage, SimPlayerApi, settle};

/// Built-in scenario used when no file is given: one talking frame, a
/// seek, a fullscreen round trip and a clean end of playback.
pub const SHOWCASE: &str = r#"
[engine]
poll_interval_ms = 250

[[frame]]
src = "https://www.youtube.com/embed/dQw4w9WgXcQ"
video_id = "dQw4w9WgXcQ"

[[frame.cue]]
start = 0.0
end = 2.0
text = "Never gonna give you up"

[[frame.cue]]
start = 2.5
end = 4.5
text = "Never gonna let you down"

[[step]]
at_ms = 0
action = "api_ready"

[[step]]
at_ms = 300
action = "play"
frame = 0

[[step]]
at_ms = 600
action = "seek"
frame = 0
position = 3.0

[[step]]
at_ms = 1200
action = "fullscreen"
frame = 0

[[step]]
at_ms = 1700
action = "fullscreen"

[[step]]
at_ms = 2000
action = "end"
frame = 0
"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub engine: ConfigOverrides,
    #[serde(default, rename = "frame")]
    pub frames: Vec<FrameSpec>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrameSpec {
    pub src: String,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub rect: Option<RectSpec>,
    #[serde(default, rename = "cue")]
    pub cues: Vec<Cue>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RectSpec {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<RectSpec> for FrameRect {
    fn from(rect: RectSpec) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: Action,
}

/// One scripted happening. `frame` fields index into the scenario's frame
/// list. The first `play`/`pause`/`end` on a frame also makes its player
/// announce `Ready`, the way a freshly bound player would.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// The vendor script "loads" and the player API appears on the page.
    ApiReady,
    Play { frame: usize },
    Pause { frame: usize },
    End { frame: usize },
    Seek { frame: usize, position: f64 },
    /// Enter fullscreen on a frame, or leave it when `frame` is omitted.
    Fullscreen {
        #[serde(default)]
        frame: Option<usize>,
    },
    Destroy { frame: usize },
}

impl Action {
    const fn frame_index(&self) -> Option<usize> {
        match self {
            Self::ApiReady | Self::Fullscreen { frame: None } => None,
            Self::Play { frame }
            | Self::Pause { frame }
            | Self::End { frame }
            | Self::Seek { frame, .. }
            | Self::Fullscreen { frame: Some(frame) }
            | Self::Destroy { frame } => Some(*frame),
        }
    }
}

/// Outcome of a scenario run, printable as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub steps_applied: usize,
    /// Final caption per frame, `None` when empty or destroyed.
    pub captions: Vec<Option<String>>,
}

impl Scenario {
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the TOML does not describe a valid
    /// scenario.
    pub fn from_toml(text: &str) -> AppResult<Self> {
        let scenario: Self =
            toml::from_str(text).map_err(|err| Error::Config(format!("scenario: {err}")))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] when a step points at a frame the scenario
    /// never declares.
    pub fn validate(&self) -> AppResult<()> {
        for (position, step) in self.steps.iter().enumerate() {
            if let Some(frame) = step.action.frame_index() {
                if frame >= self.frames.len() {
                    return Err(Error::Config(format!(
                        "step {position} references frame {frame}, but only {} frames exist",
                        self.frames.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Plays a scenario against a fresh simulated page.
///
/// # Errors
///
/// Returns [`Error::Config`] for inconsistent scenarios and passes through
/// attach failures.
pub async fn run(scenario: Scenario) -> AppResult<ScenarioReport> {
    scenario.validate()?;

    let page = SimPage::new();
    let api = Arc::new(SimPlayerApi::new());
    let mut frames = Vec::new();
    let mut players = Vec::new();
    for spec in &scenario.frames {
        let frame = page.add_frame(&spec.src);
        let player = ScriptedPlayer::new();
        player.set_video_id(spec.video_id.as_deref());
        if let Some(rect) = spec.rect {
            player.set_frame_rect(rect.into());
        }
        api.add_player(frame, player.clone());
        frames.push(frame);
        players.push(player);
    }

    let engine = Engine::new(page.host(), scenario.engine.clone().resolve())?;
    let mut overlays: Vec<Option<Overlay>> = Vec::new();
    for (frame, spec) in frames.iter().copied().zip(&scenario.frames) {
        overlays.push(Some(engine.attach(frame, spec.cues.clone())?));
    }

    let mut steps = scenario.steps.clone();
    steps.sort_by_key(|step| step.at_ms);

    let start = tokio::time::Instant::now();
    let ready_sent = vec![false; players.len()];
    let mut stage = Stage {
        page,
        api,
        frames,
        players,
        overlays,
        ready_sent,
    };
    let mut steps_applied = 0usize;
    for step in &steps {
        tokio::time::sleep_until(start + Duration::from_millis(step.at_ms)).await;
        tracing::info!(at_ms = step.at_ms, action = ?step.action, "scenario step");
        stage.apply(&step.action)?;
        steps_applied = steps_applied.saturating_add(1);
    }
    settle().await;

    let captions = stage
        .overlays
        .iter()
        .map(|slot| slot.as_ref().and_then(|overlay| overlay.state().text))
        .collect();
    Ok(ScenarioReport {
        steps_applied,
        captions,
    })
}

struct Stage {
    page: SimPage,
    api: Arc<SimPlayerApi>,
    frames: Vec<crate::host::NodeId>,
    players: Vec<ScriptedPlayer>,
    overlays: Vec<Option<Overlay>>,
    ready_sent: Vec<bool>,
}

impl Stage {
    fn player(&self, frame: usize) -> AppResult<&ScriptedPlayer> {
        self.players
            .get(frame)
            .ok_or_else(|| Error::Config(format!("no player for frame index {frame}")))
    }

    /// A bound player announces `Ready` once before its first phase event,
    /// so the first playback action on a frame emits it implicitly.
    fn playback(&mut self, frame: usize, phase: PlaybackPhase) -> AppResult<()> {
        let player = self.player(frame)?.clone();
        if let Some(sent) = self.ready_sent.get_mut(frame) {
            if !*sent {
                player.emit_ready();
                *sent = true;
            }
        }
        player.emit_phase(phase);
        Ok(())
    }

    fn apply(&mut self, action: &Action) -> AppResult<()> {
        match action {
            Action::ApiReady => {
                let api: Arc<dyn PlayerApi> = Arc::clone(&self.api) as Arc<dyn PlayerApi>;
                self.page.install_player_api(api);
            }
            Action::Play { frame } => self.playback(*frame, PlaybackPhase::Playing)?,
            Action::Pause { frame } => self.playback(*frame, PlaybackPhase::Paused)?,
            Action::End { frame } => self.playback(*frame, PlaybackPhase::Ended)?,
            Action::Seek { frame, position } => self.player(*frame)?.set_position(*position),
            Action::Fullscreen { frame } => {
                let target = match frame {
                    Some(index) => Some(self.frame_node(*index)?),
                    None => None,
                };
                self.page.set_fullscreen(FullscreenProbe::Standard, target);
                self.page.emit_page_event("fullscreenchange");
            }
            Action::Destroy { frame } => {
                if let Some(overlay) = self.overlays.get_mut(*frame).and_then(Option::take) {
                    overlay.destroy();
                }
            }
        }
        Ok(())
    }

    fn frame_node(&self, index: usize) -> AppResult<crate::host::NodeId> {
        self.frames
            .get(index)
            .copied()
            .ok_or_else(|| Error::Config(format!("no frame at index {index}")))
    }
}
