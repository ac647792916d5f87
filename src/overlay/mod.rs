//! Overlay lifecycle and caption state.
//!
//! An [`Overlay`] is a cheap-to-clone handle shared by the registry, the
//! fullscreen coordinator and the embedding host. All state lives behind
//! one mutex and every mutation renders synchronously when, and only when,
//! something actually changed. Timers never touch state directly: a driver
//! task owns the poll interval and the controls-hide deadline and calls
//! back into the same mutex, so caller-facing methods and timer ticks can
//! never interleave mid-render.

mod driver;
#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::JoinHandle;

use crate::bridge::PlayerBridge;
use crate::config::Config;
use crate::host::{BoundPlayer, HostPage, NodeId, OverlayNode, PlaybackPhase, PlayerEvent};
use crate::registry::OverlayRegistry;
use crate::render::RenderStrategy;
use crate::schedule::{Cue, CueIndex};

/// What the caption node currently shows.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayState {
    /// Caption text, `None` between cues.
    pub text: Option<String>,
    /// `Some(true)` when this overlay's player is fullscreen, `Some(false)`
    /// when another one is, `None` when nothing is fullscreen.
    pub fullscreen: Option<bool>,
    /// Whether the player controls are assumed visible.
    pub controls_visible: bool,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            text: None,
            fullscreen: None,
            controls_visible: true,
        }
    }
}

/// Partial state update; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StatePatch {
    text: Option<Option<String>>,
    fullscreen: Option<Option<bool>>,
    controls_visible: Option<bool>,
}

impl StatePatch {
    pub(crate) fn text(value: Option<String>) -> Self {
        Self {
            text: Some(value),
            ..Self::default()
        }
    }

    pub(crate) fn fullscreen(value: Option<bool>) -> Self {
        Self {
            fullscreen: Some(value),
            ..Self::default()
        }
    }

    pub(crate) const fn controls_visible(value: bool) -> Self {
        Self {
            text: None,
            fullscreen: None,
            controls_visible: Some(value),
        }
    }
}

impl OverlayState {
    fn merged(&self, patch: &StatePatch) -> Self {
        Self {
            text: patch
                .text
                .clone()
                .unwrap_or_else(|| self.text.clone()),
            fullscreen: patch.fullscreen.unwrap_or(self.fullscreen),
            controls_visible: patch.controls_visible.unwrap_or(self.controls_visible),
        }
    }
}

/// Timer adjustment requested by a player event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerChange {
    StartPolling,
    StopPolling,
}

/// Handle to one caption overlay. Clones share the same overlay.
#[derive(Clone)]
pub struct Overlay {
    inner: Arc<OverlayInner>,
}

/// Everything needed to assemble an overlay.
pub(crate) struct OverlayParts {
    pub(crate) frame: NodeId,
    pub(crate) node: Arc<dyn OverlayNode>,
    pub(crate) host: Arc<dyn HostPage>,
    pub(crate) config: Arc<Config>,
    pub(crate) renderer: Arc<dyn RenderStrategy>,
    pub(crate) registry: Weak<OverlayRegistry>,
    pub(crate) cues: Vec<Cue>,
}

pub(crate) struct OverlayInner {
    frame: NodeId,
    node: Arc<dyn OverlayNode>,
    host: Arc<dyn HostPage>,
    config: Arc<Config>,
    renderer: Arc<dyn RenderStrategy>,
    registry: Weak<OverlayRegistry>,
    runtime: Mutex<Runtime>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

struct Runtime {
    state: OverlayState,
    cues: CueIndex,
    player: Option<Arc<dyn BoundPlayer>>,
    video_id: Option<String>,
    destroyed: bool,
}

impl Overlay {
    pub(crate) fn new(parts: OverlayParts) -> Self {
        Self {
            inner: Arc::new(OverlayInner {
                frame: parts.frame,
                node: parts.node,
                host: parts.host,
                config: parts.config,
                renderer: parts.renderer,
                registry: parts.registry,
                runtime: Mutex::new(Runtime {
                    state: OverlayState::default(),
                    cues: CueIndex::build(parts.cues),
                    player: None,
                    video_id: None,
                    destroyed: false,
                }),
                driver: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn spawn_driver(&self, bridge: PlayerBridge) {
        let handle = tokio::spawn(driver::run(Arc::clone(&self.inner), bridge));
        *self.inner.lock_driver() = Some(handle);
    }

    /// Renders the current state unconditionally. Used once at attach time.
    pub(crate) fn render_now(&self) {
        let runtime = self.inner.lock_runtime();
        if runtime.destroyed {
            return;
        }
        self.inner.render_locked(&runtime);
    }

    /// Replaces the cue set. The visible caption is untouched until the
    /// next poll tick or state change.
    pub fn load(&self, cues: Vec<Cue>) {
        let mut runtime = self.inner.lock_runtime();
        if runtime.destroyed {
            return;
        }
        runtime.cues = CueIndex::build(cues);
    }

    /// Updates the fullscreen flag, re-rendering only on a real change.
    pub fn set_fullscreen_active(&self, active: Option<bool>) {
        let mut runtime = self.inner.lock_runtime();
        self.inner
            .apply_patch(&mut runtime, StatePatch::fullscreen(active));
    }

    /// The bound player, once the driver has acquired one.
    #[must_use]
    pub fn player(&self) -> Option<Arc<dyn BoundPlayer>> {
        self.inner.lock_runtime().player.clone()
    }

    /// Snapshot of the displayed state.
    #[must_use]
    pub fn state(&self) -> OverlayState {
        self.inner.lock_runtime().state.clone()
    }

    #[must_use]
    pub fn frame_id(&self) -> NodeId {
        self.inner.frame
    }

    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.inner.node.node_id()
    }

    pub(crate) fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether this overlay's caption node is `container` or sits inside it.
    pub(crate) fn is_inside(&self, container: NodeId) -> bool {
        let node = self.inner.node.node_id();
        container == node || self.inner.host.contains(container, node)
    }

    /// Tears the overlay down: stops the driver and its timers, detaches
    /// the caption node and releases the frame in the registry. Consumes
    /// the handle; clones of it become inert no-ops.
    pub fn destroy(self) {
        if let Some(handle) = self.inner.lock_driver().take() {
            handle.abort();
        }
        {
            let mut runtime = self.inner.lock_runtime();
            if std::mem::replace(&mut runtime.destroyed, true) {
                return;
            }
            runtime.player = None;
        }
        self.inner.node.detach();
        if let Some(registry) = self.inner.registry.upgrade() {
            registry.unregister(&self);
        }
        tracing::debug!(frame = self.inner.frame, "overlay destroyed");
    }
}

impl fmt::Debug for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlay")
            .field("frame", &self.inner.frame)
            .field("node", &self.inner.node.node_id())
            .finish()
    }
}

impl OverlayInner {
    fn lock_runtime(&self) -> MutexGuard<'_, Runtime> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_driver(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) const fn frame_id(&self) -> NodeId {
        self.frame
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn adopt_player(&self, player: Arc<dyn BoundPlayer>) {
        let mut runtime = self.lock_runtime();
        if runtime.destroyed {
            return;
        }
        runtime.player = Some(player);
    }

    /// Reacts to one player event. State changes happen here, under the
    /// runtime lock; the returned value tells the driver what to do with
    /// its timers.
    pub(crate) fn on_player_event(&self, event: &PlayerEvent) -> Option<TimerChange> {
        let mut runtime = self.lock_runtime();
        let player = runtime.player.clone()?;
        match event {
            PlayerEvent::Ready => {
                runtime.video_id = player.video_id();
                None
            }
            PlayerEvent::PhaseChange(phase) => {
                // `video_id` stays `None` until `Ready`, so phases arriving
                // early only pass when the player reports no video yet.
                if runtime.video_id != player.video_id() {
                    tracing::debug!(
                        frame = self.frame,
                        "ignoring phase change for a different video id"
                    );
                    return None;
                }
                match phase {
                    PlaybackPhase::Playing => {
                        self.apply_patch(&mut runtime, StatePatch::controls_visible(true));
                        self.refresh_caption(&mut runtime, &player);
                        Some(TimerChange::StartPolling)
                    }
                    PlaybackPhase::Paused => {
                        self.apply_patch(&mut runtime, StatePatch::controls_visible(true));
                        Some(TimerChange::StopPolling)
                    }
                    PlaybackPhase::Ended => {
                        self.apply_patch(&mut runtime, StatePatch::controls_visible(true));
                        self.apply_patch(&mut runtime, StatePatch::text(None));
                        Some(TimerChange::StopPolling)
                    }
                    PlaybackPhase::Buffering | PlaybackPhase::Cued => None,
                }
            }
        }
    }

    /// One poll tick: look up the cue for the current position.
    pub(crate) fn poll_time(&self) {
        let mut runtime = self.lock_runtime();
        let Some(player) = runtime.player.clone() else {
            return;
        };
        self.refresh_caption(&mut runtime, &player);
    }

    /// The controls-hide deadline fired.
    pub(crate) fn controls_hidden(&self) {
        let mut runtime = self.lock_runtime();
        self.apply_patch(&mut runtime, StatePatch::controls_visible(false));
    }

    fn refresh_caption(&self, runtime: &mut Runtime, player: &Arc<dyn BoundPlayer>) {
        let text = runtime
            .cues
            .cue_at(player.position_secs())
            .map(|cue| cue.text.clone());
        self.apply_patch(runtime, StatePatch::text(text));
    }

    fn apply_patch(&self, runtime: &mut Runtime, patch: StatePatch) {
        if runtime.destroyed {
            return;
        }
        let next = runtime.state.merged(&patch);
        if next == runtime.state {
            return;
        }
        runtime.state = next;
        self.render_locked(runtime);
    }

    fn render_locked(&self, runtime: &Runtime) {
        self.renderer.render(
            self.node.as_ref(),
            runtime.player.as_deref(),
            &runtime.state,
            &self.config.layout,
        );
    }
}
