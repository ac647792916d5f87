use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use approx::assert_relative_eq;
use tokio::time::advance;

use crate::config::{Config, LayoutTuning};
use crate::engine::Engine;
use crate::host::{BoundPlayer, FrameRect, OverlayNode, PlaybackPhase};
use crate::overlay::{Overlay, OverlayState};
use crate::render::{CaptionRenderer, RenderStrategy};
use crate::schedule::Cue;
use crate::sim::{NodeSnapshot, ScriptedPlayer, SimPage, SimPlayerApi, settle};

fn cue(start: f64, end: f64, text: &str) -> Cue {
    Cue {
        start,
        end,
        text: text.to_owned(),
    }
}

fn two_cues() -> Vec<Cue> {
    vec![cue(0.0, 2.0, "alpha"), cue(3.0, 5.0, "beta")]
}

struct Rig {
    page: SimPage,
    player: ScriptedPlayer,
    // Dropping the engine would tear down the bridge and coordinator.
    _engine: Engine,
    overlay: Overlay,
}

impl Rig {
    fn snapshot(&self) -> Result<NodeSnapshot, String> {
        self.page
            .node_snapshot(self.overlay.node_id())
            .ok_or_else(|| "missing caption node".to_owned())
    }

    fn shown_text(&self) -> Result<Option<String>, String> {
        let snapshot = self.snapshot()?;
        if snapshot.visible {
            Ok(Some(snapshot.lines.join("\n")))
        } else {
            Ok(None)
        }
    }
}

async fn rig_with(cues: Vec<Cue>) -> Result<Rig, String> {
    rig_with_renderer(cues, Arc::new(CaptionRenderer)).await
}

async fn rig_with_renderer(
    cues: Vec<Cue>,
    renderer: Arc<dyn RenderStrategy>,
) -> Result<Rig, String> {
    let rig = rig_before_ready(cues, renderer).await?;
    rig.player.emit_ready();
    settle().await;
    Ok(rig)
}

/// Same wiring, but the bound player has not announced `Ready` yet.
async fn rig_before_ready(
    cues: Vec<Cue>,
    renderer: Arc<dyn RenderStrategy>,
) -> Result<Rig, String> {
    let page = SimPage::new();
    let frame = page.add_frame("https://example.com/embed/abc");
    let api = Arc::new(SimPlayerApi::new());
    let player = ScriptedPlayer::new();
    player.set_video_id(Some("abc"));
    api.add_player(frame, player.clone());
    page.install_player_api(api);

    let engine = Engine::with_renderer(page.host(), Config::default(), renderer)
        .map_err(|err| err.to_string())?;
    let overlay = engine.attach(frame, cues).map_err(|err| err.to_string())?;
    settle().await;
    Ok(Rig {
        page,
        player,
        _engine: engine,
        overlay,
    })
}

/// Counts renders so no-op updates can be told apart from real ones.
#[derive(Default)]
struct CountingRenderer {
    inner: CaptionRenderer,
    renders: AtomicU32,
}

impl CountingRenderer {
    fn count(&self) -> u32 {
        self.renders.load(Ordering::SeqCst)
    }
}

impl RenderStrategy for CountingRenderer {
    fn render(
        &self,
        node: &dyn OverlayNode,
        player: Option<&dyn BoundPlayer>,
        state: &OverlayState,
        layout: &LayoutTuning,
    ) {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.inner.render(node, player, state, layout);
    }
}

#[tokio::test(start_paused = true)]
async fn playing_shows_the_cue_at_the_current_position() -> Result<(), String> {
    let rig = rig_with(two_cues()).await?;
    rig.player.set_position(1.0);
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;

    assert_eq!(rig.shown_text()?, Some("alpha".to_owned()));
    let snapshot = rig.snapshot()?;
    assert!(!snapshot.placements.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn polling_follows_the_playback_position() -> Result<(), String> {
    let rig = rig_with(two_cues()).await?;
    rig.player.set_position(1.0);
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;
    assert_eq!(rig.shown_text()?, Some("alpha".to_owned()));

    rig.player.set_position(4.0);
    advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(rig.shown_text()?, Some("beta".to_owned()));

    rig.player.set_position(10.0);
    advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(rig.shown_text()?, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unchanged_position_does_not_rerender() -> Result<(), String> {
    let renderer = Arc::new(CountingRenderer::default());
    let rig = rig_with_renderer(two_cues(), Arc::clone(&renderer) as Arc<dyn RenderStrategy>)
        .await?;
    rig.player.set_position(1.0);
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;

    let after_play = renderer.count();
    advance(Duration::from_millis(500)).await;
    settle().await;
    advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(renderer.count(), after_play);

    rig.player.set_position(4.0);
    advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(renderer.count(), after_play.saturating_add(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn redundant_fullscreen_updates_do_not_rerender() -> Result<(), String> {
    let renderer = Arc::new(CountingRenderer::default());
    let rig = rig_with_renderer(Vec::new(), Arc::clone(&renderer) as Arc<dyn RenderStrategy>)
        .await?;

    let baseline = renderer.count();
    rig.overlay.set_fullscreen_active(None);
    assert_eq!(renderer.count(), baseline);

    rig.overlay.set_fullscreen_active(Some(true));
    assert_eq!(renderer.count(), baseline.saturating_add(1));
    rig.overlay.set_fullscreen_active(Some(true));
    assert_eq!(renderer.count(), baseline.saturating_add(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fullscreen_flag_switches_the_class_list() -> Result<(), String> {
    let rig = rig_with(Vec::new()).await?;

    rig.overlay.set_fullscreen_active(Some(true));
    assert_eq!(rig.snapshot()?.class_name, "capsync-overlay fullscreen");

    rig.overlay.set_fullscreen_active(Some(false));
    assert_eq!(
        rig.snapshot()?.class_name,
        "capsync-overlay fullscreen-ignore"
    );

    rig.overlay.set_fullscreen_active(None);
    assert_eq!(rig.snapshot()?.class_name, "capsync-overlay");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn pause_keeps_the_caption_and_stops_polling() -> Result<(), String> {
    let rig = rig_with(two_cues()).await?;
    rig.player.set_position(1.0);
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;

    rig.player.emit_phase(PlaybackPhase::Paused);
    settle().await;
    assert_eq!(rig.shown_text()?, Some("alpha".to_owned()));
    assert!(rig.overlay.state().controls_visible);

    // Seeking while paused must not touch the caption.
    rig.player.set_position(4.0);
    advance(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(rig.shown_text()?, Some("alpha".to_owned()));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn ended_clears_the_caption() -> Result<(), String> {
    let rig = rig_with(two_cues()).await?;
    rig.player.set_position(1.0);
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;
    assert_eq!(rig.shown_text()?, Some("alpha".to_owned()));

    rig.player.emit_phase(PlaybackPhase::Ended);
    settle().await;
    assert_eq!(rig.shown_text()?, None);
    assert!(rig.overlay.state().controls_visible);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn controls_hide_after_the_delay_and_tighten_short_frames() -> Result<(), String> {
    let rig = rig_with(two_cues()).await?;
    rig.player.set_frame_rect(FrameRect {
        x: 0.0,
        y: 0.0,
        width: 400.0,
        height: 150.0,
    });
    rig.player.set_position(1.0);
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;

    let first = *rig
        .snapshot()?
        .placements
        .first()
        .ok_or("no placement after play")?;
    assert!(rig.overlay.state().controls_visible);

    advance(Duration::from_secs(3)).await;
    settle().await;
    assert!(!rig.overlay.state().controls_visible);

    let last = *rig
        .snapshot()?
        .placements
        .last()
        .ok_or("no placement after controls hid")?;
    // Padding drops from 60 to 20, so the caption moves 40 units down.
    assert_relative_eq!(last.y - first.y, 40.0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn replaying_resets_the_controls_deadline() -> Result<(), String> {
    let rig = rig_with(two_cues()).await?;
    rig.player.set_position(1.0);
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;

    advance(Duration::from_secs(2)).await;
    settle().await;
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;

    advance(Duration::from_secs(2)).await;
    settle().await;
    assert!(rig.overlay.state().controls_visible);

    advance(Duration::from_secs(1)).await;
    settle().await;
    assert!(!rig.overlay.state().controls_visible);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn phase_changes_from_a_previous_video_are_ignored() -> Result<(), String> {
    let rig = rig_with(two_cues()).await?;
    rig.player.set_position(1.0);

    rig.player.set_video_id(Some("stale"));
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;
    assert_eq!(rig.shown_text()?, None);
    assert!(rig.snapshot()?.placements.is_empty());

    rig.player.set_video_id(Some("abc"));
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;
    assert_eq!(rig.shown_text()?, Some("alpha".to_owned()));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn phase_changes_before_ready_are_ignored() -> Result<(), String> {
    let rig = rig_before_ready(two_cues(), Arc::new(CaptionRenderer)).await?;
    rig.player.set_position(1.0);
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;
    assert_eq!(rig.shown_text()?, None);

    // `Ready` adopts the video id; from then on the same phase counts.
    rig.player.emit_ready();
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;
    assert_eq!(rig.shown_text()?, Some("alpha".to_owned()));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn load_swaps_cues_on_the_next_tick() -> Result<(), String> {
    let rig = rig_with(two_cues()).await?;
    rig.player.set_position(1.0);
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;
    assert_eq!(rig.shown_text()?, Some("alpha".to_owned()));

    rig.overlay.load(vec![cue(0.0, 2.0, "gamma")]);
    assert_eq!(rig.shown_text()?, Some("alpha".to_owned()));

    advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(rig.shown_text()?, Some("gamma".to_owned()));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn repeated_loads_keep_only_the_last_cue_set() -> Result<(), String> {
    let rig = rig_with(Vec::new()).await?;
    rig.player.set_position(1.0);
    rig.overlay.load(vec![cue(0.0, 2.0, "first")]);
    rig.overlay.load(vec![cue(0.0, 2.0, "second")]);

    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;
    assert_eq!(rig.shown_text()?, Some("second".to_owned()));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn multiline_cues_become_separate_boxes() -> Result<(), String> {
    let rig = rig_with(vec![cue(0.0, 2.0, "one\r\ntwo\nthree")]).await?;
    rig.player.set_position(1.0);
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;

    assert_eq!(rig.snapshot()?.lines, vec!["one", "two", "three"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn destroy_stops_timers_and_detaches_the_node() -> Result<(), String> {
    let rig = rig_with(two_cues()).await?;
    rig.player.set_position(1.0);
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;

    let spare = rig.overlay.clone();
    let node = rig.overlay.node_id();
    let placements_before = rig.snapshot()?.placements.len();
    rig.overlay.destroy();

    assert!(
        rig.page
            .node_snapshot(node)
            .is_some_and(|snapshot| snapshot.detached)
    );
    assert!(spare.player().is_none());

    rig.player.set_position(4.0);
    advance(Duration::from_secs(5)).await;
    settle().await;
    let snapshot = rig.page.node_snapshot(node).ok_or("missing caption node")?;
    assert_eq!(snapshot.placements.len(), placements_before);

    // A second destroy through a clone is a quiet no-op.
    spare.destroy();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn buffering_does_not_disturb_the_caption() -> Result<(), String> {
    let rig = rig_with(two_cues()).await?;
    rig.player.set_position(1.0);
    rig.player.emit_phase(PlaybackPhase::Playing);
    settle().await;

    rig.player.emit_phase(PlaybackPhase::Buffering);
    settle().await;
    assert_eq!(rig.shown_text()?, Some("alpha".to_owned()));

    // Polling is still live after a buffer notice.
    rig.player.set_position(4.0);
    advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(rig.shown_text()?, Some("beta".to_owned()));
    Ok(())
}
