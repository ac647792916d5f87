//! Scripted host page and player doubles.
//!
//! [`SimPage`] implements [`HostPage`] over an in-memory page model:
//! frames, caption nodes, scripts, styles and fullscreen slots, every call
//! recorded for inspection. [`ScriptedPlayer`] is a [`BoundPlayer`] whose
//! position, video id and events are driven from the outside. Tests and
//! the demo binary both build on these, so the engine runs end to end with
//! no browser anywhere.

pub mod scenario;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::error::{AppResult, Error};
use crate::host::{
    BoundPlayer, FrameRect, FullscreenProbe, HostPage, MeasureStyle, NodeId, OverlayNode,
    PageEvent, PlaybackPhase, PlayerApi, PlayerEvent, Point, Size,
};

const CHAR_WIDTH: f64 = 8.0;
const LINE_HEIGHT: f64 = 20.0;

/// Lets spawned engine tasks reach their next await point. Scripted tests
/// call this between steps instead of sleeping.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Everything a caption node did since its creation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeSnapshot {
    pub class_name: String,
    pub lines: Vec<String>,
    pub visible: bool,
    pub measures: Vec<MeasureStyle>,
    pub placements: Vec<Point>,
    pub detached: bool,
}

#[derive(Debug, Default)]
struct NodeLog {
    snapshot: NodeSnapshot,
}

struct NodeModel {
    id: NodeId,
    log: Mutex<NodeLog>,
}

impl NodeModel {
    fn lock(&self) -> MutexGuard<'_, NodeLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct SimNode {
    model: Arc<NodeModel>,
}

impl OverlayNode for SimNode {
    fn node_id(&self) -> NodeId {
        self.model.id
    }

    fn set_class_name(&self, class_name: &str) {
        self.model.lock().snapshot.class_name = class_name.to_owned();
    }

    fn set_lines(&self, lines: &[String]) {
        self.model.lock().snapshot.lines = lines.to_vec();
    }

    fn set_visible(&self, visible: bool) {
        self.model.lock().snapshot.visible = visible;
    }

    fn measure(&self, style: MeasureStyle) -> Size {
        let mut log = self.model.lock();
        log.snapshot.measures.push(style);
        let longest = log
            .snapshot
            .lines
            .iter()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0) as f64;
        Size {
            width: (longest * CHAR_WIDTH * style.font_scale).min(style.max_width),
            height: (log.snapshot.lines.len() as f64) * LINE_HEIGHT * style.font_scale,
        }
    }

    fn place(&self, position: Point) {
        self.model.lock().snapshot.placements.push(position);
    }

    fn detach(&self) {
        self.model.lock().snapshot.detached = true;
    }
}

#[derive(Debug)]
struct FrameModel {
    src: String,
    src_writes: u32,
}

struct StyleSheet {
    id: String,
    css: String,
}

struct EventTap {
    names: Vec<String>,
    tx: mpsc::UnboundedSender<PageEvent>,
}

#[derive(Default)]
struct PageModel {
    next_id: NodeId,
    frames: HashMap<NodeId, FrameModel>,
    nodes: HashMap<NodeId, Arc<NodeModel>>,
    parents: HashMap<NodeId, NodeId>,
    scripts: Vec<String>,
    injected: Vec<String>,
    styles: Vec<StyleSheet>,
    api: Option<Arc<dyn PlayerApi>>,
    fullscreen: HashMap<FullscreenProbe, NodeId>,
    taps: Vec<EventTap>,
}

/// In-memory page. Clones share the same model.
#[derive(Clone)]
pub struct SimPage {
    model: Arc<Mutex<PageModel>>,
}

impl Default for SimPage {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPage {
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: Arc::new(Mutex::new(PageModel::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PageModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate_id(model: &mut PageModel) -> NodeId {
        model.next_id = model.next_id.wrapping_add(1);
        model.next_id
    }

    /// This page as a host capability handle.
    #[must_use]
    pub fn host(&self) -> Arc<dyn HostPage> {
        Arc::new(self.clone())
    }

    /// A plain grouping node, usable as a fullscreen target.
    #[must_use]
    pub fn add_container(&self) -> NodeId {
        let mut model = self.lock();
        Self::allocate_id(&mut model)
    }

    #[must_use]
    pub fn add_frame(&self, src: &str) -> NodeId {
        let mut model = self.lock();
        let id = Self::allocate_id(&mut model);
        model.frames.insert(
            id,
            FrameModel {
                src: src.to_owned(),
                src_writes: 0,
            },
        );
        id
    }

    /// Adds a frame inside `container`, so fullscreen on the container
    /// covers the frame and its caption node.
    #[must_use]
    pub fn add_frame_in(&self, container: NodeId, src: &str) -> NodeId {
        let id = self.add_frame(src);
        self.lock().parents.insert(id, container);
        id
    }

    #[must_use]
    pub fn src_of(&self, frame: NodeId) -> Option<String> {
        self.lock().frames.get(&frame).map(|entry| entry.src.clone())
    }

    #[must_use]
    pub fn src_writes(&self, frame: NodeId) -> u32 {
        self.lock()
            .frames
            .get(&frame)
            .map_or(0, |entry| entry.src_writes)
    }

    /// Marks a script as already present without counting it as injected.
    pub fn add_script(&self, src: &str) {
        self.lock().scripts.push(src.to_owned());
    }

    #[must_use]
    pub fn injected_scripts(&self) -> Vec<String> {
        self.lock().injected.clone()
    }

    #[must_use]
    pub fn style_ids(&self) -> Vec<String> {
        self.lock()
            .styles
            .iter()
            .map(|sheet| sheet.id.clone())
            .collect()
    }

    #[must_use]
    pub fn style_css(&self, id: &str) -> Option<String> {
        self.lock()
            .styles
            .iter()
            .find(|sheet| sheet.id == id)
            .map(|sheet| sheet.css.clone())
    }

    pub fn install_player_api(&self, api: Arc<dyn PlayerApi>) {
        self.lock().api = Some(api);
    }

    pub fn set_fullscreen(&self, probe: FullscreenProbe, target: Option<NodeId>) {
        let mut model = self.lock();
        match target {
            Some(node) => {
                model.fullscreen.insert(probe, node);
            }
            None => {
                model.fullscreen.remove(&probe);
            }
        }
    }

    /// Dispatches a named page event to matching subscribers.
    pub fn emit_page_event(&self, name: &str) {
        let event = match name {
            "fullscreenchange" | "webkitfullscreenchange" | "mozfullscreenchange"
            | "MSFullscreenChange" => PageEvent::FullscreenChange,
            other => {
                tracing::debug!(name = other, "dropping unknown page event");
                return;
            }
        };
        let mut model = self.lock();
        model
            .taps
            .retain(|tap| !tap.names.iter().any(|n| n == name) || tap.tx.send(event).is_ok());
    }

    #[must_use]
    pub fn node_snapshot(&self, node: NodeId) -> Option<NodeSnapshot> {
        self.lock()
            .nodes
            .get(&node)
            .map(|model| model.lock().snapshot.clone())
    }
}

impl HostPage for SimPage {
    fn frame_src(&self, frame: NodeId) -> Option<String> {
        self.src_of(frame)
    }

    fn set_frame_src(&self, frame: NodeId, src: &str) {
        let mut model = self.lock();
        if let Some(entry) = model.frames.get_mut(&frame) {
            entry.src = src.to_owned();
            entry.src_writes = entry.src_writes.saturating_add(1);
        }
    }

    fn create_overlay_node(&self, frame: NodeId) -> AppResult<Arc<dyn OverlayNode>> {
        let mut model = self.lock();
        if !model.frames.contains_key(&frame) {
            return Err(Error::Host(format!("frame {frame} does not exist")));
        }
        let id = Self::allocate_id(&mut model);
        let node = Arc::new(NodeModel {
            id,
            log: Mutex::new(NodeLog::default()),
        });
        model.nodes.insert(id, Arc::clone(&node));
        if let Some(parent) = model.parents.get(&frame).copied() {
            model.parents.insert(id, parent);
        }
        Ok(Arc::new(SimNode { model: node }))
    }

    fn script_present(&self, fragment: &str) -> bool {
        self.lock()
            .scripts
            .iter()
            .any(|src| src.contains(fragment))
    }

    fn inject_script(&self, url: &str) {
        let mut model = self.lock();
        model.scripts.push(url.to_owned());
        model.injected.push(url.to_owned());
    }

    fn install_styles(&self, style_id: &str, css: &str) {
        self.lock().styles.push(StyleSheet {
            id: style_id.to_owned(),
            css: css.to_owned(),
        });
    }

    fn player_api(&self) -> Option<Arc<dyn PlayerApi>> {
        self.lock().api.clone()
    }

    fn fullscreen_element(&self, probe: FullscreenProbe) -> Option<NodeId> {
        self.lock().fullscreen.get(&probe).copied()
    }

    fn contains(&self, container: NodeId, node: NodeId) -> bool {
        let model = self.lock();
        let mut current = node;
        loop {
            if current == container {
                return true;
            }
            match model.parents.get(&current) {
                Some(parent) => current = *parent,
                None => return false,
            }
        }
    }

    fn page_events(&self, names: &[&str]) -> mpsc::UnboundedReceiver<PageEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().taps.push(EventTap {
            names: names.iter().map(|name| (*name).to_owned()).collect(),
            tx,
        });
        rx
    }
}

struct PlayerModel {
    state: Mutex<PlayerShared>,
}

struct PlayerShared {
    position: f64,
    video_id: Option<String>,
    frame_rect: FrameRect,
    taps: Vec<mpsc::UnboundedSender<PlayerEvent>>,
}

/// A player double driven entirely by the test or scenario script.
#[derive(Clone)]
pub struct ScriptedPlayer {
    model: Arc<PlayerModel>,
}

impl Default for ScriptedPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPlayer {
    /// Starts at position zero with a 640x360 frame at the page origin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: Arc::new(PlayerModel {
                state: Mutex::new(PlayerShared {
                    position: 0.0,
                    video_id: None,
                    frame_rect: FrameRect {
                        x: 0.0,
                        y: 0.0,
                        width: 640.0,
                        height: 360.0,
                    },
                    taps: Vec::new(),
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlayerShared> {
        self.model
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_position(&self, seconds: f64) {
        self.lock().position = seconds;
    }

    pub fn set_video_id(&self, video_id: Option<&str>) {
        self.lock().video_id = video_id.map(ToOwned::to_owned);
    }

    pub fn set_frame_rect(&self, rect: FrameRect) {
        self.lock().frame_rect = rect;
    }

    pub fn emit(&self, event: PlayerEvent) {
        self.lock().taps.retain(|tap| tap.send(event).is_ok());
    }

    pub fn emit_ready(&self) {
        self.emit(PlayerEvent::Ready);
    }

    pub fn emit_phase(&self, phase: PlaybackPhase) {
        self.emit(PlayerEvent::PhaseChange(phase));
    }
}

impl BoundPlayer for ScriptedPlayer {
    fn position_secs(&self) -> f64 {
        self.lock().position
    }

    fn video_id(&self) -> Option<String> {
        self.lock().video_id.clone()
    }

    fn frame(&self) -> FrameRect {
        self.lock().frame_rect
    }

    fn events(&self) -> mpsc::UnboundedReceiver<PlayerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().taps.push(tx);
        rx
    }
}

#[derive(Default)]
struct ApiModel {
    players: HashMap<NodeId, ScriptedPlayer>,
    bind_counts: HashMap<NodeId, u32>,
}

/// Player API double: hands out pre-registered [`ScriptedPlayer`]s.
#[derive(Default)]
pub struct SimPlayerApi {
    model: Mutex<ApiModel>,
}

impl SimPlayerApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ApiModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_player(&self, frame: NodeId, player: ScriptedPlayer) {
        self.lock().players.insert(frame, player);
    }

    #[must_use]
    pub fn bind_count(&self, frame: NodeId) -> u32 {
        self.lock().bind_counts.get(&frame).copied().unwrap_or(0)
    }
}

impl PlayerApi for SimPlayerApi {
    fn bind(&self, frame: NodeId) -> AppResult<Arc<dyn BoundPlayer>> {
        let mut model = self.lock();
        let player = model
            .players
            .get(&frame)
            .cloned()
            .ok_or_else(|| Error::PlayerBind(format!("no scripted player for frame {frame}")))?;
        let count = model.bind_counts.entry(frame).or_insert(0);
        *count = count.saturating_add(1);
        Ok(Arc::new(player))
    }
}
