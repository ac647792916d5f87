//! Capability traits for the page hosting the player.
//!
//! The engine never touches a real DOM or a vendor player SDK. Everything
//! it needs from its surroundings goes through the traits here: a
//! [`HostPage`] for frame, script and fullscreen queries, an
//! [`OverlayNode`] for the caption box itself and a [`PlayerApi`] /
//! [`BoundPlayer`] pair for playback access. Browser hosts, native shells
//! and the bundled simulator all plug in the same way.
//!
//! Trait methods are synchronous; anything event-shaped is delivered
//! through a channel receiver handed out once at subscription time.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::AppResult;

/// Opaque host-assigned node identity.
pub type NodeId = u64;

/// Position and size of a frame in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Vendor-prefixed ways of asking the page for its fullscreen element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FullscreenProbe {
    Standard,
    Webkit,
    WebkitCurrent,
    Moz,
    Ms,
}

/// Probe order when resolving the fullscreen element. The first probe that
/// yields a node wins.
pub const FULLSCREEN_PROBES: [FullscreenProbe; 5] = [
    FullscreenProbe::Standard,
    FullscreenProbe::Webkit,
    FullscreenProbe::WebkitCurrent,
    FullscreenProbe::Moz,
    FullscreenProbe::Ms,
];

/// Page event names the engine subscribes to, vendor prefixes included.
pub const FULLSCREEN_EVENTS: [&str; 4] = [
    "fullscreenchange",
    "webkitfullscreenchange",
    "mozfullscreenchange",
    "MSFullscreenChange",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    FullscreenChange,
}

/// Playback phases reported by the bound player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Playing,
    Paused,
    Ended,
    Buffering,
    Cued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The player finished initializing and can be queried.
    Ready,
    PhaseChange(PlaybackPhase),
}

/// Constraints an overlay node applies before measuring its content. The
/// node stays invisible, parked at `origin`, while the measurement runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasureStyle {
    pub origin: Point,
    pub max_width: f64,
    /// Font size in em relative to the page base size.
    pub font_scale: f64,
}

/// The page surrounding the embedded players.
pub trait HostPage: Send + Sync {
    /// Current src of a frame, or `None` when the node is not a frame.
    fn frame_src(&self, frame: NodeId) -> Option<String>;

    fn set_frame_src(&self, frame: NodeId, src: &str);

    /// Creates an empty caption node as the next sibling of `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Host`] when the frame is gone or the
    /// page refuses the insertion.
    fn create_overlay_node(&self, frame: NodeId) -> AppResult<Arc<dyn OverlayNode>>;

    /// Whether a script whose src contains `fragment` is already on the page.
    fn script_present(&self, fragment: &str) -> bool;

    fn inject_script(&self, url: &str);

    /// Installs the caption stylesheet under `style_id`. Called at most once
    /// per engine.
    fn install_styles(&self, style_id: &str, css: &str);

    /// The player API object, once the vendor script has populated it.
    fn player_api(&self) -> Option<Arc<dyn PlayerApi>>;

    fn fullscreen_element(&self, probe: FullscreenProbe) -> Option<NodeId>;

    /// Inclusive containment: a node contains itself.
    fn contains(&self, container: NodeId, node: NodeId) -> bool;

    /// Subscribes to the page events named in `names`.
    fn page_events(&self, names: &[&str]) -> mpsc::UnboundedReceiver<PageEvent>;
}

/// The caption box sitting next to a frame.
pub trait OverlayNode: Send + Sync {
    fn node_id(&self) -> NodeId;

    /// Replaces the full class list.
    fn set_class_name(&self, class_name: &str);

    /// Replaces the caption content, one box per line.
    fn set_lines(&self, lines: &[String]);

    fn set_visible(&self, visible: bool);

    /// Applies `style`, measures the resulting content and reports its size.
    /// The node must not become visible during the measurement.
    fn measure(&self, style: MeasureStyle) -> Size;

    /// Moves the node to its final position and reveals it.
    fn place(&self, position: Point);

    /// Removes the node from the page.
    fn detach(&self);
}

/// Entry point of the vendor player script.
pub trait PlayerApi: Send + Sync {
    /// Binds a player instance to the given frame.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::PlayerBind`] when the frame cannot be
    /// controlled.
    fn bind(&self, frame: NodeId) -> AppResult<Arc<dyn BoundPlayer>>;
}

/// A player bound to one frame.
pub trait BoundPlayer: Send + Sync {
    /// Current playback position in seconds.
    fn position_secs(&self) -> f64;

    /// Identity of the loaded video, if one is loaded.
    fn video_id(&self) -> Option<String>;

    /// Current geometry of the player frame.
    fn frame(&self) -> FrameRect;

    /// Subscribes to readiness and phase changes.
    fn events(&self) -> mpsc::UnboundedReceiver<PlayerEvent>;
}
