//! Caption rendering and placement.
//!
//! Rendering is split in two: pure layout math (class list, line
//! splitting, padding, position) lives in free functions, and
//! [`CaptionRenderer`] drives an [`OverlayNode`] with them. Hosts with
//! unusual styling needs swap in their own [`RenderStrategy`]; everything
//! else in the engine stays unchanged.

use crate::config::LayoutTuning;
use crate::host::{BoundPlayer, FrameRect, MeasureStyle, OverlayNode, Point, Size};
use crate::overlay::OverlayState;

/// Base class carried by every caption node.
pub const OVERLAY_CLASS: &str = "capsync-overlay";
/// Added when the node's own player is fullscreen.
pub const FULLSCREEN_CLASS: &str = "fullscreen";
/// Added when some other player is fullscreen.
pub const FULLSCREEN_IGNORE_CLASS: &str = "fullscreen-ignore";
/// Element id of the injected stylesheet.
pub const STYLE_ID: &str = "capsync-style";

/// Default caption stylesheet. The base class keeps the node hidden until
/// a render reveals it; `fullscreen-ignore` wins over everything.
pub const DEFAULT_CSS: &str = "\
.capsync-overlay { position: absolute; display: none; z-index: 0; pointer-events: none; color: #fff; font-family: Arial, Helvetica, sans-serif; font-weight: normal; font-size: 17px; text-align: center; }\n\
.capsync-overlay span { background: #000; background: rgba(0, 0, 0, 0.9); padding: 1px 4px; display: inline-block; margin-bottom: 2px; }\n\
.capsync-overlay.fullscreen-ignore { display: none !important; }\n\
.capsync-overlay.fullscreen { z-index: 3000000000; }\n";

/// How overlay state becomes pixels on the host page.
pub trait RenderStrategy: Send + Sync {
    fn render(
        &self,
        node: &dyn OverlayNode,
        player: Option<&dyn BoundPlayer>,
        state: &OverlayState,
        layout: &LayoutTuning,
    );
}

/// Default renderer. Text and classes are applied unconditionally; geometry
/// needs a bound player and runs as a hidden measure followed by a place.
#[derive(Debug, Default)]
pub struct CaptionRenderer;

impl RenderStrategy for CaptionRenderer {
    fn render(
        &self,
        node: &dyn OverlayNode,
        player: Option<&dyn BoundPlayer>,
        state: &OverlayState,
        layout: &LayoutTuning,
    ) {
        node.set_class_name(&class_list(state.fullscreen));
        node.set_lines(&split_lines(state.text.as_deref().unwrap_or_default()));
        node.set_visible(state.text.is_some());

        if let Some(player) = player {
            let frame = player.frame();
            let content = node.measure(measure_style(frame, layout));
            node.place(caption_position(frame, content, state.controls_visible, layout));
        }
    }
}

#[must_use]
pub fn class_list(fullscreen: Option<bool>) -> String {
    match fullscreen {
        None => OVERLAY_CLASS.to_owned(),
        Some(true) => format!("{OVERLAY_CLASS} {FULLSCREEN_CLASS}"),
        Some(false) => format!("{OVERLAY_CLASS} {FULLSCREEN_IGNORE_CLASS}"),
    }
}

/// Splits caption text on `\r\n`, `\n` or `\r`. Every line becomes its own
/// box, empty lines included; empty text yields one empty line.
#[must_use]
pub fn split_lines(text: &str) -> Vec<String> {
    text.split("\r\n")
        .flat_map(|chunk| chunk.split(['\r', '\n']))
        .map(ToOwned::to_owned)
        .collect()
}

#[must_use]
pub fn measure_style(frame: FrameRect, layout: &LayoutTuning) -> MeasureStyle {
    MeasureStyle {
        origin: Point {
            x: frame.x,
            y: frame.y,
        },
        max_width: frame.width - layout.horizontal_margin,
        font_scale: frame.height / layout.font_scale_divisor,
    }
}

/// Compact embeds tuck the caption closer to the bottom edge, but only
/// while the player controls are hidden.
#[must_use]
pub fn bottom_padding(frame_height: f64, controls_visible: bool, layout: &LayoutTuning) -> f64 {
    if frame_height < layout.short_frame_height && !controls_visible {
        layout.short_frame_padding
    } else {
        layout.bottom_padding
    }
}

/// Final caption position: horizontally centered, resting on the bottom
/// padding line. Pure in frame geometry and content size, so repeating a
/// render with unchanged inputs lands on the same spot.
#[must_use]
pub fn caption_position(
    frame: FrameRect,
    content: Size,
    controls_visible: bool,
    layout: &LayoutTuning,
) -> Point {
    let padding = bottom_padding(frame.height, controls_visible, layout);
    Point {
        x: frame.x + (frame.width - content.width) / 2.0,
        y: frame.y + frame.height - padding - content.height,
    }
}
