//! Fullscreen change handling.
//!
//! One task per engine listens for the page's fullscreen events, resolves
//! which node is fullscreen through the vendor probe chain and broadcasts
//! the outcome to every registered overlay: `Some(true)` to the overlay
//! owning the fullscreen target, `Some(false)` to the rest, `None` to all
//! of them once fullscreen ends.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;

use crate::host::{FULLSCREEN_PROBES, HostPage, NodeId, PageEvent};
use crate::overlay::Overlay;
use crate::registry::OverlayRegistry;

pub(crate) async fn run(
    host: Arc<dyn HostPage>,
    registry: Weak<OverlayRegistry>,
    mut events: mpsc::UnboundedReceiver<PageEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            PageEvent::FullscreenChange => {
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                apply_fullscreen_change(host.as_ref(), &registry);
            }
        }
    }
    tracing::debug!("fullscreen coordinator stopped");
}

/// The page's fullscreen node, if any, via the first probe that answers.
pub(crate) fn fullscreen_target(host: &dyn HostPage) -> Option<NodeId> {
    FULLSCREEN_PROBES
        .iter()
        .find_map(|probe| host.fullscreen_element(*probe))
}

/// Recomputes and broadcasts the fullscreen flag of every overlay.
pub(crate) fn apply_fullscreen_change(host: &dyn HostPage, registry: &OverlayRegistry) {
    let target = fullscreen_target(host);
    let owner = target.and_then(|node| owning_overlay(registry, node));
    tracing::debug!(
        target = ?target,
        owner = ?owner.as_ref().map(Overlay::frame_id),
        "fullscreen change"
    );
    for overlay in registry.snapshot() {
        let active = target.map(|_| {
            owner
                .as_ref()
                .is_some_and(|owned| owned.same_as(&overlay))
        });
        overlay.set_fullscreen_active(active);
    }
}

/// The overlay owning a fullscreen target: a direct frame or caption-node
/// hit first, otherwise the first registered overlay sitting inside the
/// target.
fn owning_overlay(registry: &OverlayRegistry, target: NodeId) -> Option<Overlay> {
    registry
        .by_frame(target)
        .or_else(|| registry.by_node(target))
        .or_else(|| {
            registry
                .snapshot()
                .into_iter()
                .find(|overlay| overlay.is_inside(target))
        })
}
