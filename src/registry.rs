//! Bookkeeping for attached overlays.
//!
//! One registry per engine. It answers three questions: is a frame already
//! claimed, which overlay owns a given caption node, and what is the full
//! set of overlays in attachment order. Overlay handles are stored here
//! instead of tagging host nodes with back-pointers, so the host page
//! never carries engine state.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{AppResult, Error};
use crate::host::NodeId;
use crate::overlay::Overlay;

#[derive(Debug, Default)]
pub struct OverlayRegistry {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    order: Vec<Overlay>,
    by_frame: HashMap<NodeId, Overlay>,
    by_node: HashMap<NodeId, Overlay>,
}

impl OverlayRegistry {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn frame_in_use(&self, frame: NodeId) -> bool {
        self.lock().by_frame.contains_key(&frame)
    }

    /// Claims the overlay's frame and node atomically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateAttachment`] when the frame already has an
    /// overlay, leaving the registry untouched.
    pub(crate) fn register(&self, overlay: &Overlay) -> AppResult<()> {
        let frame = overlay.frame_id();
        let mut tables = self.lock();
        if tables.by_frame.contains_key(&frame) {
            return Err(Error::DuplicateAttachment { frame });
        }
        tables.by_frame.insert(frame, overlay.clone());
        tables.by_node.insert(overlay.node_id(), overlay.clone());
        tables.order.push(overlay.clone());
        Ok(())
    }

    /// Removes the overlay's entries. Identity-checked so an overlay that
    /// lost an attach race cannot evict the one holding the frame.
    pub(crate) fn unregister(&self, overlay: &Overlay) {
        let mut tables = self.lock();
        let frame = overlay.frame_id();
        if tables
            .by_frame
            .get(&frame)
            .is_some_and(|entry| entry.same_as(overlay))
        {
            tables.by_frame.remove(&frame);
        }
        let node = overlay.node_id();
        if tables
            .by_node
            .get(&node)
            .is_some_and(|entry| entry.same_as(overlay))
        {
            tables.by_node.remove(&node);
        }
        tables.order.retain(|entry| !entry.same_as(overlay));
    }

    /// All overlays in attachment order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Overlay> {
        self.lock().order.clone()
    }

    /// The overlay attached to `frame`, if any.
    #[must_use]
    pub fn by_frame(&self, frame: NodeId) -> Option<Overlay> {
        self.lock().by_frame.get(&frame).cloned()
    }

    /// The overlay whose caption node is `node`, if any.
    #[must_use]
    pub fn by_node(&self, node: NodeId) -> Option<Overlay> {
        self.lock().by_node.get(&node).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().order.is_empty()
    }
}
