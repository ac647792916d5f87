//! Page-level engine.
//!
//! One [`Engine`] per page. It owns the shared pieces every overlay needs:
//! the host capability handle, the player bridge, the overlay registry and
//! the render strategy, plus the background task reacting to fullscreen
//! changes. Hosts construct it explicitly and pass it around; nothing in
//! this crate lives in a global.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

use crate::bridge::PlayerBridge;
use crate::config::Config;
use crate::coordinator;
use crate::embed::normalize_embed_src;
use crate::error::{AppResult, Error};
use crate::host::{FULLSCREEN_EVENTS, HostPage, NodeId};
use crate::overlay::{Overlay, OverlayParts};
use crate::registry::OverlayRegistry;
use crate::render::{CaptionRenderer, DEFAULT_CSS, RenderStrategy, STYLE_ID};
use crate::schedule::Cue;

pub struct Engine {
    shared: Arc<EngineShared>,
    coordinator: JoinHandle<()>,
}

struct EngineShared {
    host: Arc<dyn HostPage>,
    config: Arc<Config>,
    bridge: PlayerBridge,
    registry: Arc<OverlayRegistry>,
    renderer: Arc<dyn RenderStrategy>,
    styles_installed: AtomicBool,
}

impl Engine {
    /// Builds an engine with the default caption renderer.
    ///
    /// Must be called inside a Tokio runtime; the fullscreen coordinator
    /// task is spawned here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `config` fails validation.
    pub fn new(host: Arc<dyn HostPage>, config: Config) -> AppResult<Self> {
        Self::with_renderer(host, config, Arc::new(CaptionRenderer))
    }

    /// Same as [`Engine::new`] with a caller-provided render strategy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `config` fails validation.
    pub fn with_renderer(
        host: Arc<dyn HostPage>,
        config: Config,
        renderer: Arc<dyn RenderStrategy>,
    ) -> AppResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let bridge = PlayerBridge::new(Arc::clone(&host), &config);
        let registry = Arc::new(OverlayRegistry::default());
        let events = host.page_events(&FULLSCREEN_EVENTS);
        let coordinator = tokio::spawn(coordinator::run(
            Arc::clone(&host),
            Arc::downgrade(&registry),
            events,
        ));
        Ok(Self {
            shared: Arc::new(EngineShared {
                host,
                config,
                bridge,
                registry,
                renderer,
                styles_installed: AtomicBool::new(false),
            }),
            coordinator,
        })
    }

    /// Attaches a caption overlay to a player frame.
    ///
    /// Normalizes the frame src so the player exposes its JS API, installs
    /// the caption stylesheet on first use, creates the caption node,
    /// registers the overlay and starts its driver. The driver acquires
    /// the player API in the background; captions begin flowing once the
    /// player reports readiness and playback.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateAttachment`] when the frame already has an
    /// overlay and [`Error::Host`] when the frame is unknown to the page.
    pub fn attach(&self, frame: NodeId, cues: Vec<Cue>) -> AppResult<Overlay> {
        let shared = &self.shared;
        if shared.registry.frame_in_use(frame) {
            return Err(Error::DuplicateAttachment { frame });
        }

        let src = shared
            .host
            .frame_src(frame)
            .ok_or_else(|| Error::Host(format!("frame {frame} has no src")))?;
        let normalized = normalize_embed_src(&src);
        if normalized != src {
            shared.host.set_frame_src(frame, &normalized);
        }

        if !shared.styles_installed.swap(true, Ordering::SeqCst) {
            shared.host.install_styles(STYLE_ID, DEFAULT_CSS);
        }

        let node = shared.host.create_overlay_node(frame)?;
        let overlay = Overlay::new(OverlayParts {
            frame,
            node,
            host: Arc::clone(&shared.host),
            config: Arc::clone(&shared.config),
            renderer: Arc::clone(&shared.renderer),
            registry: Arc::downgrade(&shared.registry),
            cues,
        });
        overlay.render_now();

        if let Err(err) = shared.registry.register(&overlay) {
            // Lost an attach race on the same frame after the pre-check.
            overlay.destroy();
            return Err(err);
        }

        overlay.spawn_driver(shared.bridge.clone());
        tracing::info!(frame, "overlay attached");
        Ok(overlay)
    }

    /// All live overlays in attachment order.
    #[must_use]
    pub fn overlays(&self) -> Vec<Overlay> {
        self.shared.registry.snapshot()
    }

    /// The overlay attached to `frame`, if any.
    #[must_use]
    pub fn overlay_for_frame(&self, frame: NodeId) -> Option<Overlay> {
        self.shared.registry.by_frame(frame)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.coordinator.abort();
    }
}
