//! Caption overlay engine for embedded third-party video players.
//!
//! capsync keeps externally loaded captions in sync with a video playing
//! inside a page-controlled frame. While the video plays it polls the
//! player position, resolves the caption through an interval-bucketed cue
//! index and drives an absolutely positioned caption node over the frame,
//! including fullscreen handling across vendor prefixes. The page, the
//! caption node and the player are capability traits, so the engine runs
//! against a real browser bridge or the bundled in-process simulator
//! alike.
pub mod bridge;
pub mod config;
pub mod embed;
pub mod engine;
pub mod error;
pub mod host;
pub mod logger;
pub mod overlay;
pub mod registry;
pub mod render;
pub mod schedule;
pub mod sim;

mod coordinator;
