//! Timer and event loop behind one overlay.
//!
//! The driver owns the two timers the overlay needs: the caption poll
//! interval while the video plays and the one-shot controls-hide deadline.
//! It is the only task that touches them, so starting and stopping is a
//! plain local variable swap. State changes themselves happen inside
//! [`OverlayInner`] under its runtime lock.

use std::sync::Arc;

use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::{OverlayInner, TimerChange};
use crate::bridge::PlayerBridge;
use crate::host::BoundPlayer;

pub(super) async fn run(inner: Arc<OverlayInner>, bridge: PlayerBridge) {
    let api = match bridge.acquire().await {
        Ok(api) => api,
        Err(err) => {
            tracing::warn!(frame = inner.frame_id(), %err, "player api unavailable");
            return;
        }
    };
    let player: Arc<dyn BoundPlayer> = match api.bind(inner.frame_id()) {
        Ok(player) => player,
        Err(err) => {
            tracing::warn!(frame = inner.frame_id(), %err, "player bind failed");
            return;
        }
    };

    let mut events = player.events();
    inner.adopt_player(Arc::clone(&player));
    tracing::debug!(frame = inner.frame_id(), "player bound");

    let poll_period = inner.config().poll_interval();
    let controls_delay = inner.config().controls_hide_delay();

    let mut poll: Option<Interval> = None;
    let controls_deadline = tokio::time::sleep(std::time::Duration::ZERO);
    tokio::pin!(controls_deadline);
    let mut controls_armed = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match inner.on_player_event(&event) {
                    Some(TimerChange::StartPolling) => {
                        poll = Some(poll_interval(poll_period));
                        controls_deadline.as_mut().reset(Instant::now() + controls_delay);
                        controls_armed = true;
                    }
                    Some(TimerChange::StopPolling) => {
                        poll = None;
                        controls_armed = false;
                    }
                    None => {}
                }
            }
            () = next_poll_tick(poll.as_mut()) => {
                inner.poll_time();
            }
            () = controls_deadline.as_mut(), if controls_armed => {
                controls_armed = false;
                inner.controls_hidden();
            }
        }
    }

    tracing::debug!(frame = inner.frame_id(), "player event stream closed");
}

/// First tick lands one full period after (re)start; the immediate caption
/// refresh on play already covered "now".
fn poll_interval(period: std::time::Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn next_poll_tick(poll: Option<&mut Interval>) {
    match poll {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
