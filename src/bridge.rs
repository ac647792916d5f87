//! Lazy acquisition of the vendor player API.
//!
//! The API object shows up on the page only after the vendor script loads,
//! and the script itself is injected on demand. The bridge funnels every
//! overlay through one shared acquisition: the first caller triggers the
//! injection and a background probe, later callers piggyback on the same
//! watch channel, and once the API is seen it is handed out synchronously
//! forever after.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::error::{AppResult, Error};
use crate::host::{HostPage, PlayerApi};

type ApiSlot = Option<Arc<dyn PlayerApi>>;

#[derive(Clone)]
pub struct PlayerBridge {
    shared: Arc<BridgeShared>,
}

struct BridgeShared {
    host: Arc<dyn HostPage>,
    script_url: String,
    script_fragment: String,
    probe_interval: Duration,
    slot: Mutex<Slot>,
}

enum Slot {
    /// No acquisition attempted yet.
    Idle,
    /// Script injected (if it was missing) and the probe task is running.
    Waiting(watch::Receiver<ApiSlot>),
    Ready(Arc<dyn PlayerApi>),
}

impl PlayerBridge {
    #[must_use]
    pub fn new(host: Arc<dyn HostPage>, config: &Config) -> Self {
        Self {
            shared: Arc::new(BridgeShared {
                host,
                script_url: config.script_url.clone(),
                script_fragment: config.script_fragment.clone(),
                probe_interval: config.api_poll_interval(),
                slot: Mutex::new(Slot::Idle),
            }),
        }
    }

    /// Resolves the player API, injecting the vendor script and polling the
    /// page until it appears. There is no timeout; the future hangs as long
    /// as the page never produces an API.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] when the probe stops while callers are still
    /// waiting, which only happens if the bridge itself is dropped.
    pub async fn acquire(&self) -> AppResult<Arc<dyn PlayerApi>> {
        let mut pending = {
            let mut slot = self.shared.lock_slot();
            match &*slot {
                Slot::Ready(api) => return Ok(Arc::clone(api)),
                Slot::Waiting(rx) => rx.clone(),
                Slot::Idle => {
                    if let Some(api) = self.shared.host.player_api() {
                        *slot = Slot::Ready(Arc::clone(&api));
                        return Ok(api);
                    }
                    if !self.shared.host.script_present(&self.shared.script_fragment) {
                        tracing::debug!(url = %self.shared.script_url, "injecting player api script");
                        self.shared.host.inject_script(&self.shared.script_url);
                    }
                    let (tx, rx) = watch::channel(None);
                    tokio::spawn(probe_for_api(Arc::downgrade(&self.shared), tx));
                    *slot = Slot::Waiting(rx.clone());
                    rx
                }
            }
        };

        let found = pending
            .wait_for(Option::is_some)
            .await
            .map_err(|_closed| Error::Host("player api probe stopped".to_owned()))?;
        found
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| Error::Host("player api probe stopped".to_owned()))
    }
}

impl BridgeShared {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Checks the page for the API on every tick until it appears or the
/// bridge goes away.
async fn probe_for_api(shared: Weak<BridgeShared>, tx: watch::Sender<ApiSlot>) {
    let period = match shared.upgrade() {
        Some(strong) => strong.probe_interval,
        None => return,
    };
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(strong) = shared.upgrade() else {
            return;
        };
        if let Some(api) = strong.host.player_api() {
            *strong.lock_slot() = Slot::Ready(Arc::clone(&api));
            if tx.send(Some(api)).is_err() {
                tracing::debug!("player api arrived with no overlay waiting");
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::future::join_all;

    use super::*;
    use crate::sim::{SimPage, SimPlayerApi, settle};

    fn bridge_over(page: &SimPage) -> PlayerBridge {
        PlayerBridge::new(page.host(), &Config::default())
    }

    #[tokio::test(start_paused = true)]
    async fn preinstalled_api_resolves_without_injection() -> Result<(), String> {
        let page = SimPage::new();
        page.install_player_api(Arc::new(SimPlayerApi::new()));
        let bridge = bridge_over(&page);

        bridge.acquire().await.map_err(|err| err.to_string())?;
        assert_eq!(page.injected_scripts(), Vec::<String>::new());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn script_is_injected_once_for_concurrent_callers() -> Result<(), String> {
        let page = SimPage::new();
        let bridge = bridge_over(&page);

        let first = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.acquire().await }
        });
        let second = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.acquire().await }
        });
        settle().await;

        assert_eq!(
            page.injected_scripts(),
            vec!["https://www.youtube.com/iframe_api".to_owned()]
        );

        page.install_player_api(Arc::new(SimPlayerApi::new()));
        tokio::time::advance(Duration::from_millis(100)).await;

        for handle in join_all([first, second]).await {
            handle
                .map_err(|err| err.to_string())?
                .map_err(|err| err.to_string())?;
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn present_script_is_not_injected_again() -> Result<(), String> {
        let page = SimPage::new();
        page.add_script("https://static.example/loader?youtube.com/iframe_api&v=2");
        let bridge = bridge_over(&page);

        let waiter = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.acquire().await }
        });
        settle().await;
        assert_eq!(page.injected_scripts(), Vec::<String>::new());

        page.install_player_api(Arc::new(SimPlayerApi::new()));
        tokio::time::advance(Duration::from_millis(100)).await;
        waiter
            .await
            .map_err(|err| err.to_string())?
            .map_err(|err| err.to_string())?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn api_found_by_probe_is_cached_for_later_callers() -> Result<(), String> {
        let page = SimPage::new();
        let bridge = bridge_over(&page);

        let waiter = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.acquire().await }
        });
        settle().await;
        page.install_player_api(Arc::new(SimPlayerApi::new()));
        tokio::time::advance(Duration::from_millis(100)).await;
        let first = waiter
            .await
            .map_err(|err| err.to_string())?
            .map_err(|err| err.to_string())?;

        // Second acquire resolves synchronously from the cached slot.
        let second = bridge.acquire().await.map_err(|err| err.to_string())?;
        assert!(Arc::ptr_eq(&first, &second));
        Ok(())
    }
}
