//! Dirty tracking and periodic persistence of player profiles.
//!
//! Gameplay marks profiles dirty (usually indirectly, through the profile
//! events this scheduler watches) and the scheduler writes them out in
//! batches: on a timer, on demand, and one final blocking sweep at shutdown.
//! A dirty flag is only cleared once the store confirms the save, so a
//! failed write is retried on the next cycle instead of being lost.
//!
//! Each dirty mark carries a generation number. A profile that changes again
//! while its save is in flight keeps its flag, because the flushed snapshot
//! predates the newer change.

use crate::players::{PersistError, PlayerRegistry, PlayerStore};
use dashmap::DashMap;
use futures::future::join_all;
use herald_events::{
    ChannelMembershipChangedEvent, EventBus, MuteStateChangedEvent, NicknameChangedEvent,
    PlayerId, PlayerJoinedEvent,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default wall-clock gap between periodic flushes.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(300);

/// What a flush accomplished.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Profiles confirmed written
    pub saved: Vec<PlayerId>,
    /// Profiles whose save failed; they remain dirty
    pub failed: Vec<(PlayerId, PersistError)>,
}

impl FlushReport {
    /// Returns `true` if nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Batches profile saves behind a dirty set.
pub struct SaveScheduler {
    players: Arc<PlayerRegistry>,
    store: Arc<dyn PlayerStore>,
    dirty: DashMap<PlayerId, u64>,
    generation: AtomicU64,
    running: AtomicBool,
    stop_signal: Notify,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SaveScheduler {
    /// Creates a scheduler. Nothing runs until
    /// [`run_periodic`](Self::run_periodic) or an explicit flush.
    pub fn new(players: Arc<PlayerRegistry>, store: Arc<dyn PlayerStore>) -> Arc<Self> {
        Arc::new(Self {
            players,
            store,
            dirty: DashMap::new(),
            generation: AtomicU64::new(1),
            running: AtomicBool::new(false),
            stop_signal: Notify::new(),
            task: Mutex::new(None),
        })
    }

    /// Subscribes to the profile events and marks the affected player dirty
    /// for each one.
    ///
    /// Remote-origin events count too: a profile change applied here from
    /// another server still has to reach storage from here.
    pub fn watch(self: &Arc<Self>, events: &EventBus) {
        let scheduler = self.clone();
        events.subscribe::<PlayerJoinedEvent, _>(move |event| {
            scheduler.mark_dirty(event.player_id);
            Ok(())
        });

        let scheduler = self.clone();
        events.subscribe::<NicknameChangedEvent, _>(move |event| {
            scheduler.mark_dirty(event.player_id);
            Ok(())
        });

        let scheduler = self.clone();
        events.subscribe::<MuteStateChangedEvent, _>(move |event| {
            scheduler.mark_dirty(event.player_id);
            Ok(())
        });

        let scheduler = self.clone();
        events.subscribe::<ChannelMembershipChangedEvent, _>(move |event| {
            scheduler.mark_dirty(event.player_id);
            Ok(())
        });
    }

    /// Flags a profile for the next flush.
    pub fn mark_dirty(&self, player: PlayerId) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        self.dirty.insert(player, generation);
    }

    /// Number of profiles awaiting a save.
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Saves every currently-dirty profile, in parallel, and reports the
    /// result. Profiles marked dirty after the flush begins are left for the
    /// next one.
    pub async fn flush_now(&self) -> FlushReport {
        let snapshot: Vec<(PlayerId, u64)> = self
            .dirty
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        if snapshot.is_empty() {
            return FlushReport::default();
        }

        let mut saves = Vec::new();
        for (player, generation) in snapshot {
            match self.players.get(player) {
                Some(record) => {
                    let store = self.store.clone();
                    saves.push(async move { (player, generation, store.save(&record).await) });
                }
                None => {
                    // Profile unloaded since it was marked; the caller that
                    // unloaded it got the final record to persist.
                    self.dirty.remove_if(&player, |_, g| *g == generation);
                }
            }
        }

        let mut report = FlushReport::default();
        for (player, generation, result) in join_all(saves).await {
            match result {
                Ok(()) => {
                    // Clear the flag only if no newer mark landed mid-save.
                    self.dirty.remove_if(&player, |_, g| *g == generation);
                    report.saved.push(player);
                }
                Err(e) => {
                    error!("Failed to save profile for {}: {}", player, e);
                    report.failed.push((player, e));
                }
            }
        }

        if !report.saved.is_empty() {
            debug!("Flushed {} player profiles", report.saved.len());
        }
        report
    }

    /// Starts the background flush loop. Calling this while a loop is
    /// already running is a no-op.
    pub fn run_periodic(self: &Arc<Self>, every: Duration) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Save scheduler is already running");
            return;
        }

        info!("Saving dirty player profiles every {:?}", every);
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick of an interval completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = scheduler.stop_signal.notified() => break,
                }
                if !scheduler.running.load(Ordering::SeqCst) {
                    break;
                }
                let report = scheduler.flush_now().await;
                if !report.is_clean() {
                    warn!(
                        "{} profile saves failed; they stay dirty for the next cycle",
                        report.failed.len()
                    );
                }
            }
            debug!("Periodic save task exited");
        });
        *self.task.lock().expect("save task lock poisoned") = Some(handle);
    }

    /// Stops the periodic loop. A flush already in progress runs to
    /// completion; no new cycles start.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // notify_one stores a permit, so a task that is mid-flush rather
        // than waiting on the select still sees the stop.
        self.stop_signal.notify_one();
    }

    /// Final sweep for shutdown: stops the loop, waits for it to wind down,
    /// then flushes everything dirty and blocks until every save has
    /// completed.
    pub async fn flush_on_shutdown(&self) -> FlushReport {
        self.stop();
        let task = self.task.lock().expect("save task lock poisoned").take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Periodic save task failed: {}", e);
            }
        }

        let pending = self.dirty.len();
        if pending > 0 {
            info!("Flushing {} dirty profiles before shutdown", pending);
        }
        self.flush_now().await
    }
}

impl std::fmt::Debug for SaveScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveScheduler")
            .field("dirty", &self.dirty.len())
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::players::PlayerRecord;
    use async_trait::async_trait;

    /// Store that records saves and can be told to fail.
    struct MockStore {
        saved: Mutex<Vec<PlayerRecord>>,
        failing: AtomicBool,
    }

    impl MockStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                saved: Mutex::new(Vec::new()),
                failing: AtomicBool::new(false),
            })
        }

        fn saved_ids(&self) -> Vec<PlayerId> {
            self.saved.lock().unwrap().iter().map(|r| r.id).collect()
        }
    }

    #[async_trait]
    impl PlayerStore for MockStore {
        async fn save(&self, record: &PlayerRecord) -> Result<(), PersistError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PersistError::Backend("injected failure".to_string()));
            }
            self.saved.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn load(&self, _player: PlayerId) -> Result<Option<PlayerRecord>, PersistError> {
            Ok(None)
        }
    }

    fn setup() -> (Arc<EventBus>, Arc<PlayerRegistry>, Arc<MockStore>, Arc<SaveScheduler>) {
        let events = Arc::new(EventBus::new());
        let players = PlayerRegistry::new(events.clone());
        let store = MockStore::new();
        let scheduler = SaveScheduler::new(players.clone(), store.clone());
        (events, players, store, scheduler)
    }

    #[tokio::test]
    async fn flush_saves_and_clears_dirty() {
        let (_events, players, store, scheduler) = setup();
        let player = PlayerId::new();
        players.player_joined(player, "Steve");
        scheduler.mark_dirty(player);

        let report = scheduler.flush_now().await;

        assert!(report.is_clean());
        assert_eq!(report.saved, [player]);
        assert_eq!(store.saved_ids(), [player]);
        assert_eq!(scheduler.dirty_count(), 0);
    }

    #[tokio::test]
    async fn failed_save_stays_dirty_and_retries() {
        let (_events, players, store, scheduler) = setup();
        let player = PlayerId::new();
        players.player_joined(player, "Steve");
        scheduler.mark_dirty(player);

        store.failing.store(true, Ordering::SeqCst);
        let report = scheduler.flush_now().await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(scheduler.dirty_count(), 1);

        store.failing.store(false, Ordering::SeqCst);
        let report = scheduler.flush_now().await;
        assert_eq!(report.saved, [player]);
        assert_eq!(scheduler.dirty_count(), 0);
    }

    #[tokio::test]
    async fn unloaded_profile_is_dropped_from_dirty_set() {
        let (_events, players, store, scheduler) = setup();
        let player = PlayerId::new();
        players.player_joined(player, "Steve");
        scheduler.mark_dirty(player);
        players.player_left(player);

        let report = scheduler.flush_now().await;

        assert!(report.saved.is_empty());
        assert!(store.saved_ids().is_empty());
        assert_eq!(scheduler.dirty_count(), 0);
    }

    #[tokio::test]
    async fn profile_events_mark_dirty() {
        let (events, players, _store, scheduler) = setup();
        scheduler.watch(&events);

        let player = PlayerId::new();
        players.player_joined(player, "Steve");
        assert_eq!(scheduler.dirty_count(), 1);

        scheduler.flush_now().await;
        assert_eq!(scheduler.dirty_count(), 0);

        players.set_muted(player, true).unwrap();
        assert_eq!(scheduler.dirty_count(), 1);
    }

    #[tokio::test]
    async fn remark_during_save_keeps_profile_dirty() {
        use tokio::sync::Notify;

        struct GatedStore {
            entered: Notify,
            release: Notify,
        }

        #[async_trait]
        impl PlayerStore for GatedStore {
            async fn save(&self, _record: &PlayerRecord) -> Result<(), PersistError> {
                self.entered.notify_one();
                self.release.notified().await;
                Ok(())
            }

            async fn load(&self, _player: PlayerId) -> Result<Option<PlayerRecord>, PersistError> {
                Ok(None)
            }
        }

        let events = Arc::new(EventBus::new());
        let players = PlayerRegistry::new(events.clone());
        let store = Arc::new(GatedStore {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let scheduler = SaveScheduler::new(players.clone(), store.clone());

        let player = PlayerId::new();
        players.player_joined(player, "Steve");
        scheduler.mark_dirty(player);

        let flusher = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.flush_now().await })
        };

        // Once the save is underway, dirty the profile again.
        store.entered.notified().await;
        scheduler.mark_dirty(player);
        store.release.notify_one();

        let report = flusher.await.unwrap();
        assert_eq!(report.saved, [player]);
        // The newer mark must survive the completed save.
        assert_eq!(scheduler.dirty_count(), 1);
    }

    #[tokio::test]
    async fn periodic_loop_flushes_and_stops() {
        let (_events, players, store, scheduler) = setup();
        let player = PlayerId::new();
        players.player_joined(player, "Steve");
        scheduler.mark_dirty(player);

        scheduler.run_periodic(Duration::from_millis(20));

        let mut flushed = false;
        for _ in 0..100 {
            if scheduler.dirty_count() == 0 {
                flushed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(flushed, "periodic loop never flushed");
        assert_eq!(store.saved_ids(), [player]);

        scheduler.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.mark_dirty(player);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(scheduler.dirty_count(), 1, "stopped loop still flushing");
    }

    #[tokio::test]
    async fn shutdown_flush_covers_all_dirty_profiles() {
        let (_events, players, store, scheduler) = setup();
        scheduler.run_periodic(Duration::from_secs(3600));

        let ids: Vec<PlayerId> = (0..3).map(|_| PlayerId::new()).collect();
        for (index, player) in ids.iter().enumerate() {
            players.player_joined(*player, format!("Player{}", index));
            scheduler.mark_dirty(*player);
        }

        let report = scheduler.flush_on_shutdown().await;

        assert!(report.is_clean());
        assert_eq!(report.saved.len(), 3);
        assert_eq!(scheduler.dirty_count(), 0);
        let mut saved = store.saved_ids();
        saved.sort_by_key(|id| id.0);
        let mut expected = ids.clone();
        expected.sort_by_key(|id| id.0);
        assert_eq!(saved, expected);
    }
}
