use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    artwork,
    config::{ArtworkConfig, TitleFormat},
    media::{MediaState, SharedMedia},
    source::{ChangeHandler, MediaChange, MediaSource, SessionInfo, Subscription},
};

pub type PublishHook = Box<dyn Fn() + Send + Sync>;

/// Keeps [`SharedMedia`] in step with whatever the media source says is
/// playing, and runs `on_publish` every time it changes.
pub struct MediaSampler<S: MediaSource> {
    source: S,
    media: SharedMedia,
    artwork_size: u32,
    title_format: TitleFormat,
    on_publish: PublishHook,
    sample_lock: Mutex<()>,
    manager_subscriptions: Mutex<Vec<Subscription>>,
    session_subscriptions: Mutex<HashMap<String, Vec<Subscription>>>,
}

impl<S: MediaSource> MediaSampler<S> {
    pub fn new(
        source: S,
        media: SharedMedia,
        artwork: &ArtworkConfig,
        title_format: TitleFormat,
        on_publish: PublishHook,
    ) -> Self {
        Self {
            source,
            media,
            artwork_size: artwork.size(),
            title_format,
            on_publish,
            sample_lock: Mutex::new(()),
            manager_subscriptions: Mutex::new(Vec::new()),
            session_subscriptions: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Subscribes to the source's notifications and takes a first sample,
    /// since the source may not fire anything until the next change.
    pub fn attach(self: &Arc<Self>) {
        match self.source.subscribe_manager(self.change_handler()) {
            Ok(subscriptions) => *self.manager_subscriptions.lock() = subscriptions,
            Err(err) => warn!(error = %format!("{err:#}"), "media manager subscription failed"),
        }
        self.sync_sessions();
        self.sample();
    }

    /// Revokes every subscription this sampler holds.
    pub fn detach(&self) {
        let manager = std::mem::take(&mut *self.manager_subscriptions.lock());
        let sessions = std::mem::take(&mut *self.session_subscriptions.lock());
        for subscription in manager {
            subscription.revoke();
        }
        for subscription in sessions.into_values().flatten() {
            subscription.revoke();
        }
    }

    pub fn handle_change(self: &Arc<Self>, change: MediaChange) {
        debug!(?change, "media change notification");
        if change == MediaChange::SessionsChanged {
            self.sync_sessions();
        }
        self.sample();
    }

    /// Re-reads the source and publishes the result if it differs from the
    /// current state. Returns whether anything was published. Failures are
    /// logged and leave the current state alone.
    pub fn sample(&self) -> bool {
        let _guard = self.sample_lock.lock();

        let next = match self.read_state() {
            Ok(next) => next,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "media sample failed");
                return false;
            }
        };

        if !self.media.replace_if_changed(next) {
            return false;
        }
        debug!(title = %self.media.snapshot().title, "media state published");
        (self.on_publish)();
        true
    }

    fn read_state(&self) -> anyhow::Result<MediaState> {
        let Some(session) = self.playing_session()? else {
            return Ok(MediaState::default());
        };

        let title = self.title_format.render(&session);
        if title.is_empty() {
            return Ok(MediaState::default());
        }

        let image = match self.source.thumbnail(&session.id)? {
            Some(bytes) => artwork::encode_button_image(&bytes, self.artwork_size)
                .unwrap_or_else(|err| {
                    warn!(session = %session.id, error = %format!("{err:#}"), "artwork dropped");
                    String::new()
                }),
            None => String::new(),
        };

        Ok(MediaState { title, image })
    }

    /// The foreground session if it is playing, otherwise the first playing
    /// session in source order.
    fn playing_session(&self) -> anyhow::Result<Option<SessionInfo>> {
        if let Some(current) = self.source.current_session()? {
            if current.status.is_playing() {
                return Ok(Some(current));
            }
        }

        Ok(self
            .source
            .sessions()?
            .into_iter()
            .find(|session| session.status.is_playing()))
    }

    /// Subscribes to sessions the source newly reports and revokes the
    /// subscriptions of sessions that are gone.
    pub fn sync_sessions(self: &Arc<Self>) {
        let sessions = match self.source.sessions() {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "listing media sessions failed");
                return;
            }
        };

        for session in &sessions {
            debug!(session = %session.id, status = %session.status, "media session");
        }

        let mut registry = self.session_subscriptions.lock();
        let stale: Vec<String> = registry
            .keys()
            .filter(|id| !sessions.iter().any(|session| &session.id == *id))
            .cloned()
            .collect();
        let mut revoked = Vec::new();
        for id in stale {
            if let Some(subscriptions) = registry.remove(&id) {
                info!(session = %id, "media session removed");
                revoked.extend(subscriptions);
            }
        }

        for session in &sessions {
            if registry.contains_key(&session.id) {
                continue;
            }
            match self
                .source
                .subscribe_session(&session.id, self.change_handler())
            {
                Ok(subscriptions) => {
                    info!(session = %session.id, "media session added");
                    registry.insert(session.id.clone(), subscriptions);
                }
                Err(err) => {
                    warn!(session = %session.id, error = %format!("{err:#}"), "session subscription failed")
                }
            }
        }
        drop(registry);

        for subscription in revoked {
            subscription.revoke();
        }
    }

    pub fn subscribed_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.session_subscriptions.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn change_handler(self: &Arc<Self>) -> ChangeHandler {
        let weak: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |change| {
            if let Some(sampler) = weak.upgrade() {
                sampler.handle_change(change);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PlaybackStatus;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSource {
        current: Mutex<Option<SessionInfo>>,
        sessions: Mutex<Vec<SessionInfo>>,
        thumbnails: Mutex<HashMap<String, Vec<u8>>>,
        fail: AtomicBool,
        slow: AtomicBool,
        inside: AtomicUsize,
        most_inside: AtomicUsize,
        active: Arc<Mutex<Vec<String>>>,
        manager_handler: Mutex<Option<ChangeHandler>>,
    }

    impl FakeSource {
        fn check(&self) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("source unavailable");
            }
            Ok(())
        }
    }

    impl MediaSource for FakeSource {
        fn current_session(&self) -> anyhow::Result<Option<SessionInfo>> {
            self.check()?;
            Ok(self.current.lock().clone())
        }

        fn sessions(&self) -> anyhow::Result<Vec<SessionInfo>> {
            self.check()?;
            let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
            self.most_inside.fetch_max(now, Ordering::SeqCst);
            if self.slow.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
            let sessions = self.sessions.lock().clone();
            self.inside.fetch_sub(1, Ordering::SeqCst);
            Ok(sessions)
        }

        fn thumbnail(&self, session_id: &str) -> anyhow::Result<Option<Vec<u8>>> {
            self.check()?;
            Ok(self.thumbnails.lock().get(session_id).cloned())
        }

        fn subscribe_manager(&self, handler: ChangeHandler) -> anyhow::Result<Vec<Subscription>> {
            *self.manager_handler.lock() = Some(handler);
            Ok(Vec::new())
        }

        fn subscribe_session(
            &self,
            session_id: &str,
            _handler: ChangeHandler,
        ) -> anyhow::Result<Vec<Subscription>> {
            self.active.lock().push(session_id.to_string());
            let active = Arc::clone(&self.active);
            let id = session_id.to_string();
            Ok(vec![Subscription::new(move || {
                active.lock().retain(|entry| entry != &id);
            })])
        }
    }

    fn session(id: &str, title: &str, status: PlaybackStatus) -> SessionInfo {
        SessionInfo {
            id: id.into(),
            title: title.into(),
            artist: String::new(),
            status,
        }
    }

    fn sampler(source: FakeSource) -> (Arc<MediaSampler<FakeSource>>, SharedMedia, Arc<AtomicUsize>) {
        let media = SharedMedia::new();
        let published = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&published);
        let sampler = MediaSampler::new(
            source,
            media.clone(),
            &ArtworkConfig::default(),
            TitleFormat::Title,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (Arc::new(sampler), media, published)
    }

    #[test]
    fn foreground_playing_session_wins() {
        let source = FakeSource::default();
        *source.current.lock() = Some(session("a", "Front", PlaybackStatus::Playing));
        source
            .sessions
            .lock()
            .push(session("b", "Back", PlaybackStatus::Playing));
        let (sampler, media, _) = sampler(source);

        assert!(sampler.sample());
        assert_eq!(media.snapshot().title, "Front");
    }

    #[test]
    fn falls_back_to_first_playing_session() {
        let source = FakeSource::default();
        *source.current.lock() = Some(session("a", "Paused", PlaybackStatus::Paused));
        source.sessions.lock().extend([
            session("a", "Paused", PlaybackStatus::Paused),
            session("b", "Playing B", PlaybackStatus::Playing),
            session("c", "Playing C", PlaybackStatus::Playing),
        ]);
        let (sampler, media, _) = sampler(source);

        sampler.sample();
        assert_eq!(media.snapshot().title, "Playing B");
    }

    #[test]
    fn nothing_playing_clears_state() {
        let source = FakeSource::default();
        source
            .sessions
            .lock()
            .push(session("a", "Song", PlaybackStatus::Playing));
        let (sampler, media, _) = sampler(source);
        sampler.sample();
        assert_eq!(media.snapshot().title, "Song");

        sampler.source().sessions.lock()[0].status = PlaybackStatus::Stopped;
        assert!(sampler.sample());
        assert!(media.snapshot().is_empty());
    }

    #[test]
    fn repeated_sample_publishes_once() {
        let source = FakeSource::default();
        source
            .sessions
            .lock()
            .push(session("a", "Song", PlaybackStatus::Playing));
        let (sampler, _, published) = sampler(source);

        assert!(sampler.sample());
        assert!(!sampler.sample());
        assert_eq!(published.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_leaves_state_untouched() {
        let source = FakeSource::default();
        source
            .sessions
            .lock()
            .push(session("a", "Song", PlaybackStatus::Playing));
        let (sampler, media, published) = sampler(source);
        sampler.sample();

        sampler.source().fail.store(true, Ordering::SeqCst);
        assert!(!sampler.sample());
        assert_eq!(media.snapshot().title, "Song");
        assert_eq!(published.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn undecodable_artwork_becomes_empty_image() {
        let source = FakeSource::default();
        source
            .sessions
            .lock()
            .push(session("a", "Song", PlaybackStatus::Playing));
        source
            .thumbnails
            .lock()
            .insert("a".into(), vec![0u8, 1, 2, 3]);
        let (sampler, media, _) = sampler(source);

        sampler.sample();
        let state = media.snapshot();
        assert_eq!(state.title, "Song");
        assert!(state.image.is_empty());
    }

    #[test]
    fn session_changes_resubscribe() {
        let source = FakeSource::default();
        source.sessions.lock().extend([
            session("a", "A", PlaybackStatus::Paused),
            session("b", "B", PlaybackStatus::Paused),
        ]);
        let (sampler, _, _) = sampler(source);
        sampler.attach();
        assert_eq!(sampler.subscribed_sessions(), vec!["a", "b"]);

        {
            let mut sessions = sampler.source().sessions.lock();
            sessions.remove(0);
            sessions.push(session("c", "C", PlaybackStatus::Playing));
        }
        let handler = sampler.source().manager_handler.lock().clone().unwrap();
        handler(MediaChange::SessionsChanged);

        assert_eq!(sampler.subscribed_sessions(), vec!["b", "c"]);
        let mut active = sampler.source().active.lock().clone();
        active.sort();
        assert_eq!(active, vec!["b", "c"]);

        sampler.detach();
        assert!(sampler.subscribed_sessions().is_empty());
        assert!(sampler.source().active.lock().is_empty());
    }

    #[test]
    fn overlapping_samples_run_one_at_a_time() {
        let source = FakeSource::default();
        source.slow.store(true, Ordering::SeqCst);
        source
            .sessions
            .lock()
            .push(session("a", "Song", PlaybackStatus::Playing));
        let (sampler, media, published) = sampler(source);

        let workers: Vec<_> = (0..6)
            .map(|_| {
                let sampler = Arc::clone(&sampler);
                std::thread::spawn(move || {
                    for _ in 0..4 {
                        sampler.sample();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(sampler.source().most_inside.load(Ordering::SeqCst), 1);
        assert_eq!(media.snapshot().title, "Song");
        assert_eq!(published.load(Ordering::SeqCst), 1);
    }
}
