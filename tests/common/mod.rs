#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use nowplaying_deck::{
    source::{ChangeHandler, MediaChange, Subscription},
    Host, MediaSource, PlaybackStatus, SessionInfo, Target,
};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Draw {
    Title(String),
    Image(String),
}

#[derive(Default)]
pub struct RecordingHost {
    draws: Mutex<HashMap<String, Vec<(Instant, Draw)>>>,
    logs: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub fn draws(&self, context: &str) -> Vec<Draw> {
        self.draws
            .lock()
            .get(context)
            .map(|draws| draws.iter().map(|(_, draw)| draw.clone()).collect())
            .unwrap_or_default()
    }

    pub fn draw_times(&self, context: &str) -> Vec<Instant> {
        self.draws
            .lock()
            .get(context)
            .map(|draws| draws.iter().map(|(at, _)| *at).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, context: &str) -> usize {
        self.draws.lock().get(context).map(Vec::len).unwrap_or(0)
    }

    pub fn titles(&self, context: &str) -> Vec<String> {
        self.draws(context)
            .into_iter()
            .filter_map(|draw| match draw {
                Draw::Title(title) => Some(title),
                Draw::Image(_) => None,
            })
            .collect()
    }

    pub fn images(&self, context: &str) -> Vec<String> {
        self.draws(context)
            .into_iter()
            .filter_map(|draw| match draw {
                Draw::Image(image) => Some(image),
                Draw::Title(_) => None,
            })
            .collect()
    }

    fn record(&self, context: &str, draw: Draw) {
        self.draws
            .lock()
            .entry(context.to_string())
            .or_default()
            .push((Instant::now(), draw));
    }
}

impl Host for RecordingHost {
    fn set_title(&self, context: &str, title: &str, _target: Target) {
        self.record(context, Draw::Title(title.to_string()));
    }

    fn set_image(&self, context: &str, image: &str, _target: Target) {
        self.record(context, Draw::Image(image.to_string()));
    }

    fn log_message(&self, message: &str) {
        self.logs.lock().push(message.to_string());
    }
}

/// A scriptable media source. Clones share state, so a test can keep one
/// handle while the controller owns another.
#[derive(Clone, Default)]
pub struct FakeSource {
    inner: Arc<FakeState>,
}

#[derive(Default)]
struct FakeState {
    current: Mutex<Option<SessionInfo>>,
    sessions: Mutex<Vec<SessionInfo>>,
    thumbnails: Mutex<HashMap<String, Vec<u8>>>,
    manager_handler: Mutex<Option<ChangeHandler>>,
}

impl FakeSource {
    pub fn set_current(&self, session: Option<SessionInfo>) {
        *self.inner.current.lock() = session;
    }

    pub fn set_sessions(&self, sessions: Vec<SessionInfo>) {
        *self.inner.sessions.lock() = sessions;
    }

    pub fn set_thumbnail(&self, session_id: &str, bytes: Vec<u8>) {
        self.inner
            .thumbnails
            .lock()
            .insert(session_id.to_string(), bytes);
    }

    pub fn notify(&self, change: MediaChange) {
        let handler = self.inner.manager_handler.lock().clone();
        if let Some(handler) = handler {
            handler(change);
        }
    }
}

impl MediaSource for FakeSource {
    fn current_session(&self) -> anyhow::Result<Option<SessionInfo>> {
        Ok(self.inner.current.lock().clone())
    }

    fn sessions(&self) -> anyhow::Result<Vec<SessionInfo>> {
        Ok(self.inner.sessions.lock().clone())
    }

    fn thumbnail(&self, session_id: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.inner.thumbnails.lock().get(session_id).cloned())
    }

    fn subscribe_manager(&self, handler: ChangeHandler) -> anyhow::Result<Vec<Subscription>> {
        *self.inner.manager_handler.lock() = Some(handler);
        let inner = Arc::clone(&self.inner);
        Ok(vec![Subscription::new(move || {
            inner.manager_handler.lock().take();
        })])
    }

    fn subscribe_session(
        &self,
        _session_id: &str,
        _handler: ChangeHandler,
    ) -> anyhow::Result<Vec<Subscription>> {
        Ok(Vec::new())
    }
}

pub fn playing(id: &str, title: &str) -> SessionInfo {
    SessionInfo {
        id: id.to_string(),
        title: title.to_string(),
        artist: String::new(),
        status: PlaybackStatus::Playing,
    }
}

pub fn paused(id: &str, title: &str) -> SessionInfo {
    SessionInfo {
        status: PlaybackStatus::Paused,
        ..playing(id, title)
    }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
