use std::{fmt, sync::Arc};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PlaybackStatus {
    Closed,
    Opened,
    Changing,
    Stopped,
    Playing,
    Paused,
    #[default]
    Unknown,
}

impl PlaybackStatus {
    pub fn is_playing(self) -> bool {
        self == PlaybackStatus::Playing
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackStatus::Closed => "Closed",
            PlaybackStatus::Opened => "Opened",
            PlaybackStatus::Changing => "Changing",
            PlaybackStatus::Stopped => "Stopped",
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point-in-time view of one application's media session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionInfo {
    /// Unique per live session, even when one application owns several.
    pub id: String,
    pub title: String,
    pub artist: String,
    pub status: PlaybackStatus,
}

/// Notifications a media source can deliver.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MediaChange {
    CurrentSessionChanged,
    SessionsChanged,
    MediaPropertiesChanged,
    PlaybackInfoChanged,
}

pub type ChangeHandler = Arc<dyn Fn(MediaChange) + Send + Sync>;

/// Keeps one event registration alive. Revoking runs the source's
/// unregistration exactly once; dropping an unrevoked token revokes it.
pub struct Subscription {
    revoke: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(revoke: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            revoke: Some(Box::new(revoke)),
        }
    }

    pub fn revoke(mut self) {
        self.run_revoke();
    }

    fn run_revoke(&mut self) {
        if let Some(revoke) = self.revoke.take() {
            revoke();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_revoke();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.revoke.is_some())
            .finish()
    }
}

/// The operating system's "now playing" service.
///
/// Every call may block on I/O. Handlers passed to the `subscribe_*` methods
/// may be invoked from arbitrary threads, possibly concurrently.
pub trait MediaSource: Send + Sync + 'static {
    /// The session the system currently considers in the foreground.
    fn current_session(&self) -> anyhow::Result<Option<SessionInfo>>;

    /// All known sessions, in the order the system reports them.
    fn sessions(&self) -> anyhow::Result<Vec<SessionInfo>>;

    /// Raw artwork bytes for the session, if it has any. They belong to the
    /// same media properties that produced the session's last [`SessionInfo`].
    fn thumbnail(&self, session_id: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Registers for current-session and session-list changes.
    fn subscribe_manager(&self, handler: ChangeHandler) -> anyhow::Result<Vec<Subscription>>;

    /// Registers for media-property and playback-info changes of one session.
    fn subscribe_session(
        &self,
        session_id: &str,
        handler: ChangeHandler,
    ) -> anyhow::Result<Vec<Subscription>>;
}
