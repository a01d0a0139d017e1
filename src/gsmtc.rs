use std::{
    future::IntoFuture,
    sync::atomic::{AtomicU64, Ordering},
};

use anyhow::Context;
use futures::executor::block_on;
use parking_lot::Mutex;
use tracing::warn;
use windows::{
    core::Result as WinResult,
    Foundation::TypedEventHandler,
    Media::Control::{
        CurrentSessionChangedEventArgs, GlobalSystemMediaTransportControlsSession,
        GlobalSystemMediaTransportControlsSessionManager,
        GlobalSystemMediaTransportControlsSessionMediaProperties,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus, MediaPropertiesChangedEventArgs,
        PlaybackInfoChangedEventArgs, SessionsChangedEventArgs,
    },
    Storage::Streams::DataReader,
    Win32::{
        Foundation::RPC_E_CHANGED_MODE,
        System::Com::{CoInitializeEx, COINIT_MULTITHREADED},
    },
};

use crate::source::{
    ChangeHandler, MediaChange, MediaSource, PlaybackStatus, SessionInfo, Subscription,
};

type Manager = GlobalSystemMediaTransportControlsSessionManager;
type Session = GlobalSystemMediaTransportControlsSession;
type MediaProperties = GlobalSystemMediaTransportControlsSessionMediaProperties;

/// A live session under the id handed out for it, with the properties its
/// last [`SessionInfo`] was read from.
struct KnownSession {
    id: String,
    session: Session,
    properties: MediaProperties,
}

/// The Windows system media transport controls, as a [`MediaSource`].
///
/// One application (a browser, say) may own several sessions, so ids are the
/// app id plus a sequence number assigned the first time a session is seen.
pub struct GsmtcSource {
    manager: Manager,
    known: Mutex<Vec<KnownSession>>,
    next_id: AtomicU64,
}

impl GsmtcSource {
    /// Joins the multithreaded COM apartment on this thread and requests the
    /// session manager.
    pub fn connect() -> anyhow::Result<Self> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr.is_err() && hr != RPC_E_CHANGED_MODE {
            anyhow::bail!("COM init failed: {hr:?}");
        }

        let manager = resolve(Manager::RequestAsync()?)
            .context("Failed to request media session manager")?;
        Ok(Self {
            manager,
            known: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    fn describe(&self, session: &Session) -> WinResult<SessionInfo> {
        let properties = resolve(session.TryGetMediaPropertiesAsync()?)?;
        let status = playback_status(session.GetPlaybackInfo()?.PlaybackStatus()?);
        let title = properties.Title()?.to_string_lossy();
        let artist = properties.Artist()?.to_string_lossy();
        let id = self.remember(session, properties)?;
        Ok(SessionInfo {
            id,
            title,
            artist,
            status,
        })
    }

    fn remember(&self, session: &Session, properties: MediaProperties) -> WinResult<String> {
        let app = session.SourceAppUserModelId()?.to_string_lossy();
        let mut known = self.known.lock();
        if let Some(entry) = known.iter_mut().find(|entry| entry.session == *session) {
            entry.properties = properties;
            return Ok(entry.id.clone());
        }
        let id = format!("{app}#{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        known.push(KnownSession {
            id: id.clone(),
            session: session.clone(),
            properties,
        });
        Ok(id)
    }

    fn known_session(&self, session_id: &str) -> Option<(Session, MediaProperties)> {
        self.known
            .lock()
            .iter()
            .find(|entry| entry.id == session_id)
            .map(|entry| (entry.session.clone(), entry.properties.clone()))
    }
}

impl MediaSource for GsmtcSource {
    fn current_session(&self) -> anyhow::Result<Option<SessionInfo>> {
        // No foreground session comes back as an error rather than null.
        let Ok(session) = self.manager.GetCurrentSession() else {
            return Ok(None);
        };
        Ok(Some(self.describe(&session)?))
    }

    fn sessions(&self) -> anyhow::Result<Vec<SessionInfo>> {
        let listed = self.manager.GetSessions()?;
        let count = listed.Size()?;
        let mut live = Vec::with_capacity(count as usize);
        let mut out = Vec::with_capacity(count as usize);
        for index in 0..count {
            let session = listed.GetAt(index)?;
            match self.describe(&session) {
                Ok(info) => out.push(info),
                Err(err) => warn!(error = ?err, "skipping unreadable media session"),
            }
            live.push(session);
        }
        self.known
            .lock()
            .retain(|entry| live.contains(&entry.session));
        Ok(out)
    }

    fn thumbnail(&self, session_id: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let Some((_, properties)) = self.known_session(session_id) else {
            return Ok(None);
        };
        Ok(read_thumbnail(&properties)?)
    }

    fn subscribe_manager(&self, handler: ChangeHandler) -> anyhow::Result<Vec<Subscription>> {
        let on_current = handler.clone();
        let token = self.manager.CurrentSessionChanged(&TypedEventHandler::<
            Manager,
            CurrentSessionChangedEventArgs,
        >::new(move |_, _| {
            on_current(MediaChange::CurrentSessionChanged);
            Ok(())
        }))?;
        let manager = self.manager.clone();
        let current = Subscription::new(move || {
            let _ = manager.RemoveCurrentSessionChanged(token);
        });

        let on_sessions = handler;
        let token = self.manager.SessionsChanged(&TypedEventHandler::<
            Manager,
            SessionsChangedEventArgs,
        >::new(move |_, _| {
            on_sessions(MediaChange::SessionsChanged);
            Ok(())
        }))?;
        let manager = self.manager.clone();
        let sessions = Subscription::new(move || {
            let _ = manager.RemoveSessionsChanged(token);
        });

        Ok(vec![current, sessions])
    }

    fn subscribe_session(
        &self,
        session_id: &str,
        handler: ChangeHandler,
    ) -> anyhow::Result<Vec<Subscription>> {
        let Some((session, _)) = self.known_session(session_id) else {
            return Ok(Vec::new());
        };

        let on_media = handler.clone();
        let token = session.MediaPropertiesChanged(&TypedEventHandler::<
            Session,
            MediaPropertiesChangedEventArgs,
        >::new(move |_, _| {
            on_media(MediaChange::MediaPropertiesChanged);
            Ok(())
        }))?;
        let owner = session.clone();
        let media = Subscription::new(move || {
            let _ = owner.RemoveMediaPropertiesChanged(token);
        });

        let on_playback = handler;
        let token = session.PlaybackInfoChanged(&TypedEventHandler::<
            Session,
            PlaybackInfoChangedEventArgs,
        >::new(move |_, _| {
            on_playback(MediaChange::PlaybackInfoChanged);
            Ok(())
        }))?;
        let playback = Subscription::new(move || {
            let _ = session.RemovePlaybackInfoChanged(token);
        });

        Ok(vec![media, playback])
    }
}

fn playback_status(status: GlobalSystemMediaTransportControlsSessionPlaybackStatus) -> PlaybackStatus {
    match status {
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Closed => PlaybackStatus::Closed,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Opened => PlaybackStatus::Opened,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Changing => {
            PlaybackStatus::Changing
        }
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Stopped => PlaybackStatus::Stopped,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Playing => PlaybackStatus::Playing,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Paused => PlaybackStatus::Paused,
        _ => PlaybackStatus::Unknown,
    }
}

/// Reads the whole artwork stream in one load; `None` when there is no
/// artwork or the stream is empty.
fn read_thumbnail(properties: &MediaProperties) -> WinResult<Option<Vec<u8>>> {
    let Ok(reference) = properties.Thumbnail() else {
        return Ok(None);
    };
    let stream = resolve(reference.OpenReadAsync()?)?;
    let length = u32::try_from(stream.Size()?).unwrap_or(u32::MAX);
    if length == 0 {
        return Ok(None);
    }

    let reader = DataReader::CreateDataReader(&stream.GetInputStreamAt(0)?)?;
    let loaded = resolve(reader.LoadAsync(length)?)?;
    let mut bytes = vec![0u8; loaded as usize];
    reader.ReadBytes(&mut bytes)?;
    Ok((!bytes.is_empty()).then_some(bytes))
}

/// Waits on a WinRT async operation from a plain thread.
fn resolve<O, T>(operation: O) -> WinResult<T>
where
    O: IntoFuture<Output = WinResult<T>>,
{
    block_on(operation.into_future())
}
