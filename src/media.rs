use std::sync::Arc;

use parking_lot::Mutex;

/// What every button should be showing right now. `image` is the host-ready
/// data URL of the artwork, empty when there is none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaState {
    pub title: String,
    pub image: String,
}

impl MediaState {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.image.is_empty()
    }
}

/// The single shared media state. Title and image always travel together:
/// readers get an owned copy taken under the lock, writers replace both at
/// once.
#[derive(Debug, Clone, Default)]
pub struct SharedMedia {
    inner: Arc<Mutex<MediaState>>,
}

impl SharedMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MediaState {
        self.inner.lock().clone()
    }

    /// Stores `next` and returns `true` if it differs from the current state.
    pub fn replace_if_changed(&self, next: MediaState) -> bool {
        let mut current = self.inner.lock();
        if *current == next {
            return false;
        }
        *current = next;
        true
    }
}
