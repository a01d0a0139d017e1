//! Shows the system's "now playing" title as a scrolling marquee, with album
//! art, on the buttons of a deck plugin.
//!
//! [`PluginController`] receives the deck software's lifecycle events. It owns
//! a [`MediaSampler`](sampler::MediaSampler) that keeps the shared
//! [`MediaState`] current and one animation loop per visible button.

pub mod animator;
pub mod artwork;
pub mod config;
pub mod controller;
#[cfg(windows)]
pub mod gsmtc;
pub mod host;
pub mod logging;
pub mod media;
pub mod periodic;
pub mod sampler;
pub mod scroll;
pub mod settings;
pub mod source;

pub use config::Config;
pub use controller::PluginController;
pub use host::{Host, HostEvent, JsonHost, Target};
pub use media::MediaState;
pub use source::{MediaSource, PlaybackStatus, SessionInfo};
