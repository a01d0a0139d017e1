use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    animator::{self, AnimatorPhase, AnimatorShared, ButtonAnimator},
    config::{AnimationConfig, Config},
    host::{Host, HostEvent},
    media::{MediaState, SharedMedia},
    periodic::PeriodicTask,
    sampler::MediaSampler,
    settings::ButtonSettings,
    source::MediaSource,
};

/// Animators keyed by button context. The lock only ever covers map access.
#[derive(Default)]
struct Registry {
    animators: Mutex<HashMap<String, ButtonAnimator>>,
}

impl Registry {
    fn mark_all_dirty(&self) {
        for animator in self.animators.lock().values() {
            animator.shared().mark_dirty();
        }
    }
}

/// Bridges the deck software's lifecycle events to the media sampler and the
/// per-button animation loops.
pub struct PluginController<H: Host, S: MediaSource> {
    host: Arc<H>,
    animation: AnimationConfig,
    media: SharedMedia,
    registry: Arc<Registry>,
    sampler: Arc<MediaSampler<S>>,
}

impl<H: Host, S: MediaSource> PluginController<H, S> {
    pub fn new(host: Arc<H>, source: S, config: &Config) -> Self {
        let media = SharedMedia::new();
        let registry = Arc::new(Registry::default());

        let dirty_registry = Arc::clone(&registry);
        let sampler = Arc::new(MediaSampler::new(
            source,
            media.clone(),
            &config.artwork,
            config.display.title_format,
            Box::new(move || dirty_registry.mark_all_dirty()),
        ));
        sampler.attach();

        info!("media controller started");
        Self {
            host,
            animation: config.animation.clone(),
            media,
            registry,
            sampler,
        }
    }

    pub fn on_button_appear(&self, context: &str, settings: &Value) {
        debug!(context, "button appeared");
        self.configure(context, settings);
    }

    pub fn on_settings_changed(&self, context: &str, settings: &Value) {
        debug!(context, "button settings received");
        self.configure(context, settings);
    }

    pub fn on_button_disappear(&self, context: &str) {
        let removed = self.registry.animators.lock().remove(context);
        if let Some(mut animator) = removed {
            animator.stop();
            debug!(context, "button disappeared");
        }
    }

    /// Recomputes the visible character count without disturbing the scroll.
    pub fn on_title_parameters_changed(&self, context: &str, font_size: u32) {
        let width = self.animation.text_width(font_size);
        let known = match self.registry.animators.lock().get(context) {
            Some(animator) => {
                animator.shared().set_text_width(width);
                true
            }
            None => false,
        };
        if known {
            debug!(context, font_size, width, "text width updated");
        } else {
            debug!(context, font_size, "title parameters for unknown button");
        }
    }

    pub fn handle_event(&self, event: HostEvent) {
        match event {
            HostEvent::WillAppear { context, settings } => {
                self.on_button_appear(&context, &settings)
            }
            HostEvent::WillDisappear { context } => self.on_button_disappear(&context),
            HostEvent::DidReceiveSettings { context, settings } => {
                self.on_settings_changed(&context, &settings)
            }
            HostEvent::TitleParametersDidChange { context, font_size } => {
                self.on_title_parameters_changed(&context, font_size)
            }
            HostEvent::KeyDown { .. }
            | HostEvent::KeyUp { .. }
            | HostEvent::DeviceDidConnect { .. }
            | HostEvent::DeviceDidDisconnect { .. }
            | HostEvent::SendToPlugin { .. } => {}
            HostEvent::Unknown { event } => debug!(event = %event, "ignoring host event"),
        }
    }

    /// Decodes a raw host message and handles it; malformed input is logged.
    pub fn handle_message(&self, raw: &str) {
        match HostEvent::parse(raw) {
            Ok(event) => self.handle_event(event),
            Err(err) => warn!(error = %format!("{err:#}"), "dropping host message"),
        }
    }

    /// Takes a fresh media sample now; returns whether the state changed.
    pub fn refresh_media(&self) -> bool {
        self.sampler.sample()
    }

    pub fn media(&self) -> MediaState {
        self.media.snapshot()
    }

    pub fn contexts(&self) -> Vec<String> {
        let mut contexts: Vec<String> = self.registry.animators.lock().keys().cloned().collect();
        contexts.sort();
        contexts
    }

    pub fn running_animators(&self) -> usize {
        self.registry
            .animators
            .lock()
            .values()
            .filter(|animator| animator.phase() == AnimatorPhase::Running)
            .count()
    }

    pub fn text_width(&self, context: &str) -> Option<usize> {
        self.registry
            .animators
            .lock()
            .get(context)
            .map(|animator| animator.shared().text_width())
    }

    /// Revokes media subscriptions and stops every animation loop.
    pub fn shutdown(&self) {
        self.sampler.detach();
        let drained: Vec<ButtonAnimator> = self
            .registry
            .animators
            .lock()
            .drain()
            .map(|(_, animator)| animator)
            .collect();
        for mut animator in drained {
            animator.stop();
        }
    }

    /// Creates or reuses the animator for `context`, marks it dirty and
    /// restarts its loop with the period from `settings`.
    fn configure(&self, context: &str, settings: &Value) {
        let period = ButtonSettings::from_value(settings).period(self.animation.default_period());

        let (shared, previous) = {
            let mut animators = self.registry.animators.lock();
            let animator = animators.entry(context.to_string()).or_insert_with(|| {
                ButtonAnimator::new(context, self.animation.initial_text_width())
            });
            animator.shared().mark_dirty();
            (Arc::clone(animator.shared()), animator.take_task())
        };
        stop_task(previous);

        let task = match animator::spawn_loop(
            Arc::clone(&shared),
            Arc::clone(&self.host),
            self.media.clone(),
            self.animation.target,
            period,
        ) {
            Ok(task) => task,
            Err(err) => {
                warn!(context, error = %err, "failed to start button loop");
                return;
            }
        };

        if self.install(context, &shared, task) {
            info!(
                context,
                period_ms = period.as_millis() as u64,
                "button loop running"
            );
        } else {
            debug!(context, "button went away while its loop was starting");
        }
    }

    /// Hands `task` to the animator that owns `shared`. Returns `false`, with
    /// the task stopped, when that animator was removed or replaced meanwhile.
    fn install(&self, context: &str, shared: &Arc<AnimatorShared>, task: PeriodicTask) -> bool {
        let (installed, displaced) = {
            let mut animators = self.registry.animators.lock();
            match animators.get_mut(context) {
                Some(animator) if Arc::ptr_eq(animator.shared(), shared) => {
                    (true, animator.install_task(task))
                }
                _ => (false, Some(task)),
            }
        };
        stop_task(displaced);
        installed
    }
}

fn stop_task(task: Option<PeriodicTask>) {
    if let Some(mut task) = task {
        task.stop();
    }
}

impl<H: Host, S: MediaSource> Drop for PluginController<H, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
