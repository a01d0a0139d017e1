use std::{
    io,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tracing::debug;

use crate::{
    host::{Host, Target},
    media::SharedMedia,
    periodic::PeriodicTask,
    scroll,
};

/// "Artwork or title changed since this button last drew."
///
/// Raising bumps a generation; a draw consumes only the generation it saw,
/// so a raise that lands mid-draw stays pending for the next tick.
#[derive(Debug, Default)]
pub struct DirtyFlag {
    raised: AtomicU64,
    consumed: AtomicU64,
}

impl DirtyFlag {
    pub fn raise(&self) {
        self.raised.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_set(&self) -> bool {
        self.pending().is_some()
    }

    fn pending(&self) -> Option<u64> {
        let raised = self.raised.load(Ordering::Acquire);
        (raised != self.consumed.load(Ordering::Acquire)).then_some(raised)
    }

    fn consume(&self, generation: u64) {
        self.consumed.fetch_max(generation, Ordering::AcqRel);
    }
}

/// The part of a button animator its background loop reads.
#[derive(Debug)]
pub struct AnimatorShared {
    context: String,
    text_width: AtomicUsize,
    dirty: DirtyFlag,
}

impl AnimatorShared {
    pub fn new(context: impl Into<String>, text_width: usize) -> Self {
        Self {
            context: context.into(),
            text_width: AtomicUsize::new(text_width),
            dirty: DirtyFlag::default(),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn text_width(&self) -> usize {
        self.text_width.load(Ordering::Acquire)
    }

    pub fn set_text_width(&self, width: usize) {
        self.text_width.store(width, Ordering::Release);
    }

    pub fn mark_dirty(&self) {
        self.dirty.raise();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_set()
    }
}

/// Draws one frame for `shared` and returns the scroll offset for the next.
///
/// With no known text width nothing is drawn and the offset is kept. A pending
/// dirty flag restarts the scroll and pushes the artwork first. The title slice
/// is always sent, so an empty slice blanks the button.
pub fn draw_frame<H: Host + ?Sized>(
    shared: &AnimatorShared,
    host: &H,
    media: &SharedMedia,
    target: Target,
    tick: usize,
) -> usize {
    let width = shared.text_width();
    if width == 0 {
        return tick;
    }

    // Read the generation before the state: a publish that lands in between
    // then raises a newer generation than the one consumed below.
    let redraw = shared.dirty.pending();
    let state = media.snapshot();
    let mut tick = tick;
    if redraw.is_some() {
        tick = 0;
        host.set_image(&shared.context, &state.image, target);
    }

    let frame = scroll::advance(&state.title, width, tick);
    if let Some(generation) = redraw {
        if !frame.visible.is_empty() {
            shared.dirty.consume(generation);
        }
    }

    host.set_title(&shared.context, &frame.visible, target);
    frame.next_tick
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AnimatorPhase {
    Idle,
    Running,
    Stopped,
}

/// One visible button: its shared record plus the loop that animates it.
pub struct ButtonAnimator {
    shared: Arc<AnimatorShared>,
    task: Option<PeriodicTask>,
    stopped: bool,
}

impl ButtonAnimator {
    pub fn new(context: impl Into<String>, text_width: usize) -> Self {
        Self {
            shared: Arc::new(AnimatorShared::new(context, text_width)),
            task: None,
            stopped: false,
        }
    }

    pub fn shared(&self) -> &Arc<AnimatorShared> {
        &self.shared
    }

    pub fn phase(&self) -> AnimatorPhase {
        match (&self.task, self.stopped) {
            (Some(_), _) => AnimatorPhase::Running,
            (None, true) => AnimatorPhase::Stopped,
            (None, false) => AnimatorPhase::Idle,
        }
    }

    /// Detaches the running loop so it can be stopped outside a lock.
    pub fn take_task(&mut self) -> Option<PeriodicTask> {
        self.task.take()
    }

    /// Installs a freshly spawned loop, handing back any loop it displaces.
    pub fn install_task(&mut self, task: PeriodicTask) -> Option<PeriodicTask> {
        self.stopped = false;
        self.task.replace(task)
    }

    pub fn stop(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.stop();
        }
        self.stopped = true;
    }
}

impl Drop for ButtonAnimator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawns the animation loop for `shared`, ticking every `period`.
pub fn spawn_loop<H: Host + ?Sized>(
    shared: Arc<AnimatorShared>,
    host: Arc<H>,
    media: SharedMedia,
    target: Target,
    period: Duration,
) -> io::Result<PeriodicTask> {
    let name = format!("nowplaying-deck-button-{}", shared.context());
    debug!(
        context = shared.context(),
        period_ms = period.as_millis() as u64,
        "starting button loop"
    );
    PeriodicTask::start(name, period, 0, move |tick| {
        draw_frame(&shared, host.as_ref(), &media, target, tick)
    })
}
