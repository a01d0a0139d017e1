use std::{
    io,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{RecvTimeoutError, Sender};

/// A named background thread that runs `tick` once per period until stopped.
///
/// The counter returned by one tick is passed to the next, so the loop keeps
/// its own position without sharing it. Stopping wakes the thread from its
/// sleep and joins it before returning.
pub struct PeriodicTask {
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn start<F>(
        name: String,
        period: Duration,
        counter: usize,
        mut tick: F,
    ) -> io::Result<Self>
    where
        F: FnMut(usize) -> usize + Send + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let join = thread::Builder::new().name(name).spawn(move || {
            let mut counter = counter;
            loop {
                counter = tick(counter);
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            join: Some(join),
        })
    }

    /// Signals the loop and blocks until its thread has exited. A tick already
    /// in progress is allowed to finish.
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the channel, which wakes the sleep.
        self.stop_tx.take();
        if let Some(join) = self.join.take() {
            if join.thread().id() == thread::current().id() {
                return;
            }
            let _ = join.join();
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}
