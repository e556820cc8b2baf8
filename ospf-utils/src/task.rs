//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{self, Instant};
use tracing::error;

/// A handle which can be used to manipulate the task created by the
/// [`Task::spawn`] function.
///
/// By default, dropping this handle cancels the task (unless [`Task::detach`]
/// is used).
#[derive(Debug)]
pub struct Task<T> {
    join_handle: tokio::task::JoinHandle<T>,
    detached: bool,
}

/// A handle to a one-shot timer created by the [`TimeoutTask::new`] function.
/// The callback runs once when the timeout expires.
///
/// Dropping this handle cancels the timer.
///
/// When the `testing` feature is enabled, the handle is an inert stub: no
/// task is spawned and the callback never runs. This keeps timer-driven
/// logic deterministic under test while preserving the `Option<TimeoutTask>`
/// armed/disarmed bookkeeping.
#[derive(Debug)]
pub struct TimeoutTask {
    #[cfg(not(feature = "testing"))]
    control: UnboundedSender<TimerControl>,
    #[cfg(not(feature = "testing"))]
    _task: Task<()>,
}

/// A handle to a periodic timer created by the [`IntervalTask::new`]
/// function. The callback runs on every tick.
///
/// Dropping this handle cancels the timer. Inert under the `testing`
/// feature, like [`TimeoutTask`].
#[derive(Debug)]
pub struct IntervalTask {
    #[cfg(not(feature = "testing"))]
    control: UnboundedSender<TimerControl>,
    #[cfg(not(feature = "testing"))]
    _task: Task<()>,
}

#[derive(Debug)]
enum TimerControl {
    // Restart the timer, optionally with a new duration.
    Restart(Option<Duration>),
}

// ===== impl Task =====

impl<T> Task<T> {
    /// Spawns a new asynchronous task, returning a handle for it.
    pub fn spawn<Fut>(future: Fut) -> Task<T>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Task {
            join_handle: tokio::task::spawn(future),
            detached: false,
        }
    }

    /// Detach the task, meaning it will no longer be canceled if its handle
    /// is dropped.
    pub fn detach(&mut self) {
        self.detached = true;
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        if !self.detached {
            self.join_handle.abort();
        }
    }
}

// ===== impl TimeoutTask =====

impl TimeoutTask {
    /// Spawns a new task that will call the provided async closure when the
    /// specified timeout expires.
    #[cfg(not(feature = "testing"))]
    pub fn new<F, Fut>(timeout: Duration, cb: F) -> TimeoutTask
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel();

        let _task = Task::spawn(async move {
            let sleep = time::sleep(timeout);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    // Timeout has expired.
                    _ = &mut sleep => {
                        (cb)().await;
                        break;
                    }
                    control = control_rx.recv() => {
                        match control {
                            // Timeout has been restarted.
                            Some(TimerControl::Restart(new_timeout)) => {
                                let deadline = Instant::now()
                                    + new_timeout.unwrap_or(timeout);
                                sleep.as_mut().reset(deadline);
                            }
                            // Timeout has been canceled.
                            None => break,
                        }
                    }
                }
            }
        });

        TimeoutTask {
            control: control_tx,
            _task,
        }
    }

    #[cfg(feature = "testing")]
    pub fn new<F, Fut>(_timeout: Duration, _cb: F) -> TimeoutTask
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        TimeoutTask {}
    }

    /// Resets the timeout, regardless if it has already expired or not.
    ///
    /// If a new timeout value isn't specified, the last value will be reused.
    pub fn reset(&mut self, timeout: Option<Duration>) {
        #[cfg(not(feature = "testing"))]
        if self.control.send(TimerControl::Restart(timeout)).is_err() {
            error!("failed to reset timeout");
        }
    }
}

// ===== impl IntervalTask =====

impl IntervalTask {
    /// Spawns a new task that will call the provided async closure whenever
    /// the specified interval timer ticks.
    #[cfg(not(feature = "testing"))]
    pub fn new<F, Fut>(
        interval: Duration,
        tick_on_start: bool,
        mut cb: F,
    ) -> IntervalTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel();

        let _task = Task::spawn(async move {
            let mut ticker = if tick_on_start {
                time::interval(interval)
            } else {
                time::interval_at(Instant::now() + interval, interval)
            };

            loop {
                tokio::select! {
                    // Interval timer has ticked.
                    _ = ticker.tick() => {
                        (cb)().await;
                    }
                    control = control_rx.recv() => {
                        match control {
                            // Interval timer has been restarted.
                            Some(TimerControl::Restart(new_interval)) => {
                                let interval =
                                    new_interval.unwrap_or(interval);
                                ticker = time::interval_at(
                                    Instant::now() + interval,
                                    interval,
                                );
                            }
                            // Interval timer has been canceled.
                            None => break,
                        }
                    }
                }
            }
        });

        IntervalTask {
            control: control_tx,
            _task,
        }
    }

    #[cfg(feature = "testing")]
    pub fn new<F, Fut>(
        _interval: Duration,
        _tick_on_start: bool,
        _cb: F,
    ) -> IntervalTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        IntervalTask {}
    }

    /// Resets the interval.
    ///
    /// If a new interval value isn't specified, the last value will be
    /// reused.
    pub fn reset(&mut self, interval: Option<Duration>) {
        #[cfg(not(feature = "testing"))]
        if self.control.send(TimerControl::Restart(interval)).is_err() {
            error!("failed to reset interval");
        }
    }
}
