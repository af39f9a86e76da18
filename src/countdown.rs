//! Polling helpers for a live token display.
//!
//! A display re-evaluates the engine on a fixed cadence, usually every second. Because
//! every tick calls [`compute_current_token`] afresh, the countdown only ever goes down,
//! or wraps back to [`PERIOD`] when the token rotates.
//!
//! ```rust
//! use totp_dash::{Countdown, ManualClock};
//!
//! let clock = ManualClock::new(58);
//! let mut countdown = Countdown::new("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ", clock.clone());
//!
//! let tick = countdown.next().unwrap();
//! assert_eq!(tick.result.remaining_seconds, 2);
//!
//! clock.advance(2);
//! let tick = countdown.next().unwrap();
//! assert_eq!(tick.result.remaining_seconds, 30);
//! assert!(tick.rotated);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error};

use crate::{compute_current_token, system_time, OtpResult, TokenError, PERIOD};

/// Source of the current unix time in seconds.
pub trait Clock {
    fn now(&self) -> Result<u64, TokenError>;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<u64, TokenError> {
        Ok(system_time()?)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(seconds: u64) -> ManualClock {
        ManualClock {
            seconds: Arc::new(AtomicU64::new(seconds)),
        }
    }

    pub fn set(&self, seconds: u64) {
        self.seconds.store(seconds, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.seconds.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<u64, TokenError> {
        Ok(self.seconds.load(Ordering::SeqCst))
    }
}

/// One evaluation of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    /// Second the tick was evaluated at, if the clock could be read
    pub at: Option<u64>,
    pub result: OtpResult,
    /// The step changed since the previous tick, so the token was replaced
    pub rotated: bool,
}

/// Endless iterator of [`Tick`]s for one secret, read against `clock` on every `next()`.
#[derive(Debug, Clone)]
pub struct Countdown<C> {
    secret: String,
    clock: C,
    last_counter: Option<u64>,
}

impl<C: Clock> Countdown<C> {
    pub fn new<S: Into<String>>(secret: S, clock: C) -> Countdown<C> {
        Countdown {
            secret: secret.into(),
            clock,
            last_counter: None,
        }
    }

    fn tick(&mut self) -> Tick {
        let now = match self.clock.now() {
            Ok(now) => now,
            Err(err) => {
                error!("token generation failed: {}", err);
                return Tick {
                    at: None,
                    result: OtpResult::invalid(),
                    rotated: false,
                };
            }
        };

        let counter = now / PERIOD;
        let rotated = matches!(self.last_counter, Some(last) if last != counter);
        self.last_counter = Some(counter);
        if rotated {
            debug!("token rotated at step {}", counter);
        }

        Tick {
            at: Some(now),
            result: compute_current_token(&self.secret, now),
            rotated,
        }
    }
}

impl<C: Clock> Iterator for Countdown<C> {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        Some(self.tick())
    }
}

/// Background thread feeding a [`Countdown`] into a callback every `interval`.
///
/// The thread is stopped and joined when the `Ticker` is dropped, so tying it to the
/// lifetime of a view is enough to tear it down.
#[derive(Debug)]
pub struct Ticker {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Tick against the system clock.
    pub fn spawn<S, F>(secret: S, interval: Duration, on_tick: F) -> std::io::Result<Ticker>
    where
        S: Into<String>,
        F: FnMut(Tick) + Send + 'static,
    {
        Ticker::spawn_with_clock(secret, SystemClock, interval, on_tick)
    }

    pub fn spawn_with_clock<S, C, F>(
        secret: S,
        clock: C,
        interval: Duration,
        mut on_tick: F,
    ) -> std::io::Result<Ticker>
    where
        S: Into<String>,
        C: Clock + Send + 'static,
        F: FnMut(Tick) + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let mut countdown = Countdown::new(secret, clock);

        let handle = thread::Builder::new()
            .name("totp-ticker".to_string())
            .spawn(move || {
                debug!("ticker started, interval {:?}", interval);
                loop {
                    if let Some(tick) = countdown.next() {
                        on_tick(tick);
                    }
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("ticker stopped");
            })?;

        Ok(Ticker {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Stop ticking and wait for the thread to exit. Dropping the `Ticker` does the same.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            // the thread may already be gone, in which case there's nobody to tell
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("ticker thread panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
