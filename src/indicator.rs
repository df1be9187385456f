//! Status indicator.
//!
//! The orchestrator reports its state through a single LED: fast blink in
//! provisioning mode, slow blink while reconnecting, steady on when
//! connected. The interval lives in one atomic cell so the orchestrator's
//! writes never block, and a dedicated blinker thread drives the LED from
//! whatever the cell currently holds.

use crate::config::STOP_TIMEOUT;
use log::error;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Encoding of [`IndicatorMode::SteadyOn`] in the atomic cell.
const STEADY_ON: u64 = u64::MAX;

/// Encoding of [`IndicatorMode::SteadyOff`] in the atomic cell.
const STEADY_OFF: u64 = 0;

/// Re-poll interval for the steady states.
const STEADY_POLL_MS: u64 = 1000;

/// Granularity of blink sleeps, so the thread notices mode changes and
/// shutdown without waiting out a long interval.
const TICK: Duration = Duration::from_millis(100);

/// What the indicator should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorMode {
    /// LED held on (connected).
    SteadyOn,
    /// LED held off.
    SteadyOff,
    /// LED toggling with the given half-period in milliseconds.
    Blink(u64),
}

/// Cheap cloneable handle to the indicator cell.
#[derive(Debug, Clone, Default)]
pub struct IndicatorHandle {
    cell: Arc<AtomicU64>,
}

impl IndicatorHandle {
    /// Create a handle starting in the steady-off state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the indicator mode. Never blocks.
    pub fn set(&self, mode: IndicatorMode) {
        let encoded = match mode {
            IndicatorMode::SteadyOn => STEADY_ON,
            IndicatorMode::SteadyOff => STEADY_OFF,
            // Interval 0 would spin; treat it as off.
            IndicatorMode::Blink(0) => STEADY_OFF,
            IndicatorMode::Blink(ms) if ms == STEADY_ON => STEADY_ON,
            IndicatorMode::Blink(ms) => ms,
        };
        self.cell.store(encoded, Ordering::Release);
    }

    /// Current indicator mode.
    pub fn get(&self) -> IndicatorMode {
        match self.cell.load(Ordering::Acquire) {
            STEADY_ON => IndicatorMode::SteadyOn,
            STEADY_OFF => IndicatorMode::SteadyOff,
            ms => IndicatorMode::Blink(ms),
        }
    }
}

/// Something that can switch the physical LED.
pub trait Led: Send + 'static {
    /// Drive the LED on or off.
    fn set(&mut self, on: bool);
}

/// Background thread translating the indicator cell into LED toggles.
pub struct Blinker {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    done_rx: mpsc::Receiver<()>,
}

impl Blinker {
    /// Spawn the blink loop for `led`, following `indicator`.
    pub fn spawn<L: Led>(indicator: IndicatorHandle, mut led: L) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = mpsc::channel();
        let loop_running = Arc::clone(&running);

        let handle = thread::spawn(move || {
            let mut lit = false;
            while loop_running.load(Ordering::Acquire) {
                match indicator.get() {
                    IndicatorMode::SteadyOn => {
                        if !lit {
                            led.set(true);
                            lit = true;
                        }
                        sleep_while(&loop_running, Duration::from_millis(STEADY_POLL_MS));
                    }
                    IndicatorMode::SteadyOff => {
                        if lit {
                            led.set(false);
                            lit = false;
                        }
                        sleep_while(&loop_running, Duration::from_millis(STEADY_POLL_MS));
                    }
                    IndicatorMode::Blink(ms) => {
                        lit = !lit;
                        led.set(lit);
                        sleep_while(&loop_running, Duration::from_millis(ms));
                    }
                }
            }
            if lit {
                led.set(false);
            }
            let _ = done_tx.send(());
        });

        Self {
            running,
            handle: Some(handle),
            done_rx,
        }
    }

    /// Stop the blink loop and wait for it to exit.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.running.store(false, Ordering::Release);
        match self.done_rx.recv_timeout(STOP_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                error!("blinker did not stop within {:?}", STOP_TIMEOUT);
            }
        }
    }
}

impl Drop for Blinker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sleep for `total`, in short ticks, returning early when `running`
/// clears.
fn sleep_while(running: &AtomicBool, total: Duration) {
    let mut remaining = total;
    while !remaining.is_zero() && running.load(Ordering::Acquire) {
        let step = remaining.min(TICK);
        thread::sleep(step);
        remaining -= step;
    }
}
