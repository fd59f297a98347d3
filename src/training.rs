//! Boot-time bit rate training
//!
//! The link partner announces its bit rate with a single high pulse, one bit
//! long. Training listens on the transmit pin, measures that pulse with the
//! transmit timer, and echoes the measured period back as an acknowledgement.
//!
//! Training never fails the boot. If the partner stays quiet, or sends
//! something that can't be a bit, [`Training::run`] logs the reason and
//! returns the fallback profile.
//!
//! ```
//! # fn boot<T: softuart_usbd::hal::TxTimer>(tx_timer: &mut T) {
//! use softuart_usbd::training::{Training, TrainingConfig};
//!
//! let profile = Training::new(TrainingConfig::default()).run(tx_timer);
//! // Construct the transmitter and receiver with `profile`...
//! # let _ = profile;
//! # }
//! ```

use crate::hal::{Events, Level, LineMode, Mode, TxTimer};
use crate::profile::TimingProfile;
use crate::timeout::{OverflowBudget, Timeout};

/// Why a calibration attempt was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum TrainingError {
    /// The line never went low.
    NoActivity,
    /// The line went low, but the calibration pulse never started.
    NoPulse,
    /// The pulse outlasted a timer overflow, or had no measurable width.
    MalformedPulse,
}

/// Training limits and fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingConfig {
    /// Overflows to wait for an idle-high line to go low.
    pub idle_overflows: u8,
    /// Overflows, counted from the start of training, to wait for the pulse.
    pub pulse_overflows: u8,
    /// Profile used when training fails.
    pub fallback: TimingProfile,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            idle_overflows: 10,
            pulse_overflows: 30,
            fallback: TimingProfile::DEFAULT,
        }
    }
}

/// The training procedure.
#[derive(Debug, Clone, Copy)]
pub struct Training {
    config: TrainingConfig,
}

impl Training {
    /// Prepare a training run with the given limits and fallback.
    pub const fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Train the bit rate, falling back to the configured profile on failure.
    ///
    /// Blocks until the pulse is measured or a budget runs out. Run this
    /// before enabling any interrupt that depends on the profile. On success,
    /// the measured period is sent back over the line and the pin is left as
    /// an output, driven high.
    pub fn run<T: TxTimer>(&self, timer: &mut T) -> TimingProfile {
        match self.measure(timer) {
            Ok(profile) => {
                debug!("TRAINED {} TICKS", profile.bit_period());
                acknowledge(timer, profile);
                profile
            }
            Err(_err) => {
                warn!(
                    "TRAINING {}, FALLBACK {} TICKS",
                    _err,
                    self.config.fallback.bit_period()
                );
                self.config.fallback
            }
        }
    }

    /// Measure the calibration pulse, without acknowledging it.
    pub fn measure<T: TxTimer>(&self, timer: &mut T) -> Result<TimingProfile, TrainingError> {
        timer.set_interrupts(Events::empty());
        timer.set_mode(Mode::FreeRunning);
        timer.set_line_mode(LineMode::InputPullUp);
        timer.reset();
        timer.clear_events(Events::OVERFLOW);

        let mut budget = OverflowBudget::new(self.config.idle_overflows);
        while timer.line().is_high() {
            budget
                .poll(timer)
                .map_err(|Timeout| TrainingError::NoActivity)?;
        }

        budget.extend_to(self.config.pulse_overflows);
        while !timer.line().is_high() {
            budget.poll(timer).map_err(|Timeout| TrainingError::NoPulse)?;
        }

        timer.reset();
        timer.clear_events(Events::OVERFLOW);
        while timer.line().is_high() {
            // One bit never spans a whole counter period.
            if timer.events().contains(Events::OVERFLOW) {
                timer.clear_events(Events::OVERFLOW);
                return Err(TrainingError::MalformedPulse);
            }
        }

        match timer.counter() {
            0 => Err(TrainingError::MalformedPulse),
            width => Ok(TimingProfile::from_bit_period(width)),
        }
    }
}

/// Send the measured period, saturated to a byte, back to the partner.
///
/// The engines aren't running yet, so this busy-waits on the counter for
/// every bit. The frame leads with one idle bit.
fn acknowledge<T: TxTimer>(timer: &mut T, profile: TimingProfile) {
    let period = profile.bit_period();
    let value = u8::try_from(period).unwrap_or(u8::MAX);

    timer.force_output(Level::High);
    timer.set_line_mode(LineMode::Output);

    // idle, start, 8 data bits, stop
    let frame = 0b1 | (u16::from(value) << 2) | (1 << 10);
    for bit in 0..11 {
        hold(timer, Level::of_lsb(frame >> bit), period);
    }
}

fn hold<T: TxTimer>(timer: &mut T, level: Level, ticks: u16) {
    timer.force_output(level);
    timer.reset();
    while timer.counter() < ticks {}
}
