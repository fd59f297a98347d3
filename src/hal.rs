//! Hardware seam for the software UART.
//!
//! The engines never touch registers. They drive two timers through the
//! traits in this module, and a board crate implements the traits over its
//! peripheral access crate. The vocabulary follows a typical output-compare /
//! input-capture timer:
//!
//! - a free-running counter that can be [`reset`](Timer::reset),
//! - status [`Events`] that latch until cleared,
//! - a per-event interrupt enable mask.
//!
//! # Requirements
//!
//! The traits assume that you've prepared the timer clocks and prescalers
//! so that one tick has the same duration on both timers. For the
//! [`RxTimer`], you must also configure the input capture unit to latch on
//! *falling* edges of the receive pin, with the pin as an input with pull-up.
//! Enable a noise canceler if the part has one.

bitflags::bitflags! {
    /// Timer status and interrupt sources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Events: u8 {
        /// The counter matched the compare value.
        const COMPARE = 1 << 0;
        /// The input capture unit latched an edge.
        const CAPTURE = 1 << 1;
        /// The counter wrapped.
        const OVERFLOW = 1 << 2;
    }
}

/// Logic level on a serial line.
///
/// The line idles high. A start bit is low, a stop bit is high.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Level of the least significant bit of `bits`.
    pub const fn of_lsb(bits: u16) -> Self {
        if bits & 1 != 0 {
            Level::High
        } else {
            Level::Low
        }
    }

    /// `true` for [`Level::High`].
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

/// Direction of the transmit pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum LineMode {
    /// Input with pull-up. Used while training listens for the calibration pulse.
    InputPullUp,
    /// Output, driven by the compare unit or by [`TxTimer::force_output`].
    Output,
}

/// Functionality shared by both timers.
pub trait Timer {
    /// Set the counter to zero.
    ///
    /// `reset` does not clear any latched [`Events`].
    fn reset(&mut self);

    /// Returns the current counter value, in ticks.
    fn counter(&self) -> u16;

    /// Returns the latched status events.
    fn events(&self) -> Events;

    /// Clear the given latched status events.
    fn clear_events(&mut self, events: Events);

    /// Enable interrupts for exactly the given events, disabling all others.
    fn set_interrupts(&mut self, events: Events);

    /// Returns the enabled interrupt sources.
    fn interrupts(&self) -> Events;
}

/// Counter behavior of the [`TxTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Mode {
    /// The counter runs up to its maximum, wraps to zero, and latches
    /// [`Events::OVERFLOW`]. Training measures pulses in this mode.
    FreeRunning,
    /// The counter restarts at zero on every compare match. The transmitter
    /// runs in this mode.
    Restart,
}

/// A timer with an output-compare unit attached to the transmit pin.
///
/// In [`Mode::Restart`] the counter restarts at zero on every match, so a
/// match happens once per [`set_period`](TxTimer::set_period) ticks. On each
/// match the hardware drives the pin to the level selected with
/// [`set_output_on_compare`](TxTimer::set_output_on_compare). This happens
/// whether or not the compare interrupt is enabled.
///
/// In [`Mode::FreeRunning`] the counter must wrap and latch an overflow.
/// Training's timeouts count those overflows; a counter that never wraps
/// would keep training waiting forever.
pub trait TxTimer: Timer {
    /// Select the counter mode.
    fn set_mode(&mut self, mode: Mode);

    /// Set the number of ticks between compare matches.
    fn set_period(&mut self, ticks: u16);

    /// Select the pin direction.
    fn set_line_mode(&mut self, mode: LineMode);

    /// Sample the transmit pin.
    ///
    /// Only meaningful in [`LineMode::InputPullUp`].
    fn line(&self) -> Level;

    /// Drive the pin to `level` right now.
    fn force_output(&mut self, level: Level);

    /// Select the level the hardware drives at the next compare match.
    fn set_output_on_compare(&mut self, level: Level);
}

/// A timer with an input-capture unit and a compare unit, attached to the
/// receive pin.
///
/// The counter is free running and wraps at `u16::MAX`.
pub trait RxTimer: Timer {
    /// Set the absolute counter value of the next compare match.
    fn set_compare(&mut self, ticks: u16);

    /// Returns the counter value latched by the last captured edge.
    fn capture(&self) -> u16;

    /// Sample the receive pin.
    fn line(&self) -> Level;
}

/// A fault indicator, usually an LED.
///
/// Once set, it's never cleared.
pub trait Indicator {
    /// Assert the fault indicator.
    fn set(&mut self);
}
