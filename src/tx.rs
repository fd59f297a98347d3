//! Output-compare driven transmitter
//!
//! The transmitter never toggles the pin from software once a byte is under
//! way. Each compare interrupt only *selects* the level for the next match,
//! and the compare unit drives it at exactly one bit period after the last.
//! Interrupt latency can be as long as one bit period without distorting the
//! frame.

use crate::hal::{Events, Level, LineMode, Mode, TxTimer};
use crate::profile::TimingProfile;
use crate::ring::Consumer;

/// Stop bit, above the seven data bits that remain after bit 0.
const STOP: u16 = 1 << 7;
/// Keeps the engine busy until the stop bit was on the line for a full period.
const GUARD: u16 = 1 << 8;

/// Sends one byte at a time.
///
/// Call [`on_compare()`](Transmitter::on_compare) from the transmit timer's
/// compare interrupt. Everything else runs in the main loop.
pub struct Transmitter<T> {
    timer: T,
    /// Levels still to arm, LSB first. Zero when idle.
    bits: u16,
}

impl<T: TxTimer> Transmitter<T> {
    /// Take the pin as an output, idle high.
    pub fn new(mut timer: T, profile: TimingProfile) -> Self {
        timer.set_interrupts(Events::empty());
        timer.set_mode(Mode::Restart);
        timer.set_period(profile.bit_period());
        timer.force_output(Level::High);
        timer.set_line_mode(LineMode::Output);
        timer.set_output_on_compare(Level::High);
        Transmitter { timer, bits: 0 }
    }

    /// Indicates if a byte is on the line.
    ///
    /// The engine is busy as long as the compare interrupt is enabled.
    pub fn is_busy(&self) -> bool {
        self.timer.interrupts().contains(Events::COMPARE)
    }

    /// Start sending `byte`.
    ///
    /// Returns `false`, without touching the line, if a byte is already in
    /// flight. There's no queue; check [`is_busy()`](Transmitter::is_busy),
    /// or use [`feed_from()`](Transmitter::feed_from).
    pub fn submit(&mut self, byte: u8) -> bool {
        if self.is_busy() {
            warn!("TX BUSY, REJECTED {=u8:#x}", byte);
            return false;
        }

        // Bit 0 is armed below; the shift register holds the rest.
        self.bits = u16::from(byte >> 1) | STOP | GUARD;

        self.timer.force_output(Level::Low);
        self.timer.reset();
        self.timer.clear_events(Events::COMPARE);
        self.timer.set_interrupts(Events::COMPARE);
        self.timer.set_output_on_compare(Level::of_lsb(u16::from(byte)));
        true
    }

    /// Start sending the next byte from `source`, if idle.
    ///
    /// Returns `true` if a byte was taken. Nothing is taken while busy.
    pub fn feed_from<const C: usize>(&mut self, source: &mut Consumer<'_, C>) -> bool {
        if self.is_busy() {
            return false;
        }
        match source.try_pop() {
            Some(byte) => self.submit(byte),
            None => false,
        }
    }

    /// Compare interrupt handler.
    ///
    /// The hardware just drove the level armed by the previous call. Arm the
    /// next one, or go idle once the guard has shifted out.
    pub fn on_compare(&mut self) {
        self.timer.clear_events(Events::COMPARE);
        if self.bits == 0 {
            self.timer.set_interrupts(Events::empty());
            trace!("TX IDLE");
            return;
        }
        self.timer.set_output_on_compare(Level::of_lsb(self.bits));
        self.bits >>= 1;
    }

    /// Release the timer.
    pub fn release(self) -> T {
        self.timer
    }
}
