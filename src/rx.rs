//! Capture / compare driven receiver
//!
//! The receiver has two phases. While awaiting a start bit, only the capture
//! interrupt is enabled. The captured time of the falling edge anchors the
//! sample points: the first one lands one and a half bit periods later, in
//! the middle of data bit 0, and the rest follow one period apart. After the
//! eighth sample the byte goes into the inbound ring and capture is armed
//! again.
//!
//! The stop bit isn't checked. Sampling trusts the trained bit period.

use crate::hal::{Events, RxTimer};
use crate::profile::TimingProfile;
use crate::ring::Producer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingStart,
    Sampling {
        /// Counter value of the pending sample
        next: u16,
        shift: u8,
        count: u8,
    },
}

/// Receives bytes into a ring.
///
/// Call [`on_interrupt()`](Receiver::on_interrupt) from the receive timer's
/// interrupt. If your part has separate capture and compare vectors, call
/// [`on_capture()`](Receiver::on_capture) and
/// [`on_compare()`](Receiver::on_compare) instead.
pub struct Receiver<'a, T, const C: usize> {
    timer: T,
    profile: TimingProfile,
    sink: Producer<'a, C>,
    phase: Phase,
    dropped: usize,
}

impl<'a, T: RxTimer, const C: usize> Receiver<'a, T, C> {
    /// Arm the receiver, awaiting the first start bit.
    pub fn new(timer: T, profile: TimingProfile, sink: Producer<'a, C>) -> Self {
        let mut receiver = Receiver {
            timer,
            profile,
            sink,
            phase: Phase::AwaitingStart,
            dropped: 0,
        };
        receiver.await_start();
        receiver
    }

    /// Indicates if a byte is being sampled.
    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Sampling { .. })
    }

    /// Returns the number of bytes dropped because the ring was full.
    ///
    /// Inbound overflow is otherwise silent. It does not set a fault
    /// indicator.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Dispatch to the capture or compare handler.
    pub fn on_interrupt(&mut self) {
        let pending = self.timer.events() & self.timer.interrupts();
        if pending.contains(Events::CAPTURE) {
            self.on_capture();
        } else if pending.contains(Events::COMPARE) {
            self.on_compare();
        }
    }

    /// Start bit detected.
    pub fn on_capture(&mut self) {
        self.timer.clear_events(Events::CAPTURE);
        if self.is_busy() {
            return;
        }

        let first = self
            .timer
            .capture()
            .wrapping_add(self.profile.sample_offset());
        self.timer.set_compare(first);
        self.timer.clear_events(Events::COMPARE);
        self.timer.set_interrupts(Events::COMPARE);
        self.phase = Phase::Sampling {
            next: first,
            shift: 0,
            count: 0,
        };
    }

    /// Sample point reached.
    pub fn on_compare(&mut self) {
        let level = self.timer.line();
        self.timer.clear_events(Events::COMPARE);

        let Phase::Sampling { next, shift, count } = self.phase else {
            return;
        };

        // LSB first
        let shift = (shift >> 1) | ((level.is_high() as u8) << 7);
        let count = count + 1;
        if count < 8 {
            let next = next.wrapping_add(self.profile.bit_period());
            self.timer.set_compare(next);
            self.phase = Phase::Sampling { next, shift, count };
            return;
        }

        if !self.sink.try_push(shift) {
            self.dropped = self.dropped.saturating_add(1);
            debug!("RX DROPPED {=u8:#x}", shift);
        }
        self.await_start();
    }

    /// Release the timer and the ring producer.
    pub fn release(self) -> (T, Producer<'a, C>) {
        (self.timer, self.sink)
    }

    fn await_start(&mut self) {
        self.phase = Phase::AwaitingStart;
        // Data bits latch captures too. Forget them.
        self.timer.clear_events(Events::CAPTURE);
        self.timer.set_interrupts(Events::CAPTURE);
    }
}
