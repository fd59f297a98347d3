//! Bit timing shared by the transmit and receive engines

/// The calibrated duration of one bit, in timer ticks.
///
/// [`Training`](crate::training::Training) produces one profile at boot. Both
/// engines receive a copy when they're constructed, and never change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct TimingProfile {
    bit_period: u16,
    sample_offset: u16,
}

impl TimingProfile {
    /// 2400 baud with a 16 MHz clock divided by 64.
    pub const DEFAULT: Self = Self::from_bit_period(104);

    /// Derive a profile from the duration of one bit.
    ///
    /// The sample offset is one and a half bit periods. Counted from the
    /// falling edge of a start bit, that's the middle of the first data bit.
    pub const fn from_bit_period(bit_period: u16) -> Self {
        Self {
            bit_period,
            sample_offset: bit_period.saturating_add(bit_period / 2),
        }
    }

    /// Ticks per bit.
    pub const fn bit_period(&self) -> u16 {
        self.bit_period
    }

    /// Ticks from a start edge to the first data bit sample.
    pub const fn sample_offset(&self) -> u16 {
        self.sample_offset
    }
}

impl Default for TimingProfile {
    fn default() -> Self {
        Self::DEFAULT
    }
}
