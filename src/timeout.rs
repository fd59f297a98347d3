//! Bounded waits measured in timer overflows

use crate::hal::{Events, Timer};

/// The overflow budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Timeout;

/// Counts timer overflows against a limit.
///
/// Use [`poll()`](OverflowBudget::poll) inside a busy-wait loop. Each latched
/// overflow is cleared and charged to the budget. The budget is cumulative
/// across waits; raise the limit with [`extend_to()`](OverflowBudget::extend_to)
/// to give a later wait more time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverflowBudget {
    spent: u8,
    limit: u8,
}

impl OverflowBudget {
    /// A budget that times out on the `limit`-th overflow.
    pub const fn new(limit: u8) -> Self {
        Self { spent: 0, limit }
    }

    /// Raise the limit, keeping what was already spent.
    pub fn extend_to(&mut self, limit: u8) {
        self.limit = self.limit.max(limit);
    }

    /// Returns the number of overflows charged so far.
    pub const fn spent(&self) -> u8 {
        self.spent
    }

    /// Charge any pending overflow on `timer`.
    pub fn poll<T: Timer + ?Sized>(&mut self, timer: &mut T) -> Result<(), Timeout> {
        if !timer.events().contains(Events::OVERFLOW) {
            return Ok(());
        }
        timer.clear_events(Events::OVERFLOW);
        self.spent = self.spent.saturating_add(1);
        if self.spent >= self.limit {
            Err(Timeout)
        } else {
            Ok(())
        }
    }
}
