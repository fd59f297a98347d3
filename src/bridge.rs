//! Host side of the bridge
//!
//! The host exchanges fixed, 8 byte reports with the device. Both directions
//! use the first byte as a header.
//!
//! - Input reports (device to host) carry up to seven received bytes. The
//!   header packs the payload length in its low three bits, and the number of
//!   free outbound slots in the remaining five. That count is the only flow
//!   control: the host must not write more than it was last told.
//! - Output reports (host to device) carry the payload length in the header,
//!   followed by the bytes to send.
//!
//! A host that writes past the advertised free count loses the excess, and
//! the fault indicator latches on.

use crate::hal::Indicator;
use crate::ring::{Consumer, Producer};

/// Size of every report, in bytes.
pub const REPORT_LEN: usize = 8;
/// Payload bytes that fit behind the header.
pub const MAX_PAYLOAD: usize = REPORT_LEN - 1;

const LEN_MASK: u8 = 0x07;
const FREE_SHIFT: u32 = 3;

/// The outcome of a host write.
///
/// The write is consumed either way. There's nothing the host can do with a
/// rejection, so it's never reported on the bus.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Written {
    /// Bytes now queued for the transmitter.
    pub accepted: u8,
    /// Bytes lost because the outbound ring was full.
    pub dropped: u8,
}

/// Moves bytes between host reports and the two rings.
///
/// `RX` is the capacity of the inbound ring, filled by the receiver. `TX` is
/// the capacity of the outbound ring, drained by the transmitter. `TX` can't
/// exceed 16, so that the free count fits in the header.
pub struct HostBridge<'a, I, const RX: usize, const TX: usize> {
    inbound: Consumer<'a, RX>,
    outbound: Producer<'a, TX>,
    fault: I,
    overflowed: bool,
}

impl<'a, I: Indicator, const RX: usize, const TX: usize> HostBridge<'a, I, RX, TX> {
    const FREE_FITS: () = assert!(TX <= 16, "outbound capacity must fit in the report header");

    /// Create a bridge between the rings and the host.
    ///
    /// `fault` is set when the host overruns the outbound ring.
    pub fn new(inbound: Consumer<'a, RX>, outbound: Producer<'a, TX>, fault: I) -> Self {
        let _: () = Self::FREE_FITS;
        HostBridge {
            inbound,
            outbound,
            fault,
            overflowed: false,
        }
    }

    /// Fill an input report. Returns the report length.
    ///
    /// Payload bytes past the reported length are left as they were.
    pub fn on_host_poll(&mut self, report: &mut [u8; REPORT_LEN]) -> usize {
        let mut len = 0;
        for slot in report[1..].iter_mut() {
            match self.inbound.try_pop() {
                Some(byte) => *slot = byte,
                None => break,
            }
            len += 1;
        }

        let free = self.outbound.free_count() as u8;
        report[0] = (len & LEN_MASK) | (free << FREE_SHIFT);
        REPORT_LEN
    }

    /// Queue the payload of an output report.
    ///
    /// A header that declares more bytes than the request holds is clamped to
    /// what's there. On the first byte that doesn't fit, the rest of the
    /// request is dropped and the fault indicator is set.
    pub fn on_host_write(&mut self, request: &[u8]) -> Written {
        let Some((&declared, payload)) = request.split_first() else {
            return Written::default();
        };
        let payload = &payload[..payload.len().min(usize::from(declared))];

        let mut written = Written::default();
        for (idx, &byte) in payload.iter().enumerate() {
            if !self.outbound.try_push(byte) {
                written.dropped = (payload.len() - idx) as u8;
                self.overflow(written.dropped);
                break;
            }
            written.accepted += 1;
        }
        written
    }

    /// Indicates if the host ever overran the outbound ring.
    ///
    /// There's no way to clear this. Neither is there a way to clear the
    /// fault indicator.
    pub fn has_overflowed(&self) -> bool {
        self.overflowed
    }

    fn overflow(&mut self, _dropped: u8) {
        warn!("OUTBOUND OVERFLOW, DROPPED {=u8}", _dropped);
        self.overflowed = true;
        self.fault.set();
    }
}
