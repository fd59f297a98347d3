use crate::ring::{Consumer, Producer, RingBuffer};

/// Default capacity of the inbound ring
pub const DEFAULT_INBOUND: usize = 32;
/// Default capacity of the outbound ring
pub const DEFAULT_OUTBOUND: usize = 16;

/// Buffers shared by the engines and the host bridge.
///
/// Each bridge needs a `BridgeState`. Allocate a `static` object, and split
/// it once during start-up to hand each context its end of the rings.
///
/// ```
/// use softuart_usbd::BridgeState;
///
/// static STATE: BridgeState = BridgeState::new();
///
/// let parts = STATE.split().unwrap();
/// assert!(STATE.split().is_none());
/// # let _ = parts;
/// ```
///
/// You can change the capacities with the const generics. Both must be
/// powers of two. `TX` can't exceed 16.
///
/// ```
/// use softuart_usbd::BridgeState;
///
/// static STATE: BridgeState<64, 8> = BridgeState::new();
/// ```
pub struct BridgeState<const RX: usize = DEFAULT_INBOUND, const TX: usize = DEFAULT_OUTBOUND> {
    inbound: RingBuffer<RX>,
    outbound: RingBuffer<TX>,
}

/// The ends of the rings, grouped by the context that owns them.
pub struct Parts<'a, const RX: usize, const TX: usize> {
    /// For the [`Receiver`](crate::rx::Receiver).
    pub rx_sink: Producer<'a, RX>,
    /// For the [`HostBridge`](crate::bridge::HostBridge).
    pub host_inbound: Consumer<'a, RX>,
    /// For the [`HostBridge`](crate::bridge::HostBridge).
    pub host_outbound: Producer<'a, TX>,
    /// For the main loop, to [feed](crate::tx::Transmitter::feed_from) the
    /// transmitter.
    pub tx_source: Consumer<'a, TX>,
}

impl<const RX: usize, const TX: usize> BridgeState<RX, TX> {
    /// Allocate both rings, empty.
    pub const fn new() -> Self {
        Self {
            inbound: RingBuffer::new(),
            outbound: RingBuffer::new(),
        }
    }

    /// Acquire the ring ends.
    ///
    /// Returns `None` if the state was already split.
    pub fn split(&self) -> Option<Parts<'_, RX, TX>> {
        // The rings are private, so they're split together or not at all.
        let (rx_sink, host_inbound) = self.inbound.split()?;
        let (host_outbound, tx_source) = self.outbound.split()?;
        Some(Parts {
            rx_sink,
            host_inbound,
            host_outbound,
            tx_source,
        })
    }
}

impl<const RX: usize, const TX: usize> Default for BridgeState<RX, TX> {
    fn default() -> Self {
        Self::new()
    }
}
