//! Simulated timers for unit tests
//!
//! Time is a `u32` tick count. [`SimTx`] advances by one tick on every
//! counter or line read, like a CPU spinning on a status register. The
//! compare unit only advances when the test calls
//! [`compare_match()`](SimTx::compare_match). [`SimRx`] is driven by
//! [`drive_receiver()`], which plays an input waveform into a receiver.
//! [`SimBus`] stands in for a USB controller: the test queues the host's
//! packets for the control endpoint, and reads back what the device wrote.

extern crate std;

use crate::hal::{Events, Indicator, Level, LineMode, Mode, RxTimer, Timer, TxTimer};
use crate::rx::Receiver;
use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
    sync::{Arc, Mutex},
    vec::Vec,
};
use usb_device::{
    bus::{PollResult, UsbBus},
    endpoint::{EndpointAddress, EndpointType},
    UsbDirection, UsbError,
};

/// Counter width of the transmit timer
const TX_WRAP: u32 = 256;

/// An input waveform: level changes, sorted by time.
///
/// The line is high before the first change.
#[derive(Clone, Default)]
pub struct Waveform(Vec<(u32, Level)>);

impl Waveform {
    pub fn new(changes: &[(u32, Level)]) -> Self {
        Self(changes.to_vec())
    }

    pub fn level_at(&self, time: u32) -> Level {
        self.0
            .iter()
            .take_while(|(at, _)| *at <= time)
            .last()
            .map_or(Level::High, |(_, level)| *level)
    }

    /// First high-to-low transition in `(after, until]`.
    pub fn falling_edge(&self, after: u32, until: u32) -> Option<u32> {
        let mut previous = self.level_at(after);
        for &(at, level) in &self.0 {
            if at <= after || at > until {
                continue;
            }
            if previous == Level::High && level == Level::Low {
                return Some(at);
            }
            previous = level;
        }
        None
    }

    /// Append the frame of `byte`: start bit, 8 data bits LSB first, stop bit.
    pub fn push_frame(&mut self, start: u32, period: u32, byte: u8) {
        self.0.push((start, Level::Low));
        for bit in 0..8 {
            let level = Level::of_lsb(u16::from(byte >> bit));
            self.0.push((start + period * (bit + 1), level));
        }
        self.0.push((start + period * 9, Level::High));
    }
}

struct TxState {
    now: u32,
    base: u32,
    cleared_wraps: u32,
    compare_pending: bool,
    interrupts: Events,
    counter_mode: Mode,
    period: u16,
    mode: LineMode,
    armed: Level,
    input: Waveform,
    driven: Vec<(u32, Level)>,
}

impl TxState {
    /// Counter range in the current mode
    fn wrap(&self) -> u32 {
        match (self.counter_mode, self.period) {
            (Mode::Restart, period) if period > 0 => u32::from(period),
            _ => TX_WRAP,
        }
    }

    fn wraps(&self) -> u32 {
        match self.counter_mode {
            Mode::FreeRunning => (self.now - self.base) / TX_WRAP,
            Mode::Restart => 0,
        }
    }
}

/// A simulated [`TxTimer`] with an 8-bit counter.
#[derive(Clone)]
pub struct SimTx(Rc<RefCell<TxState>>);

impl SimTx {
    /// The link partner drives `input` on the line.
    pub fn new(input: Waveform) -> Self {
        Self(Rc::new(RefCell::new(TxState {
            now: 0,
            base: 0,
            cleared_wraps: 0,
            compare_pending: false,
            interrupts: Events::empty(),
            counter_mode: Mode::FreeRunning,
            period: 0,
            mode: LineMode::InputPullUp,
            armed: Level::High,
            input,
            driven: Vec::new(),
        })))
    }

    /// A partner that never drives the line.
    pub fn idle_line() -> Self {
        Self::new(Waveform::default())
    }

    /// A partner that pulls the line low, then sends a high pulse of `width` ticks.
    pub fn calibration(width: u32) -> Self {
        Self::new(Waveform::new(&[
            (40, Level::Low),
            (300, Level::High),
            (300 + width, Level::Low),
        ]))
    }

    pub fn now(&self) -> u32 {
        self.0.borrow().now
    }

    pub fn advance(&self, ticks: u32) {
        self.0.borrow_mut().now += ticks;
    }

    pub fn mode(&self) -> LineMode {
        self.0.borrow().mode
    }

    pub fn counter_mode(&self) -> Mode {
        self.0.borrow().counter_mode
    }

    /// Every level the pin was driven to, with its time.
    pub fn driven(&self) -> Vec<(u32, Level)> {
        self.0.borrow().driven.clone()
    }

    /// Run the counter to the next compare match. The hardware drives the
    /// armed level and latches the compare event.
    pub fn compare_match(&self) {
        let mut state = self.0.borrow_mut();
        state.now += u32::from(state.period);
        state.base = state.now;
        state.compare_pending = true;
        let (now, armed) = (state.now, state.armed);
        state.driven.push((now, armed));
    }
}

impl Timer for SimTx {
    fn reset(&mut self) {
        let mut state = self.0.borrow_mut();
        state.base = state.now;
        state.cleared_wraps = 0;
    }

    fn counter(&self) -> u16 {
        let mut state = self.0.borrow_mut();
        let value = (state.now - state.base) % state.wrap();
        state.now += 1;
        value as u16
    }

    fn events(&self) -> Events {
        let state = self.0.borrow();
        let mut events = Events::empty();
        events.set(Events::COMPARE, state.compare_pending);
        events.set(Events::OVERFLOW, state.wraps() > state.cleared_wraps);
        events
    }

    fn clear_events(&mut self, events: Events) {
        let mut state = self.0.borrow_mut();
        if events.contains(Events::COMPARE) {
            state.compare_pending = false;
        }
        if events.contains(Events::OVERFLOW) {
            state.cleared_wraps = state.wraps();
        }
    }

    fn set_interrupts(&mut self, events: Events) {
        self.0.borrow_mut().interrupts = events;
    }

    fn interrupts(&self) -> Events {
        self.0.borrow().interrupts
    }
}

impl TxTimer for SimTx {
    fn set_mode(&mut self, mode: Mode) {
        let mut state = self.0.borrow_mut();
        state.counter_mode = mode;
        state.cleared_wraps = state.wraps();
    }

    fn set_period(&mut self, ticks: u16) {
        self.0.borrow_mut().period = ticks;
    }

    fn set_line_mode(&mut self, mode: LineMode) {
        self.0.borrow_mut().mode = mode;
    }

    fn line(&self) -> Level {
        let mut state = self.0.borrow_mut();
        let level = state.input.level_at(state.now);
        state.now += 1;
        level
    }

    fn force_output(&mut self, level: Level) {
        let mut state = self.0.borrow_mut();
        let now = state.now;
        state.driven.push((now, level));
    }

    fn set_output_on_compare(&mut self, level: Level) {
        self.0.borrow_mut().armed = level;
    }
}

struct RxState {
    now: u32,
    compare: u16,
    capture: u16,
    pending: Events,
    interrupts: Events,
    input: Waveform,
}

/// A simulated [`RxTimer`] with a free-running 16-bit counter.
#[derive(Clone)]
pub struct SimRx(Rc<RefCell<RxState>>);

impl SimRx {
    pub fn new(input: Waveform) -> Self {
        Self(Rc::new(RefCell::new(RxState {
            now: 0,
            compare: 0,
            capture: 0,
            pending: Events::empty(),
            interrupts: Events::empty(),
            input,
        })))
    }

    pub fn compare(&self) -> u16 {
        self.0.borrow().compare
    }

    /// Move time forward, latching a capture for any falling edge on the way.
    fn advance_to(&self, time: u32) {
        let mut state = self.0.borrow_mut();
        if let Some(edge) = state.input.falling_edge(state.now, time) {
            state.pending |= Events::CAPTURE;
            state.capture = edge as u16;
        }
        state.now = time;
    }
}

impl Timer for SimRx {
    fn reset(&mut self) {}

    fn counter(&self) -> u16 {
        self.0.borrow().now as u16
    }

    fn events(&self) -> Events {
        self.0.borrow().pending
    }

    fn clear_events(&mut self, events: Events) {
        self.0.borrow_mut().pending.remove(events);
    }

    fn set_interrupts(&mut self, events: Events) {
        self.0.borrow_mut().interrupts = events;
    }

    fn interrupts(&self) -> Events {
        self.0.borrow().interrupts
    }
}

impl RxTimer for SimRx {
    fn set_compare(&mut self, ticks: u16) {
        self.0.borrow_mut().compare = ticks;
    }

    fn capture(&self) -> u16 {
        self.0.borrow().capture
    }

    fn line(&self) -> Level {
        let state = self.0.borrow();
        state.input.level_at(state.now)
    }
}

/// Play the simulated input into `receiver` until `until`, or until no
/// enabled interrupt can fire.
pub fn drive_receiver<const C: usize>(
    receiver: &mut Receiver<'_, SimRx, C>,
    sim: &SimRx,
    until: u32,
) {
    loop {
        let (now, enabled, pending, compare) = {
            let state = sim.0.borrow();
            (state.now, state.interrupts, state.pending, state.compare)
        };

        if enabled.contains(Events::CAPTURE) {
            if !pending.contains(Events::CAPTURE) {
                let Some(edge) = sim.0.borrow().input.falling_edge(now, until) else {
                    return;
                };
                sim.advance_to(edge);
            }
        } else if enabled.contains(Events::COMPARE) {
            let delta = match compare.wrapping_sub(now as u16) {
                0 => 1 << 16,
                delta => u32::from(delta),
            };
            if now + delta > until {
                return;
            }
            sim.advance_to(now + delta);
            sim.0.borrow_mut().pending |= Events::COMPARE;
        } else {
            return;
        }

        receiver.on_interrupt();
    }
}

/// A fault LED you can inspect after handing it away.
#[derive(Clone, Default)]
pub struct SimLed(Rc<RefCell<bool>>);

impl SimLed {
    pub fn is_set(&self) -> bool {
        *self.0.borrow()
    }
}

impl Indicator for SimLed {
    fn set(&mut self) {
        *self.0.borrow_mut() = true;
    }
}

/// Bus traffic, shared between the test and the [`SimBus`] inside the allocator.
#[derive(Default)]
struct BusState {
    /// Host packets for EP0 OUT, each flagged as SETUP or not
    host: VecDeque<(bool, Vec<u8>)>,
    /// Packets the device wrote to EP0 IN
    device: Vec<Vec<u8>>,
    stalled: bool,
}

/// A simulated USB controller with only the control endpoint.
#[derive(Clone, Default)]
pub struct SimBus(Arc<Mutex<BusState>>);

impl SimBus {
    /// The host sends a SETUP packet.
    pub fn setup(&self, request_type: u8, request: u8, index: u16, length: u16) {
        let mut packet = Vec::with_capacity(8);
        packet.extend_from_slice(&[request_type, request, 0x00, 0x01]);
        packet.extend_from_slice(&index.to_le_bytes());
        packet.extend_from_slice(&length.to_le_bytes());
        self.0.lock().unwrap().host.push_back((true, packet));
    }

    /// The host sends the data stage of an OUT transfer.
    pub fn data(&self, packet: &[u8]) {
        self.0.lock().unwrap().host.push_back((false, packet.to_vec()));
    }

    /// Everything the device wrote to EP0 IN.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.0.lock().unwrap().device.clone()
    }

    /// Indicates if the device ever stalled a request.
    pub fn was_stalled(&self) -> bool {
        self.0.lock().unwrap().stalled
    }
}

impl UsbBus for SimBus {
    fn alloc_ep(
        &mut self,
        ep_dir: UsbDirection,
        ep_addr: Option<EndpointAddress>,
        _: EndpointType,
        _: u16,
        _: u8,
    ) -> usb_device::Result<EndpointAddress> {
        Ok(ep_addr.unwrap_or_else(|| EndpointAddress::from_parts(1, ep_dir)))
    }

    fn enable(&mut self) {}
    fn reset(&self) {}
    fn set_device_address(&self, _: u8) {}

    fn write(&self, ep_addr: EndpointAddress, buf: &[u8]) -> usb_device::Result<usize> {
        assert_eq!(ep_addr.index(), 0);
        self.0.lock().unwrap().device.push(buf.to_vec());
        Ok(buf.len())
    }

    fn read(&self, ep_addr: EndpointAddress, buf: &mut [u8]) -> usb_device::Result<usize> {
        assert_eq!(ep_addr.index(), 0);
        let (_, packet) = self
            .0
            .lock()
            .unwrap()
            .host
            .pop_front()
            .ok_or(UsbError::WouldBlock)?;
        buf[..packet.len()].copy_from_slice(&packet);
        Ok(packet.len())
    }

    fn set_stalled(&self, _: EndpointAddress, stalled: bool) {
        self.0.lock().unwrap().stalled |= stalled;
    }

    fn is_stalled(&self, _: EndpointAddress) -> bool {
        self.0.lock().unwrap().stalled
    }

    fn suspend(&self) {}
    fn resume(&self) {}

    fn poll(&self) -> PollResult {
        match self.0.lock().unwrap().host.front() {
            Some((true, _)) => PollResult::Data {
                ep_out: 0,
                ep_in_complete: 0,
                ep_setup: 1,
            },
            Some((false, _)) => PollResult::Data {
                ep_out: 1,
                ep_in_complete: 0,
                ep_setup: 0,
            },
            None => PollResult::None,
        }
    }
}
