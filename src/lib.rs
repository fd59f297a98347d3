//! A USB to software UART bridge
//!
//! `softuart-usbd` moves bytes between a USB host and a single-wire,
//! asynchronous serial line that's driven by two timers instead of a UART
//! peripheral. It provides
//!
//! - boot-time [`training`] that measures the link partner's bit rate,
//! - a [transmitter](tx::Transmitter) paced by an output-compare unit,
//! - a [receiver](rx::Receiver) paced by input-capture and compare units,
//! - the [bridge](bridge::HostBridge) between host reports and two byte
//!   rings, exposed to the host as a [`usb-device`] [class](class::UartClass).
//!
//! To interface the library, implement the [`hal`] traits for your timers
//! and fault LED. The USB bus itself comes from any `usb-device` bus
//! implementation.
//!
//! The rings use [`critical-section`] for their shortest updates. The crate
//! doesn't pick an implementation; your application must link one. On a
//! single-core Cortex-M part, that's usually `cortex-m`'s
//! `critical-section-single-core` feature. Your HAL or executor may already
//! provide one.
//!
//! # Example
//!
//! ```ignore
//! use softuart_usbd::{
//!     bridge::HostBridge, class::UartClass, rx::Receiver, training::Training,
//!     tx::Transmitter, BridgeState,
//! };
//!
//! static STATE: BridgeState = BridgeState::new();
//!
//! let profile = Training::new(Default::default()).run(&mut tx_timer);
//! let parts = STATE.split().unwrap();
//!
//! let mut transmitter = Transmitter::new(tx_timer, profile);
//! let receiver = Receiver::new(rx_timer, profile, parts.rx_sink);
//! // Move `receiver` into the receive timer's interrupt, and `transmitter`
//! // behind a critical section shared with the transmit timer's interrupt...
//!
//! let bridge = HostBridge::new(parts.host_inbound, parts.host_outbound, fault_led);
//! let mut class = UartClass::new(&bus_allocator, bridge);
//! let mut device = UsbDeviceBuilder::new(&bus_allocator, VID_PID).build();
//!
//! let mut tx_source = parts.tx_source;
//! loop {
//!     device.poll(&mut [&mut class]);
//!     critical_section::with(|cs| {
//!         TRANSMITTER.borrow_ref_mut(cs).feed_from(&mut tx_source);
//!     });
//! }
//! ```
//!
//! [`usb-device`]: https://crates.io/crates/usb-device
//! [`critical-section`]: https://crates.io/crates/critical-section

#![no_std]

#[cfg(feature = "defmt-03")]
extern crate defmt_03 as defmt;

#[macro_use]
mod log;

pub mod bridge;
pub mod class;
pub mod hal;
pub mod profile;
pub mod ring;
pub mod rx;
pub mod timeout;
pub mod training;
pub mod tx;

mod state;

#[cfg(test)]
mod sim;

pub use profile::TimingProfile;
pub use state::{BridgeState, Parts, DEFAULT_INBOUND, DEFAULT_OUTBOUND};
