//! `usb-device` class for the bridge
//!
//! The class exposes one vendor-specific interface, with no endpoints besides
//! the default control pipe. The host moves data with two class (or vendor)
//! requests:
//!
//! - GET_REPORT, device to host, is answered with an input report from
//!   [`HostBridge::on_host_poll`].
//! - SET_REPORT, host to device, hands the output report to
//!   [`HostBridge::on_host_write`].
//!
//! Every other request is left to `usb-device` and other classes.

use usb_device::{
    class_prelude::*,
    control::{Recipient, Request, RequestType},
    UsbDirection,
};

use crate::bridge::{HostBridge, REPORT_LEN};
use crate::hal::Indicator;

/// Interface class code of a vendor-specific interface
pub const VENDOR_CLASS: u8 = 0xFF;
/// Request code that reads an input report
pub const GET_REPORT: u8 = 0x01;
/// Request code that writes an output report
pub const SET_REPORT: u8 = 0x09;

/// A report request addressed to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum ReportRequest {
    /// The host polls for an input report.
    Get,
    /// The host sends an output report.
    Set,
}

/// Recognize a report request for `interface`.
///
/// Accepts class and vendor requests, addressed either to the interface or
/// to the whole device. The direction must match the request code.
pub fn classify(req: &Request, interface: u8) -> Option<ReportRequest> {
    if !matches!(req.request_type, RequestType::Class | RequestType::Vendor) {
        return None;
    }
    let addressed = match req.recipient {
        Recipient::Interface => req.index as u8 == interface,
        Recipient::Device => true,
        _ => false,
    };
    if !addressed {
        return None;
    }

    match (req.request, req.direction) {
        (GET_REPORT, UsbDirection::In) => Some(ReportRequest::Get),
        (SET_REPORT, UsbDirection::Out) => Some(ReportRequest::Set),
        _ => None,
    }
}

/// The bridge as a USB class.
///
/// Allocate it from the bus allocator before building the `UsbDevice`, then
/// pass it to every `UsbDevice::poll`.
pub struct UartClass<'a, I, const RX: usize, const TX: usize> {
    interface: InterfaceNumber,
    bridge: HostBridge<'a, I, RX, TX>,
}

impl<'a, I: Indicator, const RX: usize, const TX: usize> UartClass<'a, I, RX, TX> {
    /// Allocate the bridge interface, and route its reports to `bridge`.
    pub fn new<B: UsbBus>(alloc: &UsbBusAllocator<B>, bridge: HostBridge<'a, I, RX, TX>) -> Self {
        UartClass {
            interface: alloc.interface(),
            bridge,
        }
    }

    /// Access the bridge, to check the overflow latch.
    pub fn bridge(&self) -> &HostBridge<'a, I, RX, TX> {
        &self.bridge
    }

    /// Mutable access to the bridge.
    pub fn bridge_mut(&mut self) -> &mut HostBridge<'a, I, RX, TX> {
        &mut self.bridge
    }

    fn interface(&self) -> u8 {
        u8::from(self.interface)
    }
}

impl<B, I, const RX: usize, const TX: usize> UsbClass<B> for UartClass<'_, I, RX, TX>
where
    B: UsbBus,
    I: Indicator,
{
    fn get_configuration_descriptors(&self, writer: &mut DescriptorWriter) -> usb_device::Result<()> {
        writer.interface(self.interface, VENDOR_CLASS, 0x00, 0x00)
    }

    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = *xfer.request();
        if classify(&req, self.interface()) != Some(ReportRequest::Get) {
            return;
        }

        let mut report = [0; REPORT_LEN];
        let len = self.bridge.on_host_poll(&mut report);
        let len = len.min(usize::from(req.length));
        trace!("GET_REPORT {=usize}", len);
        xfer.accept_with(&report[..len]).ok();
    }

    fn control_out(&mut self, xfer: ControlOut<B>) {
        let req = *xfer.request();
        if classify(&req, self.interface()) != Some(ReportRequest::Set) {
            return;
        }

        let _written = self.bridge.on_host_write(xfer.data());
        trace!("SET_REPORT {}", _written);
        xfer.accept().ok();
    }
}
