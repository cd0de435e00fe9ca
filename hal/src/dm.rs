use crate::Error;

/// Outcome of probing one bound device.
#[derive(Clone, Copy, Debug)]
pub struct ProbeStatus<'a> {
    pub name: &'a str,
    /// The boot cannot go on without this device, e.g. the boot-source controller.
    pub required: bool,
    pub result: Result<(), Error>,
}

/// Driver model.
pub trait DeviceModel {
    /// Probes every bound device once, reporting each outcome through `report`.
    fn probe_all(&mut self, report: &mut dyn FnMut(ProbeStatus<'_>));
}
