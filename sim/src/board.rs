//! Simulated drivers, one per collaborator contract.

use common::{BoardInfo, BootDevice, DramBank};
use embedded_hal::delay::DelayNs;
use hal::{
    boot_mode::BootMode,
    ccu::{Ccu, Clocks},
    cpu::Cpu,
    dm::{DeviceModel, ProbeStatus},
    dram::Dram,
    memory::Memory,
    serial::Serial,
    storage::{EnvStorage, Loader},
    time::Timer,
    Error,
};
use std::{cell::RefCell, collections::HashMap, rc::Rc};

/// What the CPU was asked to do.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CpuEvent {
    DisableInterrupts,
    EnableInterrupts,
    FlushDcache { start: usize, end: usize },
    InvalidateIcache,
    Jump { entry: usize, arg: usize },
}

/// Records every request. A jump returns at once, as if the image returned;
/// a reset panics with `"reset"`.
#[derive(Default)]
pub struct SimCpu {
    pub events: Vec<CpuEvent>,
}

impl SimCpu {
    pub fn jumps(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.events.iter().filter_map(|e| match *e {
            CpuEvent::Jump { entry, arg } => Some((entry, arg)),
            _ => None,
        })
    }
}

impl Cpu for SimCpu {
    fn disable_interrupts(&mut self) {
        self.events.push(CpuEvent::DisableInterrupts);
    }

    fn enable_interrupts(&mut self) {
        self.events.push(CpuEvent::EnableInterrupts);
    }

    fn flush_dcache_range(&mut self, start: usize, end: usize) {
        self.events.push(CpuEvent::FlushDcache { start, end });
    }

    fn invalidate_icache_all(&mut self) {
        self.events.push(CpuEvent::InvalidateIcache);
    }

    fn jump_to_image(&mut self, entry: usize, arg: usize) {
        self.events.push(CpuEvent::Jump { entry, arg });
    }

    fn reset(&mut self) -> ! {
        panic!("reset");
    }
}

pub struct SimClocks(pub Result<Clocks, Error>);

impl Default for SimClocks {
    fn default() -> Self {
        Self(Ok(Clocks {
            cpu: 1_008_000_000,
            bus: 200_000_000,
        }))
    }
}

impl Ccu for SimClocks {
    fn init(&mut self) -> Result<Clocks, Error> {
        self.0
    }
}

/// Virtual time: only delays advance the clock.
#[derive(Default)]
pub struct SimTimer {
    now_ns: u64,
    pub started: bool,
}

impl DelayNs for SimTimer {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ns += ns as u64;
    }
}

impl Timer for SimTimer {
    fn init(&mut self) -> Result<(), Error> {
        self.started = true;
        Ok(())
    }

    fn micros(&self) -> u64 {
        self.now_ns / 1_000
    }
}

/// Captures everything written to the UART.
#[derive(Default)]
pub struct SimSerial {
    pub baudrate: Option<u32>,
    out: Vec<u8>,
}

impl SimSerial {
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.out).into_owned()
    }
}

impl Serial for SimSerial {
    fn init(&mut self, baudrate: u32) -> Result<(), Error> {
        self.baudrate = Some(baudrate);
        Ok(())
    }

    fn put_char(&mut self, c: u8) {
        self.out.push(c);
    }
}

/// Reports busy for `training_polls` calls, then the configured memory.
pub struct SimDram {
    pub base: usize,
    pub size: usize,
    pub training_polls: u32,
    pub fail: Option<Error>,
    /// Overrides the single-bank default.
    pub banks: Option<Vec<DramBank>>,
    pub polls: u32,
}

impl SimDram {
    pub fn new(base: usize, size: usize) -> Self {
        Self {
            base,
            size,
            training_polls: 3,
            fail: None,
            banks: None,
            polls: 0,
        }
    }
}

impl Dram for SimDram {
    fn init(&mut self) -> nb::Result<(usize, usize), Error> {
        self.polls += 1;
        if let Some(e) = self.fail {
            return Err(nb::Error::Other(e));
        }
        if self.polls <= self.training_polls {
            return Err(nb::Error::WouldBlock);
        }
        Ok((self.base, self.size))
    }

    fn banksize(&mut self, base: usize, size: usize, bd: &mut BoardInfo) -> Result<(), Error> {
        match &self.banks {
            Some(banks) => {
                for (i, bank) in banks.iter().enumerate() {
                    if !bd.set_bank(i, *bank) {
                        return Err(Error::TooLarge);
                    }
                }
            }
            None => {
                bd.set_bank(0, DramBank::new(base, size));
            }
        }
        Ok(())
    }
}

/// One bound device and the result its probe gives.
pub struct SimDevice {
    pub name: &'static str,
    pub required: bool,
    pub result: Result<(), Error>,
}

#[derive(Default)]
pub struct SimDevices {
    pub devices: Vec<SimDevice>,
    pub probed: Vec<&'static str>,
}

impl SimDevices {
    pub fn bind(&mut self, name: &'static str, required: bool, result: Result<(), Error>) -> &mut Self {
        self.devices.push(SimDevice {
            name,
            required,
            result,
        });
        self
    }
}

impl DeviceModel for SimDevices {
    fn probe_all(&mut self, report: &mut dyn FnMut(ProbeStatus<'_>)) {
        for dev in &self.devices {
            self.probed.push(dev.name);
            report(ProbeStatus {
                name: dev.name,
                required: dev.required,
                result: dev.result,
            });
        }
    }
}

/// Environment storage holding an optional raw blob.
#[derive(Default)]
pub struct SimEnv {
    pub blob: Option<Vec<u8>>,
}

impl EnvStorage for SimEnv {
    fn load(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        let blob = self.blob.as_ref().ok_or(Error::NoMedium)?;
        buf.fill(0);
        let n = blob.len().min(buf.len());
        buf[..n].copy_from_slice(&blob[..n]);
        Ok(())
    }
}

pub struct SimBootMode(pub u32);

impl BootMode for SimBootMode {
    fn read(&self) -> u32 {
        self.0
    }
}

/// Shared record of which devices were asked for an image, in order.
pub type LoadLog = Rc<RefCell<Vec<BootDevice>>>;

/// A boot medium with one scripted outcome per device.
pub struct SimLoader {
    name: &'static str,
    media: HashMap<BootDevice, Result<Vec<u8>, Error>>,
    log: LoadLog,
}

impl SimLoader {
    pub fn new(name: &'static str, log: &LoadLog) -> Self {
        Self {
            name,
            media: HashMap::new(),
            log: log.clone(),
        }
    }

    pub fn image(mut self, device: BootDevice, bytes: Vec<u8>) -> Self {
        self.media.insert(device, Ok(bytes));
        self
    }

    pub fn failing(mut self, device: BootDevice, error: Error) -> Self {
        self.media.insert(device, Err(error));
        self
    }
}

impl Loader for SimLoader {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, device: BootDevice) -> bool {
        self.media.contains_key(&device)
    }

    fn load(
        &mut self,
        device: BootDevice,
        mem: &mut dyn Memory,
        dest: usize,
        max_len: usize,
    ) -> Result<usize, Error> {
        self.log.borrow_mut().push(device);
        let bytes = match self.media.get(&device) {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => return Err(*e),
            None => return Err(Error::NoDevice),
        };
        if bytes.len() > max_len {
            return Err(Error::TooLarge);
        }
        mem.write(dest, bytes)?;
        log::trace!("{}: {} bytes from {device} to {dest:#x}", self.name, bytes.len());
        Ok(bytes.len())
    }
}
