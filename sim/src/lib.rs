//! A board made of host memory and scripted drivers, for running the boot
//! core off target.

mod board;
mod firmware;
pub mod memory;

pub use board::{
    CpuEvent, LoadLog, SimBootMode, SimClocks, SimCpu, SimDevice, SimDevices, SimDram, SimEnv,
    SimLoader, SimSerial, SimTimer,
};
pub use firmware::{legacy_image, Firmware, FirmwareBuilder};
pub use memory::SimMemory;

use common::{
    memory::{DRAM, SRAM},
    BootDevice,
};
use hal::storage::Loader;
use spl::Platform;

pub const SRAM_SIZE: usize = 0x2_0000;
pub const DRAM_SIZE: usize = 8 << 20;

/// Every driver the boot core needs, with public state for inspection.
pub struct SimBoard {
    pub cpu: SimCpu,
    pub clocks: SimClocks,
    pub timer: SimTimer,
    pub serial: SimSerial,
    pub dram: SimDram,
    pub memory: SimMemory,
    pub devices: SimDevices,
    pub env: SimEnv,
    pub boot_mode: SimBootMode,
    pub loaders: Vec<SimLoader>,
    pub loads: LoadLog,
}

impl SimBoard {
    /// SRAM at its usual base, DRAM at its usual base, strap value 0.
    pub fn new() -> Self {
        let mut mem = SimMemory::new();
        mem.add_region(SRAM, SRAM_SIZE)
            .add_region(DRAM, DRAM_SIZE);
        Self {
            cpu: SimCpu::default(),
            clocks: SimClocks::default(),
            timer: SimTimer::default(),
            serial: SimSerial::default(),
            dram: SimDram::new(DRAM, DRAM_SIZE),
            memory: mem,
            devices: SimDevices::default(),
            env: SimEnv::default(),
            boot_mode: SimBootMode(0),
            loaders: Vec::new(),
            loads: LoadLog::default(),
        }
    }

    /// Starts a loader that logs into this board's load record.
    pub fn loader(&self, name: &'static str) -> SimLoader {
        SimLoader::new(name, &self.loads)
    }

    /// Devices asked for an image so far, in order.
    pub fn load_order(&self) -> Vec<BootDevice> {
        self.loads.borrow().clone()
    }

    /// Lends the drivers to `f` as a [`Platform`].
    pub fn with_platform<R>(&mut self, f: impl FnOnce(&mut Platform<'_>) -> R) -> R {
        let mut loaders: Vec<&mut dyn Loader> = self
            .loaders
            .iter_mut()
            .map(|l| l as &mut dyn Loader)
            .collect();
        let mut p = Platform {
            cpu: &mut self.cpu,
            clocks: &mut self.clocks,
            timer: &mut self.timer,
            serial: &mut self.serial,
            dram: &mut self.dram,
            memory: &mut self.memory,
            devices: &mut self.devices,
            env: &mut self.env,
            boot_mode: &self.boot_mode,
            loaders: &mut loaders,
        };
        f(&mut p)
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// A small SPL image with a few self-references, a device tree and a
/// built-in environment, linked at the start of SRAM.
pub fn sample_firmware() -> Firmware {
    sample_firmware_at(SRAM)
}

/// [`sample_firmware`] linked at `link_addr`.
pub fn sample_firmware_at(link_addr: usize) -> Firmware {
    FirmwareBuilder::new(link_addr, 0x1000)
        .pointer(0x100, 0x800)
        .pointer(0x108, 0x0)
        .pointer(0x800, 0x100)
        .fdt(&[0xd0, 0x0d, 0xfe, 0xed, 0, 0, 0, 0x28])
        .default_env(&[("bootdelay", "2"), ("stdout", "serial")])
        .bss(0x400)
        .build()
}
