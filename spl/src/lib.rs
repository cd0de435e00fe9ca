//! Staged boot for the first stage that runs from on-chip SRAM.
//!
//! ```text
//! board_init_f -> relocate_code -> board_init_r -> boot flow -> jump
//!      |               |                |              |
//!      +---------------+----------------+--------------+--> hang
//! ```
//!
//! Board code provides the drivers through [`Platform`], a [`Config`] and
//! the linker facts of the running image, then calls [`spl_main`].

#![cfg_attr(not(test), no_std)]

pub mod board_f;
pub mod board_r;
pub mod boot;
pub mod bootstage;
pub mod config;
pub mod console;
pub mod env;
pub mod gd;
pub mod hang;
pub mod heap;
pub mod initcall;
pub mod layout;
pub mod reloc;

pub use boot::{BootFailure, SplImage};
pub use config::Config;
pub use gd::{Early, Gd, GdFlags, GlobalData, Relocated};
pub use hang::{hang, Abort, Hang};
pub use reloc::{Arch, ImageInfo};

use hal::{
    boot_mode::BootMode, ccu::Ccu, cpu::Cpu, dm::DeviceModel, dram::Dram, memory::Memory,
    serial::Serial, storage::EnvStorage, storage::Loader, time::Timer,
};

/// The board's drivers, as seen by the boot core.
pub struct Platform<'p> {
    pub cpu: &'p mut dyn Cpu,
    pub clocks: &'p mut dyn Ccu,
    pub timer: &'p mut dyn Timer,
    pub serial: &'p mut dyn Serial,
    pub dram: &'p mut dyn Dram,
    pub memory: &'p mut dyn Memory,
    pub devices: &'p mut dyn DeviceModel,
    pub env: &'p mut dyn EnvStorage,
    pub boot_mode: &'p dyn BootMode,
    /// Searched in order for one that supports the boot device.
    pub loaders: &'p mut [&'p mut dyn Loader],
}

/// Everything needed to enter the next stage.
pub struct Handoff {
    pub image: SplImage,
    /// First argument register: the relocated device tree, or zero.
    pub arg: usize,
    pub gd: Gd<Relocated>,
}

impl Handoff {
    /// Enters the image. Only comes back if the image returns.
    pub fn jump(&self, cpu: &mut dyn Cpu) -> Abort {
        let image = &self.image;
        log::info!(
            "jumping to {} at {:#x}, arg {:#x}",
            image.name(),
            image.entry_point,
            self.arg
        );
        cpu.disable_interrupts();
        cpu.flush_dcache_range(image.load_addr, image.load_addr + image.size);
        cpu.invalidate_icache_all();
        cpu.jump_to_image(image.entry_point, self.arg);
        Abort {
            reason: Hang::ImageReturned {
                entry: image.entry_point,
            },
            flags: self.gd.flags(),
        }
    }
}

/// Runs every phase up to, but not including, the jump.
///
/// `boot_flags` come from the boot ROM; [`GdFlags::SILENT`] is honoured.
pub fn run(
    p: &mut Platform<'_>,
    cfg: &Config,
    image: &ImageInfo,
    boot_flags: u32,
) -> Result<Handoff, Abort> {
    let (gd, plan) = board_f::board_init_f(p, cfg, image, boot_flags).map_err(|(gd, e)| Abort {
        reason: Hang::Initcall(e),
        flags: gd.flags(),
    })?;
    let gd = reloc::relocate_code(gd, &plan, image, &mut *p.memory, &mut *p.cpu).map_err(
        |(gd, e)| Abort {
            reason: Hang::Relocate(e),
            flags: gd.flags(),
        },
    )?;
    board_r::board_init_r(p, cfg, image, gd)
}

/// Boots the board. Never returns: control either leaves for the next
/// stage or ends in [`hang`].
pub fn spl_main(p: &mut Platform<'_>, cfg: &Config, image: &ImageInfo, boot_flags: u32) -> ! {
    let abort = match run(p, cfg, image, boot_flags) {
        Ok(handoff) => handoff.jump(&mut *p.cpu),
        Err(abort) => abort,
    };
    hang(p, cfg, &abort)
}
