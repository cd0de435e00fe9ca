//! Pre-relocation init: no DRAM, no heap, no interrupts.

use crate::{
    bootstage::BootstageId,
    config::Config,
    console::{Console, Size},
    gd::{Early, Gd, GdFlags},
    initcall::{initcalls, run_list, InitResult, Initcall, InitcallError},
    layout::{LayoutInput, RelocPlan, Reserve},
    printf,
    reloc::{self, ImageInfo, BOARD_INFO_LEN},
    Platform,
};
use hal::Error;

/// Poll interval while DRAM trains.
const DRAM_POLL_US: u32 = 10;

/// Context of the pre-relocation sequence.
pub struct InitF<'a, 'p> {
    pub(crate) gd: Gd<Early>,
    p: &'a mut Platform<'p>,
    cfg: &'a Config,
    image: &'a ImageInfo,
    plan: Option<RelocPlan>,
}

/// Runs the pre-relocation sequence.
///
/// On success global data is complete and the relocation plan is final. On
/// failure the early global data is returned for diagnostics.
pub fn board_init_f(
    p: &mut Platform<'_>,
    cfg: &Config,
    image: &ImageInfo,
    boot_flags: u32,
) -> Result<(Gd<Early>, RelocPlan), (Gd<Early>, InitcallError)> {
    let mut gd = Gd::init(cfg.scratch_addr);
    gd.boot_flags = boot_flags;
    gd.set_flags(GdFlags::SPL_INIT);
    if boot_flags & GdFlags::SILENT.bits() != 0 {
        gd.set_flags(GdFlags::SILENT);
    }
    let mut ctx = InitF {
        gd,
        p,
        cfg,
        image,
        plan: None,
    };
    if let Err(e) = run_list(&mut ctx, &InitF::SEQUENCE) {
        return Err((ctx.gd, e));
    }
    match ctx.plan {
        Some(plan) => Ok((ctx.gd, plan)),
        None => Err((
            ctx.gd,
            InitcallError {
                name: "reserve_uboot",
                error: Error::Invalid,
            },
        )),
    }
}

impl<'a, 'p> InitF<'a, 'p> {
    const SEQUENCE: [Initcall<Self>; 20] = initcalls![
        setup_mon_len,
        fdtdec_setup,
        arch_cpu_init,
        init_clocks,
        timer_init,
        env_init,
        init_baud_rate,
        console_init_f,
        display_options,
        dram_init,
        dram_init_banksize,
        show_dram_config,
        setup_dest_addr,
        reserve_uboot,
        reserve_malloc,
        reserve_board,
        reserve_global_data,
        reserve_stacks,
        validate_relocs,
        setup_reloc,
    ];

    fn console(&mut self) -> Console<'_> {
        Console::new(&mut self.gd, &mut *self.p.serial)
    }

    fn mark(&mut self, id: BootstageId) {
        let now = self.p.timer.micros();
        self.gd.bootstage.mark(id, now);
    }

    fn plan(&self) -> Result<&RelocPlan, Error> {
        self.plan.as_ref().ok_or(Error::Invalid)
    }

    fn setup_mon_len(&mut self) -> InitResult {
        if self.image.bss_end < self.image.link_addr {
            return Err(Error::Invalid.into());
        }
        self.gd.mon_len = self.image.mon_len();
        Ok(())
    }

    fn fdtdec_setup(&mut self) -> InitResult {
        self.gd.fdt_blob = self.image.fdt.unwrap_or(0);
        Ok(())
    }

    fn arch_cpu_init(&mut self) -> InitResult {
        self.p.cpu.disable_interrupts();
        Ok(())
    }

    fn init_clocks(&mut self) -> InitResult {
        let clocks = self.p.clocks.init()?;
        self.gd.cpu_clk = clocks.cpu;
        self.gd.bus_clk = clocks.bus;
        // buffered until console_init_f
        printf!(
            self.console(),
            "CPU:   {} MHz, bus {} MHz\n",
            clocks.cpu / 1_000_000,
            clocks.bus / 1_000_000
        );
        Ok(())
    }

    fn timer_init(&mut self) -> InitResult {
        self.p.timer.init()?;
        self.mark(BootstageId::Start);
        Ok(())
    }

    fn env_init(&mut self) -> InitResult {
        if let Some((addr, len)) = self.image.default_env {
            self.gd.env_addr = addr;
            self.gd.env_len = len;
        }
        Ok(())
    }

    fn init_baud_rate(&mut self) -> InitResult {
        self.gd.baudrate = self.cfg.baudrate;
        Ok(())
    }

    fn console_init_f(&mut self) -> InitResult {
        self.p.serial.init(self.gd.baudrate)?;
        self.gd.set_flags(GdFlags::HAVE_CONSOLE);
        if !self.gd.flags().contains(GdFlags::SILENT) {
            let lost = self.gd.precon.flush_to(&mut *self.p.serial);
            if lost != 0 {
                printf!(self.console(), "[pre-console: {lost} bytes lost]\n");
            }
        }
        self.mark(BootstageId::ConsoleReady);
        Ok(())
    }

    fn display_options(&mut self) -> InitResult {
        let board = self.cfg.board;
        printf!(
            self.console(),
            "\nU-Boot SPL {} ({board})\n",
            env!("CARGO_PKG_VERSION")
        );
        Ok(())
    }

    fn dram_init(&mut self) -> InitResult {
        let start = self.p.timer.micros();
        let (base, size) = loop {
            match self.p.dram.init() {
                Ok(found) => break found,
                Err(nb::Error::Other(e)) => return Err(e.into()),
                Err(nb::Error::WouldBlock) => {
                    if self.p.timer.micros() - start >= self.cfg.dram_timeout_us {
                        log::error!("DRAM calibration timed out");
                        return Err(Error::Timeout.into());
                    }
                    self.p.timer.delay_us(DRAM_POLL_US);
                }
            }
        };
        if size == 0 {
            return Err(Error::NoMemory.into());
        }
        self.gd.ram_base = base;
        self.gd.ram_size = size;
        self.gd.set_flags(GdFlags::DRAM_READY);
        self.mark(BootstageId::DramReady);
        Ok(())
    }

    fn dram_init_banksize(&mut self) -> InitResult {
        let (base, size) = (self.gd.ram_base, self.gd.ram_size);
        self.p.dram.banksize(base, size, &mut self.gd.bd)?;
        if !self.gd.bd.is_well_formed() {
            log::error!("DRAM banks are empty, unordered or overlapping");
            return Err(Error::Invalid.into());
        }
        Ok(())
    }

    fn show_dram_config(&mut self) -> InitResult {
        for (i, bank) in self.gd.bd.banks().enumerate() {
            log::debug!("bank #{i}: start {:#x}, size {:#x}", bank.start, bank.size);
        }
        let total = self.gd.bd.total_size() as u64;
        printf!(self.console(), "DRAM:  {}\n", Size(total));
        Ok(())
    }

    fn setup_dest_addr(&mut self) -> InitResult {
        let top = self
            .p
            .dram
            .usable_ram_top(self.gd.ram_base, self.gd.ram_size);
        if top <= self.gd.ram_base {
            return Err(Error::NoMemory.into());
        }
        self.gd.ram_top = top;
        log::debug!("Ram top: {top:#x}");
        Ok(())
    }

    fn reserve_uboot(&mut self) -> InitResult {
        let plan = RelocPlan::compute(&LayoutInput {
            ram_base: self.gd.ram_base,
            ram_top: self.gd.ram_top,
            link_addr: self.image.link_addr,
            mon_len: self.gd.mon_len,
            align: self.cfg.reloc_align,
            reserve: Reserve {
                malloc: self.cfg.malloc_len,
                board_info: BOARD_INFO_LEN,
                global_data: core::mem::size_of::<crate::gd::GlobalData>(),
                stack: self.cfg.stack_size,
            },
        })?;
        log::debug!(
            "Reserving {}k for U-Boot at: {:#x}",
            plan.mon_len >> 10,
            plan.relocaddr
        );
        self.gd.relocaddr = plan.relocaddr;
        self.plan = Some(plan);
        Ok(())
    }

    fn reserve_malloc(&mut self) -> InitResult {
        let malloc = self.plan()?.malloc.clone();
        log::debug!(
            "Reserving {}k for malloc() at: {:#x}",
            malloc.len() >> 10,
            malloc.start
        );
        self.gd.malloc_base = malloc.start;
        self.gd.malloc_limit = malloc.end;
        Ok(())
    }

    fn reserve_board(&mut self) -> InitResult {
        let addr = self.plan()?.board_info;
        log::debug!("Reserving {BOARD_INFO_LEN} Bytes for Board Info at: {addr:#x}");
        Ok(())
    }

    fn reserve_global_data(&mut self) -> InitResult {
        let addr = self.plan()?.global_data;
        log::debug!(
            "Reserving {} Bytes for Global Data at: {addr:#x}",
            core::mem::size_of::<crate::gd::GlobalData>()
        );
        Ok(())
    }

    fn reserve_stacks(&mut self) -> InitResult {
        let stack = self.plan()?.stack.clone();
        if stack.len() < self.cfg.stack_size {
            return Err(Error::NoMemory.into());
        }
        self.gd.start_addr_sp = stack.end;
        log::debug!("Stack Pointer at: {:#x}", stack.end);
        Ok(())
    }

    fn validate_relocs(&mut self) -> InitResult {
        let n = reloc::validate_relocs(&*self.p.memory, self.image, self.cfg.arch)?;
        log::debug!("{n} relocations checked");
        Ok(())
    }

    fn setup_reloc(&mut self) -> InitResult {
        let plan = self.plan()?;
        let (off, gd_addr, relocaddr) = (plan.reloc_off, plan.global_data, plan.relocaddr);
        if off == 0 {
            self.gd.set_flags(GdFlags::SKIP_RELOC);
        }
        log::debug!("Relocation Offset is: {off:08x}");
        log::debug!(
            "Relocating to {relocaddr:08x}, new gd at {gd_addr:08x}, sp at {:08x}",
            self.gd.start_addr_sp
        );
        Ok(())
    }
}
