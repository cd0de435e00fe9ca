//! Post-relocation init, ending in the boot-device state machine.

use crate::{
    bootstage::BootstageId,
    config::Config,
    console::Console,
    env::Env,
    gd::{Gd, GdFlags, Relocated},
    hang::{Abort, Hang},
    heap::Heap,
    initcall::{initcalls, run_list, Failure, InitResult, Initcall},
    printf,
    reloc::ImageInfo,
    Handoff, Platform,
};
use common::env::CRC_LEN;
use hal::Error;

/// Context of the post-relocation sequence and of the boot flow.
pub struct InitR<'a, 'p, 'h> {
    pub(crate) gd: Gd<Relocated>,
    pub(crate) p: &'a mut Platform<'p>,
    pub(crate) cfg: &'a Config,
    image: &'a ImageInfo,
    heap: &'h Heap,
    pub(crate) env: Option<Env<'h>>,
}

/// Runs the post-relocation sequence on the relocated global data, then
/// selects a boot device and loads the next stage from it.
pub fn board_init_r(
    p: &mut Platform<'_>,
    cfg: &Config,
    image: &ImageInfo,
    gd: Gd<Relocated>,
) -> Result<Handoff, Abort> {
    let heap = Heap::new();
    let mut ctx = InitR {
        gd,
        p,
        cfg,
        image,
        heap: &heap,
        env: None,
    };
    if let Err(e) = run_list(&mut ctx, &InitR::SEQUENCE) {
        return Err(Abort {
            reason: Hang::Initcall(e),
            flags: ctx.gd.flags(),
        });
    }
    match ctx.boot_flow() {
        Ok(spl_image) => {
            ctx.mark(BootstageId::Handoff);
            ctx.gd.bootstage().report();
            let arg = ctx.gd.fdt_blob;
            Ok(Handoff {
                image: spl_image,
                arg,
                gd: ctx.gd,
            })
        }
        Err(failure) => Err(Abort {
            reason: Hang::Boot(failure),
            flags: ctx.gd.flags(),
        }),
    }
}

impl<'a, 'p, 'h> InitR<'a, 'p, 'h> {
    const SEQUENCE: [Initcall<Self>; 8] = initcalls![
        initr_reloc,
        initr_clear_bss,
        initr_malloc,
        initr_console,
        initr_dm,
        initr_env,
        initr_interrupts,
        initr_announce,
    ];

    pub(crate) fn console(&mut self) -> Console<'_> {
        Console::new(&mut self.gd, &mut *self.p.serial)
    }

    pub(crate) fn mark(&mut self, id: BootstageId) {
        let now = self.p.timer.micros();
        self.gd.bootstage.mark(id, now);
    }

    fn initr_reloc(&mut self) -> InitResult {
        // the early record is gone; nothing may refer to the scratch copy
        debug_assert_eq!(self.gd.addr(), self.gd.new_gd);
        self.mark(BootstageId::Relocated);
        Ok(())
    }

    fn initr_clear_bss(&mut self) -> InitResult {
        let off = self.gd.reloc_off();
        let start = self.image.bss_start.wrapping_add(off);
        let len = self.image.bss_end - self.image.bss_start;
        self.p.memory.fill(start, len, 0)?;
        Ok(())
    }

    fn initr_malloc(&mut self) -> InitResult {
        let (base, limit) = (self.gd.malloc_base, self.gd.malloc_limit);
        let len = limit - base;
        let ptr = self
            .p
            .memory
            .as_mut_ptr(base, len)
            .ok_or(Error::NoMemory)?;
        // SAFETY: the layout reserves this carve-out for the heap alone, and
        // it stays mapped until control leaves this stage
        unsafe { self.heap.claim(ptr, len)? };
        self.gd.set_flags(GdFlags::FULL_MALLOC_INIT);
        log::debug!("malloc: {len:#x} bytes at {base:#x}");
        Ok(())
    }

    fn initr_console(&mut self) -> InitResult {
        self.gd.set_flags(GdFlags::DEVINIT);
        Ok(())
    }

    fn initr_dm(&mut self) -> InitResult {
        let mut required = None;
        let (mut ok, mut failed) = (0, 0);
        self.p.devices.probe_all(&mut |status| match status.result {
            Ok(()) => {
                log::debug!("probed {}", status.name);
                ok += 1;
            }
            Err(e) if status.required => {
                log::error!("required device {} failed: {e}", status.name);
                required.get_or_insert(e);
                failed += 1;
            }
            Err(e) => {
                log::warn!("device {} failed: {e}", status.name);
                failed += 1;
            }
        });
        log::debug!("dm: {ok} devices probed, {failed} failed");
        match required {
            Some(e) => Err(Failure::Fatal(e)),
            None => Ok(()),
        }
    }

    /// Falls back to the built-in environment when storage has none; that is
    /// a soft failure.
    fn initr_env(&mut self) -> InitResult {
        if self.cfg.env_size <= CRC_LEN + 1 {
            return Err(Error::Invalid.into());
        }
        let buf = self.heap.alloc_buf(self.cfg.env_size)?;
        let (env, result) = match Env::load(buf, &mut *self.p.env) {
            Ok(env) => (env, Ok(())),
            Err((buf, e)) => {
                printf!(
                    self.console(),
                    "*** Warning - {e}, using default environment\n"
                );
                let (addr, len) = (self.gd.env_addr, self.gd.env_len);
                let env = Env::default_from(buf, &*self.p.memory, addr, len)?;
                self.gd.set_flags(GdFlags::ENV_DEFAULT);
                (env, Err(Failure::Soft(e)))
            }
        };
        log::debug!(
            "env: {} variables from {:?}",
            env.vars().count(),
            env.source()
        );
        self.env = Some(env);
        self.gd.set_flags(GdFlags::ENV_READY);
        result
    }

    fn initr_interrupts(&mut self) -> InitResult {
        if self.cfg.enable_interrupts {
            self.p.cpu.enable_interrupts();
        }
        Ok(())
    }

    fn initr_announce(&mut self) -> InitResult {
        log::debug!("Now running in RAM - U-Boot at: {:08x}", self.gd.relocaddr);
        self.mark(BootstageId::BoardInitR);
        Ok(())
    }
}
