//! The only failure action: report, then reset or park.

use crate::{
    boot::BootFailure,
    config::Config,
    console::SerialOut,
    gd::GdFlags,
    initcall::InitcallError,
    printf, Platform,
};
use common::Arrow;
use core::fmt;
use hal::Error;

/// Width of the parking animation.
const ARROW_WIDTH: usize = 52;
const FRAME_MS: u32 = 100;

/// Why the boot stopped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Hang {
    Initcall(InitcallError),
    Relocate(Error),
    Boot(BootFailure),
    /// The next stage gave control back.
    ImageReturned { entry: usize },
}

impl fmt::Display for Hang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initcall(e) => write!(f, "{e}"),
            Self::Relocate(e) => write!(f, "relocation failed: {e}"),
            Self::Boot(failure) => write!(f, "{failure}"),
            Self::ImageReturned { entry } => write!(f, "image at {entry:#x} returned"),
        }
    }
}

impl From<InitcallError> for Hang {
    #[inline]
    fn from(value: InitcallError) -> Self {
        Self::Initcall(value)
    }
}

/// A stopped boot, with the global-data flags at the time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Abort {
    pub reason: Hang,
    pub flags: GdFlags,
}

impl Abort {
    /// Whether a diagnostic can reach the user.
    #[inline]
    pub fn console_ready(&self) -> bool {
        self.flags.contains(GdFlags::HAVE_CONSOLE) && !self.flags.contains(GdFlags::SILENT)
    }
}

impl fmt::Display for Abort {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.reason.fmt(f)
    }
}

/// Prints the diagnostic, then resets the board or parks it forever.
pub fn hang(p: &mut Platform<'_>, cfg: &Config, abort: &Abort) -> ! {
    log::error!("{abort}");
    p.cpu.disable_interrupts();
    let console = abort.console_ready();
    if console {
        let mut out = SerialOut(&mut *p.serial);
        printf!(out, "{abort}\n### ERROR ### Please RESET the board ###\n");
        p.serial.flush();
    }
    if cfg.reset_on_hang {
        p.cpu.reset();
    }
    if !console {
        loop {
            p.timer.delay_ms(FRAME_MS);
        }
    }
    let serial = &mut *p.serial;
    let mut arrow = Arrow::init(ARROW_WIDTH, |frame: &[u8]| {
        for &c in frame {
            serial.put_char(c);
        }
    });
    loop {
        arrow.next();
        p.timer.delay_ms(FRAME_MS);
    }
}
