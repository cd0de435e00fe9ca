use crate::gd::{GdFlags, GlobalData};
use core::fmt::{self, Arguments, Write};
use hal::serial::Serial;

/// Bytes kept before the console is up.
pub const PRE_CONSOLE_LEN: usize = 512;

/// Output buffered until the UART is initialised.
pub struct PreConsole {
    buf: [u8; PRE_CONSOLE_LEN],
    len: usize,
    lost: usize,
}

impl PreConsole {
    pub(crate) const fn new() -> Self {
        Self {
            buf: [0; PRE_CONSOLE_LEN],
            len: 0,
            lost: 0,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        let room = PRE_CONSOLE_LEN - self.len;
        let n = bytes.len().min(room);
        self.buf[self.len..][..n].copy_from_slice(&bytes[..n]);
        self.len += n;
        self.lost += bytes.len() - n;
    }

    #[inline]
    pub fn pending(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Bytes dropped because the buffer was full.
    #[inline]
    pub fn lost(&self) -> usize {
        self.lost
    }

    /// Writes everything buffered to `serial` and empties the buffer.
    ///
    /// Returns the number of bytes that had been lost.
    pub(crate) fn flush_to(&mut self, serial: &mut dyn Serial) -> usize {
        for &c in &self.buf[..self.len] {
            serial.put_char(c);
        }
        let lost = self.lost;
        self.len = 0;
        self.lost = 0;
        lost
    }
}

/// Raw UART writer.
pub struct SerialOut<'a>(pub &'a mut dyn Serial);

impl Write for SerialOut<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.bytes() {
            self.0.put_char(c);
        }
        Ok(())
    }
}

/// Board console: UART once it is up, the pre-console buffer before that.
pub struct Console<'a> {
    gd: &'a mut GlobalData,
    serial: &'a mut dyn Serial,
}

impl<'a> Console<'a> {
    #[inline]
    pub fn new(gd: &'a mut GlobalData, serial: &'a mut dyn Serial) -> Self {
        Self { gd, serial }
    }
}

impl Write for Console<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let flags = self.gd.flags();
        if flags.contains(GdFlags::SILENT) {
            return Ok(());
        }
        if flags.contains(GdFlags::HAVE_CONSOLE) {
            SerialOut(&mut *self.serial).write_str(s)?;
        } else {
            self.gd.precon.push(s.as_bytes());
        }
        Ok(())
    }
}

#[inline]
pub fn print(out: &mut impl Write, args: Arguments) {
    // nowhere to report a console failure
    let _ = out.write_fmt(args);
}

/// Formats to a console.
#[macro_export]
macro_rules! printf {
    ($out:expr, $($arg:tt)*) => {
        $crate::console::print(&mut $out, core::format_args!($($arg)*))
    };
}

/// Byte count in binary units: `512 MiB`, `1.5 GiB`.
#[derive(Clone, Copy, Debug)]
pub struct Size(pub u64);

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [&str; 7] = ["Bytes", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
        let mut unit = 0;
        while unit + 1 < UNITS.len() && self.0 >> (10 * (unit + 1)) != 0 {
            unit += 1;
        }
        if unit == 0 {
            return write!(f, "{} Bytes", self.0);
        }
        let shift = 10 * unit;
        let mut whole = self.0 >> shift;
        let rest = self.0 & ((1u64 << shift) - 1);
        // one decimal, rounded half up
        let mut tenths = ((rest * 10) + (1 << (shift - 1))) >> shift;
        if tenths == 10 {
            whole += 1;
            tenths = 0;
        }
        if tenths == 0 {
            write!(f, "{whole} {}", UNITS[unit])
        } else {
            write!(f, "{whole}.{tenths} {}", UNITS[unit])
        }
    }
}
