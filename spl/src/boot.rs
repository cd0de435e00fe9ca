//! Boot-device selection and next-stage loading.
//!
//! ```text
//! SelectDevice -> LoadImage -> ValidateImage -> Jump
//!                   ^  |            |
//!                   +--+------------+  next candidate
//!                      |
//!                      +-> Hang     no candidate left
//! ```

use crate::{board_r::InitR, bootstage::BootstageId, printf};
use common::{
    image::{self, Header, HEADER_SIZE},
    memory::{contains_range, overlaps},
    BootDevice,
};
use core::{fmt, ops::Range};
use hal::Error;

/// Most devices tried in one boot.
pub const MAX_CANDIDATES: usize = 8;

/// A loaded, validated next stage.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SplImage {
    pub device: BootDevice,
    pub load_addr: usize,
    pub entry_point: usize,
    pub size: usize,
    /// `None` for a raw image.
    pub header: Option<Header>,
}

impl SplImage {
    pub fn name(&self) -> &str {
        self.header.as_ref().map_or("raw image", Header::name)
    }
}

/// Why no image could be booted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BootFailure {
    /// The boot-mode value is not in the board's table.
    UnknownBootMode(u32),
    /// The configured load window is not usable DRAM.
    BadLoadWindow,
    /// Every candidate failed.
    Exhausted {
        tried: usize,
        last: Option<(BootDevice, Error)>,
    },
}

impl fmt::Display for BootFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBootMode(mode) => write!(f, "unsupported boot mode {mode:#x}"),
            Self::BadLoadWindow => f.write_str("load window is not usable DRAM"),
            Self::Exhausted { tried, last } => {
                write!(f, "SPL: failed to boot from all boot devices ({tried} tried)")?;
                if let Some((dev, e)) = last {
                    write!(f, ", last {dev}: {e}")?;
                }
                Ok(())
            }
        }
    }
}

/// Ordered boot devices without duplicates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Candidates {
    list: [BootDevice; MAX_CANDIDATES],
    len: usize,
}

impl Candidates {
    pub const fn new() -> Self {
        Self {
            list: [BootDevice::Ram; MAX_CANDIDATES],
            len: 0,
        }
    }

    /// `primary` first, then `boot_targets` from the environment if set, else `fallback`.
    pub fn build(primary: BootDevice, boot_targets: Option<&str>, fallback: &[BootDevice]) -> Self {
        let mut ans = Self::new();
        ans.push(primary);
        match boot_targets {
            Some(targets) => {
                for name in targets.split_whitespace() {
                    match name.parse() {
                        Ok(dev) => {
                            if !ans.push(dev) {
                                log::warn!("boot_targets: too many devices, ignoring the rest");
                                break;
                            }
                        }
                        Err(_) => log::warn!("boot_targets: unknown device {name}"),
                    }
                }
            }
            None => {
                for &dev in fallback {
                    ans.push(dev);
                }
            }
        }
        ans
    }

    /// Appends `dev` unless already listed. Returns `false` if the list is full.
    pub fn push(&mut self, dev: BootDevice) -> bool {
        if self.as_slice().contains(&dev) {
            return true;
        }
        match self.list.get_mut(self.len) {
            Some(slot) => {
                *slot = dev;
                self.len += 1;
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[BootDevice] {
        &self.list[..self.len]
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<BootDevice> {
        self.as_slice().get(idx).copied()
    }
}

impl Default for Candidates {
    fn default() -> Self {
        Self::new()
    }
}

enum State {
    SelectDevice,
    LoadImage(usize),
    ValidateImage {
        idx: usize,
        device: BootDevice,
        len: usize,
    },
    Jump(SplImage),
    Hang(BootFailure),
}

impl InitR<'_, '_, '_> {
    /// Runs the state machine to a loaded image or to a failure.
    ///
    /// Candidates are tried once each, in order; a load or validation
    /// failure moves on to the next one.
    pub(crate) fn boot_flow(&mut self) -> Result<SplImage, BootFailure> {
        let mut candidates = Candidates::new();
        let mut last = None;
        let mut state = State::SelectDevice;
        loop {
            state = match state {
                State::SelectDevice => self.select_device(&mut candidates),
                State::LoadImage(idx) => match candidates.get(idx) {
                    None => State::Hang(BootFailure::Exhausted { tried: idx, last }),
                    Some(device) => match self.load_image(device) {
                        Ok(len) => State::ValidateImage { idx, device, len },
                        Err(e) => {
                            self.report(device, e);
                            last = Some((device, e));
                            State::LoadImage(idx + 1)
                        }
                    },
                },
                State::ValidateImage { idx, device, len } => {
                    match self.validate_image(device, len) {
                        Ok(image) => State::Jump(image),
                        Err(e) => {
                            self.report(device, e);
                            last = Some((device, e));
                            State::LoadImage(idx + 1)
                        }
                    }
                }
                State::Jump(image) => {
                    self.gd.boot_device = Some(image.device);
                    self.mark(BootstageId::ImageLoaded);
                    return Ok(image);
                }
                State::Hang(failure) => return Err(failure),
            }
        }
    }

    fn select_device(&mut self, candidates: &mut Candidates) -> State {
        let mode = self.p.boot_mode.read();
        let Some(primary) = self.cfg.boot_device(mode) else {
            return State::Hang(BootFailure::UnknownBootMode(mode));
        };
        let targets = self.env.as_ref().and_then(|env| env.get("boot_targets"));
        *candidates = Candidates::build(primary, targets, self.cfg.boot_fallback);
        log::debug!("boot candidates: {:?}", candidates.as_slice());

        let window = self
            .cfg
            .load_addr
            .checked_add(self.cfg.max_image_size)
            .map(|end| self.cfg.load_addr..end);
        match window {
            Some(window) if self.usable(&window) => {}
            _ => return State::Hang(BootFailure::BadLoadWindow),
        }
        self.mark(BootstageId::BootDevice);
        State::LoadImage(0)
    }

    /// Whether `range` is DRAM the relocated monitor does not own.
    fn usable(&self, range: &Range<usize>) -> bool {
        let dram = self.gd.ram_base..self.gd.ram_top;
        let monitor = self.gd.relocaddr..self.gd.start_addr_sp;
        contains_range(&dram, range) && !overlaps(range, &monitor)
    }

    fn load_image(&mut self, device: BootDevice) -> Result<usize, Error> {
        printf!(self.console(), "Trying to boot from {device}\n");
        let (dest, max) = (self.cfg.load_addr, self.cfg.max_image_size);
        let p = &mut *self.p;
        let loader = p
            .loaders
            .iter_mut()
            .find(|l| l.supports(device))
            .ok_or(Error::NoDevice)?;
        log::debug!("{device}: using {} loader", loader.name());
        let len = loader.load(device, &mut *p.memory, dest, max)?;
        match len {
            0 => Err(Error::Io),
            len if len > max => Err(Error::TooLarge),
            len => Ok(len),
        }
    }

    fn validate_image(&mut self, device: BootDevice, len: usize) -> Result<SplImage, Error> {
        let base = self.cfg.load_addr;
        let mut raw = [0u8; HEADER_SIZE];
        let n = len.min(HEADER_SIZE);
        self.p.memory.read(base, &mut raw[..n])?;
        match Header::parse(&raw[..n]) {
            Ok(header) => self.place_legacy(device, header, len),
            Err(image::Error::BadMagic | image::Error::Truncated) if self.cfg.raw_image_support => {
                log::debug!("{device}: no image header, assuming raw image");
                Ok(SplImage {
                    device,
                    load_addr: base,
                    entry_point: base,
                    size: len,
                    header: None,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Checks the payload CRC and moves the payload to the header's load address.
    fn place_legacy(&mut self, device: BootDevice, header: Header, len: usize) -> Result<SplImage, Error> {
        let size = header.size as usize;
        if HEADER_SIZE + size > len {
            return Err(image::Error::Truncated.into());
        }
        let src = self.cfg.load_addr + HEADER_SIZE;
        let mut check = header.data_check();
        let mut chunk = [0u8; 256];
        for start in (src..src + size).step_by(chunk.len()) {
            let n = (src + size - start).min(chunk.len());
            self.p.memory.read(start, &mut chunk[..n])?;
            check.update(&chunk[..n]);
        }
        check.finish()?;

        let dest = header.load as usize;
        let target = dest..dest.checked_add(size).ok_or(Error::Invalid)?;
        if !self.usable(&target) {
            log::error!("{}: load address {dest:#x} is not usable DRAM", header.name());
            return Err(Error::Overlap);
        }
        self.p.memory.copy(dest, src, size)?;
        log::debug!(
            "{}: {size} bytes at {dest:#x}, entry {:#x}",
            header.name(),
            header.entry
        );
        Ok(SplImage {
            device,
            load_addr: dest,
            entry_point: header.entry as usize,
            size,
            header: Some(header),
        })
    }

    fn report(&mut self, device: BootDevice, e: Error) {
        printf!(self.console(), "Load from {device} failed: {e}\n");
    }
}
