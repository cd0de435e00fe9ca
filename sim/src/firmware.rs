//! Synthetic SPL images and next-stage payloads.

use common::{image::Header, memory::align_up};
use hal::{memory::Memory, Error};
use spl::{
    reloc::{Rela, RELA_SIZE},
    Arch, ImageInfo,
};

/// Lays out a position-dependent image the way the linker script would:
///
/// ```text
/// link_addr
/// | text | fdt | default env | .rela.dyn | ... bss ... |
///                            ^ copy_end              ^ bss_end
/// ```
pub struct FirmwareBuilder {
    link_addr: usize,
    text: Vec<u8>,
    pointers: Vec<(usize, usize)>,
    fdt: Option<Vec<u8>>,
    default_env: Option<Vec<u8>>,
    bss_len: usize,
    arch: Arch,
}

/// A built image and the words its relocations patch.
pub struct Firmware {
    pub info: ImageInfo,
    pub bytes: Vec<u8>,
    /// `(address of the word, link-time value)` per relocation.
    pub pointers: Vec<(usize, usize)>,
}

impl FirmwareBuilder {
    pub fn new(link_addr: usize, text_len: usize) -> Self {
        Self {
            link_addr,
            text: vec![0u8; align_up(text_len, 8).unwrap_or(text_len)],
            pointers: Vec::new(),
            fdt: None,
            default_env: None,
            bss_len: 0,
            arch: Arch::Riscv64,
        }
    }

    pub fn arch(mut self, arch: Arch) -> Self {
        self.arch = arch;
        self
    }

    /// Puts a pointer at text offset `at` that refers to text offset `to`.
    pub fn pointer(mut self, at: usize, to: usize) -> Self {
        self.pointers.push((at, to));
        self
    }

    pub fn fdt(mut self, blob: &[u8]) -> Self {
        self.fdt = Some(blob.to_vec());
        self
    }

    /// Built-in environment entry area.
    pub fn default_env(mut self, vars: &[(&str, &str)]) -> Self {
        let mut area = Vec::new();
        for (k, v) in vars {
            area.extend_from_slice(k.as_bytes());
            area.push(b'=');
            area.extend_from_slice(v.as_bytes());
            area.push(0);
        }
        area.push(0);
        self.default_env = Some(area);
        self
    }

    pub fn bss(mut self, len: usize) -> Self {
        self.bss_len = len;
        self
    }

    pub fn build(self) -> Firmware {
        let link = self.link_addr;
        let mut bytes = self.text;
        let mut pointers = Vec::new();
        for &(at, to) in &self.pointers {
            let value = link + to;
            bytes[at..at + 8].copy_from_slice(&(value as u64).to_le_bytes());
            pointers.push((link + at, value));
        }

        let mut append = |blob: &[u8]| {
            let start = link + bytes.len();
            bytes.extend_from_slice(blob);
            bytes.resize(align_up(bytes.len(), 8).unwrap_or(bytes.len()), 0);
            start
        };
        let fdt = self.fdt.as_deref().map(&mut append);
        let default_env = self
            .default_env
            .as_deref()
            .map(|area| (append(area), area.len()));

        let copy_end = link + bytes.len();
        for &(addr, value) in &pointers {
            let rela = Rela {
                offset: addr as u64,
                info: self.arch.r_relative() as u64,
                addend: value as i64,
            };
            bytes.extend_from_slice(&rela.to_bytes());
        }
        let rela_end = link + bytes.len();
        let bss_end = rela_end.max(copy_end + self.bss_len);
        let bss_end = align_up(bss_end, 16).unwrap_or(bss_end);

        Firmware {
            info: ImageInfo {
                link_addr: link,
                copy_end,
                rela_start: copy_end,
                rela_end,
                bss_start: copy_end,
                bss_end,
                entry: link,
                fdt,
                default_env,
            },
            bytes,
            pointers,
        }
    }
}

impl Firmware {
    /// Writes the image at its link address, with garbage in bss.
    pub fn install(&self, mem: &mut dyn Memory) -> Result<(), Error> {
        let info = &self.info;
        mem.write(info.link_addr, &self.bytes)?;
        let dirty = info.link_addr + self.bytes.len();
        mem.fill(dirty, info.bss_end - dirty, 0xa5)
    }

    /// Appends a relocation entry of an arbitrary type; the table grows into bss.
    pub fn push_rela(&mut self, rela: Rela) {
        self.bytes.extend_from_slice(&rela.to_bytes());
        self.info.rela_end += RELA_SIZE;
        let end = self.info.link_addr + self.bytes.len();
        if end > self.info.bss_end {
            self.info.bss_end = align_up(end, 16).unwrap_or(end);
        }
    }
}

/// A legacy-header image wrapping `payload`.
pub fn legacy_image(name: &str, load: u32, entry: u32, payload: &[u8]) -> Vec<u8> {
    let header = Header::new(name, load, entry, payload);
    let mut out = header.to_bytes().to_vec();
    out.extend_from_slice(payload);
    out
}

