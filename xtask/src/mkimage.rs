use crate::{parse_u32, XError, DIRS};
use common::image::{self, Header, HEADER_SIZE};
use std::{error::Error, fs, path::PathBuf};

#[derive(Args)]
pub struct MkimageArgs {
    /// Payload binary.
    input: PathBuf,
    /// Defaults to `target/<name>.img`.
    #[clap(short, long)]
    output: Option<PathBuf>,
    #[clap(long, default_value = "next")]
    name: String,
    #[clap(long, value_parser = parse_u32)]
    load: u32,
    /// Defaults to the load address.
    #[clap(long, value_parser = parse_u32)]
    entry: Option<u32>,
    /// Mark the payload as a Linux kernel instead of firmware.
    #[clap(long)]
    kernel: bool,
}

impl MkimageArgs {
    pub fn make(&self) -> Result<(), Box<dyn Error>> {
        let payload = fs::read(&self.input)?;
        if payload.len() > u32::MAX as usize {
            return Err(XError::InvalidArgument("payload exceeds 4 GiB".into()).into());
        }
        let entry = self.entry.unwrap_or(self.load);
        let mut header = Header::new(&self.name, self.load, entry, &payload);
        if self.kernel {
            header.os = image::os::LINUX;
            header.kind = image::kind::KERNEL;
            header.seal();
        }
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| DIRS.target.join(&self.name).with_extension("img"));
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&payload);
        fs::write(&output, bytes)?;
        info!(
            "{}: {} bytes, load {:#x}, entry {entry:#x}",
            output.display(),
            payload.len(),
            self.load
        );
        Ok(())
    }
}

#[derive(Args)]
pub struct InspectArgs {
    image: PathBuf,
}

impl InspectArgs {
    pub fn inspect(&self) -> Result<(), Box<dyn Error>> {
        let bytes = fs::read(&self.image)?;
        let header = Header::parse(&bytes).map_err(XError::from)?;
        println!(
            "
name:  {}
size:  {} bytes
load:  {:#010x}
entry: {:#010x}
os {}, arch {}, type {}",
            header.name(),
            header.size,
            header.load,
            header.entry,
            header.os,
            header.arch,
            header.kind,
        );
        header
            .check_data(&bytes[HEADER_SIZE..])
            .map_err(XError::from)?;
        println!("data checksum OK");
        Ok(())
    }
}
