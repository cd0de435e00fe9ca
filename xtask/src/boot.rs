use crate::XError;
use common::BootDevice;
use sim::{sample_firmware, SimBoard, SimBootMode};
use spl::{Config, GdFlags};
use std::{error::Error, fs, path::PathBuf};

#[derive(Args)]
pub struct BootArgs {
    /// Next-stage image, with or without a legacy header.
    #[clap(long)]
    image: Option<PathBuf>,
    /// Medium holding the image.
    #[clap(long, value_parser = parse_device, default_value = "mmc1")]
    device: BootDevice,
    /// Boot-mode strap value.
    #[clap(long, default_value_t = 0)]
    mode: u32,
    /// Environment blob, as written by `mkenv`.
    #[clap(long)]
    env: Option<PathBuf>,
    /// Devices tried after the strapped one.
    #[clap(long, value_parser = parse_device, num_args = 0.., value_delimiter = ',')]
    fallback: Vec<BootDevice>,
    /// Pass the silent boot flag; the board prints nothing.
    #[clap(long)]
    silent: bool,
}

fn parse_device(s: &str) -> Result<BootDevice, String> {
    s.parse().map_err(|e| format!("\"{s}\": {e}"))
}

impl BootArgs {
    pub fn boot(&self) -> Result<(), Box<dyn Error>> {
        let fw = sample_firmware();
        let mut board = SimBoard::new();
        fw.install(&mut board.memory)
            .map_err(|e| XError::Boot(format!("install: {e}")))?;
        board.boot_mode = SimBootMode(self.mode);
        if let Some(env) = &self.env {
            board.env.blob = Some(fs::read(env)?);
        }
        if let Some(image) = &self.image {
            let loader = board.loader("file").image(self.device, fs::read(image)?);
            board.loaders.push(loader);
        }
        // leaked once per run; the fallback list must outlive the config
        let fallback: &'static [BootDevice] = Box::leak(self.fallback.clone().into_boxed_slice());
        let cfg = Config {
            board: "sim",
            boot_fallback: fallback,
            ..Config::DEFAULT
        };

        let boot_flags = if self.silent {
            GdFlags::SILENT.bits()
        } else {
            0
        };
        let result = board.with_platform(|p| spl::run(p, &cfg, &fw.info, boot_flags));
        print!("{}", board.serial.output());
        let handoff = result.map_err(|abort| XError::Boot(abort.to_string()))?;
        info!(
            "loaded {} from {} tried in order {:?}",
            handoff.image.name(),
            handoff.image.device,
            board.load_order()
        );
        let returned = handoff.jump(&mut board.cpu);
        for (entry, arg) in board.cpu.jumps() {
            println!("entered {entry:#x} with arg {arg:#x}");
        }
        debug!("{returned}");
        Ok(())
    }
}
