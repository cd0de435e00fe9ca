#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

mod boot;
mod layout;
mod mkenv;
mod mkimage;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use once_cell::sync::Lazy;
use std::{
    error::Error,
    fmt,
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[clap(name = "SPL Util")]
#[clap(version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show where the first stage relocates itself for a DRAM size.
    Layout(layout::LayoutArgs),
    /// Wrap a binary in a legacy image header.
    Mkimage(mkimage::MkimageArgs),
    /// Print and check the header of a legacy image.
    Inspect(mkimage::InspectArgs),
    /// Build an environment blob from a `key=value` text file.
    Mkenv(mkenv::MkenvArgs),
    /// Run the boot core on the simulated board.
    Boot(boot::BootArgs),
}

static DIRS: Lazy<Dirs> = Lazy::new(Dirs::new);

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();
    use Commands::*;
    let result = match cli.command {
        Layout(args) => args.show(),
        Mkimage(args) => args.make(),
        Inspect(args) => args.inspect(),
        Mkenv(args) => args.make(),
        Boot(args) => args.boot(),
    };
    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

struct Dirs {
    target: PathBuf,
}

impl Dirs {
    fn new() -> Self {
        let workspace = Path::new(std::env!("CARGO_MANIFEST_DIR"))
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            target: workspace.join("target"),
        }
    }
}

#[derive(Debug)]
enum XError {
    InvalidArgument(String),
    Image(common::image::Error),
    Env(common::env::Error),
    Boot(String),
}

impl fmt::Display for XError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Image(e) => write!(f, "image: {e}"),
            Self::Env(e) => write!(f, "environment: {e}"),
            Self::Boot(msg) => write!(f, "boot: {msg}"),
        }
    }
}

impl Error for XError {}

impl From<common::image::Error> for XError {
    fn from(value: common::image::Error) -> Self {
        Self::Image(value)
    }
}

impl From<common::env::Error> for XError {
    fn from(value: common::env::Error) -> Self {
        Self::Env(value)
    }
}

/// Parses `4096`, `0x1000`, `4k`, `1M` or `1G`.
fn parse_int(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let (digits, shift) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 10),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 20),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 30),
        _ => (s, 0),
    };
    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => usize::from_str_radix(&hex.replace('_', ""), 16),
        None => digits.replace('_', "").parse(),
    }
    .map_err(|e| format!("\"{s}\": {e}"))?;
    value
        .checked_mul(1 << shift)
        .ok_or_else(|| format!("\"{s}\" is too large"))
}

/// [`parse_int`] limited to 32 bits, for legacy header fields.
fn parse_u32(s: &str) -> Result<u32, String> {
    let value = parse_int(s)?;
    u32::try_from(value).map_err(|_| format!("\"{s}\" does not fit in 32 bits"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_with_radix_and_suffix() {
        assert_eq!(parse_int("4096"), Ok(4096));
        assert_eq!(parse_int("0x4000_0000"), Ok(0x4000_0000));
        assert_eq!(parse_int("64k"), Ok(64 << 10));
        assert_eq!(parse_int("0x10M"), Ok(16 << 20));
        assert_eq!(parse_int(" 2G "), Ok(2 << 30));
        assert!(parse_int("0xzz").is_err());
        assert!(parse_int("").is_err());
    }

    #[test]
    fn header_fields_are_32_bits() {
        assert_eq!(parse_u32("0x8000_0000"), Ok(0x8000_0000));
        assert!(parse_u32("4G").is_err());
    }
}
