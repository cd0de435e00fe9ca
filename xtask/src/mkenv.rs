use crate::{parse_int, XError, DIRS};
use spl::Config;
use std::{error::Error, fs, path::PathBuf};

#[derive(Args)]
pub struct MkenvArgs {
    /// Text file of `key=value` lines; `#` starts a comment.
    input: PathBuf,
    /// Defaults to `target/env.bin`.
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// Blob size, CRC included.
    #[clap(long, value_parser = parse_int, default_value_t = Config::DEFAULT.env_size)]
    size: usize,
}

impl MkenvArgs {
    pub fn make(&self) -> Result<(), Box<dyn Error>> {
        let text = fs::read_to_string(&self.input)?;
        let vars = parse_vars(&text)?;
        let mut blob = vec![0u8; self.size];
        common::env::encode(vars.iter().copied(), &mut blob).map_err(XError::from)?;
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| DIRS.target.join("env.bin"));
        fs::write(&output, blob)?;
        info!("{}: {} variables", output.display(), vars.len());
        Ok(())
    }
}

pub(crate) fn parse_vars(text: &str) -> Result<Vec<(&str, &str)>, XError> {
    let mut vars = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => vars.push((key.trim(), value.trim())),
            _ => {
                return Err(XError::InvalidArgument(format!(
                    "line {}: expected key=value",
                    i + 1
                )))
            }
        }
    }
    Ok(vars)
}
