use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(version, about = "Formats a block device or image file as tomofs")]
pub struct Cli {
    /// Block device or image file
    pub device: PathBuf,

    /// Create or resize the image to this many 4096-byte blocks
    #[arg(long, short)]
    pub blocks: Option<u64>,

    /// Directory whose regular files are copied into the root
    #[arg(long, short)]
    pub source: Option<PathBuf>,

    /// Permission bits of copied files, in octal
    #[arg(long, short, default_value = "644", value_parser = parse_mode)]
    pub mode: u16,
}

fn parse_mode(mode: &str) -> Result<u16, String> {
    u16::from_str_radix(mode, 8)
        .ok()
        .filter(|&bits| bits <= 0o7777)
        .ok_or_else(|| format!("{mode:?} is not an octal mode"))
}
