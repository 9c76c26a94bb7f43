use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Professional AES67 audio capture and archival engine.
#[derive(Parser, Debug)]
#[command(name = "audyn", version, about)]
pub struct Cli {
    /// Root directory for rotating archives (mutually exclusive with `-o`).
    #[arg(long, conflicts_with = "output")]
    pub archive_root: Option<PathBuf>,

    /// Single output file path (mutually exclusive with `--archive-root`).
    #[arg(short = 'o', long = "output", conflicts_with = "archive_root")]
    pub output: Option<PathBuf>,

    #[arg(long = "archive-layout", value_enum, default_value_t = ArchiveLayoutArg::Flat)]
    pub archive_layout: ArchiveLayoutArg,

    /// Required when `--archive-layout custom` is selected.
    #[arg(long = "archive-format")]
    pub archive_format: Option<String>,

    #[arg(long = "archive-suffix", value_enum)]
    pub archive_suffix: ArchiveSuffixArg,

    #[arg(long = "archive-period", default_value_t = 3600)]
    pub archive_period: u64,

    #[arg(long = "archive-clock", value_enum, default_value_t = ArchiveClockArg::LocalTime)]
    pub archive_clock: ArchiveClockArg,

    /// AES67 source address (unicast or multicast).
    #[arg(short = 'm', long = "source-ip")]
    pub source_ip: Ipv4Addr,

    #[arg(short = 'p', long = "port")]
    pub port: u16,

    #[arg(long = "pt", default_value_t = 96)]
    pub payload_type: u8,

    #[arg(long = "spp", default_value_t = 48)]
    pub samples_per_packet: usize,

    #[arg(long = "stream-channels", default_value_t = 0)]
    pub stream_channels: u16,

    #[arg(long = "channel-offset", default_value_t = 0)]
    pub channel_offset: u16,

    #[arg(long = "rcvbuf", default_value_t = 1 << 20)]
    pub rcvbuf: usize,

    #[arg(short = 'r', long = "sample-rate")]
    pub sample_rate: u32,

    #[arg(short = 'c', long = "channels")]
    pub channels: u16,

    #[arg(long = "ptp-device", conflicts_with_all = ["ptp_interface", "ptp_software"])]
    pub ptp_device: Option<String>,

    #[arg(long = "ptp-interface", conflicts_with_all = ["ptp_device", "ptp_software"])]
    pub ptp_interface: Option<String>,

    #[arg(long = "ptp-software", conflicts_with_all = ["ptp_device", "ptp_interface"])]
    pub ptp_software: bool,

    #[arg(long = "bitrate", default_value_t = 64_000)]
    pub bitrate: i32,

    #[arg(long = "vbr", conflicts_with = "cbr")]
    pub vbr: bool,

    #[arg(long = "cbr", conflicts_with = "vbr")]
    pub cbr: bool,

    #[arg(long = "complexity", default_value_t = 8)]
    pub complexity: i32,

    /// Frame queue capacity, in frames.
    #[arg(short = 'Q', long = "queue-capacity", default_value_t = 64)]
    pub queue_capacity: usize,

    /// Frame pool size, in frames.
    #[arg(short = 'P', long = "pool-frames", default_value_t = 128)]
    pub pool_frames: usize,

    /// Samples per frame in the pool/queue (independent of `--spp`).
    #[arg(short = 'F', long = "frame-samples", default_value_t = 960)]
    pub frame_samples: usize,

    /// Increase log verbosity (stack for more: -v, -vv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all but warnings and errors.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Redirect logging to the host syslog facility instead of stderr.
    #[arg(long = "syslog")]
    pub syslog: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveLayoutArg {
    Flat,
    Hierarchy,
    Combo,
    Dailydir,
    Accurate,
    Custom,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveSuffixArg {
    Wav,
    Opus,
}

impl ArchiveSuffixArg {
    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveSuffixArg::Wav => "wav",
            ArchiveSuffixArg::Opus => "opus",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveClockArg {
    #[value(name = "localtime")]
    LocalTime,
    Utc,
    Ptp,
}

/// Validates cross-field constraints clap's declarative attributes cannot
/// express (exactly one of `-o`/`--archive-root`; `--archive-format`
/// required for a custom layout).
pub fn validate(cli: &Cli) -> Result<(), String> {
    if cli.archive_root.is_none() && cli.output.is_none() {
        return Err("exactly one of --archive-root or -o/--output is required".into());
    }
    if cli.archive_layout == ArchiveLayoutArg::Custom && cli.archive_format.is_none() {
        return Err("--archive-format is required when --archive-layout=custom".into());
    }
    if matches!(cli.archive_clock, ArchiveClockArg::Ptp)
        && cli.ptp_device.is_none()
        && cli.ptp_interface.is_none()
        && !cli.ptp_software
    {
        return Err("--archive-clock ptp requires a PTP source (--ptp-device/--ptp-interface/--ptp-software)".into());
    }
    if !(0..=31_536_000).contains(&cli.archive_period) {
        return Err("--archive-period must be 0..=31536000".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_args() -> Vec<&'static str> {
        vec![
            "audyn",
            "--archive-root", "/tmp/audyn",
            "--archive-suffix", "wav",
            "-m", "239.1.1.1",
            "-p", "5004",
            "-r", "48000",
            "-c", "2",
        ]
    }

    #[test]
    fn parses_minimal_required_args() {
        let cli = Cli::try_parse_from(minimal_args()).unwrap();
        assert_eq!(cli.sample_rate, 48_000);
        assert_eq!(cli.channels, 2);
        assert!(validate(&cli).is_ok());
    }

    #[test]
    fn output_and_archive_root_are_mutually_exclusive() {
        let mut args = minimal_args();
        args.push("-o");
        args.push("/tmp/single.wav");
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn custom_layout_requires_format_string() {
        let mut args = minimal_args();
        args.push("--archive-layout");
        args.push("custom");
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(validate(&cli).is_err());
    }

    #[test]
    fn ptp_flags_are_mutually_exclusive() {
        let mut args = minimal_args();
        args.push("--ptp-device");
        args.push("/dev/ptp0");
        args.push("--ptp-software");
        assert!(Cli::try_parse_from(args).is_err());
    }
}
