mod cli;
mod logging;

use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use audyn_archive::{ArchivePolicy, ClockSource, Layout, PolicyConfig};
use audyn_buffer::{frame_pool, frame_queue};
use audyn_ptp::PtpClock;
use audyn_rtp::ReceiverConfig;
use audyn_worker::{SinkConfig, Worker, WorkerState};

use cli::{ArchiveClockArg, ArchiveLayoutArg, Cli};

const EXIT_OK: u8 = 0;
const EXIT_RUNTIME_ERROR: u8 = 1;
const EXIT_ARGUMENT_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(msg) = cli::validate(&cli) {
        eprintln!("audyn: {msg}");
        return ExitCode::from(EXIT_ARGUMENT_ERROR);
    }

    let level = logging::level_from_flags(cli.verbose, cli.quiet);
    if let Err(err) = logging::init(level, cli.syslog) {
        eprintln!("audyn: failed to initialize logging: {err}");
        return ExitCode::from(EXIT_RUNTIME_ERROR);
    }

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(err) => {
            log::error!("{err}");
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    log::info!(
        "starting capture from {}:{} ({} ch @ {} Hz)",
        cli.source_ip,
        cli.port,
        cli.channels,
        cli.sample_rate
    );

    let clock = Arc::new(build_clock(&cli)?);
    let policy = ArchivePolicy::new(policy_config(&cli)?)?;

    let (pool_producer, pool_consumer) = frame_pool(
        cli.pool_frames,
        cli.channels as usize,
        cli.frame_samples,
    );
    let (queue_producer, queue_consumer) = frame_queue(cli.queue_capacity);

    let stop = Arc::new(AtomicBool::new(false));
    let ctrlc_stop = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("received shutdown signal");
        ctrlc_stop.store(true, Ordering::SeqCst);
    })?;

    let receiver_config = ReceiverConfig {
        source_ip: cli.source_ip,
        port: cli.port,
        payload_type: cli.payload_type,
        sample_rate: cli.sample_rate,
        channels: cli.channels,
        samples_per_packet: cli.samples_per_packet,
        stream_channels: cli.stream_channels,
        channel_offset: cli.channel_offset,
        socket_rcvbuf: cli.rcvbuf,
        bind_interface: None,
    };

    let (receiver_handle, receiver_stats) = audyn_rtp::spawn(
        receiver_config,
        pool_producer,
        queue_producer,
        Some(clock.clone()),
        stop.clone(),
    )?;

    let sink_config = SinkConfig {
        suffix: cli.archive_suffix.as_str().to_string(),
        sample_rate: cli.sample_rate,
        channels: cli.channels,
        fsync_enabled: true,
        opus_bitrate: cli.bitrate,
        opus_vbr: !cli.cbr,
        opus_complexity: cli.complexity,
    };

    let mut worker = Worker::new(
        queue_consumer,
        pool_consumer,
        policy,
        sink_config,
        clock,
        cli.channels as usize,
        cli.frame_samples,
    );
    let worker_stats = worker.stats();

    let final_state = worker.run(&stop);
    stop.store(true, Ordering::SeqCst);
    let _ = receiver_handle.join();

    log::info!(
        "shutdown complete: worker state={:?}, frames_written={}, silence_frames={}, rotations={}, \
         packets_rx={}, packets_dropped={}, discontinuities={}, frames_pushed={}, \
         frames_dropped_pool_empty={}, frames_dropped_queue_full={}",
        final_state,
        worker_stats.frames_written.load(Ordering::Relaxed),
        worker_stats.silence_frames.load(Ordering::Relaxed),
        worker_stats.rotations.load(Ordering::Relaxed),
        receiver_stats.packets_rx(),
        receiver_stats.packets_dropped(),
        receiver_stats.discontinuities(),
        receiver_stats.frames_pushed(),
        receiver_stats.frames_dropped_pool_empty(),
        receiver_stats.frames_dropped_queue_full(),
    );

    if final_state != WorkerState::Stopped {
        return Err("worker exited in an unexpected state".into());
    }
    if let Some(err) = worker_stats.last_error() {
        return Err(format!("worker stopped after a fatal error: {err}").into());
    }
    Ok(())
}

fn build_clock(cli: &Cli) -> Result<PtpClock, Box<dyn std::error::Error>> {
    if let Some(device) = &cli.ptp_device {
        return Ok(PtpClock::hardware_device(device)?);
    }
    if let Some(iface) = &cli.ptp_interface {
        return Ok(PtpClock::hardware_interface(iface)?);
    }
    if cli.ptp_software {
        return Ok(PtpClock::software());
    }
    Ok(PtpClock::none())
}

/// Builds the rotation policy for either `--archive-root` (normal rotating
/// archive) or `-o`/`--output` (a single fixed file, modeled as a policy
/// whose period never elapses and whose layout renders that exact path).
fn policy_config(cli: &Cli) -> Result<PolicyConfig, Box<dyn std::error::Error>> {
    if let Some(output) = &cli.output {
        let root = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let stem = output
            .file_stem()
            .ok_or("--output must name a file")?
            .to_string_lossy()
            .into_owned();
        return Ok(PolicyConfig {
            root,
            suffix: cli.archive_suffix.as_str().to_string(),
            layout: Layout::Custom(stem),
            period_sec: 0,
            clock_source: archive_clock(cli),
            create_dirs: true,
        });
    }

    let root = cli
        .archive_root
        .clone()
        .ok_or("either --archive-root or -o/--output is required")?;
    let layout = match cli.archive_layout {
        ArchiveLayoutArg::Flat => Layout::Flat,
        ArchiveLayoutArg::Hierarchy => Layout::Hierarchy,
        ArchiveLayoutArg::Combo => Layout::Combo,
        ArchiveLayoutArg::Dailydir => Layout::DailyDir,
        ArchiveLayoutArg::Accurate => Layout::Accurate,
        ArchiveLayoutArg::Custom => Layout::Custom(
            cli.archive_format
                .clone()
                .ok_or("--archive-format is required for --archive-layout=custom")?,
        ),
    };
    Ok(PolicyConfig {
        root,
        suffix: cli.archive_suffix.as_str().to_string(),
        layout,
        period_sec: cli.archive_period,
        clock_source: archive_clock(cli),
        create_dirs: true,
    })
}

fn archive_clock(cli: &Cli) -> ClockSource {
    match cli.archive_clock {
        ArchiveClockArg::LocalTime => ClockSource::LocalTime,
        ArchiveClockArg::Utc => ClockSource::Utc,
        ArchiveClockArg::Ptp => ClockSource::PtpTai,
    }
}
