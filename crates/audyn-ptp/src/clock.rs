use parking_lot::Mutex;

use crate::error::PtpError;
use crate::platform;

#[cfg(target_os = "linux")]
use crate::phc;

/// The time source a [`PtpClock`] was built from, for diagnostics/logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// Plain monotonic/system fallback, no external discipline assumed.
    None,
    /// The OS clock, assumed disciplined by an external PTP daemon
    /// (e.g. `ptp4l` + `phc2sys`).
    Software,
    /// A PTP Hardware Clock read directly through the kernel's dynamic
    /// clockid interface.
    Hardware,
}

#[derive(Debug, Clone, Copy)]
struct Epoch {
    rtp_ts: u32,
    ptp_ns: u64,
    sample_rate: u32,
}

struct EpochState {
    epoch: Option<Epoch>,
    last_rtp_ts: u32,
    wraparound_count: u64,
}

impl Default for EpochState {
    fn default() -> Self {
        Self {
            epoch: None,
            last_rtp_ts: 0,
            wraparound_count: 0,
        }
    }
}

enum Source {
    None,
    Software,
    #[cfg(target_os = "linux")]
    Hardware {
        _device: std::fs::File,
        clockid: libc::clockid_t,
    },
}

/// Maps RTP sample-counter timestamps onto an absolute nanosecond
/// timeline, sourced from one of three clocks (see [`ClockMode`]).
///
/// Epoch and wraparound bookkeeping live behind a single mutex; reads and
/// writes to it happen once per packet, never on a sample-by-sample hot
/// path, so the lock is not a contention concern.
pub struct PtpClock {
    source: Source,
    state: Mutex<EpochState>,
}

/// Beyond this many samples away from the established epoch (about 53
/// hours at 48 kHz) the `i64` nanosecond multiplication in `rtp_to_ns`
/// would overflow; treat it as a timing anomaly and re-seed instead.
fn sample_delta_threshold() -> i128 {
    (i64::MAX as i128) / 1_000_000_000
}

impl PtpClock {
    pub fn none() -> Self {
        Self {
            source: Source::None,
            state: Mutex::new(EpochState::default()),
        }
    }

    pub fn software() -> Self {
        Self {
            source: Source::Software,
            state: Mutex::new(EpochState::default()),
        }
    }

    #[cfg(target_os = "linux")]
    pub fn hardware_device(path: &str) -> Result<Self, PtpError> {
        let index = path
            .strip_prefix("/dev/ptp")
            .and_then(|s| s.parse::<i32>().ok())
            .ok_or_else(|| {
                PtpError::ConfigInvalid(format!("not a PTP device path: {path}"))
            })?;
        let (device, clockid) = phc::open_phc(index)?;
        Ok(Self {
            source: Source::Hardware {
                _device: device,
                clockid,
            },
            state: Mutex::new(EpochState::default()),
        })
    }

    #[cfg(target_os = "linux")]
    pub fn hardware_interface(iface: &str) -> Result<Self, PtpError> {
        let index = phc::phc_index_for_interface(iface)?;
        let (device, clockid) = phc::open_phc(index)?;
        log::info!("resolved PTP interface {iface} to /dev/ptp{index}");
        Ok(Self {
            source: Source::Hardware {
                _device: device,
                clockid,
            },
            state: Mutex::new(EpochState::default()),
        })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn hardware_device(_path: &str) -> Result<Self, PtpError> {
        Err(PtpError::ConfigInvalid(
            "hardware PTP clocks are only supported on Linux".into(),
        ))
    }

    #[cfg(not(target_os = "linux"))]
    pub fn hardware_interface(_iface: &str) -> Result<Self, PtpError> {
        Err(PtpError::ConfigInvalid(
            "hardware PTP clocks are only supported on Linux".into(),
        ))
    }

    pub fn mode(&self) -> ClockMode {
        match &self.source {
            Source::None => ClockMode::None,
            Source::Software => ClockMode::Software,
            #[cfg(target_os = "linux")]
            Source::Hardware { .. } => ClockMode::Hardware,
        }
    }

    /// Current time of the selected clock, in nanoseconds since its epoch.
    pub fn now_ns(&self) -> u64 {
        match &self.source {
            // Wall-clock, not monotonic, despite `none`/`software` being the
            // "monotonic fallback" modes: the archive layout's calendar-path
            // naming needs real time-of-day even when no PTP source is live.
            Source::None | Source::Software => platform::get_timestamp_ns().max(0) as u64,
            #[cfg(target_os = "linux")]
            Source::Hardware { clockid, .. } => phc::read_phc_ns(*clockid)
                .unwrap_or_else(|err| {
                    log::warn!("PHC read failed, falling back to system clock: {err}");
                    platform::get_timestamp_ns().max(0) as u64
                }),
        }
    }

    /// Establishes the RTP-timestamp-to-absolute-time reference point.
    /// Idempotent: once an epoch is set it is only replaced by
    /// `rtp_to_ns`'s own reset path, never by a later `set_rtp_epoch` call
    /// with a matching sample rate.
    pub fn set_rtp_epoch(&self, rtp_ts: u32, ptp_ns: u64, sample_rate: u32) {
        let mut state = self.state.lock();
        if state.epoch.is_none() {
            state.epoch = Some(Epoch {
                rtp_ts,
                ptp_ns,
                sample_rate,
            });
            state.last_rtp_ts = rtp_ts;
            state.wraparound_count = 0;
        }
    }

    /// Converts an RTP timestamp to absolute nanoseconds per the epoch
    /// established by `set_rtp_epoch`, extending the 32-bit counter across
    /// wraparounds and resetting the epoch if the delta grows implausibly
    /// large (see module docs for the step-by-step algorithm).
    pub fn rtp_to_ns(&self, rtp_ts: u32, sample_rate: u32) -> Result<u64, PtpError> {
        let mut state = self.state.lock();
        let epoch = state.epoch.ok_or(PtpError::EpochNotSet)?;
        if sample_rate != epoch.sample_rate {
            return Err(PtpError::SampleRateMismatch);
        }

        if rtp_ts < state.last_rtp_ts && state.last_rtp_ts - rtp_ts > (1u32 << 31) {
            state.wraparound_count += 1;
        }
        state.last_rtp_ts = rtp_ts;

        let extended_now = (state.wraparound_count << 32) | rtp_ts as u64;
        let extended_epoch = epoch.rtp_ts as u64;
        let sample_delta = extended_now as i128 - extended_epoch as i128;

        if sample_delta.abs() > sample_delta_threshold() {
            log::warn!(
                "PTP sample delta {sample_delta} exceeds safe range, resetting epoch at rtp_ts={rtp_ts}"
            );
            drop(state);
            let now = self.now_ns();
            let mut state = self.state.lock();
            state.epoch = Some(Epoch {
                rtp_ts,
                ptp_ns: now,
                sample_rate,
            });
            state.last_rtp_ts = rtp_ts;
            state.wraparound_count = 0;
            return Ok(now);
        }

        let ns_delta = sample_delta * 1_000_000_000 / sample_rate as i128;
        let abs_ns = epoch.ptp_ns as i128 + ns_delta;
        if abs_ns < 0 {
            return Err(PtpError::NegativeTime);
        }
        Ok(abs_ns as u64)
    }

    /// Whether the selected clock currently looks trustworthy. `none` is
    /// always healthy; `software` requires the system clock to read a
    /// plausible (i.e. actually-set) time; `hardware` requires the PHC
    /// device to still respond.
    pub fn healthy(&self) -> bool {
        match &self.source {
            Source::None => true,
            Source::Software => platform::get_timestamp_ns() > platform::PLAUSIBLE_EPOCH_NS,
            #[cfg(target_os = "linux")]
            Source::Hardware { clockid, .. } => phc::read_phc_ns(*clockid).is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rtp_to_ns_is_monotone_across_packets() {
        let clock = PtpClock::none();
        clock.set_rtp_epoch(1_000, 1_000_000_000, 48_000);

        let t0 = clock.rtp_to_ns(1_000, 48_000).unwrap();
        let t1 = clock.rtp_to_ns(1_048, 48_000).unwrap();
        let t2 = clock.rtp_to_ns(2_000, 48_000).unwrap();

        assert!(t1 > t0);
        assert!(t2 > t1);
        assert_relative_eq!(
            (t1 - t0) as f64,
            (48.0 / 48_000.0) * 1e9,
            epsilon = 1.0
        );
    }

    #[test]
    fn rtp_to_ns_rejects_mismatched_sample_rate() {
        let clock = PtpClock::none();
        clock.set_rtp_epoch(0, 0, 48_000);
        assert!(matches!(
            clock.rtp_to_ns(100, 44_100),
            Err(PtpError::SampleRateMismatch)
        ));
    }

    #[test]
    fn rtp_to_ns_fails_before_epoch_is_set() {
        let clock = PtpClock::none();
        assert!(matches!(
            clock.rtp_to_ns(0, 48_000),
            Err(PtpError::EpochNotSet)
        ));
    }

    #[test]
    fn handles_32bit_wraparound() {
        let clock = PtpClock::none();
        clock.set_rtp_epoch(0xFFFF_FE00, 1_000_000_000, 48_000);

        let before_wrap = clock.rtp_to_ns(0xFFFF_FF00, 48_000).unwrap();
        let after_wrap = clock.rtp_to_ns(0x0000_0100, 48_000).unwrap();

        assert!(
            after_wrap > before_wrap,
            "time after a 32-bit RTP wraparound must still advance"
        );
    }

    #[test]
    fn resets_epoch_on_extreme_delta() {
        let clock = PtpClock::none();
        clock.set_rtp_epoch(1_000, 1_000_000_000, 48_000);

        // ~100 hours of samples at 48kHz, far past the 53-hour safe window.
        let huge_delta_samples: u64 = 100 * 3600 * 48_000;
        let rtp_ts = (1_000u64 + huge_delta_samples) as u32;

        let before = clock.now_ns();
        let result = clock.rtp_to_ns(rtp_ts, 48_000).unwrap();
        let after = clock.now_ns();

        assert!(result >= before && result <= after);

        // Epoch should have been reseeded: a nearby timestamp now converts
        // to a time close to `result` instead of far in the past/future.
        let next = clock.rtp_to_ns(rtp_ts.wrapping_add(48), 48_000).unwrap();
        assert!(next > result);
        assert!(next - result < 10_000_000_000);
    }

    #[test]
    fn none_mode_is_always_healthy() {
        assert!(PtpClock::none().healthy());
    }
}
