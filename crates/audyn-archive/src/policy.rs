use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Duration, Local, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::error::ArchiveError;
use crate::layout::{render_path, ClockSource, Layout};

/// Maximum rotation period: one year, per the `--archive-period` CLI range.
const MAX_PERIOD_SEC: u64 = 31_536_000;

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub root: PathBuf,
    pub suffix: String,
    pub layout: Layout,
    pub period_sec: u64,
    pub clock_source: ClockSource,
    pub create_dirs: bool,
}

impl PolicyConfig {
    fn validate(&self) -> Result<(), ArchiveError> {
        if self.suffix.is_empty() {
            return Err(ArchiveError::ConfigInvalid(
                "archive suffix must not be empty".into(),
            ));
        }
        if self.period_sec > MAX_PERIOD_SEC {
            return Err(ArchiveError::ConfigInvalid(format!(
                "archive period {}s exceeds the one-year maximum",
                self.period_sec
            )));
        }
        if let Layout::Custom(pattern) = &self.layout {
            if pattern.is_empty() {
                return Err(ArchiveError::ConfigInvalid(
                    "custom archive layout requires a non-empty format string".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Decides when rotation is due and renders the next archive path, per the
/// wall-clock-aligned boundary rules in the layout table.
pub struct ArchivePolicy {
    config: PolicyConfig,
    initialized: bool,
    current_period_start_ns: u64,
    next_boundary_ns: u64,
    rotations: u64,
}

impl ArchivePolicy {
    pub fn new(config: PolicyConfig) -> Result<Self, ArchiveError> {
        config.validate()?;
        Ok(Self {
            config,
            initialized: false,
            current_period_start_ns: 0,
            next_boundary_ns: 0,
            rotations: 0,
        })
    }

    /// True on the very first call, and whenever rotation is enabled and
    /// `now_ns` has reached the previously computed boundary.
    pub fn should_rotate(&self, now_ns: u64) -> bool {
        !self.initialized || (self.config.period_sec > 0 && now_ns >= self.next_boundary_ns)
    }

    /// Computes the wall-clock-aligned period start for `now_ns` and renders
    /// the path for it. Calling this again with the same `now_ns` before
    /// `advance()` yields the same path, since it is a pure function of the
    /// configuration and `now_ns`.
    pub fn next_path(&mut self, now_ns: u64) -> Result<PathBuf, ArchiveError> {
        let (naive, centiseconds) = broken_down(now_ns, self.config.clock_source);

        let period_start_ns = if self.config.period_sec == 0 {
            now_ns
        } else {
            let seconds_since_midnight = naive.num_seconds_from_midnight() as u64;
            let period_index = seconds_since_midnight / self.config.period_sec;
            let period_start_ssm = period_index * self.config.period_sec;

            let midnight = naive.date().and_hms_opt(0, 0, 0).unwrap();
            let period_start_naive = midnight + Duration::seconds(period_start_ssm as i64);
            epoch_ns_for(period_start_naive, self.config.clock_source)?
        };
        self.current_period_start_ns = period_start_ns;

        let render_dt = if matches!(self.config.layout, Layout::Accurate) {
            naive
        } else {
            let (period_naive, _) = broken_down(period_start_ns, self.config.clock_source);
            period_naive
        };

        let path = render_path(
            &self.config.root,
            &self.config.layout,
            &self.config.suffix,
            render_dt,
            centiseconds,
        );

        if self.config.create_dirs {
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }
        }

        Ok(path)
    }

    /// Call after successfully opening the file `next_path` produced: marks
    /// the policy initialized, counts the rotation, and schedules the next
    /// boundary.
    pub fn advance(&mut self) {
        self.initialized = true;
        self.rotations += 1;
        self.next_boundary_ns = if self.config.period_sec == 0 {
            u64::MAX
        } else {
            self.current_period_start_ns + self.config.period_sec * 1_000_000_000
        };
    }

    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }
}

fn create_dir_all(path: &Path) -> Result<(), ArchiveError> {
    std::fs::create_dir_all(path).map_err(|source| ArchiveError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Converts `now_ns` (nanoseconds since the Unix epoch, or since the TAI
/// epoch for `PtpTai` — see `ClockSource::PtpTai`) into a naive wall-clock
/// broken-down time in the configured zone, plus the centisecond remainder
/// `Layout::Accurate` wants.
fn broken_down(now_ns: u64, clock_source: ClockSource) -> (NaiveDateTime, u32) {
    let secs = (now_ns / 1_000_000_000) as i64;
    let nanos = (now_ns % 1_000_000_000) as u32;
    let centiseconds = nanos / 10_000_000;
    let naive_utc = DateTime::<Utc>::from_timestamp(secs, nanos)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap())
        .naive_utc();

    let naive = match clock_source {
        ClockSource::Utc | ClockSource::PtpTai => naive_utc,
        ClockSource::LocalTime => Local.from_utc_datetime(&naive_utc).naive_local(),
    };
    (naive, centiseconds)
}

/// Inverse of `broken_down`'s date math: reinterprets a naive wall-clock
/// value in the configured zone and returns nanoseconds since the epoch.
fn epoch_ns_for(naive: NaiveDateTime, clock_source: ClockSource) -> Result<u64, ArchiveError> {
    let secs = match clock_source {
        ClockSource::Utc | ClockSource::PtpTai => Utc.from_utc_datetime(&naive).timestamp(),
        ClockSource::LocalTime => Local
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| {
                ArchiveError::ConfigInvalid(
                    "period boundary falls in an ambiguous or nonexistent local time (DST transition)"
                        .into(),
                )
            })?
            .timestamp(),
    };
    Ok(secs.max(0) as u64 * 1_000_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(period_sec: u64, layout: Layout, root: &Path) -> PolicyConfig {
        PolicyConfig {
            root: root.to_path_buf(),
            suffix: "opus".to_string(),
            layout,
            period_sec,
            clock_source: ClockSource::Utc,
            create_dirs: false,
        }
    }

    fn ns_for(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> u64 {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap()
            .timestamp() as u64
            * 1_000_000_000
    }

    #[test]
    fn first_call_always_rotates() {
        let policy = ArchivePolicy::new(config(3600, Layout::Flat, Path::new("/tmp/x"))).unwrap();
        assert!(policy.should_rotate(0));
    }

    #[test]
    fn hourly_rotation_at_local_14_59_crosses_15_00() {
        let mut policy =
            ArchivePolicy::new(config(3600, Layout::DailyDir, Path::new("/archive"))).unwrap();

        let t0 = ns_for(2026, 1, 10, 14, 59, 0);
        let path0 = policy.next_path(t0).unwrap();
        policy.advance();
        assert_eq!(
            path0,
            PathBuf::from("/archive/2026-01-10/2026-01-10-14.opus")
        );
        assert!(!policy.should_rotate(ns_for(2026, 1, 10, 14, 59, 30)));

        let t1 = ns_for(2026, 1, 10, 15, 0, 30);
        assert!(policy.should_rotate(t1));
        let path1 = policy.next_path(t1).unwrap();
        policy.advance();
        assert_eq!(
            path1,
            PathBuf::from("/archive/2026-01-10/2026-01-10-15.opus")
        );
        assert_eq!(policy.rotations(), 2);
    }

    #[test]
    fn next_path_is_idempotent_without_advance() {
        let mut policy =
            ArchivePolicy::new(config(3600, Layout::Flat, Path::new("/archive"))).unwrap();
        let now = ns_for(2026, 1, 10, 14, 30, 0);
        let a = policy.next_path(now).unwrap();
        let b = policy.next_path(now).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_period_disables_rotation_after_first_open() {
        let mut policy =
            ArchivePolicy::new(config(0, Layout::Flat, Path::new("/archive"))).unwrap();
        assert!(policy.should_rotate(1));
        policy.next_path(1).unwrap();
        policy.advance();
        assert!(!policy.should_rotate(u64::MAX - 1));
    }

    #[test]
    fn custom_layout_requires_nonempty_pattern() {
        let err = ArchivePolicy::new(config(
            3600,
            Layout::Custom(String::new()),
            Path::new("/archive"),
        ))
        .unwrap_err();
        assert!(matches!(err, ArchiveError::ConfigInvalid(_)));
    }

    #[test]
    fn create_dirs_makes_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config(3600, Layout::DailyDir, tmp.path());
        cfg.create_dirs = true;
        let mut policy = ArchivePolicy::new(cfg).unwrap();
        let path = policy.next_path(ns_for(2026, 1, 10, 14, 0, 0)).unwrap();
        assert!(path.parent().unwrap().is_dir());
    }
}
