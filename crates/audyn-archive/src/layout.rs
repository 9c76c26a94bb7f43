use std::path::PathBuf;

use chrono::NaiveDateTime;

/// Where rotated archive paths land, mirroring Rotter's naming conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// `<root>/2026-01-10-14.<suffix>`
    Flat,
    /// `<root>/2026/01/10/14/archive.<suffix>`
    Hierarchy,
    /// `<root>/2026/01/10/14/2026-01-10-14.<suffix>`
    Combo,
    /// `<root>/2026-01-10/2026-01-10-14.<suffix>`
    DailyDir,
    /// `<root>/2026-01-10/2026-01-10-14-30-00-00.<suffix>`, second-accurate
    /// and using the wall-clock time of the call rather than the period
    /// start.
    Accurate,
    /// A user-supplied strftime-style pattern, rendered under `<root>` with
    /// `.<suffix>` appended.
    Custom(String),
}

/// Which clock the policy's broken-down-time math runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// The host's local time zone.
    LocalTime,
    /// UTC.
    Utc,
    /// The PTP clock's value, interpreted as TAI seconds but formatted with
    /// a plain UTC calendar (no TAI-UTC leap offset applied — see
    /// `DESIGN.md` for why this spec keeps that behavior rather than
    /// "fixing" it).
    PtpTai,
}

/// Renders `dt` (already broken down in the policy's configured clock/zone,
/// as a naive wall-clock value) into a full archive path under `root` per
/// `layout`.
pub fn render_path(
    root: &std::path::Path,
    layout: &Layout,
    suffix: &str,
    dt: NaiveDateTime,
    centiseconds: u32,
) -> PathBuf {
    match layout {
        Layout::Flat => root.join(format!("{}.{suffix}", dt.format("%Y-%m-%d-%H"))),
        Layout::Hierarchy => root
            .join(format!("{}", dt.format("%Y/%m/%d/%H")))
            .join(format!("archive.{suffix}")),
        Layout::Combo => root
            .join(format!("{}", dt.format("%Y/%m/%d/%H")))
            .join(format!("{}.{suffix}", dt.format("%Y-%m-%d-%H"))),
        Layout::DailyDir => root
            .join(format!("{}", dt.format("%Y-%m-%d")))
            .join(format!("{}.{suffix}", dt.format("%Y-%m-%d-%H"))),
        Layout::Accurate => root
            .join(format!("{}", dt.format("%Y-%m-%d")))
            .join(format!(
                "{}-{centiseconds:02}.{suffix}",
                dt.format("%Y-%m-%d-%H-%M-%S")
            )),
        Layout::Custom(pattern) => root.join(format!("{}.{suffix}", dt.format(pattern))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_dt() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 10)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
    }

    #[test]
    fn flat_layout_renders_hour_bucket() {
        let path = render_path(
            std::path::Path::new("/root"),
            &Layout::Flat,
            "opus",
            sample_dt(),
            0,
        );
        assert_eq!(path, std::path::PathBuf::from("/root/2026-01-10-14.opus"));
    }

    #[test]
    fn hierarchy_layout_uses_fixed_filename() {
        let path = render_path(
            std::path::Path::new("/root"),
            &Layout::Hierarchy,
            "opus",
            sample_dt(),
            0,
        );
        assert_eq!(
            path,
            std::path::PathBuf::from("/root/2026/01/10/14/archive.opus")
        );
    }

    #[test]
    fn combo_layout_nests_and_names() {
        let path = render_path(
            std::path::Path::new("/root"),
            &Layout::Combo,
            "opus",
            sample_dt(),
            0,
        );
        assert_eq!(
            path,
            std::path::PathBuf::from("/root/2026/01/10/14/2026-01-10-14.opus")
        );
    }

    #[test]
    fn dailydir_layout_groups_by_day() {
        let path = render_path(
            std::path::Path::new("/root"),
            &Layout::DailyDir,
            "opus",
            sample_dt(),
            0,
        );
        assert_eq!(
            path,
            std::path::PathBuf::from("/root/2026-01-10/2026-01-10-14.opus")
        );
    }

    #[test]
    fn accurate_layout_includes_centiseconds() {
        let path = render_path(
            std::path::Path::new("/root"),
            &Layout::Accurate,
            "opus",
            sample_dt(),
            0,
        );
        assert_eq!(
            path,
            std::path::PathBuf::from("/root/2026-01-10/2026-01-10-14-30-00-00.opus")
        );
    }

    #[test]
    fn custom_layout_uses_user_pattern() {
        let path = render_path(
            std::path::Path::new("/root"),
            &Layout::Custom("%Y/show-%H".to_string()),
            "wav",
            sample_dt(),
            0,
        );
        assert_eq!(path, std::path::PathBuf::from("/root/2026/show-14.wav"));
    }
}
