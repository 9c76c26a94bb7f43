//! Wall-clock time reads used by the `none`/`software` clock sources, and as
//! the fallback when a hardware clock read fails.

#[cfg(windows)]
mod windows_time {
    #[repr(C)]
    struct FileTime {
        dw_low_date_time: u32,
        dw_high_date_time: u32,
    }

    #[link(name = "kernel32")]
    extern "system" {
        fn GetSystemTimePreciseAsFileTime(lp_system_time_as_file_time: *mut FileTime);
    }

    // FILETIME epoch is 1601-01-01; Unix epoch is 1970-01-01, 116444736000000000
    // 100ns intervals apart.
    const FILETIME_TO_UNIX_EPOCH: i64 = 116_444_736_000_000_000;

    pub fn get_timestamp_ns() -> i64 {
        let mut ft = FileTime {
            dw_low_date_time: 0,
            dw_high_date_time: 0,
        };
        unsafe {
            GetSystemTimePreciseAsFileTime(&mut ft);
        }
        let filetime = (ft.dw_high_date_time as i64) << 32 | ft.dw_low_date_time as i64;
        (filetime - FILETIME_TO_UNIX_EPOCH) * 100
    }
}

#[cfg(windows)]
pub fn get_timestamp_ns() -> i64 {
    windows_time::get_timestamp_ns()
}

#[cfg(not(windows))]
pub fn get_timestamp_ns() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_nanos() as i64,
        Err(_) => 0,
    }
}

/// A rough lower bound used by [`crate::PtpClock::healthy`] to decide
/// whether the software clock has actually been set by something (an NTP or
/// PTP daemon) rather than reading out a just-booted default.
pub const PLAUSIBLE_EPOCH_NS: i64 = 1_577_836_800_000_000_000; // 2020-01-01T00:00:00Z
