//! PTP-derived time source for the Audyn capture pipeline: a clock
//! abstraction over a free-running fallback, a kernel clock assumed
//! disciplined by an external PTP daemon, or a PTP Hardware Clock read
//! directly, plus RTP-timestamp-to-absolute-time epoch correlation.

mod clock;
mod error;
mod platform;

#[cfg(target_os = "linux")]
mod phc;

pub use clock::{ClockMode, PtpClock};
pub use error::PtpError;
