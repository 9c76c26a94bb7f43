//! Linux PTP Hardware Clock (PHC) access: discovering the `/dev/ptpN`
//! device behind a network interface, and reading it via the kernel's
//! dynamic-clockid `clock_gettime` trick.

#![cfg(target_os = "linux")]

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

const SIOCETHTOOL: libc::c_ulong = 0x8946;
const ETHTOOL_GET_TS_INFO: u32 = 0x0000_0041;

#[repr(C)]
struct EthtoolTsInfo {
    cmd: u32,
    so_timestamping: u32,
    phc_index: i32,
    tx_types: u32,
    tx_reserved: [u32; 3],
    rx_filters: u32,
    rx_reserved: [u32; 3],
}

#[repr(C)]
struct IfReqData {
    ifr_name: [libc::c_char; libc::IFNAMSIZ],
    ifr_data: *mut libc::c_void,
}

/// Discovers the PHC device index associated with `iface` through the
/// kernel's `ETHTOOL_GET_TS_INFO` ioctl (the same interface `ethtool -T`
/// uses).
pub fn phc_index_for_interface(iface: &str) -> io::Result<i32> {
    if iface.len() >= libc::IFNAMSIZ {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "interface name too long",
        ));
    }

    let sock = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if sock < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut info = EthtoolTsInfo {
        cmd: ETHTOOL_GET_TS_INFO,
        so_timestamping: 0,
        phc_index: -1,
        tx_types: 0,
        tx_reserved: [0; 3],
        rx_filters: 0,
        rx_reserved: [0; 3],
    };

    let mut ifr_name = [0 as libc::c_char; libc::IFNAMSIZ];
    for (dst, src) in ifr_name.iter_mut().zip(iface.as_bytes()) {
        *dst = *src as libc::c_char;
    }

    let mut req = IfReqData {
        ifr_name,
        ifr_data: &mut info as *mut EthtoolTsInfo as *mut libc::c_void,
    };

    let ret = unsafe { libc::ioctl(sock, SIOCETHTOOL, &mut req as *mut IfReqData) };
    let err = io::Error::last_os_error();
    unsafe {
        libc::close(sock);
    }
    if ret < 0 {
        return Err(err);
    }
    if info.phc_index < 0 {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("interface {iface} has no associated PTP hardware clock"),
        ));
    }
    Ok(info.phc_index)
}

/// Opens `/dev/ptp<index>` and derives the dynamic `clockid_t` the kernel
/// accepts for `clock_gettime` on that file descriptor (`FD_TO_CLOCKID` in
/// `linux/ptp_clock.h`: `(~fd << 3) | 3`).
pub fn open_phc(index: i32) -> io::Result<(File, libc::clockid_t)> {
    let path = format!("/dev/ptp{index}");
    let file = File::open(&path)?;
    let fd = file.as_raw_fd();
    let clockid = ((!(fd as libc::clockid_t)) << 3) | 3;
    Ok((file, clockid))
}

pub fn read_phc_ns(clockid: libc::clockid_t) -> io::Result<u64> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let ret = unsafe { libc::clock_gettime(clockid, &mut ts) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64)
}
