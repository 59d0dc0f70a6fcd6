//! Free-memory sampling for the Task Runner's RAM-floor backpressure
//! (spec.md 4.L / 5). Reads `/proc/meminfo` directly rather than pulling in
//! a platform-abstraction crate, the way the teacher's resource monitor
//! does — adapted here from a usage-percentage reading to an available-MB
//! reading since the runner's floor is expressed in MB.

/// Returns free/available memory in MB, or `None` if it can't be
/// determined (non-Linux platforms, or a malformed `/proc/meminfo`). A
/// `None` is treated by callers as "can't verify, don't block" only at the
/// call site's discretion; the runner treats it conservatively as zero.
pub fn available_mb() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let contents = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_mem_available(&contents)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_mem_available(meminfo: &str) -> Option<u64> {
    for line in meminfo.lines() {
        let mut parts = line.split_whitespace();
        if parts.next()? == "MemAvailable:" {
            let kb: u64 = parts.next()?.parse().ok()?;
            return Some(kb / 1024);
        }
    }
    None
}
