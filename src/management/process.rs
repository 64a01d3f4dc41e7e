//! Management beans describing the host process itself.

use std::time::Instant;

use super::{ManagementStore, ObjectName, Value};
use crate::error::QueryError;

const RUNTIME: &str = "process:type=Runtime";
const THREADING: &str = "process:type=Threading";
const OPERATING_SYSTEM: &str = "process:type=OperatingSystem";
const MEMORY: &str = "process:type=Memory";

/// A [`ManagementStore`] exposing live statistics of the current process.
///
/// Beans:
/// - `process:type=Runtime`: `Uptime` (seconds), `Pid`
/// - `process:type=Threading`: `ThreadCount`
/// - `process:type=OperatingSystem`: `ProcessCpuUserTime`,
///   `ProcessCpuSystemTime` (milliseconds), `OpenFileDescriptorCount`
/// - `process:type=Memory`: `ResidentSetSize` (bytes)
///
/// Values the platform cannot provide read as null.
pub struct ProcessStore {
    start_time: Instant,
    names: Vec<ObjectName>,
}

impl ProcessStore {
    /// Creates a new process store.
    pub fn new() -> Self {
        let names = [RUNTIME, THREADING, OPERATING_SYSTEM, MEMORY]
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect();
        Self {
            start_time: Instant::now(),
            names,
        }
    }
}

impl Default for ProcessStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagementStore for ProcessStore {
    fn name(&self) -> &str {
        "process"
    }

    fn contains(&self, name: &ObjectName) -> bool {
        self.names.contains(name)
    }

    fn query_names(&self, pattern: &ObjectName) -> Vec<ObjectName> {
        self.names
            .iter()
            .filter(|name| pattern.matches(name))
            .cloned()
            .collect()
    }

    fn attribute(&self, name: &ObjectName, attribute: &str) -> Result<Option<Value>, QueryError> {
        if !self.contains(name) {
            return Err(QueryError::NoSuchBean(name.to_string()));
        }
        let value = match (name.property("type"), attribute) {
            (Some("Runtime"), "Uptime") => Some(Value::from(self.start_time.elapsed().as_secs())),
            (Some("Runtime"), "Pid") => Some(Value::from(std::process::id())),
            (Some("Threading"), "ThreadCount") => get_thread_count().map(Value::from),
            (Some("OperatingSystem"), "ProcessCpuUserTime") => {
                get_cpu_times().map(|(user, _)| Value::from(user))
            }
            (Some("OperatingSystem"), "ProcessCpuSystemTime") => {
                get_cpu_times().map(|(_, system)| Value::from(system))
            }
            (Some("OperatingSystem"), "OpenFileDescriptorCount") => {
                get_open_fds().map(Value::from)
            }
            (Some("Memory"), "ResidentSetSize") => get_rss_bytes().map(Value::from),
            _ => {
                return Err(QueryError::NoSuchAttribute {
                    bean: name.to_string(),
                    attribute: attribute.to_owned(),
                })
            }
        };
        Ok(value)
    }
}

/// Gets the number of threads in the current process.
#[cfg(target_os = "linux")]
fn get_thread_count() -> Option<i64> {
    // one entry per thread in /proc/self/task/
    let entries = std::fs::read_dir("/proc/self/task").ok()?;
    Some(entries.count() as i64)
}

#[cfg(not(target_os = "linux"))]
fn get_thread_count() -> Option<i64> {
    None
}

/// Gets CPU times (user, system) in milliseconds.
fn get_cpu_times() -> Option<(i64, i64)> {
    unsafe {
        let mut usage: libc::rusage = std::mem::zeroed();
        if libc::getrusage(libc::RUSAGE_SELF, &mut usage) == 0 {
            let user_ms =
                usage.ru_utime.tv_sec as i64 * 1000 + usage.ru_utime.tv_usec as i64 / 1000;
            let sys_ms =
                usage.ru_stime.tv_sec as i64 * 1000 + usage.ru_stime.tv_usec as i64 / 1000;
            Some((user_ms, sys_ms))
        } else {
            None
        }
    }
}

#[cfg(target_os = "linux")]
fn get_open_fds() -> Option<i64> {
    let entries = std::fs::read_dir("/proc/self/fd").ok()?;
    Some(entries.count() as i64)
}

#[cfg(not(target_os = "linux"))]
fn get_open_fds() -> Option<i64> {
    None
}

/// Gets the resident set size in bytes.
#[cfg(target_os = "linux")]
fn get_rss_bytes() -> Option<i64> {
    // /proc/self/statm: size resident shared text lib data dt, in pages
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: i64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as i64;
    Some(resident_pages * page_size)
}

#[cfg(not(target_os = "linux"))]
fn get_rss_bytes() -> Option<i64> {
    None
}
