//! Process memory probe.
//!
//! Reads `/proc/self/status` on Linux. Elsewhere every figure is zero.
//!
//! | field | source |
//! |---|---|
//! | `resident` | `VmRSS` |
//! | `heapTotal` | `VmData` (data + stack segments) |
//! | `heapUsed` | `RssAnon` |
//! | `external` | `RssFile` |
//! | `arrayBuffers` | `RssShmem` |

use serde::Serialize;

/// Memory usage in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub resident: u64,
    pub heap_total: u64,
    pub heap_used: u64,
    pub external: u64,
    pub array_buffers: u64,
}

impl MemoryUsage {
    /// Sample the current process.
    pub fn current() -> Self {
        std::fs::read_to_string("/proc/self/status")
            .map(|status| Self::parse_status(&status))
            .unwrap_or_default()
    }

    /// Parse the contents of a `/proc/<pid>/status` file.
    pub fn parse_status(status: &str) -> Self {
        let mut usage = MemoryUsage::default();
        for line in status.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let slot = match key {
                "VmRSS" => &mut usage.resident,
                "VmData" => &mut usage.heap_total,
                "RssAnon" => &mut usage.heap_used,
                "RssFile" => &mut usage.external,
                "RssShmem" => &mut usage.array_buffers,
                _ => continue,
            };
            *slot = parse_kib(rest).unwrap_or(0);
        }
        usage
    }
}

fn parse_kib(value: &str) -> Option<u64> {
    let number = value.trim().trim_end_matches("kB").trim();
    number.parse::<u64>().ok().map(|kib| kib * 1024)
}
