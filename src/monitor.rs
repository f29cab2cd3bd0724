use std::time::{Duration, Instant};

use log::debug;
use serde::Serialize;
use sysinfo::{ProcessExt, System, SystemExt};

/// Wall clock and resident memory for one run.
pub struct RunMonitor {
    start: Instant,
    start_memory: u64,
    system: System,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunUsage {
    pub elapsed: Duration,
    pub start_memory: u64,
    pub end_memory: u64,
}

impl RunUsage {
    pub fn memory_delta(&self) -> i64 {
        self.end_memory as i64 - self.start_memory as i64
    }
}

impl RunMonitor {
    pub fn start() -> Self {
        let mut system = System::new();
        let start_memory = resident_memory(&mut system);
        Self {
            start: Instant::now(),
            start_memory,
            system,
        }
    }

    pub fn finish(mut self) -> RunUsage {
        let usage = RunUsage {
            elapsed: self.start.elapsed(),
            start_memory: self.start_memory,
            end_memory: resident_memory(&mut self.system),
        };
        debug!("run usage: {usage:?}");
        usage
    }
}

/// Resident memory of this process in bytes, 0 when the platform does not
/// report it.
fn resident_memory(system: &mut System) -> u64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    system.refresh_process(pid);
    system.process(pid).map_or(0, |p| p.memory())
}
