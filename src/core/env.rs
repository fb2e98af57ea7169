//! Host environment detection, logged at the start of every invocation.

use serde::{Deserialize, Serialize};

/// The machine a benchmark ran on. Worker counts and memory samples only
/// make sense next to these numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub psbench_version: String,
    pub os: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_cores: Option<usize>,

    /// Threads the OS reports as able to run in parallel.
    pub logical_cpus: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ram_bytes: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_ram_bytes: Option<u64>,

    /// Whether this build samples memory (`mem` feature).
    pub memory_sampling: bool,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        EnvironmentInfo {
            psbench_version: env!("CARGO_PKG_VERSION").to_string(),
            os: std::env::consts::OS.to_string(),
            os_version: None,
            kernel_version: None,
            hostname: None,
            cpu_model: None,
            physical_cores: None,
            logical_cpus: std::thread::available_parallelism().map_or(1, |n| n.get()),
            total_ram_bytes: None,
            available_ram_bytes: None,
            memory_sampling: cfg!(feature = "mem"),
        }
    }
}

impl EnvironmentInfo {
    pub fn detect() -> Self {
        use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

        let sys = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::new())
                .with_memory(MemoryRefreshKind::new().with_ram()),
        );
        let defaults = EnvironmentInfo::default();
        EnvironmentInfo {
            os: System::name().unwrap_or(defaults.os.clone()),
            os_version: System::os_version(),
            kernel_version: System::kernel_version(),
            hostname: System::host_name(),
            cpu_model: sys.cpus().first().map(|c| c.brand().trim().to_string()),
            physical_cores: sys.physical_core_count(),
            logical_cpus: sys.cpus().len().max(defaults.logical_cpus),
            total_ram_bytes: Some(sys.total_memory()),
            available_ram_bytes: Some(sys.available_memory()),
            ..defaults
        }
    }
}
