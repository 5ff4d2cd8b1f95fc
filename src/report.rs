use crate::harness::{Operation, TransportOutcome};
use crate::{FilebenchError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub speed_mbps: f64,
    pub duration_secs: f64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&crate::harness::TransferMeasurement> for TestResult {
    fn from(measurement: &crate::harness::TransferMeasurement) -> Self {
        Self {
            speed_mbps: measurement.speed_mbps,
            duration_secs: measurement.duration.as_secs_f64(),
            success: measurement.success,
            error: measurement.error.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BenchmarkReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub file_size_mb: u64,
    pub server_hardware: BTreeMap<String, String>,
    pub results: BTreeMap<String, BTreeMap<String, TestResult>>,
}

impl BenchmarkReport {
    pub fn new(file_size_mb: u64, outcomes: &[TransportOutcome]) -> Self {
        let mut results = BTreeMap::new();
        for outcome in outcomes {
            let mut per_operation = BTreeMap::new();
            per_operation.insert("upload".to_string(), TestResult::from(&outcome.upload));
            per_operation.insert("download".to_string(), TestResult::from(&outcome.download));
            results.insert(outcome.transport.to_string(), per_operation);
        }

        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            file_size_mb,
            server_hardware: hardware_info(),
            results,
        }
    }

    pub fn print_table(&self) {
        println!("\n{}", "=".repeat(62));
        println!("BENCHMARK RESULTS - {}MB file", self.file_size_mb);
        println!("{}", "=".repeat(62));
        println!(
            "{:<12} {:<13} {:>14} {:>10} {:>8}",
            "Transport", "Operation", "Speed (MB/s)", "Time (s)", "Status"
        );
        println!("{}", "-".repeat(62));

        for (transport, per_operation) in &self.results {
            for operation in [Operation::Upload, Operation::Download] {
                let key = operation.to_string().to_lowercase();
                if let Some(result) = per_operation.get(&key) {
                    let status = if result.success { "✅" } else { "❌" };
                    println!(
                        "{:<12} {:<13} {:>14.2} {:>10.2} {:>8}",
                        transport, operation, result.speed_mbps, result.duration_secs, status
                    );
                }
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| FilebenchError::Config(format!("Failed to serialize report: {}", e)))?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Server hardware description published through SERVER_HW_* environment
/// variables, plus the local hostname.
pub fn hardware_info() -> BTreeMap<String, String> {
    let keys = [
        ("CPU", "SERVER_HW_CPU"),
        ("CPU_Cores", "SERVER_HW_CPU_CORES"),
        ("Memory", "SERVER_HW_MEMORY"),
        ("Disk", "SERVER_HW_DISK"),
        ("OS", "SERVER_HW_OS"),
        ("Kernel", "SERVER_HW_KERNEL"),
        ("Docker", "SERVER_HW_DOCKER"),
    ];

    let mut info: BTreeMap<String, String> = keys
        .iter()
        .map(|(name, var)| {
            (
                (*name).to_string(),
                env::var(var).unwrap_or_else(|_| "Unknown".to_string()),
            )
        })
        .collect();

    if info.values().all(|value| value == "Unknown") {
        info = BTreeMap::from([(
            "Error".to_string(),
            "Hardware info not available".to_string(),
        )]);
    }

    info.insert(
        "Client_Host".to_string(),
        gethostname::gethostname().to_string_lossy().to_string(),
    );
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::TransferMeasurement;
    use std::time::Duration;

    fn sample_outcome() -> TransportOutcome {
        TransportOutcome {
            transport: "stream",
            upload: TransferMeasurement::completed(
                Operation::Upload,
                10 * 1024 * 1024,
                Duration::from_secs(2),
            ),
            download: TransferMeasurement::failed(
                Operation::Download,
                Duration::from_millis(10),
                &crate::FilebenchError::NotFound("missing.bin".to_string()),
            ),
        }
    }

    #[test]
    fn report_serializes_per_transport_results() {
        let report = BenchmarkReport::new(10, &[sample_outcome()]);
        let json = serde_json::to_string(&report).unwrap();

        assert!(json.contains("\"stream\""));
        assert!(json.contains("\"upload\""));
        assert!(json.contains("missing.bin"));
        assert_eq!(report.results["stream"]["upload"].success, true);
        assert_eq!(report.results["stream"]["download"].success, false);
    }

    #[test]
    fn save_writes_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("benchmark_results.json");
        let report = BenchmarkReport::new(10, &[sample_outcome()]);

        report.save(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("file_size_mb"));
    }

    #[test]
    fn hardware_info_always_names_the_client_host() {
        let info = hardware_info();
        assert!(info.contains_key("Client_Host"));
    }
}
