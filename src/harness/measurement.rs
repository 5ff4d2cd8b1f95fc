use crate::FilebenchError;
use std::fmt;
use std::time::Duration;

const BYTES_PER_MB: f64 = (1024 * 1024) as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Download,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Upload => write!(f, "Upload"),
            Operation::Download => write!(f, "Download"),
        }
    }
}

/// One timed operation on one transport.
#[derive(Debug, Clone)]
pub struct TransferMeasurement {
    pub operation: Operation,
    pub duration: Duration,
    pub speed_mbps: f64,
    pub success: bool,
    pub error: Option<String>,
}

impl TransferMeasurement {
    pub fn completed(operation: Operation, bytes: u64, duration: Duration) -> Self {
        Self {
            operation,
            duration,
            speed_mbps: speed_mbps(bytes, duration),
            success: true,
            error: None,
        }
    }

    pub fn failed(operation: Operation, duration: Duration, error: &FilebenchError) -> Self {
        Self {
            operation,
            duration,
            speed_mbps: 0.0,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Average throughput in MB/s; zero when no time elapsed.
pub fn speed_mbps(bytes: u64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    bytes as f64 / secs / BYTES_PER_MB
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_is_bytes_over_seconds_in_mb() {
        let speed = speed_mbps(5 * 1024 * 1024, Duration::from_secs(2));
        assert!((speed - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_duration_does_not_divide() {
        assert_eq!(speed_mbps(1024, Duration::ZERO), 0.0);
    }

    #[test]
    fn failed_measurement_keeps_the_diagnostic() {
        let error = FilebenchError::Connection("refused".to_string());
        let measurement =
            TransferMeasurement::failed(Operation::Upload, Duration::from_millis(5), &error);

        assert!(!measurement.success);
        assert_eq!(measurement.speed_mbps, 0.0);
        assert!(measurement.error.as_deref().unwrap().contains("refused"));
    }
}
