//! Health check records, rolling performance metrics and alert rules.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Healthy,
    Warning,
    Critical,
    Unknown,
    Offline,
}

impl MonitorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MonitorStatus::Healthy => "healthy",
            MonitorStatus::Warning => "warning",
            MonitorStatus::Critical => "critical",
            MonitorStatus::Unknown => "unknown",
            MonitorStatus::Offline => "offline",
        }
    }
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
            AlertLevel::Critical => "critical",
        }
    }
}

impl std::str::FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(AlertLevel::Info),
            "warning" => Ok(AlertLevel::Warning),
            "error" => Ok(AlertLevel::Error),
            "critical" => Ok(AlertLevel::Critical),
            other => Err(format!("Unknown alert level: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub agent_type: String,
    pub status: MonitorStatus,
    pub timestamp: DateTime<Utc>,
    /// Seconds.
    pub response_time: f64,
    pub error_message: Option<String>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl HealthCheck {
    pub fn new(agent_type: &str, status: MonitorStatus, response_time: f64) -> Self {
        Self {
            agent_type: agent_type.to_string(),
            status,
            timestamp: Utc::now(),
            response_time,
            error_message: None,
            details: Map::new(),
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub agent_type: String,
    pub response_time_avg: f64,
    pub response_time_min: f64,
    pub response_time_max: f64,
    pub success_rate: f64,
    pub error_count: u64,
    pub total_requests: u64,
    pub last_request_time: Option<DateTime<Utc>>,
    /// Seconds since the first observation.
    pub uptime: f64,
    pub memory_usage: Option<f64>,
    pub cpu_usage: Option<f64>,
    #[serde(skip)]
    first_seen: Option<DateTime<Utc>>,
}

impl PerformanceMetrics {
    pub fn new(agent_type: &str) -> Self {
        Self {
            agent_type: agent_type.to_string(),
            response_time_avg: 0.0,
            response_time_min: 0.0,
            response_time_max: 0.0,
            success_rate: 0.0,
            error_count: 0,
            total_requests: 0,
            last_request_time: None,
            uptime: 0.0,
            memory_usage: None,
            cpu_usage: None,
            first_seen: None,
        }
    }

    /// Fold one health check into the metrics.
    ///
    /// The average is a two-point blend, `(avg + sample) / 2`, not a true mean.
    pub fn record(&mut self, check: &HealthCheck) {
        self.total_requests += 1;
        self.last_request_time = Some(check.timestamp);
        let first_seen = *self.first_seen.get_or_insert(check.timestamp);
        self.uptime = (check.timestamp - first_seen).num_milliseconds() as f64 / 1000.0;

        let sample = check.response_time;
        if self.total_requests == 1 {
            self.response_time_avg = sample;
            self.response_time_min = sample;
            self.response_time_max = sample;
        } else {
            self.response_time_avg = (self.response_time_avg + sample) / 2.0;
            self.response_time_min = self.response_time_min.min(sample);
            self.response_time_max = self.response_time_max.max(sample);
        }

        if check.status != MonitorStatus::Healthy {
            self.error_count += 1;
        }
        self.success_rate =
            (self.total_requests - self.error_count) as f64 / self.total_requests as f64;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub agent_type: String,
    pub level: AlertLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: Value,
}

/// First matching rule wins: critical status, warning status, then slow response.
pub fn evaluate_alert(check: &HealthCheck, slow_threshold_secs: f64) -> Option<Alert> {
    let agent_type = &check.agent_type;
    let (level, message, details) = match check.status {
        MonitorStatus::Critical => (
            AlertLevel::Critical,
            format!(
                "Agent {} is in critical state: {}",
                agent_type,
                check.error_message.as_deref().unwrap_or("None")
            ),
            json!({ "health_check": check }),
        ),
        MonitorStatus::Warning => (
            AlertLevel::Warning,
            format!("Agent {} is in warning state", agent_type),
            json!({ "health_check": check }),
        ),
        _ if check.response_time > slow_threshold_secs => (
            AlertLevel::Warning,
            format!(
                "Agent {} has high response time: {:.2}s",
                agent_type, check.response_time
            ),
            json!({ "response_time": check.response_time }),
        ),
        _ => return None,
    };
    Some(Alert {
        agent_type: agent_type.clone(),
        level,
        message,
        timestamp: Utc::now(),
        details,
    })
}

/// Alerts newer than `hours`, optionally of one level.
pub fn filter_alerts(alerts: &[Alert], level: Option<AlertLevel>, hours: i64) -> Vec<Alert> {
    let cutoff = Utc::now() - ChronoDuration::hours(hours);
    alerts
        .iter()
        .filter(|a| a.timestamp > cutoff)
        .filter(|a| level.map_or(true, |l| a.level == l))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(status: MonitorStatus, response_time: f64) -> HealthCheck {
        HealthCheck::new("investor_summary", status, response_time)
    }

    #[test]
    fn test_average_is_two_point_blend() {
        let mut metrics = PerformanceMetrics::new("investor_summary");
        let mut averages = Vec::new();
        for sample in [2.0, 4.0, 6.0] {
            metrics.record(&check(MonitorStatus::Healthy, sample));
            averages.push(metrics.response_time_avg);
        }
        assert_eq!(averages, vec![2.0, 3.0, 4.5]);
        assert_eq!(metrics.response_time_min, 2.0);
        assert_eq!(metrics.response_time_max, 6.0);
    }

    #[test]
    fn test_zero_first_sample_still_seeds() {
        let mut metrics = PerformanceMetrics::new("x");
        metrics.record(&check(MonitorStatus::Offline, 0.0));
        metrics.record(&check(MonitorStatus::Healthy, 4.0));
        assert_eq!(metrics.response_time_avg, 2.0);
        assert_eq!(metrics.response_time_min, 0.0);
    }

    #[test]
    fn test_success_rate() {
        let mut metrics = PerformanceMetrics::new("x");
        metrics.record(&check(MonitorStatus::Healthy, 1.0));
        metrics.record(&check(MonitorStatus::Critical, 1.0));
        metrics.record(&check(MonitorStatus::Offline, 1.0));
        metrics.record(&check(MonitorStatus::Healthy, 1.0));
        assert_eq!(metrics.error_count, 2);
        assert_eq!(metrics.success_rate, 0.5);
    }

    #[test]
    fn test_critical_and_slow_raises_one_critical_alert() {
        let slow_critical = check(MonitorStatus::Critical, 12.0).with_error("boom");
        let alert = evaluate_alert(&slow_critical, 10.0).unwrap();
        assert_eq!(alert.level, AlertLevel::Critical);
        assert_eq!(
            alert.message,
            "Agent investor_summary is in critical state: boom"
        );
    }

    #[test]
    fn test_slow_healthy_raises_warning() {
        let alert = evaluate_alert(&check(MonitorStatus::Healthy, 10.5), 10.0).unwrap();
        assert_eq!(alert.level, AlertLevel::Warning);
        assert_eq!(
            alert.message,
            "Agent investor_summary has high response time: 10.50s"
        );
        assert!(evaluate_alert(&check(MonitorStatus::Healthy, 0.1), 10.0).is_none());
        assert!(evaluate_alert(&check(MonitorStatus::Offline, 0.0), 10.0).is_none());
    }

    #[test]
    fn test_filter_alerts_by_age_then_level() {
        let mut old = evaluate_alert(&check(MonitorStatus::Warning, 0.0), 10.0).unwrap();
        old.timestamp = Utc::now() - ChronoDuration::hours(30);
        let fresh = evaluate_alert(&check(MonitorStatus::Critical, 0.0), 10.0).unwrap();
        let alerts = vec![old, fresh];
        assert_eq!(filter_alerts(&alerts, None, 24).len(), 1);
        assert_eq!(filter_alerts(&alerts, Some(AlertLevel::Warning), 48).len(), 1);
        assert_eq!(filter_alerts(&alerts, Some(AlertLevel::Info), 48).len(), 0);
    }
}
