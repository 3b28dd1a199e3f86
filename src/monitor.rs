//! Agent Monitor
//!
//! Background health polling for every registered agent type. The loop runs
//! on its own OS thread so scheduled checks never compete with generation
//! work on the async runtime. Health cache, metrics and alerts sit behind
//! locks and are read by callers concurrently with the loop.

pub mod health;

pub use health::{
    evaluate_alert, filter_alerts, Alert, AlertLevel, HealthCheck, MonitorStatus,
    PerformanceMetrics,
};

use crate::agent::factory::AgentFactory;
use crate::agent::registry::{AgentRegistry, AgentStatus};
use crate::agent::FinancialAgent;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

fn default_check_interval_secs() -> u64 {
    60
}

fn default_slow_response_threshold_secs() -> f64 {
    10.0
}

fn default_error_backoff_secs() -> u64 {
    10
}

fn default_stop_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Responses slower than this raise a warning alert.
    #[serde(default = "default_slow_response_threshold_secs")]
    pub slow_response_threshold_secs: f64,

    /// Pause after an unexpected loop-level failure.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// Upper bound on waiting for the loop thread in `stop_monitoring`.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            slow_response_threshold_secs: default_slow_response_threshold_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

pub type AlertCallback = Arc<dyn Fn(&Alert) + Send + Sync>;

/// Handle returned by [`AgentMonitor::add_alert_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackId(u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub success_rate: f64,
    pub avg_response_time: f64,
    pub total_requests: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSummary {
    pub total_agents: usize,
    pub monitoring_active: bool,
    pub health_status: BTreeMap<String, MonitorStatus>,
    pub performance_summary: BTreeMap<String, PerformanceSummary>,
    /// Alerts raised in the last hour.
    pub recent_alerts: usize,
}

const SLEEP_SLICE: Duration = Duration::from_millis(100);

pub struct AgentMonitor {
    registry: Arc<AgentRegistry>,
    factory: Arc<AgentFactory>,
    config: MonitorConfig,
    /// Id of the live polling run. A detached thread from an earlier run
    /// exits once this no longer names it.
    current_run: RwLock<Option<u64>>,
    next_run: Mutex<u64>,
    worker: Mutex<Option<JoinHandle<()>>>,
    health_cache: RwLock<HashMap<String, HealthCheck>>,
    performance_metrics: RwLock<HashMap<String, PerformanceMetrics>>,
    alerts: RwLock<Vec<Alert>>,
    callbacks: RwLock<Vec<(CallbackId, AlertCallback)>>,
    next_callback_id: Mutex<u64>,
}

impl AgentMonitor {
    pub fn new(
        registry: Arc<AgentRegistry>,
        factory: Arc<AgentFactory>,
        config: MonitorConfig,
    ) -> Self {
        let metrics = registry
            .list_agent_types()
            .into_iter()
            .map(|t| {
                let m = PerformanceMetrics::new(&t);
                (t, m)
            })
            .collect();
        Self {
            registry,
            factory,
            config,
            current_run: RwLock::new(None),
            next_run: Mutex::new(0),
            worker: Mutex::new(None),
            health_cache: RwLock::new(HashMap::new()),
            performance_metrics: RwLock::new(metrics),
            alerts: RwLock::new(Vec::new()),
            callbacks: RwLock::new(Vec::new()),
            next_callback_id: Mutex::new(0),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn is_monitoring(&self) -> bool {
        self.current_run.read().is_some()
    }

    fn is_current_run(&self, run: u64) -> bool {
        *self.current_run.read() == Some(run)
    }

    /// Spawn the polling thread. A second call while running only warns.
    pub fn start_monitoring(self: &Arc<Self>) {
        let mut current = self.current_run.write();
        if current.is_some() {
            tracing::warn!("Monitoring is already running");
            return;
        }
        let run = {
            let mut next = self.next_run.lock();
            *next += 1;
            *next
        };
        *current = Some(run);
        drop(current);

        let monitor = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("findoc-monitor".to_string())
            .spawn(move || monitor.monitor_loop(run));
        match handle {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                tracing::info!(
                    interval_secs = self.config.check_interval_secs,
                    "Agent monitoring started"
                );
            }
            Err(e) => {
                *self.current_run.write() = None;
                tracing::error!(error = %e, "Failed to start monitoring thread");
            }
        }
    }

    /// End the current run and wait up to `stop_timeout_secs` for its thread.
    pub fn stop_monitoring(&self) {
        *self.current_run.write() = None;
        if let Some(handle) = self.worker.lock().take() {
            let deadline = Instant::now() + Duration::from_secs(self.config.stop_timeout_secs);
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(SLEEP_SLICE / 2);
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    tracing::error!("Monitoring thread panicked");
                }
            } else {
                tracing::warn!(
                    timeout_secs = self.config.stop_timeout_secs,
                    "Monitoring thread did not stop in time, detaching"
                );
            }
        }
        tracing::info!("Agent monitoring stopped");
    }

    /// Sleep in short slices so a stop request is noticed promptly.
    fn pause(&self, run: u64, total: Duration) {
        let deadline = Instant::now() + total;
        while self.is_current_run(run) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }

    fn monitor_loop(self: Arc<Self>, run: u64) {
        while self.is_current_run(run) {
            tracing::debug!("Running scheduled health checks");
            let cycle = catch_unwind(AssertUnwindSafe(|| self.run_all_health_checks()));
            match cycle {
                Ok(_) => self.pause(run, Duration::from_secs(self.config.check_interval_secs)),
                Err(_) => {
                    tracing::error!("Error in monitoring loop: health check cycle panicked");
                    self.pause(run, Duration::from_secs(self.config.error_backoff_secs));
                }
            }
        }
    }

    pub fn add_alert_callback(&self, callback: AlertCallback) -> CallbackId {
        let mut next = self.next_callback_id.lock();
        let id = CallbackId(*next);
        *next += 1;
        self.callbacks.write().push((id, callback));
        id
    }

    pub fn remove_alert_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self.callbacks.write();
        let before = callbacks.len();
        callbacks.retain(|(cid, _)| *cid != id);
        callbacks.len() != before
    }

    pub fn get_agent_health(&self, agent_type: &str) -> Option<HealthCheck> {
        self.health_cache.read().get(agent_type).cloned()
    }

    pub fn get_all_agent_health(&self) -> HashMap<String, HealthCheck> {
        self.health_cache.read().clone()
    }

    pub fn get_agent_performance(&self, agent_type: &str) -> Option<PerformanceMetrics> {
        self.performance_metrics.read().get(agent_type).cloned()
    }

    pub fn get_all_performance_metrics(&self) -> HashMap<String, PerformanceMetrics> {
        self.performance_metrics.read().clone()
    }

    pub fn get_alerts(&self, level: Option<AlertLevel>, hours: i64) -> Vec<Alert> {
        filter_alerts(&self.alerts.read(), level, hours)
    }

    /// Drop alerts older than `hours`.
    pub fn clear_alerts(&self, hours: i64) {
        let cutoff = Utc::now() - ChronoDuration::hours(hours);
        self.alerts.write().retain(|a| a.timestamp > cutoff);
    }

    /// Probe one agent type. Every outcome, success or failure, is cached,
    /// folded into metrics and checked for alerts.
    pub fn run_health_check(&self, agent_type: &str) -> HealthCheck {
        let started = Instant::now();
        let check = catch_unwind(AssertUnwindSafe(|| self.probe(agent_type, started)))
            .unwrap_or_else(|_| {
                HealthCheck::new(
                    agent_type,
                    MonitorStatus::Critical,
                    started.elapsed().as_secs_f64(),
                )
                .with_error("health check panicked")
            });
        self.record_health_check(check.clone());
        check
    }

    fn probe(&self, agent_type: &str, started: Instant) -> HealthCheck {
        let Some(metadata) = self.registry.get_agent_metadata(agent_type) else {
            return HealthCheck::new(agent_type, MonitorStatus::Offline, 0.0)
                .with_error(format!("Agent {} not found in registry", agent_type));
        };
        if metadata.status == AgentStatus::Deprecated {
            return HealthCheck::new(agent_type, MonitorStatus::Offline, 0.0)
                .with_error(format!("Agent {} is deprecated", agent_type));
        }

        let Some(agent) = self.factory.create_agent(agent_type, None, false) else {
            return HealthCheck::new(
                agent_type,
                MonitorStatus::Critical,
                started.elapsed().as_secs_f64(),
            )
            .with_error(format!("Failed to create agent {}", agent_type));
        };

        let (status, error, details) = smoke_test(agent.as_ref(), agent_type);
        let check = HealthCheck::new(agent_type, status, started.elapsed().as_secs_f64())
            .with_details(details);
        match error {
            Some(e) => check.with_error(e),
            None => check,
        }
    }

    fn record_health_check(&self, check: HealthCheck) {
        let agent_type = check.agent_type.clone();
        tracing::debug!(
            agent_type = %agent_type,
            status = check.status.as_str(),
            elapsed = check.response_time,
            "Health check recorded"
        );
        self.health_cache
            .write()
            .insert(agent_type.clone(), check.clone());
        self.performance_metrics
            .write()
            .entry(agent_type.clone())
            .or_insert_with(|| PerformanceMetrics::new(&agent_type))
            .record(&check);
        if let Some(alert) = evaluate_alert(&check, self.config.slow_response_threshold_secs) {
            self.trigger_alert(alert);
        }
        self.factory.mark_health(&agent_type, check.status.as_str());
    }

    fn trigger_alert(&self, alert: Alert) {
        self.alerts.write().push(alert.clone());
        tracing::warn!(
            agent_type = %alert.agent_type,
            level = alert.level.as_str(),
            "Alert: {}",
            alert.message
        );
        let callbacks: Vec<AlertCallback> =
            self.callbacks.read().iter().map(|(_, cb)| cb.clone()).collect();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&alert))).is_err() {
                tracing::error!(agent_type = %alert.agent_type, "Error in alert callback");
            }
        }
    }

    /// Sequential checks over every registered type.
    pub fn run_all_health_checks(&self) -> BTreeMap<String, HealthCheck> {
        self.registry
            .list_agent_types()
            .into_iter()
            .map(|agent_type| {
                let check = self.run_health_check(&agent_type);
                (agent_type, check)
            })
            .collect()
    }

    pub fn get_monitoring_summary(&self) -> MonitoringSummary {
        let agent_types = self.registry.list_agent_types();
        let cache = self.health_cache.read();
        let metrics = self.performance_metrics.read();
        let health_status = agent_types
            .iter()
            .map(|t| {
                let status = cache.get(t).map_or(MonitorStatus::Unknown, |h| h.status);
                (t.clone(), status)
            })
            .collect();
        let performance_summary = agent_types
            .iter()
            .filter_map(|t| {
                metrics.get(t).map(|m| {
                    (
                        t.clone(),
                        PerformanceSummary {
                            success_rate: m.success_rate,
                            avg_response_time: m.response_time_avg,
                            total_requests: m.total_requests,
                        },
                    )
                })
            })
            .collect();
        MonitoringSummary {
            total_agents: agent_types.len(),
            monitoring_active: self.is_monitoring(),
            health_status,
            performance_summary,
            recent_alerts: self.get_alerts(None, 1).len(),
        }
    }
}

/// Agent self-description plus a knowledge-store reachability probe.
fn smoke_test(
    agent: &dyn FinancialAgent,
    agent_type: &str,
) -> (MonitorStatus, Option<String>, Map<String, Value>) {
    let probe = catch_unwind(AssertUnwindSafe(|| {
        (agent.agent_info(), agent.knowledge_status())
    }));
    let mut details = Map::new();
    details.insert("agent_type".into(), json!(agent_type));
    match probe {
        Ok((info, knowledge_status)) => {
            details.insert("agent_info".into(), info);
            details.insert("knowledge_status".into(), json!(knowledge_status));
            (MonitorStatus::Healthy, None, details)
        }
        Err(_) => (
            MonitorStatus::Critical,
            Some("agent self-description failed".to_string()),
            details,
        ),
    }
}
