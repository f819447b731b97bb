use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all reminder metrics
const PREFIX: &str = "todo_reminders";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Scheduler Metrics
    pub static ref REMINDERS_SCHEDULED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_scheduled_total"),
        "Total number of reminders scheduled or rescheduled"
    ).expect("Failed to create scheduled_total metric");

    pub static ref REMINDERS_CANCELLED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_cancelled_total"),
        "Total number of pending reminders cancelled"
    ).expect("Failed to create cancelled_total metric");

    pub static ref REMINDERS_FIRED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_fired_total"), "Reminder fires by outcome"),
        &["outcome"]
    ).expect("Failed to create fired_total metric");

    pub static ref REMINDERS_PENDING: Gauge = Gauge::new(
        format!("{PREFIX}_pending"),
        "Number of reminders waiting to fire"
    ).expect("Failed to create pending metric");

    pub static ref REMINDER_DELIVERY_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_delivery_duration_seconds"),
            "Notification sink call duration in seconds"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0])
    ).expect("Failed to create delivery_duration_seconds metric");

    // Sweep Metrics
    pub static ref SWEEP_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_sweep_runs_total"), "Daily sweep runs by status"),
        &["status"]
    ).expect("Failed to create sweep_runs_total metric");

    pub static ref SWEEP_ARMED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_sweep_armed_total"),
        "Total reminders re-armed by the daily sweep"
    ).expect("Failed to create sweep_armed_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(REMINDERS_SCHEDULED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(REMINDERS_CANCELLED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(REMINDERS_FIRED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(REMINDERS_PENDING.clone()));
    let _ = REGISTRY.register(Box::new(REMINDER_DELIVERY_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(SWEEP_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SWEEP_ARMED_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn record_reminder_scheduled() {
    REMINDERS_SCHEDULED_TOTAL.inc();
}

pub fn record_reminder_cancelled() {
    REMINDERS_CANCELLED_TOTAL.inc();
}

/// Record the outcome of a reminder fire ("delivered", "dropped", "failed")
pub fn record_reminder_fired(outcome: &str) {
    REMINDERS_FIRED_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn set_pending_reminders(count: usize) {
    REMINDERS_PENDING.set(count as f64);
}

pub fn record_delivery_duration(duration: Duration) {
    REMINDER_DELIVERY_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record a sweep run ("success" or "failed") and how many reminders it armed
pub fn record_sweep_run(status: &str, armed: usize) {
    SWEEP_RUNS_TOTAL.with_label_values(&[status]).inc();
    SWEEP_ARMED_TOTAL.inc_by(armed as f64);
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
