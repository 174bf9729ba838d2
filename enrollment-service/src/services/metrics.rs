use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
static BOOKINGS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static SEAT_RESERVATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static COUPON_REDEMPTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Idempotent: test binaries spin up several applications in one process.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    });

    let registry = PROMETHEUS_REGISTRY.get_or_init(Registry::new);

    BOOKINGS_TOTAL.get_or_init(|| {
        let counter = IntCounterVec::new(
            Opts::new(
                "enrollment_bookings_total",
                "Booking transitions by resulting status",
            ),
            &["status"],
        )
        .expect("failed to create enrollment_bookings_total metric");
        registry
            .register(Box::new(counter.clone()))
            .expect("failed to register enrollment_bookings_total");
        counter
    });

    SEAT_RESERVATIONS_TOTAL.get_or_init(|| {
        let counter = IntCounterVec::new(
            Opts::new(
                "enrollment_seat_reservations_total",
                "Seat reservation attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("failed to create enrollment_seat_reservations_total metric");
        registry
            .register(Box::new(counter.clone()))
            .expect("failed to register enrollment_seat_reservations_total");
        counter
    });

    COUPON_REDEMPTIONS_TOTAL.get_or_init(|| {
        let counter = IntCounterVec::new(
            Opts::new(
                "enrollment_coupon_redemptions_total",
                "Coupon apply attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("failed to create enrollment_coupon_redemptions_total metric");
        registry
            .register(Box::new(counter.clone()))
            .expect("failed to register enrollment_coupon_redemptions_total");
        counter
    });
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

pub fn record_booking(status: &str) {
    if let Some(counter) = BOOKINGS_TOTAL.get() {
        counter.with_label_values(&[status]).inc();
    }
}

pub fn record_reservation(outcome: &str) {
    if let Some(counter) = SEAT_RESERVATIONS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_redemption(outcome: &str) {
    if let Some(counter) = COUPON_REDEMPTIONS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}
