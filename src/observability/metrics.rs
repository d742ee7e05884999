use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub broadcasts_total: IntCounterVec,
    pub accepts_total: IntCounterVec,
    pub accept_latency_seconds: HistogramVec,
    pub deliveries_completed_total: IntCounterVec,
    pub active_assignments: IntGauge,
    pub delivery_codes_issued_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let broadcasts_total = IntCounterVec::new(
            Opts::new("broadcasts_total", "Delivery broadcasts by outcome"),
            &["outcome"],
        )
        .expect("valid broadcasts_total metric");

        let accepts_total = IntCounterVec::new(
            Opts::new("accepts_total", "Courier accept attempts by outcome"),
            &["outcome"],
        )
        .expect("valid accepts_total metric");

        let accept_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "accept_latency_seconds",
                "Latency of accept arbitration in seconds",
            ),
            &["outcome"],
        )
        .expect("valid accept_latency_seconds metric");

        let deliveries_completed_total = IntCounterVec::new(
            Opts::new(
                "deliveries_completed_total",
                "Shop orders moved to delivered, by path",
            ),
            &["path"],
        )
        .expect("valid deliveries_completed_total metric");

        let active_assignments = IntGauge::new(
            "active_assignments",
            "Couriers currently holding an assigned delivery",
        )
        .expect("valid active_assignments metric");

        let delivery_codes_issued_total = IntCounter::new(
            "delivery_codes_issued_total",
            "One-time delivery codes issued",
        )
        .expect("valid delivery_codes_issued_total metric");

        registry
            .register(Box::new(broadcasts_total.clone()))
            .expect("register broadcasts_total");
        registry
            .register(Box::new(accepts_total.clone()))
            .expect("register accepts_total");
        registry
            .register(Box::new(accept_latency_seconds.clone()))
            .expect("register accept_latency_seconds");
        registry
            .register(Box::new(deliveries_completed_total.clone()))
            .expect("register deliveries_completed_total");
        registry
            .register(Box::new(active_assignments.clone()))
            .expect("register active_assignments");
        registry
            .register(Box::new(delivery_codes_issued_total.clone()))
            .expect("register delivery_codes_issued_total");

        Self {
            registry,
            broadcasts_total,
            accepts_total,
            accept_latency_seconds,
            deliveries_completed_total,
            active_assignments,
            delivery_codes_issued_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
