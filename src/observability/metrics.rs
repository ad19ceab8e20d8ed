use prometheus::{
    Encoder, GaugeVec, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bids_total: IntCounterVec,
    pub active_bids: IntGauge,
    pub allocations_total: IntCounterVec,
    pub allocation_latency_seconds: HistogramVec,
    pub driver_wins_in_window: GaugeVec,
    pub sweeps_total: IntCounter,
    pub invariant_violations_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bids_total = IntCounterVec::new(
            Opts::new("bids_total", "Bid intake operations by outcome"),
            &["outcome"],
        )
        .expect("valid bids_total metric");

        let active_bids = IntGauge::new("active_bids", "Bids currently in the active state")
            .expect("valid active_bids metric");

        let allocations_total = IntCounterVec::new(
            Opts::new("allocations_total", "Allocation attempts by outcome"),
            &["outcome"],
        )
        .expect("valid allocations_total metric");

        let allocation_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "allocation_latency_seconds",
                "Latency of a single job allocation in seconds",
            ),
            &["outcome"],
        )
        .expect("valid allocation_latency_seconds metric");

        let driver_wins_in_window = GaugeVec::new(
            Opts::new(
                "driver_wins_in_window",
                "Jobs won by a driver in the current fairness window",
            ),
            &["driver_id"],
        )
        .expect("valid driver_wins_in_window metric");

        let sweeps_total = IntCounter::new("sweeps_total", "Completed scheduler sweeps")
            .expect("valid sweeps_total metric");

        let invariant_violations_total = IntCounter::new(
            "invariant_violations_total",
            "Internal consistency violations detected; each one needs an operator",
        )
        .expect("valid invariant_violations_total metric");

        registry
            .register(Box::new(bids_total.clone()))
            .expect("register bids_total");
        registry
            .register(Box::new(active_bids.clone()))
            .expect("register active_bids");
        registry
            .register(Box::new(allocations_total.clone()))
            .expect("register allocations_total");
        registry
            .register(Box::new(allocation_latency_seconds.clone()))
            .expect("register allocation_latency_seconds");
        registry
            .register(Box::new(driver_wins_in_window.clone()))
            .expect("register driver_wins_in_window");
        registry
            .register(Box::new(sweeps_total.clone()))
            .expect("register sweeps_total");
        registry
            .register(Box::new(invariant_violations_total.clone()))
            .expect("register invariant_violations_total");

        Self {
            registry,
            bids_total,
            active_bids,
            allocations_total,
            allocation_latency_seconds,
            driver_wins_in_window,
            sweeps_total,
            invariant_violations_total,
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
