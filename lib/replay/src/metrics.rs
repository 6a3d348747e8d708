use crate::error::Hook;
use std::time::Duration;
use vise::{Buckets, Counter, Gauge, Histogram, LabeledFamily, Metrics, Unit};

const LATENCIES: Buckets = Buckets::exponential(0.000001..=10.0, 2.0);

#[derive(Debug, Metrics)]
#[metrics(prefix = "replay")]
pub struct ReplayMetrics {
    #[metrics(unit = Unit::Seconds, labels = ["hook"], buckets = LATENCIES)]
    pub hook_latency: LabeledFamily<Hook, Histogram<Duration>>,
    pub current_block: Gauge<u64>,
    pub latest_block: Gauge<u64>,
    pub contract_calls: Counter,
}

#[vise::register]
pub(crate) static REPLAY_METRICS: vise::Global<ReplayMetrics> = vise::Global::new();
