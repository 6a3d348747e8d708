use std::time::Duration;
use vise::{Buckets, Counter, Gauge, Histogram, LabeledFamily, Metrics, Unit};

const LATENCIES: Buckets = Buckets::exponential(0.00001..=5.0, 2.0);
const CHUNK_SIZES: Buckets = Buckets::exponential(64.0..=1073741824.0, 4.0);

#[derive(Debug, Metrics)]
#[metrics(prefix = "dump_storage")]
pub struct StorageMetrics {
    /// Time spent reading one chunk file, by stream kind (`blocks` / `contracts`).
    #[metrics(unit = Unit::Seconds, labels = ["stream"], buckets = LATENCIES)]
    pub chunk_load: LabeledFamily<&'static str, Histogram<Duration>>,
    #[metrics(unit = Unit::Bytes, labels = ["stream"], buckets = CHUNK_SIZES)]
    pub chunk_size: LabeledFamily<&'static str, Histogram<usize>>,
    /// Records taken off the front of a stream, matched or skipped.
    #[metrics(labels = ["stream"])]
    pub records_consumed: LabeledFamily<&'static str, Counter>,
    pub absorbed_contract_records: Counter,
    pub tracked_contracts: Gauge<usize>,
}

#[vise::register]
pub(crate) static STORAGE_METRICS: vise::Global<StorageMetrics> = vise::Global::new();
