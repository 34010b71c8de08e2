// [libs/domain/historian/src/aggregation.rs]
/*!
 * APARATO: BUCKET AGGREGATION
 * `avg`/`min`/`max`/`first`/`last` sobre buckets de ancho fijo; un bucket
 * sin muestras produce un hueco, nunca una interpolacion.
 */

use chrono::{DateTime, Duration, Utc};
use hydroscada_domain_models::HistorianSample;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFn {
    Avg,
    Min,
    Max,
    First,
    Last,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityHistogram {
    pub good: u32,
    pub uncertain: u32,
    pub bad: u32,
    pub not_connected: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// `None` cuando el bucket no contiene ninguna muestra de buena calidad
    /// (hueco explicito, nunca interpolado).
    pub value: Option<f64>,
    pub quality_histogram: QualityHistogram,
}

/// Agrupa `samples` (se asume ordenado por tiempo) en buckets de ancho
/// `bucket_width` entre `from` y `to`, aplicando `aggregate` sobre los
/// valores de calidad utilizable de cada bucket.
pub fn aggregate(samples: &[HistorianSample], from: DateTime<Utc>, to: DateTime<Utc>, bucket_width: Duration, aggregate: AggregateFn) -> Vec<Bucket> {
    if bucket_width <= Duration::zero() || from >= to {
        return Vec::new();
    }

    let mut buckets = Vec::new();
    let mut cursor = from;
    while cursor < to {
        let end = (cursor + bucket_width).min(to);
        buckets.push(Bucket { start: cursor, end, value: None, quality_histogram: QualityHistogram::default() });
        cursor = end;
    }
    if buckets.is_empty() {
        return buckets;
    }

    for sample in samples {
        if sample.timestamp < from || sample.timestamp >= to {
            continue;
        }
        let elapsed = (sample.timestamp - from).num_milliseconds();
        let width_ms = bucket_width.num_milliseconds().max(1);
        let index = ((elapsed / width_ms) as usize).min(buckets.len() - 1);
        let bucket = &mut buckets[index];

        match sample.quality {
            hydroscada_domain_models::Quality::Good => bucket.quality_histogram.good += 1,
            hydroscada_domain_models::Quality::Uncertain => bucket.quality_histogram.uncertain += 1,
            hydroscada_domain_models::Quality::Bad => bucket.quality_histogram.bad += 1,
            hydroscada_domain_models::Quality::NotConnected => bucket.quality_histogram.not_connected += 1,
        }
        if !sample.quality.is_usable() {
            continue;
        }
        bucket.value = Some(match (aggregate, bucket.value) {
            (AggregateFn::First, Some(existing)) => existing,
            (AggregateFn::Last, _) => sample.value,
            (AggregateFn::Min, Some(existing)) => existing.min(sample.value),
            (AggregateFn::Max, Some(existing)) => existing.max(sample.value),
            (AggregateFn::Avg, Some(existing)) => {
                let n = (bucket.quality_histogram.good + bucket.quality_histogram.uncertain) as f64;
                existing + (sample.value - existing) / n.max(1.0)
            }
            (_, None) => sample.value,
        });
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydroscada_domain_models::Quality;

    fn sample(secs: i64, value: f64, quality: Quality) -> HistorianSample {
        HistorianSample { timestamp: Utc::now() + Duration::seconds(secs), value, quality }
    }

    #[test]
    fn empty_bucket_yields_gap_not_interpolation() {
        let from = Utc::now();
        let to = from + Duration::seconds(20);
        let samples = vec![sample(1, 10.0, Quality::Good)];
        let buckets = aggregate(&samples, from, to, Duration::seconds(10), AggregateFn::Avg);
        assert_eq!(buckets.len(), 2);
        assert!(buckets[0].value.is_some());
        assert!(buckets[1].value.is_none());
    }

    #[test]
    fn bad_quality_excluded_from_aggregation_but_counted() {
        let from = Utc::now();
        let to = from + Duration::seconds(10);
        let samples = vec![sample(1, 10.0, Quality::Bad)];
        let buckets = aggregate(&samples, from, to, Duration::seconds(10), AggregateFn::Avg);
        assert!(buckets[0].value.is_none());
        assert_eq!(buckets[0].quality_histogram.bad, 1);
    }

    #[test]
    fn max_picks_largest_usable_value_in_bucket() {
        let from = Utc::now();
        let to = from + Duration::seconds(10);
        let samples = vec![sample(1, 5.0, Quality::Good), sample(2, 9.0, Quality::Good), sample(3, 3.0, Quality::Good)];
        let buckets = aggregate(&samples, from, to, Duration::seconds(10), AggregateFn::Max);
        assert_eq!(buckets[0].value, Some(9.0));
    }
}
