//! Cross-source reconciliation of one fact read from several providers.
//!
//! Price and volume are compared as `Decimal` so that deviation checks and
//! the majority-consensus grouping are exact and hashable.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Mutex;

use augur_models::config::VerificationConfig;
use augur_models::reading::DataSourceReading;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationResult {
    pub symbol: String,
    pub verified: bool,
    /// 0 to 100.
    pub confidence: f64,
    pub conflicts: Vec<String>,
    pub consensus: serde_json::Value,
    /// 0 to 100 trust score for the reconciled value.
    pub verification_score: f64,
    pub sources: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Read a numeric field that upstreams may send as a JSON number or string.
pub fn decimal_field(payload: &serde_json::Value, field: &str) -> Option<Decimal> {
    match payload.get(field)? {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn decimal_to_json(value: Decimal) -> Option<serde_json::Value> {
    value
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
}

/// Largest percent deviation from the mean among sources that report `field`.
struct Deviation {
    /// Exact mean, absent when it does not fit in a `Decimal`.
    mean: Option<Decimal>,
    max_pct: f64,
    outliers: Vec<String>,
}

impl Deviation {
    fn from_percents(
        mean: Option<Decimal>,
        values: &[(&str, Decimal)],
        percents: impl Iterator<Item = f64>,
        threshold_pct: f64,
    ) -> Self {
        let mut max_pct = 0.0_f64;
        let mut outliers = Vec::new();
        for ((name, _), pct) in values.iter().zip(percents) {
            if pct > threshold_pct {
                outliers.push(name.to_string());
            }
            max_pct = max_pct.max(pct);
        }
        Self {
            mean,
            max_pct,
            outliers,
        }
    }
}

fn deviation(readings: &[&DataSourceReading], field: &str, threshold_pct: f64) -> Option<Deviation> {
    let values: Vec<(&str, Decimal)> = readings
        .iter()
        .filter_map(|r| decimal_field(&r.payload, field).map(|v| (r.name.as_str(), v)))
        .collect();
    if values.len() < 2 {
        return None;
    }

    let mean = match exact_mean(&values) {
        Some(mean) if mean.is_zero() => return None,
        Some(mean) => mean,
        None => return float_deviation(&values, threshold_pct),
    };

    let mut percents = Vec::with_capacity(values.len());
    for (_, value) in &values {
        match percent_off(*value, mean) {
            Some(pct) => percents.push(pct),
            None => return float_deviation(&values, threshold_pct),
        }
    }
    Some(Deviation::from_percents(
        Some(mean),
        &values,
        percents.into_iter(),
        threshold_pct,
    ))
}

fn exact_mean(values: &[(&str, Decimal)]) -> Option<Decimal> {
    values
        .iter()
        .try_fold(Decimal::ZERO, |sum, (_, v)| sum.checked_add(*v))?
        .checked_div(Decimal::from(values.len()))
}

fn percent_off(value: Decimal, mean: Decimal) -> Option<f64> {
    value
        .checked_sub(mean)?
        .abs()
        .checked_div(mean.abs())?
        .checked_mul(Decimal::ONE_HUNDRED)?
        .to_f64()
}

/// Same measure in `f64`, for magnitudes where `Decimal` overflows.
fn float_deviation(values: &[(&str, Decimal)], threshold_pct: f64) -> Option<Deviation> {
    let floats: Vec<f64> = values
        .iter()
        .map(|(_, v)| v.to_f64())
        .collect::<Option<_>>()?;
    let mean = floats.iter().sum::<f64>() / floats.len() as f64;
    if mean == 0.0 || !mean.is_finite() {
        return None;
    }
    let percents = floats.iter().map(|v| (v - mean).abs() / mean.abs() * 100.0);
    Some(Deviation::from_percents(
        Decimal::from_f64(mean),
        values,
        percents,
        threshold_pct,
    ))
}

/// Reliability-weighted average of every numeric field; non-numeric fields
/// are taken from the first reading that has them.
fn weighted_consensus(readings: &[&DataSourceReading]) -> serde_json::Value {
    let total_reliability: f64 = readings.iter().map(|r| r.reliability.max(0.0)).sum();
    let weight = |r: &DataSourceReading| -> f64 {
        if total_reliability > 0.0 {
            r.reliability.max(0.0)
        } else {
            1.0
        }
    };

    let keys: BTreeSet<&String> = readings
        .iter()
        .filter_map(|r| r.payload.as_object())
        .flat_map(|obj| obj.keys())
        .collect();

    let mut consensus = serde_json::Map::new();
    for key in keys {
        let numeric: Vec<(Decimal, f64)> = readings
            .iter()
            .filter(|r| r.payload.get(key).is_some_and(|v| v.is_number()))
            .filter_map(|r| decimal_field(&r.payload, key).map(|v| (v, weight(*r))))
            .collect();

        let weight_sum: f64 = numeric.iter().map(|(_, w)| w).sum();
        let averaged = if numeric.is_empty() || weight_sum <= 0.0 {
            None
        } else {
            exact_weighted_average(&numeric)
                .and_then(decimal_to_json)
                .or_else(|| float_weighted_average(&numeric, weight_sum))
        };
        let value = averaged.or_else(|| readings.iter().find_map(|r| r.payload.get(key)).cloned());
        if let Some(value) = value {
            consensus.insert(key.clone(), value);
        }
    }
    serde_json::Value::Object(consensus)
}

/// `None` when any product or sum leaves the `Decimal` range.
fn exact_weighted_average(values: &[(Decimal, f64)]) -> Option<Decimal> {
    let mut weighted = Decimal::ZERO;
    let mut total = Decimal::ZERO;
    for (value, weight) in values {
        let weight = Decimal::from_f64(*weight)?;
        weighted = weighted.checked_add(value.checked_mul(weight)?)?;
        total = total.checked_add(weight)?;
    }
    weighted.checked_div(total)
}

fn float_weighted_average(values: &[(Decimal, f64)], weight_sum: f64) -> Option<serde_json::Value> {
    let mut weighted = 0.0;
    for (value, weight) in values {
        weighted += value.to_f64()? * weight;
    }
    serde_json::Number::from_f64(weighted / weight_sum).map(serde_json::Value::Number)
}

fn bucket(value: Option<Decimal>, mean: Option<Decimal>, width_pct: f64) -> Option<Decimal> {
    let (value, mean) = (value?, mean?);
    let width = mean
        .abs()
        .checked_div(Decimal::ONE_HUNDRED)
        .zip(Decimal::from_f64(width_pct))
        .and_then(|(unit, pct)| unit.checked_mul(pct));
    match width {
        Some(width) if !width.is_zero() => {
            Some(value.checked_div(width).map_or(value, |q| q.round()))
        }
        _ => Some(value),
    }
}

fn highest_reliability<'a>(readings: &[&'a DataSourceReading]) -> &'a DataSourceReading {
    let mut best = readings[0];
    for reading in &readings[1..] {
        if reading.reliability > best.reliability {
            best = *reading;
        }
    }
    best
}

/// Reconciles a primary reading against secondaries and keeps a
/// per-symbol history of the outcomes.
pub struct CrossSourceVerifier {
    config: VerificationConfig,
    history: Mutex<HashMap<String, Vec<VerificationResult>>>,
}

impl CrossSourceVerifier {
    pub fn new(config: VerificationConfig) -> Self {
        Self {
            config,
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn verify(
        &self,
        symbol: &str,
        primary: &DataSourceReading,
        secondaries: &[DataSourceReading],
    ) -> VerificationResult {
        let readings: Vec<&DataSourceReading> =
            std::iter::once(primary).chain(secondaries.iter()).collect();
        let sources: Vec<String> = readings.iter().map(|r| r.name.clone()).collect();

        let result = if readings.len() < 2 {
            VerificationResult {
                symbol: symbol.to_string(),
                verified: true,
                confidence: 100.0,
                conflicts: vec![],
                consensus: primary.payload.clone(),
                verification_score: primary.reliability.clamp(0.0, 100.0),
                sources,
                timestamp: Utc::now(),
            }
        } else {
            self.reconcile(symbol, &readings, sources)
        };

        if !result.conflicts.is_empty() {
            warn!(symbol, conflicts = ?result.conflicts, "Source conflicts detected");
        }
        debug!(
            symbol,
            verified = result.verified,
            score = result.verification_score,
            "Verification complete"
        );

        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history
            .entry(symbol.to_string())
            .or_default()
            .push(result.clone());
        result
    }

    fn reconcile(
        &self,
        symbol: &str,
        readings: &[&DataSourceReading],
        sources: Vec<String>,
    ) -> VerificationResult {
        let cfg = &self.config;
        let price = deviation(readings, "price", cfg.price_deviation_pct);
        let volume = deviation(readings, "volume", cfg.volume_deviation_pct);

        let mut conflicts = Vec::new();
        if let Some(d) = price.as_ref().filter(|d| !d.outliers.is_empty()) {
            conflicts.push(format!(
                "Price deviation of {:.2}% exceeds {}% ({})",
                d.max_pct,
                cfg.price_deviation_pct,
                d.outliers.join(", ")
            ));
        }
        if let Some(d) = volume.as_ref().filter(|d| !d.outliers.is_empty()) {
            conflicts.push(format!(
                "Volume deviation of {:.2}% exceeds {}% ({})",
                d.max_pct,
                cfg.volume_deviation_pct,
                d.outliers.join(", ")
            ));
        }

        let n = readings.len();
        let avg_reliability = readings.iter().map(|r| r.reliability).sum::<f64>() / n as f64;
        let conflict_count = conflicts.len() as f64;

        let score_bonus = if n > 2 { cfg.multi_source_bonus } else { 0.0 };
        let verification_score = (avg_reliability - cfg.conflict_penalty_score * conflict_count
            + score_bonus)
            .clamp(0.0, 100.0);

        let confidence_bonus = if n > 1 { cfg.multi_source_bonus } else { 0.0 };
        let confidence = (avg_reliability - cfg.conflict_penalty_confidence * conflict_count
            + confidence_bonus)
            .clamp(0.0, 100.0);

        let consensus = if conflicts.is_empty() {
            weighted_consensus(readings)
        } else {
            self.majority_consensus(
                symbol,
                readings,
                price.as_ref().and_then(|d| d.mean),
                volume.as_ref().and_then(|d| d.mean),
            )
        };

        VerificationResult {
            symbol: symbol.to_string(),
            verified: conflicts.is_empty() && confidence >= cfg.min_verified_confidence,
            confidence,
            conflicts,
            consensus,
            verification_score,
            sources,
            timestamp: Utc::now(),
        }
    }

    /// Group sources on quantized (price, volume). A group holding at least
    /// half the sources wins; otherwise the most reliable source is trusted.
    fn majority_consensus(
        &self,
        symbol: &str,
        readings: &[&DataSourceReading],
        mean_price: Option<Decimal>,
        mean_volume: Option<Decimal>,
    ) -> serde_json::Value {
        // First-seen order keeps tie-breaking deterministic (primary wins).
        let mut groups: Vec<((Option<Decimal>, Option<Decimal>), Vec<&DataSourceReading>)> =
            Vec::new();
        for reading in readings {
            let key = (
                bucket(
                    decimal_field(&reading.payload, "price"),
                    mean_price,
                    self.config.price_bucket_pct,
                ),
                bucket(
                    decimal_field(&reading.payload, "volume"),
                    mean_volume,
                    self.config.volume_bucket_pct,
                ),
            );
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(reading),
                None => groups.push((key, vec![reading])),
            }
        }

        let required = readings.len().div_ceil(2);
        let group_reliability =
            |group: &[&DataSourceReading]| group.iter().map(|r| r.reliability).sum::<f64>();
        let mut majority: Option<Vec<&DataSourceReading>> = None;
        for (_, group) in groups {
            if group.len() < required {
                continue;
            }
            let better = match &majority {
                None => true,
                Some(current) => {
                    group.len() > current.len()
                        || (group.len() == current.len()
                            && group_reliability(&group) > group_reliability(current))
                }
            };
            if better {
                majority = Some(group);
            }
        }

        match majority {
            Some(group) => {
                debug!(symbol, members = group.len(), "Majority consensus reached");
                weighted_consensus(&group)
            }
            None => {
                let best = highest_reliability(readings);
                debug!(symbol, source = %best.name, "No majority, using most reliable source");
                best.payload.clone()
            }
        }
    }

    /// All results recorded for a symbol, oldest first.
    pub fn history(&self, symbol: &str) -> Vec<VerificationResult> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.get(symbol).cloned().unwrap_or_default()
    }

    pub fn latest(&self, symbol: &str) -> Option<VerificationResult> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.get(symbol).and_then(|r| r.last()).cloned()
    }

    /// Fraction (0.0 to 1.0) of the most recent results that verified.
    /// `None` until the symbol has been verified at least once.
    pub fn consistency_score(&self, symbol: &str) -> Option<f64> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let results = history.get(symbol).filter(|r| !r.is_empty())?;
        let window = self.config.history_window.max(1);
        let recent = &results[results.len().saturating_sub(window)..];
        let verified = recent.iter().filter(|r| r.verified).count();
        Some(verified as f64 / recent.len() as f64)
    }
}
