//! The built-in rule set, in evaluation order.

use augur_models::agent_output::RawAgentOutput;
use augur_models::agent_kind::AgentProfile;
use augur_models::config::ValidationConfig;
use chrono::{DateTime, Utc};

use crate::error::AgentError;

pub const DATA_COMPLETENESS: &str = "Data Completeness";
pub const CONFIDENCE_INTEGRITY: &str = "Confidence Integrity";
pub const DATA_FRESHNESS: &str = "Data Freshness";
pub const SOURCE_RELIABILITY: &str = "Source Reliability";
pub const DATA_CONSISTENCY: &str = "Data Consistency";
pub const ANOMALY_DETECTION: &str = "Anomaly Detection";

/// Everything a rule may look at.
pub struct RuleContext<'a> {
    pub output: &'a RawAgentOutput,
    pub profile: &'a AgentProfile,
    pub config: &'a ValidationConfig,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub passed: bool,
    pub score: f64,
    pub details: String,
}

impl RuleOutcome {
    pub fn new(passed: bool, score: f64, details: impl Into<String>) -> Self {
        Self {
            passed,
            score: score.clamp(0.0, 100.0).round(),
            details: details.into(),
        }
    }
}

/// A named check over one agent output.
///
/// Returning `Err` does not abort validation; the engine records it as a
/// failed check with score 0 and this rule's criticality.
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &str;
    fn critical(&self) -> bool;
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, AgentError>;
}

pub fn default_rules() -> Vec<Box<dyn ValidationRule>> {
    vec![
        Box::new(DataCompleteness),
        Box::new(ConfidenceIntegrity),
        Box::new(DataFreshness),
        Box::new(SourceReliability),
        Box::new(DataConsistency),
        Box::new(AnomalyDetection),
    ]
}

fn number_field(data: &serde_json::Value, field: &str) -> Option<f64> {
    match data.get(field)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Sentiment on a -1..1 scale. Accepts a bare number, an object with a
/// `score`, or a label.
pub(crate) fn sentiment_value(data: &serde_json::Value) -> Option<f64> {
    let sentiment = data.get("sentiment")?;
    match sentiment {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::Object(_) => number_field(sentiment, "score"),
        serde_json::Value::String(label) => match label.to_ascii_lowercase().as_str() {
            "bullish" | "positive" => Some(0.5),
            "bearish" | "negative" => Some(-0.5),
            "neutral" => Some(0.0),
            _ => None,
        },
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Bullish,
    Bearish,
}

fn trend(data: &serde_json::Value) -> Option<Trend> {
    let label = data.get("trend")?.as_str()?.to_ascii_lowercase();
    match label.as_str() {
        "bullish" | "up" | "uptrend" => Some(Trend::Bullish),
        "bearish" | "down" | "downtrend" => Some(Trend::Bearish),
        _ => None,
    }
}

pub struct DataCompleteness;

impl ValidationRule for DataCompleteness {
    fn name(&self) -> &str {
        DATA_COMPLETENESS
    }

    fn critical(&self) -> bool {
        true
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, AgentError> {
        let data = ctx
            .output
            .data
            .as_object()
            .ok_or_else(|| AgentError::rule(DATA_COMPLETENESS, "payload is not a JSON object"))?;

        let required = &ctx.profile.required_fields;
        if required.is_empty() {
            return Ok(RuleOutcome::new(true, 100.0, "no required fields"));
        }

        let missing: Vec<&str> = required
            .iter()
            .filter(|f| data.get(f.as_str()).map_or(true, |v| v.is_null()))
            .map(|f| f.as_str())
            .collect();
        let present = required.len() - missing.len();
        let score = 100.0 * present as f64 / required.len() as f64;

        if missing.is_empty() {
            Ok(RuleOutcome::new(
                true,
                score,
                format!("all {} required fields present", required.len()),
            ))
        } else {
            Ok(RuleOutcome::new(
                false,
                score,
                format!("missing fields: {}", missing.join(", ")),
            ))
        }
    }
}

pub struct ConfidenceIntegrity;

impl ValidationRule for ConfidenceIntegrity {
    fn name(&self) -> &str {
        CONFIDENCE_INTEGRITY
    }

    fn critical(&self) -> bool {
        true
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, AgentError> {
        let cfg = ctx.config;
        let confidence = ctx.output.confidence;
        let sources = ctx.output.sources.len();

        if !(0.0..=100.0).contains(&confidence) {
            return Ok(RuleOutcome::new(
                false,
                0.0,
                format!("confidence {confidence} outside 0-100"),
            ));
        }
        if confidence > cfg.integrity_high_confidence && sources == 0 {
            return Ok(RuleOutcome::new(
                false,
                0.0,
                format!("confidence {confidence} claimed without any cited source"),
            ));
        }
        if confidence < cfg.integrity_low_confidence && sources > cfg.integrity_many_sources {
            return Ok(RuleOutcome::new(
                true,
                cfg.integrity_conflict_score,
                format!("low confidence {confidence} despite {sources} sources, data may conflict"),
            ));
        }
        Ok(RuleOutcome::new(true, 100.0, "confidence consistent with sources"))
    }
}

pub struct DataFreshness;

impl ValidationRule for DataFreshness {
    fn name(&self) -> &str {
        DATA_FRESHNESS
    }

    fn critical(&self) -> bool {
        false
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, AgentError> {
        let max_age = ctx.profile.max_data_age_ms;
        if max_age == 0 {
            return Err(AgentError::rule(DATA_FRESHNESS, "max data age is zero"));
        }
        let age = (ctx.now - ctx.output.timestamp).num_milliseconds().max(0) as u64;
        let score = (100.0 - 100.0 * age as f64 / max_age as f64).max(0.0);
        let passed = age <= max_age;
        Ok(RuleOutcome::new(
            passed,
            score,
            format!("data age {}s, limit {}s", age / 1_000, max_age / 1_000),
        ))
    }
}

pub struct SourceReliability;

impl ValidationRule for SourceReliability {
    fn name(&self) -> &str {
        SOURCE_RELIABILITY
    }

    fn critical(&self) -> bool {
        false
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, AgentError> {
        let sources = &ctx.output.sources;
        if sources.is_empty() {
            return Ok(RuleOutcome::new(false, 0.0, "no sources cited"));
        }

        let domains = &ctx.profile.reliable_source_domains;
        let reliable = sources
            .iter()
            .filter(|source| {
                let host = source_host(source);
                domains.iter().any(|d| host_matches(&host, d))
            })
            .count();
        let ratio = reliable as f64 / sources.len() as f64;
        Ok(RuleOutcome::new(
            ratio >= ctx.config.reliable_source_ratio,
            100.0 * ratio,
            format!("{reliable} of {} sources on the reliable list", sources.len()),
        ))
    }
}

/// Host part of a cited source, which may be a bare domain or a URL.
fn source_host(source: &str) -> String {
    let rest = source
        .trim()
        .split_once("://")
        .map_or(source.trim(), |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = host.split(':').next().unwrap_or_default();
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Exact host or any subdomain of `domain`.
fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim().to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain
        || host
            .strip_suffix(domain.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

pub struct DataConsistency;

impl ValidationRule for DataConsistency {
    fn name(&self) -> &str {
        DATA_CONSISTENCY
    }

    fn critical(&self) -> bool {
        false
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, AgentError> {
        let data = &ctx.output.data;
        let mut flags: Vec<&str> = Vec::new();

        if ctx.output.confidence > ctx.config.integrity_high_confidence
            && ctx.output.sources.is_empty()
        {
            flags.push("high confidence with no sources");
        }

        match (trend(data), sentiment_value(data)) {
            (Some(Trend::Bullish), Some(s)) if s < -0.2 => {
                flags.push("bullish trend with bearish sentiment")
            }
            (Some(Trend::Bearish), Some(s)) if s > 0.2 => {
                flags.push("bearish trend with bullish sentiment")
            }
            _ => {}
        }

        if number_field(data, "price").is_some_and(|p| p <= 0.0) {
            flags.push("non-positive price");
        }
        if number_field(data, "volume").is_some_and(|v| v < 0.0) {
            flags.push("negative volume");
        }

        let score = 100.0 - ctx.config.consistency_penalty * flags.len() as f64;
        let details = if flags.is_empty() {
            "no inconsistencies".to_string()
        } else {
            flags.join("; ")
        };
        Ok(RuleOutcome::new(flags.is_empty(), score, details))
    }
}

pub struct AnomalyDetection;

impl ValidationRule for AnomalyDetection {
    fn name(&self) -> &str {
        ANOMALY_DETECTION
    }

    fn critical(&self) -> bool {
        false
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, AgentError> {
        let cfg = ctx.config;
        let data = &ctx.output.data;
        let mut flags: Vec<String> = Vec::new();

        if ctx.output.confidence > cfg.anomaly_confidence {
            flags.push(format!("confidence {} above {}", ctx.output.confidence, cfg.anomaly_confidence));
        }
        if let Some(strength) = number_field(data, "trend_strength").filter(|s| *s > cfg.anomaly_trend_strength) {
            flags.push(format!("trend strength {strength} above {}", cfg.anomaly_trend_strength));
        }
        if let Some(sentiment) = sentiment_value(data).filter(|s| s.abs() > cfg.anomaly_sentiment) {
            flags.push(format!("sentiment {sentiment} beyond +/-{}", cfg.anomaly_sentiment));
        }

        let score = 100.0 - cfg.anomaly_penalty * flags.len() as f64;
        let details = if flags.is_empty() {
            "no outliers".to_string()
        } else {
            flags.join("; ")
        };
        Ok(RuleOutcome::new(flags.is_empty(), score, details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use augur_models::agent_kind::AgentKind;
    use chrono::Duration;

    fn output(data: serde_json::Value, confidence: f64, sources: &[&str]) -> RawAgentOutput {
        RawAgentOutput {
            agent: "technical_analysis".to_string(),
            symbol: "AAPL".to_string(),
            timestamp: Utc::now(),
            data,
            confidence,
            sources: sources.iter().map(|s| s.to_string()).collect(),
            processing_time_ms: 10,
        }
    }

    fn run(rule: &dyn ValidationRule, output: &RawAgentOutput) -> Result<RuleOutcome, AgentError> {
        let profile = AgentKind::TechnicalAnalysis.default_profile();
        let config = ValidationConfig::default();
        let ctx = RuleContext {
            output,
            profile: &profile,
            config: &config,
            now: output.timestamp,
        };
        rule.evaluate(&ctx)
    }

    #[test]
    fn completeness_scores_fraction_present() {
        let out = output(
            serde_json::json!({"indicators": {}, "trend": null}),
            50.0,
            &[],
        );
        let outcome = run(&DataCompleteness, &out).unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.score, 33.0);
        assert!(outcome.details.contains("trend"));
        assert!(outcome.details.contains("trend_strength"));
    }

    #[test]
    fn completeness_errors_on_non_object() {
        let out = output(serde_json::json!([1, 2, 3]), 50.0, &[]);
        assert!(matches!(
            run(&DataCompleteness, &out),
            Err(AgentError::Rule { .. })
        ));
    }

    #[test]
    fn integrity_rules() {
        let unsupported = output(serde_json::json!({}), 85.0, &[]);
        let outcome = run(&ConfidenceIntegrity, &unsupported).unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.score, 0.0);

        let conflicted = output(serde_json::json!({}), 20.0, &["a", "b", "c", "d"]);
        let outcome = run(&ConfidenceIntegrity, &conflicted).unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.score, 70.0);

        let normal = output(serde_json::json!({}), 60.0, &["a"]);
        assert_eq!(run(&ConfidenceIntegrity, &normal).unwrap().score, 100.0);
    }

    #[test]
    fn freshness_decays_linearly() {
        let mut out = output(serde_json::json!({}), 50.0, &[]);
        // technical max age is 15 minutes
        out.timestamp = Utc::now() - Duration::minutes(5);
        let profile = AgentKind::TechnicalAnalysis.default_profile();
        let config = ValidationConfig::default();
        let ctx = RuleContext {
            output: &out,
            profile: &profile,
            config: &config,
            now: out.timestamp + Duration::minutes(5),
        };
        let outcome = DataFreshness.evaluate(&ctx).unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.score, 67.0);

        let ctx = RuleContext {
            now: out.timestamp + Duration::minutes(20),
            ..ctx
        };
        let outcome = DataFreshness.evaluate(&ctx).unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn source_reliability_matches_domains() {
        let out = output(
            serde_json::json!({}),
            50.0,
            &["https://www.alphavantage.co/query", "random-blog.net"],
        );
        let outcome = run(&SourceReliability, &out).unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.score, 50.0);

        let out = output(serde_json::json!({}), 50.0, &["a.net", "b.net", "polygon.io"]);
        let outcome = run(&SourceReliability, &out).unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.score, 33.0);

        let out = output(serde_json::json!({}), 50.0, &[]);
        assert!(!run(&SourceReliability, &out).unwrap().passed);
    }

    #[test]
    fn source_reliability_requires_domain_suffix() {
        let out = output(
            serde_json::json!({}),
            50.0,
            &["polygon.io.example.net", "https://notpolygon.io/v2", "evil.net/polygon.io"],
        );
        let outcome = run(&SourceReliability, &out).unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.score, 0.0);

        let out = output(
            serde_json::json!({}),
            50.0,
            &["https://api.polygon.io/v2/aggs?ticker=AAPL", "https://WWW.TradingView.com:443/chart"],
        );
        let outcome = run(&SourceReliability, &out).unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.score, 100.0);
    }

    #[test]
    fn source_host_strips_url_parts() {
        assert_eq!(source_host("https://www.Reuters.com/markets?x=1"), "www.reuters.com");
        assert_eq!(source_host("user@sec.gov:8443/filings"), "sec.gov");
        assert_eq!(source_host("polygon.io."), "polygon.io");
        assert_eq!(source_host("market_data"), "market_data");
        assert!(host_matches("api.polygon.io", "polygon.io"));
        assert!(!host_matches("apipolygon.io", "polygon.io"));
        assert!(!host_matches("polygon.io", ""));
    }

    #[test]
    fn consistency_flags_contradictions() {
        let out = output(
            serde_json::json!({"trend": "bullish", "sentiment": -0.6, "price": 0}),
            90.0,
            &[],
        );
        let outcome = run(&DataConsistency, &out).unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.score, 40.0);

        let out = output(
            serde_json::json!({"trend": "bearish", "sentiment": {"score": -0.4}}),
            60.0,
            &["polygon.io"],
        );
        assert!(run(&DataConsistency, &out).unwrap().passed);
    }

    #[test]
    fn anomaly_flags_outliers() {
        let out = output(
            serde_json::json!({"trend_strength": 95, "sentiment": 0.95}),
            97.0,
            &["polygon.io"],
        );
        let outcome = run(&AnomalyDetection, &out).unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.score, 55.0);

        let out = output(serde_json::json!({"trend_strength": 60}), 70.0, &[]);
        assert_eq!(run(&AnomalyDetection, &out).unwrap().score, 100.0);
    }

    #[test]
    fn sentiment_forms() {
        assert_eq!(sentiment_value(&serde_json::json!({"sentiment": 0.3})), Some(0.3));
        assert_eq!(
            sentiment_value(&serde_json::json!({"sentiment": {"score": "-0.7"}})),
            Some(-0.7)
        );
        assert_eq!(
            sentiment_value(&serde_json::json!({"sentiment": "Bearish"})),
            Some(-0.5)
        );
        assert_eq!(sentiment_value(&serde_json::json!({"mood": 1})), None);
    }
}
