//! Scripted agents and fixture payloads for tests.
//!
//! `fixture_output` builds a complete, fresh payload for any `AgentKind`
//! that passes every validation rule when its confidence is at most 95.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use augur_models::agent_kind::AgentKind;
use augur_models::agent_output::RawAgentOutput;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::agent::{AgentRequest, SignalAgent};
use crate::error::AgentError;

/// A bullish payload for `kind` with every required field present and two
/// sources from the kind's reliable list.
pub fn fixture_output(kind: AgentKind, confidence: f64) -> RawAgentOutput {
    let timeframes = serde_json::json!({
        "1day": {"direction": "UP", "confidence": confidence},
        "1week": {"direction": "UP", "confidence": confidence},
        "1month": {"direction": "UP", "confidence": confidence},
    });

    let data = match kind {
        AgentKind::MarketData => serde_json::json!({
            "price": 187.5,
            "volume": 52_000_000,
            "change_percent": 1.2,
            "timeframes": timeframes,
        }),
        AgentKind::TechnicalAnalysis => serde_json::json!({
            "indicators": {"rsi": 58.0, "macd": 0.8, "sma_50": 181.2},
            "trend": "bullish",
            "trend_strength": 65,
            "timeframes": timeframes,
        }),
        AgentKind::NewsSentiment => serde_json::json!({
            "articles": [{"title": "Earnings beat", "source": "reuters.com"}],
            "sentiment": {"score": 0.4, "label": "bullish"},
            "summary": "Coverage skews positive after earnings",
            "timeframes": timeframes,
        }),
        AgentKind::SocialSentiment => serde_json::json!({
            "sentiment": 0.3,
            "mentions": 1840,
            "platforms": ["reddit", "stocktwits"],
            "timeframes": timeframes,
        }),
        AgentKind::OnchainAnalytics => serde_json::json!({
            "metrics": {"active_addresses": 912_000, "exchange_netflow": -1250.0},
            "network_activity": "rising",
            "timeframes": timeframes,
        }),
        AgentKind::MacroEconomic => serde_json::json!({
            "indicators": {"cpi_yoy": 2.9, "fed_funds": 4.25},
            "outlook": "neutral_to_positive",
            "timeframes": timeframes,
        }),
        AgentKind::FundamentalAnalysis => serde_json::json!({
            "valuation": {"pe": 28.4, "fair_value": 195.0},
            "financials": {"revenue_growth": 0.08, "margin": 0.26},
            "timeframes": timeframes,
        }),
        AgentKind::PredictionSynthesis => serde_json::json!({
            "direction": "UP",
            "timeframes": timeframes,
            "confidence": confidence,
        }),
    };

    let sources = kind
        .default_profile()
        .reliable_source_domains
        .into_iter()
        .take(2)
        .collect();

    RawAgentOutput {
        agent: kind.as_str().to_string(),
        symbol: "AAPL".to_string(),
        timestamp: Utc::now(),
        data,
        confidence,
        sources,
        processing_time_ms: 12,
    }
}

/// What a [`MockAgent`] does when called.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Respond(RawAgentOutput),
    Fail(String),
    Delayed(Duration, RawAgentOutput),
}

/// An agent that replays a scripted response and remembers what it was asked.
pub struct MockAgent {
    name: String,
    behavior: MockBehavior,
    calls: AtomicUsize,
    last_request: Mutex<Option<AgentRequest>>,
}

impl MockAgent {
    pub fn new(name: &str, behavior: MockBehavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn responding(output: RawAgentOutput) -> Self {
        Self::new(&output.agent.clone(), MockBehavior::Respond(output))
    }

    pub fn for_kind(kind: AgentKind, confidence: f64) -> Self {
        Self::responding(fixture_output(kind, confidence))
    }

    pub fn failing(name: &str) -> Self {
        Self::new(name, MockBehavior::Fail(format!("Mock {name} failure")))
    }

    pub fn delayed(output: RawAgentOutput, delay: Duration) -> Self {
        Self::new(&output.agent.clone(), MockBehavior::Delayed(delay, output))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn last_request(&self) -> Option<AgentRequest> {
        self.last_request.lock().await.clone()
    }
}

#[async_trait]
impl SignalAgent for MockAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, request: &AgentRequest) -> Result<RawAgentOutput, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().await = Some(request.clone());

        let output = match &self.behavior {
            MockBehavior::Respond(output) => output.clone(),
            MockBehavior::Fail(message) => return Err(AgentError::agent(&self.name, message.clone())),
            MockBehavior::Delayed(delay, output) => {
                tokio::time::sleep(*delay).await;
                output.clone()
            }
        };

        Ok(RawAgentOutput {
            symbol: request.symbol.clone(),
            timestamp: Utc::now(),
            ..output
        })
    }
}

/// One mock per Phase-1 kind, in positional order, all at `confidence`.
pub fn phase_one_mocks(confidence: f64) -> Vec<Arc<MockAgent>> {
    AgentKind::PHASE_ONE
        .iter()
        .map(|kind| Arc::new(MockAgent::for_kind(*kind, confidence)))
        .collect()
}
