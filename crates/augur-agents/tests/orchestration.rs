use std::sync::Arc;
use std::time::Duration;

use augur_agents::test_support::{fixture_output, phase_one_mocks, MockAgent};
use augur_agents::{
    AgentError, Orchestrator, SignalAgent, SynthesisAgent, SynthesisContext, SynthesisEngine,
    ValidationEngine,
};
use augur_models::agent_kind::AgentKind;
use augur_models::config::{FailurePolicy, OrchestratorConfig};
use augur_models::signal::Direction;

fn as_agents(mocks: &[Arc<MockAgent>]) -> Vec<Arc<dyn SignalAgent>> {
    mocks
        .iter()
        .map(|m| Arc::clone(m) as Arc<dyn SignalAgent>)
        .collect()
}

fn orchestrator(
    mut agents: Vec<Arc<dyn SignalAgent>>,
    synthesis: Arc<dyn SignalAgent>,
    config: OrchestratorConfig,
) -> Orchestrator {
    agents.push(synthesis);
    Orchestrator::new(
        agents,
        ValidationEngine::default(),
        SynthesisEngine::default(),
        config,
    )
    .unwrap()
}

fn unsupported(kind: AgentKind) -> Arc<MockAgent> {
    let mut output = fixture_output(kind, 85.0);
    output.sources.clear();
    Arc::new(MockAgent::responding(output))
}

#[tokio::test]
async fn clean_run_produces_unanimous_prediction() {
    let mocks = phase_one_mocks(80.0);
    let orch = orchestrator(
        as_agents(&mocks),
        Arc::new(SynthesisAgent::default()),
        OrchestratorConfig::default(),
    );
    let result = orch.run("AAPL").await.unwrap();

    assert_eq!(result.symbol, "AAPL");
    assert_eq!(result.per_agent_results.len(), 8);
    assert_eq!(result.per_agent_results[7].agent(), "prediction_synthesis");
    assert_eq!(result.predictions.direction, Direction::Up);
    assert_eq!(result.predictions.confidence, 80.0);
    assert_eq!(result.predictions.horizon_hours, 720);

    let meta = &result.metadata;
    assert_eq!(meta.overall_confidence, 80.0);
    assert_eq!(meta.validation_summary.total_checks, 48);
    assert_eq!(meta.validation_summary.overall_score, 100.0);
    assert_eq!(meta.overall_quality.overall_quality, 96.0);
    assert!(meta.low_quality_agents.is_empty());
    assert!(meta.failed_agents.is_empty());
    assert!(meta.warnings.is_empty());
    assert!(!meta.transparency_report.is_empty());
    for pair in meta.transparency_report.windows(2) {
        assert!(pair[0].contribution >= pair[1].contribution);
    }
    for mock in &mocks {
        assert_eq!(mock.calls(), 1);
    }
}

#[tokio::test]
async fn synthesis_receives_only_validated_outputs() {
    let mut mocks = phase_one_mocks(80.0);
    mocks[0] = unsupported(AgentKind::MarketData);
    let synthesis = Arc::new(MockAgent::for_kind(AgentKind::PredictionSynthesis, 70.0));
    let orch = orchestrator(
        as_agents(&mocks),
        synthesis.clone(),
        OrchestratorConfig::default(),
    );
    orch.run("AAPL").await.unwrap();

    let request = synthesis.last_request().await.unwrap();
    let context: SynthesisContext = serde_json::from_value(request.context.unwrap()).unwrap();
    assert_eq!(context.agents.len(), 7);
    let market = &context.agents[0];
    assert_eq!(market.agent(), "market_data");
    assert_eq!(market.raw_confidence, 85.0);
    assert!(market.confidence() < 85.0);
    assert!(!market.validation.passed);
}

#[tokio::test]
async fn unsupported_confidence_is_penalized_end_to_end() {
    let mut mocks = phase_one_mocks(80.0);
    mocks[0] = unsupported(AgentKind::MarketData);
    let orch = orchestrator(
        as_agents(&mocks),
        Arc::new(SynthesisAgent::default()),
        OrchestratorConfig::default(),
    );
    let result = orch.run("AAPL").await.unwrap();

    let market = &result.per_agent_results[0];
    let integrity = market.validation.check("Confidence Integrity").unwrap();
    assert!(!integrity.passed);
    assert!(integrity.critical);
    assert!(market.confidence() <= (0.5_f64 * 85.0).round());
    assert_eq!(result.metadata.low_quality_agents, vec!["market_data"]);
    assert_eq!(result.metadata.validation_summary.critical_failures, 1);
}

#[tokio::test]
async fn too_many_low_quality_agents_warns_but_completes() {
    let mut mocks = phase_one_mocks(80.0);
    for (i, kind) in AgentKind::PHASE_ONE.iter().take(4).enumerate() {
        mocks[i] = unsupported(*kind);
    }
    let orch = orchestrator(
        as_agents(&mocks),
        Arc::new(SynthesisAgent::default()),
        OrchestratorConfig::default(),
    );
    let result = orch.run("AAPL").await.unwrap();

    assert_eq!(result.metadata.low_quality_agents.len(), 4);
    assert!(result
        .metadata
        .warnings
        .iter()
        .any(|w| w.contains("agents below quality")));
}

#[tokio::test]
async fn fail_fast_aborts_the_run() {
    let mut mocks = phase_one_mocks(80.0);
    mocks[2] = Arc::new(MockAgent::failing("news_sentiment"));
    let synthesis = Arc::new(MockAgent::for_kind(AgentKind::PredictionSynthesis, 70.0));
    let orch = orchestrator(
        as_agents(&mocks),
        synthesis.clone(),
        OrchestratorConfig::default(),
    );

    let err = orch.run("AAPL").await.unwrap_err();
    match err {
        AgentError::Phase1 { agent, .. } => assert_eq!(agent, "news_sentiment"),
        other => panic!("expected Phase1 error, got {other:?}"),
    }
    assert_eq!(synthesis.calls(), 0);
}

#[tokio::test]
async fn partial_results_drop_failed_agents() {
    let mut mocks = phase_one_mocks(80.0);
    mocks[2] = Arc::new(MockAgent::failing("news_sentiment"));
    let config = OrchestratorConfig {
        failure_policy: FailurePolicy::PartialResults,
        ..OrchestratorConfig::default()
    };
    let orch = orchestrator(as_agents(&mocks), Arc::new(SynthesisAgent::default()), config);
    let result = orch.run("AAPL").await.unwrap();

    assert_eq!(result.metadata.failed_agents, vec!["news_sentiment"]);
    assert_eq!(result.per_agent_results.len(), 7);
    assert!(result
        .per_agent_results
        .iter()
        .all(|r| r.agent() != "news_sentiment"));
    assert_eq!(result.predictions.direction, Direction::Up);
    assert!(!result.metadata.warnings.is_empty());
}

#[tokio::test(start_paused = true)]
async fn enforced_timeout_counts_as_failure() {
    let mut mocks = phase_one_mocks(80.0);
    mocks[6] = Arc::new(MockAgent::delayed(
        fixture_output(AgentKind::FundamentalAnalysis, 80.0),
        Duration::from_secs(120),
    ));
    let config = OrchestratorConfig {
        failure_policy: FailurePolicy::PartialResults,
        enforce_timeouts: true,
        agent_timeout_seconds: 5,
        ..OrchestratorConfig::default()
    };
    let orch = orchestrator(as_agents(&mocks), Arc::new(SynthesisAgent::default()), config);
    let result = orch.run("AAPL").await.unwrap();

    assert_eq!(result.metadata.failed_agents, vec!["fundamental_analysis"]);
}

#[tokio::test(start_paused = true)]
async fn advisory_timeout_waits_for_slow_agents() {
    let mut mocks = phase_one_mocks(80.0);
    mocks[6] = Arc::new(MockAgent::delayed(
        fixture_output(AgentKind::FundamentalAnalysis, 80.0),
        Duration::from_secs(120),
    ));
    let orch = orchestrator(
        as_agents(&mocks),
        Arc::new(SynthesisAgent::default()),
        OrchestratorConfig::default(),
    );
    let result = orch.run("AAPL").await.unwrap();

    assert!(result.metadata.failed_agents.is_empty());
    assert_eq!(result.per_agent_results.len(), 8);
}

#[tokio::test]
async fn unreadable_synthesis_payload_is_recomputed() {
    let mocks = phase_one_mocks(80.0);
    let mut bogus = fixture_output(AgentKind::PredictionSynthesis, 70.0);
    bogus.data = serde_json::json!({"direction": "UP", "timeframes": "soon", "confidence": 70});
    let orch = orchestrator(
        as_agents(&mocks),
        Arc::new(MockAgent::responding(bogus)),
        OrchestratorConfig::default(),
    );
    let result = orch.run("AAPL").await.unwrap();

    assert_eq!(result.predictions.direction, Direction::Up);
    assert_eq!(result.predictions.confidence, 80.0);
    assert!(result
        .metadata
        .warnings
        .iter()
        .any(|w| w.contains("recomputed")));
}

#[tokio::test]
async fn failing_synthesis_agent_degrades_gracefully() {
    let mocks = phase_one_mocks(80.0);
    let orch = orchestrator(
        as_agents(&mocks),
        Arc::new(MockAgent::failing("prediction_synthesis")),
        OrchestratorConfig::default(),
    );
    let result = orch.run("AAPL").await.unwrap();

    let synthesis = &result.per_agent_results[7];
    assert_eq!(synthesis.raw_confidence, 25.0);
    assert!(!synthesis.validation.passed);
    assert_eq!(result.predictions.direction, Direction::Up);
    assert!(result.metadata.warnings.len() >= 2);
}
