pub mod heuristic;
mod prompt;
mod ranking;

pub use ranking::{error_total, rank_errors};

use log::{debug, info, warn};
use serde::Deserialize;
use std::fmt;

use crate::ai::{extract_json, AiClient, ChatMessage};
use crate::config::AnalysisConfig;
use crate::error::{PipeSightError, Result};
use crate::models::{Analysis, ErrorCount, PipelinePlan, PipelineRun};

const TEMPERATURE: f32 = 0.0;

/// Fields the model is asked to produce. Error frequencies are never taken
/// from the model.
#[derive(Debug, Deserialize)]
struct ModelReply {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// One way of obtaining a completion, tried in order until one yields a
/// usable reply.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CompletionStrategy {
    Assistant { assistant_id: String },
    Direct,
}

impl fmt::Display for CompletionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assistant { assistant_id } => write!(f, "assistant {assistant_id}"),
            Self::Direct => write!(f, "direct completion"),
        }
    }
}

pub struct Analyzer {
    client: AiClient,
    max_attempts: u32,
    top_errors: usize,
    max_recommendations: usize,
}

impl Analyzer {
    pub fn new(client: AiClient, config: &AnalysisConfig) -> Self {
        Self {
            client,
            max_attempts: config.max_attempts.max(1),
            top_errors: config.top_errors,
            max_recommendations: config.max_recommendations,
        }
    }

    /// Maximum number of ranked errors attached to each analysis.
    pub fn top_errors(&self) -> usize {
        self.top_errors
    }

    fn strategies(&self) -> Vec<(CompletionStrategy, u32)> {
        let mut chain = Vec::with_capacity(2);
        if let Some(assistant_id) = self.client.assistant_id() {
            chain.push((
                CompletionStrategy::Assistant {
                    assistant_id: assistant_id.to_string(),
                },
                1,
            ));
        }
        chain.push((CompletionStrategy::Direct, self.max_attempts));
        chain
    }

    /// Analyzes one pipeline's runs in light of the operator's question.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisFailed` once every completion strategy is exhausted
    /// without a reply that parses into a non-empty summary.
    pub async fn analyze(
        &self,
        question: &str,
        plan: &PipelinePlan,
        runs: &[PipelineRun],
    ) -> Result<Analysis> {
        let top_errors = rank_errors(runs, self.top_errors);
        let user_prompt = prompt::user_prompt(question, plan, runs, &top_errors)?;

        let mut last_error: Option<PipeSightError> = None;
        for (strategy, attempts) in self.strategies() {
            for attempt in 1..=attempts {
                debug!("Analyzing {} via {strategy} (attempt {attempt}/{attempts})", plan.key);
                match self.complete(&strategy, &user_prompt).await {
                    Ok(reply) => {
                        info!("Analysis of {} completed via {strategy}", plan.key);
                        return Ok(self.build_analysis(plan, reply, top_errors));
                    }
                    Err(e) => {
                        warn!(
                            "{strategy} attempt {attempt}/{attempts} for {} failed: {e}",
                            plan.key
                        );
                        last_error = Some(e);
                    }
                }
            }
        }

        Err(PipeSightError::AnalysisFailed {
            pipeline_key: plan.key.clone(),
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no completion strategy available".to_string()),
        })
    }

    async fn complete(
        &self,
        strategy: &CompletionStrategy,
        user_prompt: &str,
    ) -> Result<ModelReply> {
        let text = match strategy {
            CompletionStrategy::Assistant { assistant_id } => {
                self.client
                    .run_assistant(
                        assistant_id,
                        &prompt::assistant_prompt(user_prompt),
                        Some(prompt::SYSTEM_PROMPT),
                    )
                    .await?
            }
            CompletionStrategy::Direct => {
                let messages = [
                    ChatMessage::system(prompt::json_system_prompt()),
                    ChatMessage::user(user_prompt),
                ];
                self.client.chat_completion(&messages, TEMPERATURE).await?
            }
        };

        let reply: ModelReply = extract_json(&text)?;
        if reply.summary.trim().is_empty() {
            return Err(PipeSightError::ResponseParse(
                "reply has no summary".to_string(),
            ));
        }
        Ok(reply)
    }

    fn build_analysis(
        &self,
        plan: &PipelinePlan,
        reply: ModelReply,
        top_errors: Vec<ErrorCount>,
    ) -> Analysis {
        let recommendations = reply
            .recommendations
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .take(self.max_recommendations)
            .collect();

        Analysis {
            pipeline_key: plan.key.clone(),
            summary: reply.summary.trim().to_string(),
            top_errors,
            recommendations,
            degraded: None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ai::testing::{completion_body, test_config, COMPLETIONS_PATH};
    use crate::models::RunStatus;
    use mockito::Matcher;
    use serde_json::json;

    pub(crate) fn plan(key: &str, name: &str) -> PipelinePlan {
        PipelinePlan {
            key: key.to_string(),
            name: name.to_string(),
            enabled: true,
            is_building: false,
            average_build_time_in_seconds: 420,
            link: format!("https://bamboo.example.com/rest/api/latest/plan/{key}"),
            short_name: None,
            project_key: Some("PROJ".to_string()),
            project_name: None,
            description: None,
        }
    }

    pub(crate) fn reply_json(summary: &str, recommendations: &[&str]) -> String {
        json!({"summary": summary, "recommendations": recommendations}).to_string()
    }

    fn analyzer(endpoint: &str) -> Analyzer {
        let client = AiClient::new(&test_config(endpoint)).unwrap();
        Analyzer::new(client, &AnalysisConfig::default())
    }

    fn timeout_runs() -> Vec<PipelineRun> {
        vec![
            PipelineRun::new("r1", RunStatus::Failed, 120).with_error("test", "timeout"),
            PipelineRun::new("r2", RunStatus::Failed, 130).with_error("test", "timeout"),
        ]
    }

    #[tokio::test]
    async fn test_top_errors_are_computed_locally() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "summary": "Timeouts dominate.",
            "top_errors": [{"message": "invented", "count": 99}],
            "recommendations": ["Raise the test timeout"]
        });
        server
            .mock("POST", COMPLETIONS_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(completion_body(&body.to_string()))
            .create_async()
            .await;

        let analysis = analyzer(&server.url())
            .analyze("Why does it fail?", &plan("PROJ-PLAN1", "Build"), &timeout_runs())
            .await
            .unwrap();

        assert_eq!(analysis.pipeline_key, "PROJ-PLAN1");
        assert_eq!(analysis.summary, "Timeouts dominate.");
        assert_eq!(
            analysis.top_errors,
            vec![ErrorCount {
                message: "timeout".to_string(),
                count: 2
            }]
        );
        assert_eq!(analysis.recommendations, vec!["Raise the test timeout"]);
        assert!(analysis.degraded.is_none());
    }

    #[tokio::test]
    async fn test_prompt_carries_question() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", COMPLETIONS_PATH)
            .match_query(Matcher::Any)
            .match_body(Matcher::Regex("Question from the team: Is PLAN1 flaky\\?".to_string()))
            .with_status(200)
            .with_body(completion_body(&reply_json("Stable.", &[])))
            .create_async()
            .await;

        analyzer(&server.url())
            .analyze("Is PLAN1 flaky?", &plan("PROJ-PLAN1", "Build"), &[])
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fenced_reply_is_accepted() {
        let mut server = mockito::Server::new_async().await;
        let fenced = format!("```json\n{}\n```", reply_json("Fenced summary.", &["a"]));
        server
            .mock("POST", COMPLETIONS_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(completion_body(&fenced))
            .create_async()
            .await;

        let analysis = analyzer(&server.url())
            .analyze("q", &plan("K-1", "n"), &[])
            .await
            .unwrap();

        assert_eq!(analysis.summary, "Fenced summary.");
    }

    #[tokio::test]
    async fn test_malformed_reply_exhausts_attempts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", COMPLETIONS_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(completion_body("Sorry, I can only answer in prose."))
            .expect(3)
            .create_async()
            .await;

        let err = analyzer(&server.url())
            .analyze("q", &plan("PROJ-PLAN2", "Tests"), &timeout_runs())
            .await
            .unwrap_err();

        match err {
            PipeSightError::AnalysisFailed { pipeline_key, reason } => {
                assert_eq!(pipeline_key, "PROJ-PLAN2");
                assert!(reason.contains("Failed to parse"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_summary_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let empty = server
            .mock("POST", COMPLETIONS_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(completion_body(&reply_json("   ", &["ignored"])))
            .expect(1)
            .create_async()
            .await;
        let good = server
            .mock("POST", COMPLETIONS_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(completion_body(&reply_json("Second try.", &[])))
            .expect(1)
            .create_async()
            .await;

        let analysis = analyzer(&server.url())
            .analyze("q", &plan("K-1", "n"), &[])
            .await
            .unwrap();

        assert_eq!(analysis.summary, "Second try.");
        empty.assert_async().await;
        good.assert_async().await;
    }

    #[tokio::test]
    async fn test_recommendations_trimmed_and_capped() {
        let mut server = mockito::Server::new_async().await;
        let recs = [" one ", "", "two", "three", "  ", "four", "five", "six"];
        server
            .mock("POST", COMPLETIONS_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(completion_body(&reply_json("s", &recs)))
            .create_async()
            .await;

        let analysis = analyzer(&server.url())
            .analyze("q", &plan("K-1", "n"), &[])
            .await
            .unwrap();

        assert_eq!(
            analysis.recommendations,
            vec!["one", "two", "three", "four", "five"]
        );
    }

    #[tokio::test]
    async fn test_assistant_is_preferred_when_configured() {
        let mut server = mockito::Server::new_async().await;
        let mut mocks = Vec::new();
        for (method, path, body) in [
            ("POST", "/openai/threads", json!({"id": "t1"})),
            ("POST", "/openai/threads/t1/messages", json!({"id": "m1"})),
            ("POST", "/openai/threads/t1/runs", json!({"id": "r1"})),
            ("GET", "/openai/threads/t1/runs/r1", json!({"status": "completed"})),
            (
                "GET",
                "/openai/threads/t1/messages",
                json!({"data": [{"role": "assistant", "content": [
                    {"type": "text", "text": {"value": reply_json("From the assistant.", &["x"])}}
                ]}]}),
            ),
        ] {
            mocks.push(
                server
                    .mock(method, path)
                    .match_query(Matcher::Any)
                    .with_status(200)
                    .with_body(body.to_string())
                    .create_async()
                    .await,
            );
        }
        let direct = server
            .mock("POST", COMPLETIONS_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let mut config = test_config(&server.url());
        config.assistant_id = Some("asst_1".to_string());
        let analyzer = Analyzer::new(AiClient::new(&config).unwrap(), &AnalysisConfig::default());

        let analysis = analyzer.analyze("q", &plan("K-1", "n"), &[]).await.unwrap();

        assert_eq!(analysis.summary, "From the assistant.");
        direct.assert_async().await;
    }

    #[tokio::test]
    async fn test_assistant_failure_falls_back_to_direct() {
        let mut server = mockito::Server::new_async().await;
        let threads = server
            .mock("POST", "/openai/threads")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("assistant not found")
            .expect(1)
            .create_async()
            .await;
        let direct = server
            .mock("POST", COMPLETIONS_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(completion_body(&reply_json("From direct.", &[])))
            .expect(1)
            .create_async()
            .await;

        let mut config = test_config(&server.url());
        config.assistant_id = Some("asst_missing".to_string());
        let analyzer = Analyzer::new(AiClient::new(&config).unwrap(), &AnalysisConfig::default());

        let analysis = analyzer.analyze("q", &plan("K-1", "n"), &[]).await.unwrap();

        assert_eq!(analysis.summary, "From direct.");
        threads.assert_async().await;
        direct.assert_async().await;
    }

    #[test]
    fn test_strategy_chain() {
        let mut config = test_config("https://ai.example.com");
        let plain = Analyzer::new(AiClient::new(&config).unwrap(), &AnalysisConfig::default());
        assert_eq!(plain.strategies(), vec![(CompletionStrategy::Direct, 3)]);

        config.assistant_id = Some("asst_1".to_string());
        let with_assistant =
            Analyzer::new(AiClient::new(&config).unwrap(), &AnalysisConfig::default());
        let chain = with_assistant.strategies();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].1, 1);
        assert_eq!(chain[0].0.to_string(), "assistant asst_1");
    }
}
