use serde_json::json;

use crate::error::Result;
use crate::models::{ErrorCount, PipelinePlan, PipelineRun};

pub const SYSTEM_PROMPT: &str = "You are a senior CI/CD engineer with 10+ years of experience \
analyzing Bamboo pipeline logs. Your expertise includes identifying failure patterns, \
performance bottlenecks, and providing actionable recommendations for improving pipeline \
reliability and efficiency.

Analyze the provided pipeline data and provide insights that would help a development team \
optimize their CI/CD process.";

pub const RESPONSE_SCHEMA: &str = r#"{
  "summary": "string - concise 2-3 sentence overview of pipeline health and key findings",
  "recommendations": [
    "string - specific actionable recommendation for improvement"
  ]
}"#;

/// System prompt for stateless completions, which must answer in bare JSON.
pub fn json_system_prompt() -> String {
    format!(
        "{SYSTEM_PROMPT}

IMPORTANT: You must respond with valid JSON only. Do not include any explanations, \
markdown formatting, or text outside the JSON structure.

Expected response schema: {RESPONSE_SCHEMA}"
    )
}

/// User prompt carrying the operator's question and the pipeline's data.
///
/// Error frequencies are computed locally and handed to the model so that it
/// reasons about the same counts the report will show.
pub fn user_prompt(
    question: &str,
    plan: &PipelinePlan,
    runs: &[PipelineRun],
    top_errors: &[ErrorCount],
) -> Result<String> {
    let data = json!({
        "plan": plan,
        "runs": runs,
        "error_frequencies": top_errors,
    });

    Ok(format!(
        "Question from the team: {question}

Analyze the following Bamboo pipeline data for {name} ({key}):

{data}

Please provide a comprehensive analysis focusing on:
1. Overall pipeline health and performance trends
2. Error patterns and their frequency
3. Specific actionable recommendations for improvement
4. Any performance or reliability concerns

Consider the success/failure rates, error types, duration patterns, and any recurring issues.",
        name = plan.name,
        key = plan.key,
        data = serde_json::to_string_pretty(&data)?,
    ))
}

/// Assistant resources carry their own instructions, so the schema travels
/// with the user message instead.
pub fn assistant_prompt(user_prompt: &str) -> String {
    format!(
        "{user_prompt}\n\nPlease respond with valid JSON in this exact format:\n{RESPONSE_SCHEMA}"
    )
}
