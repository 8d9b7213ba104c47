use serde::Deserialize;

use crate::error::{PipeSightError, Result};
use crate::models::{PipelinePlan, PipelineRun};

/// Payload of Bamboo's `GET /plan` listing.
#[derive(Debug, Deserialize)]
pub struct BambooPlansResponse {
    pub plans: BambooPlanPage,
}

#[derive(Debug, Deserialize)]
pub struct BambooPlanPage {
    #[serde(default)]
    pub plan: Vec<BambooPlan>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BambooPlan {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub is_building: bool,
    #[serde(default)]
    pub average_build_time_in_seconds: u64,
    #[serde(default)]
    pub link: Option<BambooLink>,
    #[serde(default)]
    pub project_key: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BambooLink {
    pub href: String,
}

/// Run history for one plan, as stored in the run fixtures.
#[derive(Debug, Deserialize)]
pub struct RunLog {
    #[serde(default)]
    pub runs: Vec<PipelineRun>,
}

impl From<BambooPlan> for PipelinePlan {
    fn from(plan: BambooPlan) -> Self {
        Self {
            name: plan.name.unwrap_or_else(|| "Unknown Plan".to_string()),
            key: plan.key,
            enabled: plan.enabled,
            is_building: plan.is_building,
            average_build_time_in_seconds: plan.average_build_time_in_seconds,
            link: plan.link.map(|link| link.href).unwrap_or_default(),
            short_name: plan.short_name,
            project_key: plan.project_key,
            project_name: plan.project_name,
            description: plan.description,
        }
    }
}

/// Flattens a raw plan listing into plans sorted by key.
pub fn normalize_plans(response: BambooPlansResponse) -> Result<Vec<PipelinePlan>> {
    let plans = response
        .plans
        .plan
        .into_iter()
        .map(PipelinePlan::from)
        .collect();
    sort_unique(plans)
}

/// Sorts plans by key and rejects a listing that repeats one.
pub fn sort_unique(mut plans: Vec<PipelinePlan>) -> Result<Vec<PipelinePlan>> {
    plans.sort_by(|a, b| a.key.cmp(&b.key));
    if let Some(pair) = plans.windows(2).find(|pair| pair[0].key == pair[1].key) {
        return Err(PipeSightError::DataUnavailable(format!(
            "duplicate plan key {}",
            pair[0].key
        )));
    }
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sorts_and_fills_defaults() {
        let raw = r#"{
            "plans": {
                "plan": [
                    {"key": "B-2", "name": "Second", "enabled": true,
                     "link": {"href": "https://ci.example.com/plan/B-2", "rel": "self"}},
                    {"key": "A-1"}
                ]
            }
        }"#;
        let response: BambooPlansResponse = serde_json::from_str(raw).unwrap();
        let plans = normalize_plans(response).unwrap();

        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].key, "A-1");
        assert_eq!(plans[0].name, "Unknown Plan");
        assert!(!plans[0].enabled);
        assert_eq!(plans[0].link, "");
        assert_eq!(plans[1].link, "https://ci.example.com/plan/B-2");
    }

    #[test]
    fn test_normalize_rejects_repeated_key() {
        let raw = r#"{"plans": {"plan": [{"key": "A-1"}, {"key": "B-2"}, {"key": "A-1"}]}}"#;
        let response: BambooPlansResponse = serde_json::from_str(raw).unwrap();

        let err = normalize_plans(response).unwrap_err();
        assert!(matches!(err, PipeSightError::DataUnavailable(_)));
        assert!(err.to_string().contains("duplicate plan key A-1"));
    }
}
