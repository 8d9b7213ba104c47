use indexmap::IndexMap;

use crate::models::{ErrorCount, PipelineRun};

/// Counts identical error messages across `runs`, most frequent first.
///
/// Messages are compared exactly. Ties keep the order in which the messages
/// were first seen, and at most `limit` entries are returned.
pub fn rank_errors(runs: &[PipelineRun], limit: usize) -> Vec<ErrorCount> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for error in runs.iter().flat_map(|run| &run.errors) {
        *counts.entry(error.message.as_str()).or_insert(0) += 1;
    }

    let mut ranked: Vec<ErrorCount> = counts
        .into_iter()
        .map(|(message, count)| ErrorCount {
            message: message.to_string(),
            count,
        })
        .collect();

    // `sort_by` is stable, so equal counts stay in first-seen order.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

/// Total number of error entries across `runs`.
pub fn error_total(runs: &[PipelineRun]) -> usize {
    runs.iter().map(|run| run.errors.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunStatus;

    fn run_with(messages: &[&str]) -> PipelineRun {
        messages
            .iter()
            .fold(PipelineRun::new("run", RunStatus::Failed, 60), |run, message| {
                run.with_error("test", message)
            })
    }

    fn counts(ranked: &[ErrorCount]) -> Vec<(&str, usize)> {
        ranked
            .iter()
            .map(|e| (e.message.as_str(), e.count))
            .collect()
    }

    #[test]
    fn test_rank_by_count_descending() {
        let runs = vec![run_with(&["A", "A", "B", "A", "B"])];
        assert_eq!(counts(&rank_errors(&runs, 5)), vec![("A", 3), ("B", 2)]);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let runs = vec![run_with(&["B", "A"]), run_with(&["C", "A", "B"])];
        assert_eq!(
            counts(&rank_errors(&runs, 5)),
            vec![("B", 2), ("A", 2), ("C", 1)]
        );
    }

    #[test]
    fn test_messages_compared_exactly() {
        let runs = vec![run_with(&["timeout", "Timeout", "timeout "])];
        assert_eq!(rank_errors(&runs, 5).len(), 3);
    }

    #[test]
    fn test_limit_applies_after_sorting() {
        let runs = vec![run_with(&["x", "y", "z", "z"])];
        assert_eq!(counts(&rank_errors(&runs, 1)), vec![("z", 2)]);
    }

    #[test]
    fn test_no_errors() {
        let runs = vec![PipelineRun::new("ok", RunStatus::Success, 30)];
        assert!(rank_errors(&runs, 5).is_empty());
        assert_eq!(error_total(&runs), 0);
        assert_eq!(error_total(&[run_with(&["a", "a"]), run_with(&["b"])]), 3);
    }
}
