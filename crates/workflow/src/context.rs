//! Per-run execution state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use clipflow_core::ContentItem;

use crate::result::{StepResult, StepStatus};

/// State for one `execute` call: the items being routed and the results
/// recorded so far.
///
/// Created fresh per run and dropped when the run returns. Items are shared
/// read-only with dispatch tasks.
#[derive(Debug)]
pub struct ExecutionContext {
    items: Arc<[ContentItem]>,
    step_results: BTreeMap<usize, StepResult>,
    by_name: HashMap<String, usize>,
}

impl ExecutionContext {
    pub fn new(items: impl Into<Arc<[ContentItem]>>) -> Self {
        Self {
            items: items.into(),
            step_results: BTreeMap::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    /// Shared handle to the items for spawned dispatches.
    pub fn shared_items(&self) -> Arc<[ContentItem]> {
        Arc::clone(&self.items)
    }

    pub fn record(&mut self, result: StepResult) {
        self.by_name
            .insert(result.step_name.clone(), result.step_index);
        self.step_results.insert(result.step_index, result);
    }

    pub fn result(&self, step_index: usize) -> Option<&StepResult> {
        self.step_results.get(&step_index)
    }

    /// Terminal status of an already-recorded step, by name.
    pub fn status_of(&self, step_name: &str) -> Option<StepStatus> {
        self.by_name
            .get(step_name)
            .and_then(|idx| self.step_results.get(idx))
            .map(|r| r.status)
    }

    pub fn completed_steps(&self) -> usize {
        self.step_results.len()
    }

    /// Recorded results in step order.
    pub fn into_results(self) -> Vec<StepResult> {
        self.step_results.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipflow_core::Category;

    #[test]
    fn records_by_index_and_name() {
        let items = vec![ContentItem::new("1", "x", Category::Text)];
        let mut ctx = ExecutionContext::new(items);
        assert_eq!(ctx.items().len(), 1);
        assert_eq!(ctx.status_of("first"), None);

        for (idx, name, status) in [(1, "second", StepStatus::Failed), (0, "first", StepStatus::Skipped)] {
            ctx.record(StepResult {
                step_index: idx,
                step_name: name.into(),
                target_role: "r".into(),
                status,
                outputs: vec![],
                error: None,
                matched: 0,
                duration_ms: 0,
            });
        }

        assert_eq!(ctx.status_of("first"), Some(StepStatus::Skipped));
        assert_eq!(ctx.result(1).map(|r| r.status), Some(StepStatus::Failed));
        let names: Vec<String> = ctx.into_results().into_iter().map(|r| r.step_name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
