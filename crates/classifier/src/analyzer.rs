//! Clipboard activity analysis: time clustering and workflow prediction.

use std::collections::BTreeMap;

use clipflow_core::{Category, ContentItem};
use serde::{Deserialize, Serialize};

use crate::keys;
use crate::signatures::Language;

/// The workflows a burst of clipboard activity is scored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Workflow {
    Frontend,
    Backend,
    DataScience,
    DevOps,
    Research,
}

impl Workflow {
    /// Scoring order; ties go to the earlier entry.
    pub const ALL: [Workflow; 5] = [
        Workflow::Frontend,
        Workflow::Backend,
        Workflow::DataScience,
        Workflow::DevOps,
        Workflow::Research,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Workflow::Frontend => "Frontend Development",
            Workflow::Backend => "Backend Development",
            Workflow::DataScience => "Data Science",
            Workflow::DevOps => "DevOps/SRE",
            Workflow::Research => "Research",
        }
    }
}

/// Keyword bonuses applied to the lowercased text of each recent item.
const KEYWORD_BONUSES: &[(&[&str], Workflow, f64)] = &[
    (&["pandas", "notebook", "csv"], Workflow::DataScience, 1.0),
    (&["react", "hook"], Workflow::Frontend, 1.0),
    (&["docker", "aws", "deploy"], Workflow::DevOps, 2.0),
    (&["django", "fastapi", "flask"], Workflow::Backend, 2.0),
];

const MIN_WINNING_SCORE: f64 = 2.0;
const MAX_CONFIDENCE: f64 = 0.95;

/// A guess at what the user is working on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPrediction {
    pub name: String,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
}

/// Sort newest first; items without a capture time go last, in input order.
fn newest_first(items: &[ContentItem]) -> Vec<&ContentItem> {
    let mut sorted: Vec<&ContentItem> = items.iter().collect();
    sorted.sort_by(|a, b| match (a.captured_at, b.captured_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    sorted
}

/// Group items captured within `threshold_secs` of their neighbour.
///
/// Clusters are returned newest first. Items without a capture time each
/// form their own cluster at the end.
pub fn cluster_by_time(items: &[ContentItem], threshold_secs: f64) -> Vec<Vec<ContentItem>> {
    let mut clusters: Vec<Vec<ContentItem>> = Vec::new();
    let mut current: Vec<ContentItem> = Vec::new();

    for item in newest_first(items) {
        let joins = match (current.last().and_then(|p| p.captured_at), item.captured_at) {
            (Some(prev), Some(at)) => {
                let gap = (prev - at).num_milliseconds() as f64 / 1000.0;
                gap <= threshold_secs
            }
            _ => false,
        };
        if !joins && !current.is_empty() {
            clusters.push(std::mem::take(&mut current));
        }
        current.push(item.clone());
    }

    if !current.is_empty() {
        clusters.push(current);
    }
    clusters
}

/// Score the `recent_window` newest items into a workflow prediction.
pub fn predict_workflow(items: &[ContentItem], recent_window: usize) -> WorkflowPrediction {
    let recent: Vec<&ContentItem> = newest_first(items).into_iter().take(recent_window).collect();
    if recent.is_empty() {
        return WorkflowPrediction {
            name: "Unknown".into(),
            confidence: 0.0,
            reasoning: "No data".into(),
            scores: BTreeMap::new(),
        };
    }

    let mut scores: BTreeMap<Workflow, f64> = Workflow::ALL.iter().map(|w| (*w, 0.0)).collect();
    let mut add = |w: Workflow, points: f64| *scores.entry(w).or_default() += points;

    for item in &recent {
        let language = item.meta(keys::LANGUAGE).and_then(Language::parse);
        match (item.category, language) {
            (Category::Code, Some(Language::JavaScript)) => add(Workflow::Frontend, 3.0),
            (Category::Code, Some(Language::Css)) => add(Workflow::Frontend, 2.0),
            (Category::Code, Some(Language::Python)) => {
                add(Workflow::Backend, 2.0);
                add(Workflow::DataScience, 1.0);
            }
            (Category::Code, Some(Language::Shell)) => {
                add(Workflow::DevOps, 3.0);
                add(Workflow::Backend, 1.0);
            }
            (Category::Sql, _) => {
                add(Workflow::Backend, 2.0);
                add(Workflow::DataScience, 2.5);
            }
            (Category::Json, _) => {
                add(Workflow::Backend, 1.0);
                add(Workflow::Frontend, 1.0);
            }
            (Category::Url, _) => add(Workflow::Research, 1.5),
            _ => {}
        }

        let lower = item.text.to_lowercase();
        for (words, workflow, bonus) in KEYWORD_BONUSES {
            if words.iter().any(|w| lower.contains(w)) {
                add(*workflow, *bonus);
            }
        }
    }

    let (best, best_score) = Workflow::ALL
        .iter()
        .map(|w| (*w, scores[w]))
        .fold((Workflow::Frontend, f64::MIN), |acc, cur| if cur.1 > acc.1 { cur } else { acc });

    let named_scores: BTreeMap<String, f64> =
        scores.iter().map(|(w, s)| (w.name().to_string(), *s)).collect();

    if best_score < MIN_WINNING_SCORE {
        return WorkflowPrediction {
            name: "General".into(),
            confidence: 0.3,
            reasoning: "Not enough specific patterns.".into(),
            scores: named_scores,
        };
    }

    let total: f64 = scores.values().sum();
    let total = if total == 0.0 { 1.0 } else { total };
    let confidence = (best_score / (total * 0.5 + 2.0)).min(MAX_CONFIDENCE);

    WorkflowPrediction {
        name: best.name().into(),
        confidence: (confidence * 100.0).round() / 100.0,
        reasoning: format!(
            "Detected {} patterns (score: {best_score}) across {} recent items.",
            best.name(),
            recent.len()
        ),
        scores: named_scores,
    }
}
