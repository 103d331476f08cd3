//! `clipflow predict`: guess the current workflow from clipboard history.

use std::path::Path;

use clipflow_classifier::{classify_all, cluster_by_time, predict_workflow};
use clipflow_config::AppConfig;

pub fn run(config: &AppConfig, entries: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let items = classify_all(&super::read_entries(entries)?);
    let analyzer = &config.analyzer;

    let prediction = predict_workflow(&items, analyzer.recent_window);
    let clusters = cluster_by_time(&items, analyzer.cluster_threshold_secs);

    println!("🧭 Workflow:   {}", prediction.name);
    println!("   Confidence: {:.0}%", prediction.confidence * 100.0);
    println!("   Reasoning:  {}", prediction.reasoning);
    println!(
        "   Activity:   {} items in {} bursts (gap > {}s)",
        items.len(),
        clusters.len(),
        analyzer.cluster_threshold_secs
    );
    for (name, score) in prediction.scores.iter().filter(|(_, s)| **s > 0.0) {
        println!("     {name:<22} {score:.1}");
    }
    Ok(())
}
