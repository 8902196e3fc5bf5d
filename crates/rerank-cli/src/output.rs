use rerank_common::RerankRequest;

pub fn print_ranking(req: &RerankRequest, outcome: &str, ranking: &[i64]) {
    println!("\n=== Rerank ===");
    println!("  outcome: {}", if outcome.is_empty() { "(unknown)" } else { outcome });

    if ranking.is_empty() {
        println!("  (no ranking, keep default order)");
        println!();
        return;
    }

    println!("  {:<6} {:<8} {:>10}", "Rank", "Index", "pred_ms");
    for (rank, index) in ranking.iter().enumerate() {
        let pred = req
            .candidates
            .iter()
            .find(|c| c.index == *index)
            .map(|c| format!("{:.0}", c.pred_ms))
            .unwrap_or_else(|| "?".to_string());
        println!("  {:<6} {:<8} {:>10}", rank + 1, index, pred);
    }
    println!();
}
