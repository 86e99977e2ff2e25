//! Table rendering for convergence results and metric events.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};

use crate::domain::models::{ConvergenceResult, EntityState, MetricEvent};

/// Create a standard list table with the given headers.
///
/// Uses the NOTHING preset (no borders) for a clean CLI aesthetic.
pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h.to_uppercase()).set_alignment(CellAlignment::Left)),
        );
    table
}

/// One row per entity, sorted by id, followed by a summary line.
pub fn render_result(result: &ConvergenceResult) -> String {
    let mut table = list_table(&["entity", "outcome", "detail"]);

    let mut rows: Vec<(String, &str, String)> = result
        .per_entity_final_state
        .iter()
        .map(|(id, state)| (id.to_string(), "terminal", state.to_string()))
        .chain(
            result
                .fatal_errors
                .iter()
                .map(|(id, err)| (id.to_string(), "error", err.clone())),
        )
        .collect();
    rows.sort();
    for (id, outcome, detail) in rows {
        table.add_row(vec![Cell::new(id), Cell::new(outcome), Cell::new(detail)]);
    }

    format!(
        "{table}\n\n{} succeeded, {} failed, {} pending of {} ({}, {:.2?}) success={}",
        result.succeeded_count,
        result.failed_count,
        result.pending_count(),
        result.total_seeded,
        result.termination,
        result.elapsed,
        result.success,
    )
}

/// Per-job task state counts, one column per state.
pub fn render_metrics(event: &MetricEvent) -> String {
    if let Some(err) = &event.error {
        return format!("Metric collection failed: {err}");
    }

    let mut headers = vec!["job"];
    headers.extend(EntityState::ALL.iter().map(EntityState::as_str));
    headers.push("list latency");
    let mut table = list_table(&headers);

    for (job, metrics) in &event.jobs {
        let mut row = vec![Cell::new(job)];
        row.extend(
            EntityState::ALL
                .iter()
                .map(|state| Cell::new(metrics.counts.get(*state))),
        );
        row.push(Cell::new(format!("{:.2?}", metrics.list_tasks_latency)));
        table.add_row(row);
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EntityId, Termination};

    #[test]
    fn test_render_result_lists_every_entity() {
        let mut result = ConvergenceResult::empty();
        result.total_seeded = 3;
        result.succeeded_count = 1;
        result.failed_count = 1;
        result.termination = Termination::TimedOut;
        result.timed_out = true;
        result
            .per_entity_final_state
            .insert(EntityId::from("n1"), EntityState::Completed);
        result
            .fatal_errors
            .insert(EntityId::from("n2"), "pool deleted".to_string());

        let rendered = render_result(&result);
        assert!(rendered.contains("n1"));
        assert!(rendered.contains("completed"));
        assert!(rendered.contains("pool deleted"));
        assert!(rendered.contains("1 pending of 3"));
    }

    #[test]
    fn test_render_failed_metrics() {
        let event = MetricEvent::failed(chrono::Utc::now(), "boom");
        assert_eq!(render_metrics(&event), "Metric collection failed: boom");
    }
}
