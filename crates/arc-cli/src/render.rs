//! Plain-text and JSON views over core snapshots.

use anyhow::Result;
use arc_core::{
    ActivityEvent, ActivityVerb, Item, Kind, ListFilter, ListView, Prefix, StatusSummary,
    Tactical, WorkStatus,
};
use serde_json::Value;

fn status_icon(item: &Item) -> &'static str {
    if item.is_done() {
        "✓"
    } else {
        "○"
    }
}

fn waiting_suffix(item: &Item) -> String {
    match item.waiting_for() {
        Some(reason) if item.is_open() => format!(" ⏳ {reason}"),
        _ => String::new(),
    }
}

fn item_label(item: &Item) -> String {
    format!(
        "{} {} ({}){}",
        status_icon(item),
        item.title,
        item.id,
        waiting_suffix(item)
    )
}

/// Outcomes with numbered actions, a blank line between outcomes, then the
/// standalone section.
#[must_use]
pub fn format_hierarchy(view: &ListView<'_>, filter: ListFilter) -> String {
    let mut blocks: Vec<Vec<String>> = Vec::new();
    for outcome in &view.outcomes {
        let mut lines = vec![item_label(outcome.outcome)];
        for (index, action) in outcome.actions.iter().enumerate() {
            lines.push(format!("  {}. {}", index + 1, item_label(action)));
        }
        if filter == ListFilter::Ready && outcome.hidden_waiting > 0 {
            if outcome.actions.is_empty() {
                lines.push(format!("  ({} waiting)", outcome.hidden_waiting));
            } else {
                lines.push(format!("  (+{} waiting)", outcome.hidden_waiting));
            }
        }
        blocks.push(lines);
    }
    if !view.standalone.is_empty() {
        let mut lines = vec!["Standalone:".to_string()];
        for action in &view.standalone {
            lines.push(format!("  {}", item_label(action)));
        }
        blocks.push(lines);
    }
    if blocks.is_empty() {
        return "No outcomes.".to_string();
    }
    blocks
        .into_iter()
        .map(|lines| lines.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `✓` for finished steps, `→` plus `[current]` for the next one.
#[must_use]
pub fn format_tactical(tactical: &Tactical) -> Vec<String> {
    tactical
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let number = index + 1;
            match index.cmp(&tactical.current) {
                std::cmp::Ordering::Less => format!("✓ {number}. {step}"),
                std::cmp::Ordering::Equal => format!("→ {number}. {step} [current]"),
                std::cmp::Ordering::Greater => format!("  {number}. {step}"),
            }
        })
        .collect()
}

#[must_use]
pub fn format_item(item: &Item, actions: &[&Item]) -> String {
    let mut lines = vec![item_label(item)];
    lines.push(format!("   Type: {}", item.kind()));
    lines.push(format!("   Status: {}", item.status.as_str()));
    lines.push(format!(
        "   Created: {} by {}",
        item.created_at.as_deref().unwrap_or("unknown"),
        item.created_by.as_deref().unwrap_or("unknown")
    ));
    if let Some(parent) = item.parent() {
        lines.push(format!("   Outcome: {parent}"));
    }
    if let Some(reason) = item.waiting_for() {
        lines.push(format!("   Waiting for: {reason}"));
    }
    if let Some(done_at) = &item.done_at {
        lines.push(format!("   Done: {done_at}"));
    }
    if let Some(brief) = &item.brief {
        lines.push(String::new());
        lines.push(format!("   Why: {}", brief.why));
        lines.push(format!("   What: {}", brief.what));
        lines.push(format!("   Done: {}", brief.done));
    }
    if let Some(tactical) = item.tactical().filter(|tactical| tactical.is_active()) {
        lines.push(String::new());
        lines.push("   Steps:".to_string());
        lines.extend(format_tactical(tactical).into_iter().map(|line| format!("   {line}")));
    }
    if item.kind() == Kind::Outcome && !actions.is_empty() {
        lines.push(String::new());
        lines.push("   Actions:".to_string());
        for (index, action) in actions.iter().enumerate() {
            lines.push(format!("   {}. {}", index + 1, item_label(action)));
        }
    }
    lines.join("\n")
}

/// The session's checklist as shown by `work --status` and `show --current`.
#[must_use]
pub fn format_current(status: &WorkStatus) -> String {
    let tactical = &status.tactical;
    let mut lines = vec![format!(
        "Working: {} ({}) step {}/{}",
        status.title,
        status.id,
        (tactical.current + 1).min(tactical.steps.len()),
        tactical.steps.len()
    )];
    lines.extend(format_tactical(tactical));
    lines.join("\n")
}

#[must_use]
pub fn format_status(summary: &StatusSummary, prefix: &Prefix, skipped: usize) -> String {
    let mut lines = vec![
        format!("Arc status (prefix: {prefix})"),
        String::new(),
        format!(
            "Outcomes:   {} open, {} done",
            summary.open_outcomes, summary.done_outcomes
        ),
        format!(
            "Actions:    {} open ({} ready, {} waiting), {} done",
            summary.open_actions,
            summary.ready_actions,
            summary.waiting_actions,
            summary.done_actions
        ),
    ];
    if summary.standalone_actions > 0 {
        lines.push(format!("Standalone: {} open", summary.open_standalone));
    }
    if skipped > 0 {
        lines.push(format!("Skipped:    {skipped} malformed line(s)"));
    }
    lines.join("\n")
}

#[must_use]
pub fn format_log(events: &[ActivityEvent]) -> String {
    if events.is_empty() {
        return "No activity yet.".to_string();
    }
    events
        .iter()
        .map(|event| {
            let icon = match event.verb {
                ActivityVerb::Created => "+",
                ActivityVerb::Completed => "✓",
                ActivityVerb::Archived => "⌂",
            };
            let compact: String = event.time.chars().take(16).collect::<String>().replace('T', " ");
            format!(
                "  {icon} {compact}  {} {} ({})",
                event.verb.as_str(),
                event.title,
                event.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Nested `{outcomes: [{.., actions}], standalone: [..]}` document.
pub fn list_json(view: &ListView<'_>) -> Result<Value> {
    let mut outcomes = Vec::with_capacity(view.outcomes.len());
    for outcome in &view.outcomes {
        outcomes.push(item_json(outcome.outcome, Some(&outcome.actions))?);
    }
    let mut standalone = Vec::with_capacity(view.standalone.len());
    for action in &view.standalone {
        standalone.push(action.to_json_value()?);
    }
    Ok(serde_json::json!({
        "outcomes": outcomes,
        "standalone": standalone,
    }))
}

/// The stored record, with an `actions` array when given.
pub fn item_json(item: &Item, actions: Option<&[&Item]>) -> Result<Value> {
    let mut value = item.to_json_value()?;
    if let (Some(actions), Value::Object(object)) = (actions, &mut value) {
        let mut encoded = Vec::with_capacity(actions.len());
        for action in actions {
            encoded.push(action.to_json_value()?);
        }
        object.insert("actions".to_string(), Value::Array(encoded));
    }
    Ok(value)
}

pub fn jsonl_lines(items: &[&Item]) -> Result<String> {
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        lines.push(item.to_json_line()?);
    }
    Ok(lines.join("\n"))
}
