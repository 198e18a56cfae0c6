pub mod entity_store;
pub mod form_section;
pub mod lost_reason;
pub mod optimistic;
pub mod pipeline;
pub mod reorder;

/// Trimmed display name, or `None` when nothing is left.
pub(crate) fn normalize_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
