/// Opaque internal identifier for a new record. Never reassigned.
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Unix seconds, the unit of every `created`, `modified` and queue timestamp.
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Maps an arbitrary string onto `[A-Za-z0-9_-]` for use in file names.
pub fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_are_unique() {
        assert_ne!(new_record_id(), new_record_id());
    }

    #[test]
    fn sanitize_component_replaces_path_characters() {
        assert_eq!(sanitize_component("4711/Kund ä"), "4711_Kund__");
    }
}
