use crate::config::TemplateSettings;
use crate::remote::{CopyReport, ResourceClient};

/// Result of cloning a template subtree into a target folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateCopy {
    /// No template location is configured; there is nothing to copy.
    NotConfigured,
    NotFound { path: String },
    Copied(CopyReport),
}

impl TemplateCopy {
    /// True only when every node of the template reached the target.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Copied(report) if report.is_complete())
    }
}

/// Copies the contents of the template folder at `template_path` into the
/// existing folder `target_folder`.
pub fn clone_template(
    client: &ResourceClient,
    settings: &TemplateSettings,
    template_path: &str,
    target_drive: &str,
    target_folder: &str,
) -> TemplateCopy {
    let Some(source_drive) = template_drive_id(client, settings) else {
        if settings.is_configured() {
            tracing::warn!(template = template_path, "template drive not found");
            return TemplateCopy::NotFound {
                path: template_path.to_string(),
            };
        }
        tracing::debug!("no template location configured; skipping copy");
        return TemplateCopy::NotConfigured;
    };

    let Some(root) = client.find_item_by_path(&source_drive, template_path, false) else {
        tracing::warn!(template = template_path, drive_id = %source_drive, "template folder not found");
        return TemplateCopy::NotFound {
            path: template_path.to_string(),
        };
    };
    let tree = client.list_children_recursive(&source_drive, root);
    tracing::info!(
        template = template_path,
        folders = tree.folder_count(),
        files = tree.file_count(),
        target_folder,
        "cloning template"
    );
    let report = client.copy_children(
        &source_drive,
        &tree,
        target_drive,
        target_folder,
        settings.include_files,
    );
    TemplateCopy::Copied(report)
}

fn template_drive_id(client: &ResourceClient, settings: &TemplateSettings) -> Option<String> {
    if let Some(drive_id) = non_blank(settings.drive_id.as_deref()) {
        return Some(drive_id.to_string());
    }
    let site_id = non_blank(settings.site_id.as_deref())?;
    client.get_site_drive(site_id).map(|drive| drive.id)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|id| !id.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{InMemoryGraph, RetryPolicy};
    use crate::shared::pause::RecordingPause;
    use std::sync::Arc;

    #[test]
    fn site_drive_is_used_when_no_drive_id_is_set() {
        let graph = Arc::new(InMemoryGraph::new());
        let client = ResourceClient::new(
            graph.clone(),
            RetryPolicy::default(),
            Arc::new(RecordingPause::new()),
        );
        let source = graph.seed_site_drive("site-1", "Mallar");
        let template = graph.seed_path(&source, "Templates/Customer");
        graph.seed_folder(&source, Some(&template), "Avtal");
        let target_drive = graph.seed_drive("Documents");
        let target = graph.seed_folder(&target_drive, None, "General");

        let settings = TemplateSettings {
            site_id: Some("site-1".to_string()),
            ..TemplateSettings::default()
        };
        let copy = clone_template(
            &client,
            &settings,
            "Templates/Customer",
            &target_drive,
            &target,
        );
        assert!(copy.is_complete());
        assert_eq!(
            graph.child_names(&target_drive, Some(&target)),
            vec!["Avtal"]
        );
    }

    #[test]
    fn unconfigured_templates_are_skipped() {
        let graph = Arc::new(InMemoryGraph::new());
        let client = ResourceClient::new(
            graph.clone(),
            RetryPolicy::default(),
            Arc::new(RecordingPause::new()),
        );
        let copy = clone_template(
            &client,
            &TemplateSettings::default(),
            "Templates/Customer",
            "drive-x",
            "item-x",
        );
        assert_eq!(copy, TemplateCopy::NotConfigured);
    }
}
