use super::client::ResourceClient;
use super::types::{FolderResult, ItemTree};

/// Tally of a best-effort tree copy. Failures below the top level are
/// collected here instead of aborting the copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// The folder created (or found) at the top of the copy, if any.
    pub root: Option<FolderResult>,
    pub folders_created: usize,
    pub folders_existing: usize,
    pub files_copied: usize,
    pub failures: Vec<String>,
}

impl CopyReport {
    /// True when the top-level folder was resolved.
    pub fn succeeded(&self) -> bool {
        self.root.is_some()
    }

    /// True when every node of the tree made it across.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, what: String) {
        tracing::warn!(failure = %what, "template copy degraded");
        self.failures.push(what);
    }
}

impl ResourceClient {
    /// Creates a folder named after `source.item` under `target_parent` and
    /// copies the whole subtree into it.
    pub fn copy_folder(
        &self,
        source_drive: &str,
        source: &ItemTree,
        target_drive: &str,
        target_parent: Option<&str>,
        include_files: bool,
    ) -> CopyReport {
        let mut report = CopyReport::default();
        let Some(root) = self.ensure_folder(target_drive, target_parent, &source.item.name) else {
            report.fail(format!("folder {}", source.item.name));
            return report;
        };
        if root.existed {
            report.folders_existing += 1;
        } else {
            report.folders_created += 1;
        }
        let root_id = root.item.id.clone();
        report.root = Some(root);
        self.copy_into(
            source_drive,
            source,
            target_drive,
            &root_id,
            include_files,
            &mut report,
        );
        report
    }

    /// Copies the children of `source` directly into the existing folder
    /// `target_folder`. The report's root is the target itself.
    pub fn copy_children(
        &self,
        source_drive: &str,
        source: &ItemTree,
        target_drive: &str,
        target_folder: &str,
        include_files: bool,
    ) -> CopyReport {
        let mut report = CopyReport::default();
        self.copy_into(
            source_drive,
            source,
            target_drive,
            target_folder,
            include_files,
            &mut report,
        );
        report
    }

    /// Folders first, depth-first, then files.
    fn copy_into(
        &self,
        source_drive: &str,
        source: &ItemTree,
        target_drive: &str,
        target_folder: &str,
        include_files: bool,
        report: &mut CopyReport,
    ) {
        for child in source.children.iter().filter(|c| c.item.is_folder()) {
            match self.ensure_folder(target_drive, Some(target_folder), &child.item.name) {
                Some(folder) => {
                    if folder.existed {
                        report.folders_existing += 1;
                    } else {
                        report.folders_created += 1;
                    }
                    self.copy_into(
                        source_drive,
                        child,
                        target_drive,
                        &folder.item.id,
                        include_files,
                        report,
                    );
                }
                None => report.fail(format!("folder {}", child.item.name)),
            }
        }

        if !include_files {
            return;
        }
        for file in source.children.iter().filter(|c| !c.item.is_folder()) {
            let copied = self
                .download_file(source_drive, &file.item.id)
                .and_then(|content| {
                    self.upload_file(target_drive, target_folder, &file.item.name, &content)
                });
            match copied {
                Some(_) => report.files_copied += 1,
                None => report.fail(format!("file {}", file.item.name)),
            }
        }
    }

    /// Download, upload, then delete the source. A failed delete leaves the
    /// file in both places, so the move is at-least-once.
    pub fn move_file(
        &self,
        source_drive: &str,
        item_id: &str,
        name: &str,
        target_drive: &str,
        target_parent: &str,
    ) -> bool {
        let Some(content) = self.download_file(source_drive, item_id) else {
            return false;
        };
        if self
            .upload_file(target_drive, target_parent, name, &content)
            .is_none()
        {
            return false;
        }
        if !self.delete_item(source_drive, item_id) {
            tracing::warn!(
                item_id,
                file = name,
                "moved file could not be removed from its source; it now exists twice"
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::remote::memory::InMemoryGraph;
    use crate::remote::{ResourceClient, RetryPolicy};
    use crate::shared::pause::RecordingPause;
    use std::sync::Arc;

    fn setup() -> (Arc<InMemoryGraph>, ResourceClient) {
        let graph = Arc::new(InMemoryGraph::new());
        let client = ResourceClient::new(
            graph.clone(),
            RetryPolicy::default(),
            Arc::new(RecordingPause::new()),
        );
        (graph, client)
    }

    #[test]
    fn copy_folder_replicates_nested_tree_with_files() {
        let (graph, client) = setup();
        let source_drive = graph.seed_drive("Templates");
        let template = graph.seed_path(&source_drive, "Templates/Order");
        let drawings = graph.seed_folder(&source_drive, Some(&template), "Ritningar");
        graph.seed_folder(&source_drive, Some(&drawings), "Arkiv");
        graph.seed_file(&source_drive, &template, "Checklista.docx", b"check");

        let root = client
            .find_item_by_path(&source_drive, "Templates/Order", false)
            .expect("template root");
        let tree = client.list_children_recursive(&source_drive, root);
        assert_eq!(tree.folder_count(), 2);
        assert_eq!(tree.file_count(), 1);

        let target_drive = graph.seed_drive("Documents");
        let report = client.copy_folder(&source_drive, &tree, &target_drive, None, true);

        assert!(report.succeeded());
        assert!(report.is_complete());
        assert_eq!(report.folders_created, 3);
        assert_eq!(report.files_copied, 1);
        assert_eq!(
            graph.file_content(&target_drive, "Order/Checklista.docx"),
            Some(b"check".to_vec())
        );
        assert!(graph
            .item_id_by_path(&target_drive, "Order/Ritningar/Arkiv")
            .is_some());
    }

    #[test]
    fn failed_file_degrades_without_aborting() {
        let (graph, client) = setup();
        let source_drive = graph.seed_drive("Templates");
        let template = graph.seed_path(&source_drive, "Tpl");
        graph.seed_file(&source_drive, &template, "a.txt", b"a");
        graph.seed_file(&source_drive, &template, "b.txt", b"b");
        graph.fail_uploads_named("a.txt");

        let root = client
            .find_item_by_path(&source_drive, "Tpl", false)
            .expect("template root");
        let tree = client.list_children_recursive(&source_drive, root);
        let target_drive = graph.seed_drive("Documents");
        let target = graph.seed_folder(&target_drive, None, "Order");

        let report = client.copy_children(&source_drive, &tree, &target_drive, &target, true);
        assert!(!report.is_complete());
        assert_eq!(report.files_copied, 1);
        assert_eq!(report.failures, vec!["file a.txt".to_string()]);
    }

    #[test]
    fn folders_only_copy_skips_files() {
        let (graph, client) = setup();
        let source_drive = graph.seed_drive("Templates");
        let template = graph.seed_path(&source_drive, "Tpl");
        graph.seed_folder(&source_drive, Some(&template), "Sub");
        graph.seed_file(&source_drive, &template, "a.txt", b"a");

        let root = client
            .find_item_by_path(&source_drive, "Tpl", false)
            .expect("template root");
        let tree = client.list_children_recursive(&source_drive, root);
        let target_drive = graph.seed_drive("Documents");
        let target = graph.seed_folder(&target_drive, None, "Order");

        let report = client.copy_children(&source_drive, &tree, &target_drive, &target, false);
        assert!(report.is_complete());
        assert_eq!(report.files_copied, 0);
        assert_eq!(graph.child_names(&target_drive, Some(&target)), vec!["Sub"]);
        assert_eq!(graph.counts().upload_file, 0);
    }

    #[test]
    fn move_file_removes_source_after_upload() {
        let (graph, client) = setup();
        let drive = graph.seed_drive("Documents");
        let inbox = graph.seed_folder(&drive, None, "Inbox");
        let archive = graph.seed_folder(&drive, None, "Archive");
        let file = graph.seed_file(&drive, &inbox, "order.pdf", b"pdf");

        assert!(client.move_file(&drive, &file, "order.pdf", &drive, &archive));
        assert!(graph.child_names(&drive, Some(&inbox)).is_empty());
        assert_eq!(
            graph.file_content(&drive, "Archive/order.pdf"),
            Some(b"pdf".to_vec())
        );
    }
}
