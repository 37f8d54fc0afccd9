use super::api::GraphApi;
use super::retry::RetryPolicy;
use super::types::{
    Channel, ColumnDefinition, Drive, DriveItem, FolderResult, Group, ItemTree, NewGroup, NewTab,
    Plan, Team, User,
};
use super::RemoteError;
use crate::shared::pause::Pause;
use std::sync::Arc;

/// Idempotent, not-found-tolerant operations over a [`GraphApi`].
///
/// Nothing here returns an error. Misses and failures are logged and come back
/// as `None`, `false` or an empty list, and the caller decides what a miss
/// means for its workflow.
#[derive(Clone)]
pub struct ResourceClient {
    api: Arc<dyn GraphApi>,
    policy: RetryPolicy,
    pause: Arc<dyn Pause + Send + Sync>,
}

impl std::fmt::Debug for ResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ResourceClient {
    pub fn new(
        api: Arc<dyn GraphApi>,
        policy: RetryPolicy,
        pause: Arc<dyn Pause + Send + Sync>,
    ) -> Self {
        Self { api, policy, pause }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `attempt` up to `policy.attempts(with_retry)` times, pausing between
    /// misses. Errors count as misses. A cancelled pause ends the window early.
    fn retrying<T>(
        &self,
        operation: &'static str,
        target: &str,
        with_retry: bool,
        mut attempt: impl FnMut() -> Result<Option<T>, RemoteError>,
    ) -> Option<T> {
        let attempts = self.policy.attempts(with_retry);
        for n in 1..=attempts {
            match attempt() {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {
                    tracing::debug!(operation, target, attempt = n, "remote lookup missed");
                }
                Err(err) if err.is_not_found_like() => {
                    tracing::debug!(operation, target, attempt = n, error = %err, "remote lookup missed");
                }
                Err(err) => {
                    tracing::warn!(operation, target, attempt = n, error = %err, "remote lookup failed");
                }
            }
            if n < attempts && !self.pause.pause(self.policy.next_delay()) {
                tracing::info!(operation, target, "retry window cancelled");
                return None;
            }
        }
        None
    }

    fn single<T>(
        &self,
        operation: &'static str,
        target: &str,
        result: Result<T, RemoteError>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) if err.is_not_found_like() => {
                tracing::warn!(operation, target, error = %err, "remote resource not found");
                None
            }
            Err(err) => {
                tracing::error!(operation, target, error = %err, "remote call failed");
                None
            }
        }
    }

    /// Waits out eventual consistency after a creation. Returns `false` when cancelled.
    pub fn wait_after_group_creation(&self) -> bool {
        self.pause.pause(self.policy.group_creation_wait)
    }

    pub fn wait_after_team_creation(&self) -> bool {
        self.pause.pause(self.policy.team_creation_wait)
    }

    pub fn resolve_group_by_id(&self, group_id: &str) -> Option<Group> {
        if group_id.trim().is_empty() {
            return None;
        }
        self.single("group.by_id", group_id, self.api.get_group(group_id))
    }

    /// Looks a group up by mail nickname. Several matches are tolerated and the
    /// first one wins.
    pub fn resolve_group_by_nickname(
        &self,
        mail_nickname: &str,
        with_retry: bool,
    ) -> Option<Group> {
        self.retrying("group.by_nickname", mail_nickname, with_retry, || {
            let mut groups = self.api.find_groups_by_mail_nickname(mail_nickname)?;
            if groups.len() > 1 {
                tracing::warn!(
                    mail_nickname,
                    count = groups.len(),
                    chosen = %groups[0].id,
                    "several groups share a mail nickname; using the first"
                );
            }
            Ok((!groups.is_empty()).then(|| groups.swap_remove(0)))
        })
    }

    pub fn create_group(&self, group: &NewGroup) -> Option<Group> {
        let created = self.single(
            "group.create",
            &group.mail_nickname,
            self.api.create_group(group),
        )?;
        tracing::info!(group_id = %created.id, mail_nickname = %group.mail_nickname, "group created");
        Some(created)
    }

    pub fn get_group_drive(&self, group_id: &str) -> Option<Drive> {
        self.single(
            "drive.for_group",
            group_id,
            self.api.get_group_drive(group_id),
        )
    }

    pub fn get_site_drive(&self, site_id: &str) -> Option<Drive> {
        self.single("drive.for_site", site_id, self.api.get_site_drive(site_id))
    }

    pub fn get_drive(&self, drive_id: &str) -> Option<Drive> {
        self.single("drive.by_id", drive_id, self.api.get_drive(drive_id))
    }

    pub fn list_root_items(&self, drive_id: &str) -> Vec<DriveItem> {
        self.single(
            "items.root",
            drive_id,
            self.api.list_root_children(drive_id),
        )
        .unwrap_or_default()
    }

    pub fn list_children(&self, drive_id: &str, item_id: &str) -> Vec<DriveItem> {
        self.single(
            "items.children",
            item_id,
            self.api.list_children(drive_id, item_id),
        )
        .unwrap_or_default()
    }

    /// Fetches `folder` and every descendant into an owned tree.
    pub fn list_children_recursive(&self, drive_id: &str, folder: DriveItem) -> ItemTree {
        let children = if folder.is_folder() {
            self.list_children(drive_id, &folder.id)
                .into_iter()
                .map(|child| self.list_children_recursive(drive_id, child))
                .collect()
        } else {
            Vec::new()
        };
        ItemTree {
            item: folder,
            children,
        }
    }

    pub fn find_item_by_path(
        &self,
        drive_id: &str,
        path: &str,
        with_retry: bool,
    ) -> Option<DriveItem> {
        let trimmed = path.trim().trim_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        self.retrying("items.by_path", trimmed, with_retry, || {
            self.api.get_item_by_path(drive_id, trimmed).map(Some)
        })
    }

    /// A direct child of `parent_id` (or of the root) whose name matches, ignoring case.
    pub fn find_child(
        &self,
        drive_id: &str,
        parent_id: Option<&str>,
        name: &str,
    ) -> Option<DriveItem> {
        let children = match parent_id {
            Some(parent) => self.list_children(drive_id, parent),
            None => self.list_root_items(drive_id),
        };
        children
            .into_iter()
            .find(|child| child.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Returns the existing child folder, or creates it. A concurrent creator
    /// surfaces as a conflict, after which the winner's folder is returned.
    pub fn ensure_folder(
        &self,
        drive_id: &str,
        parent_id: Option<&str>,
        name: &str,
    ) -> Option<FolderResult> {
        let name = name.trim();
        if name.is_empty() {
            tracing::warn!(drive_id, "refusing to create a folder with an empty name");
            return None;
        }
        if let Some(item) = self.find_child(drive_id, parent_id, name) {
            return Some(FolderResult {
                item,
                existed: true,
            });
        }
        match self.api.create_folder(drive_id, parent_id, name) {
            Ok(item) => {
                tracing::info!(drive_id, folder = name, folder_id = %item.id, "folder created");
                Some(FolderResult {
                    item,
                    existed: false,
                })
            }
            Err(err) if err.is_conflict() => {
                tracing::warn!(
                    drive_id,
                    folder = name,
                    "folder appeared concurrently; reusing it"
                );
                self.find_child(drive_id, parent_id, name)
                    .map(|item| FolderResult {
                        item,
                        existed: true,
                    })
            }
            Err(err) => {
                tracing::error!(drive_id, folder = name, error = %err, "folder creation failed");
                None
            }
        }
    }

    pub fn download_file(&self, drive_id: &str, item_id: &str) -> Option<Vec<u8>> {
        self.single(
            "file.download",
            item_id,
            self.api.download_file(drive_id, item_id),
        )
    }

    pub fn upload_file(
        &self,
        drive_id: &str,
        parent_id: &str,
        name: &str,
        content: &[u8],
    ) -> Option<DriveItem> {
        self.single(
            "file.upload",
            name,
            self.api.upload_file(drive_id, parent_id, name, content),
        )
    }

    pub fn delete_item(&self, drive_id: &str, item_id: &str) -> bool {
        self.single(
            "item.delete",
            item_id,
            self.api.delete_item(drive_id, item_id),
        )
        .is_some()
    }

    pub fn find_user(&self, user_principal_name: &str) -> Option<User> {
        let upn = user_principal_name.trim();
        if upn.is_empty() {
            return None;
        }
        self.single("user.find", upn, self.api.find_user(upn))
    }

    /// Adds `user_id` to the group. Existing membership counts as success.
    pub fn add_member(&self, group_id: &str, user_id: &str) -> bool {
        match self.api.add_group_member(group_id, user_id) {
            Ok(()) => true,
            Err(err) if is_existing_membership(&err) => {
                tracing::debug!(group_id, user_id, "user is already a member");
                true
            }
            Err(err) => {
                tracing::error!(group_id, user_id, error = %err, "adding group member failed");
                false
            }
        }
    }

    pub fn get_team(&self, group_id: &str) -> Option<Team> {
        self.single("team.for_group", group_id, self.api.get_team(group_id))
    }

    /// Returns the group's team, creating it from the group if needed and
    /// waiting for it to appear.
    pub fn ensure_team(&self, group_id: &str) -> Option<Team> {
        if let Ok(team) = self.api.get_team(group_id) {
            return Some(team);
        }
        match self.api.create_team_from_group(group_id) {
            Ok(()) => tracing::info!(group_id, "team creation requested"),
            Err(err) if err.is_conflict() => {
                tracing::debug!(group_id, "team already exists");
            }
            Err(err) => {
                tracing::error!(group_id, error = %err, "team creation failed");
                return None;
            }
        }
        if !self.wait_after_team_creation() {
            return None;
        }
        self.retrying("team.for_group", group_id, true, || {
            self.api.get_team(group_id).map(Some)
        })
    }

    pub fn find_channel(&self, team_id: &str, display_name: &str) -> Option<Channel> {
        let wanted = display_name.trim();
        self.single("channel.list", team_id, self.api.list_channels(team_id))?
            .into_iter()
            .find(|channel| channel.display_name.eq_ignore_ascii_case(wanted))
    }

    pub fn ensure_channel(
        &self,
        team_id: &str,
        display_name: &str,
        description: &str,
    ) -> Option<Channel> {
        if let Some(channel) = self.find_channel(team_id, display_name) {
            return Some(channel);
        }
        let name = display_name.trim();
        match self.api.create_channel(team_id, name, description) {
            Ok(channel) => {
                tracing::info!(team_id, channel = display_name, "channel created");
                Some(channel)
            }
            Err(err) if err.is_conflict() => self.find_channel(team_id, display_name),
            Err(err) => {
                tracing::error!(team_id, channel = display_name, error = %err, "channel creation failed");
                None
            }
        }
    }

    pub fn tab_exists(&self, team_id: &str, channel_id: &str, display_name: &str) -> bool {
        self.single(
            "tab.list",
            channel_id,
            self.api.list_tabs(team_id, channel_id),
        )
        .map(|tabs| {
            tabs.iter()
                .any(|tab| tab.display_name.eq_ignore_ascii_case(display_name.trim()))
        })
        .unwrap_or(false)
    }

    pub fn ensure_tab(&self, team_id: &str, channel_id: &str, tab: &NewTab) -> bool {
        if self.tab_exists(team_id, channel_id, &tab.display_name) {
            return true;
        }
        self.single(
            "tab.create",
            &tab.display_name,
            self.api.create_tab(team_id, channel_id, tab),
        )
        .is_some()
    }

    pub fn find_plan(&self, group_id: &str, title: &str) -> Option<Plan> {
        self.single("plan.list", group_id, self.api.list_plans(group_id))?
            .into_iter()
            .find(|plan| plan.title.eq_ignore_ascii_case(title.trim()))
    }

    pub fn ensure_plan(&self, group_id: &str, title: &str) -> Option<Plan> {
        if let Some(plan) = self.find_plan(group_id, title) {
            return Some(plan);
        }
        self.single(
            "plan.create",
            title,
            self.api.create_plan(group_id, title.trim()),
        )
    }

    /// Creates the column unless one with the same internal name exists.
    pub fn ensure_column(&self, drive_id: &str, column: &ColumnDefinition) -> bool {
        let Some(existing) = self.single(
            "column.list",
            drive_id,
            self.api.list_drive_columns(drive_id),
        ) else {
            return false;
        };
        if existing
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&column.name))
        {
            return true;
        }
        match self.api.create_drive_column(drive_id, column) {
            Ok(_) => {
                tracing::info!(drive_id, column = %column.name, "column created");
                true
            }
            Err(err) if err.is_conflict() => true,
            Err(err) => {
                tracing::error!(drive_id, column = %column.name, error = %err, "column creation failed");
                false
            }
        }
    }

    pub fn ensure_app_installed(&self, team_id: &str, teams_app_id: &str) -> bool {
        let Some(installed) =
            self.single("app.list", team_id, self.api.list_installed_apps(team_id))
        else {
            return false;
        };
        if installed.iter().any(|app| app.teams_app_id == teams_app_id) {
            return true;
        }
        match self.api.install_app(team_id, teams_app_id) {
            Ok(()) => true,
            Err(err) if err.is_conflict() => true,
            Err(err) => {
                tracing::error!(team_id, teams_app_id, error = %err, "app installation failed");
                false
            }
        }
    }
}

fn is_existing_membership(err: &RemoteError) -> bool {
    match err {
        RemoteError::Conflict(_) => true,
        RemoteError::Status { code: 400, body } => body.contains("already exist"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::InMemoryGraph;
    use crate::shared::pause::RecordingPause;
    use std::time::Duration;

    fn client(graph: &Arc<InMemoryGraph>, pause: &Arc<RecordingPause>) -> ResourceClient {
        ResourceClient::new(
            graph.clone(),
            RetryPolicy {
                jitter: Duration::ZERO,
                ..RetryPolicy::default()
            },
            pause.clone(),
        )
    }

    #[test]
    fn ensure_folder_reports_existing_on_second_call() {
        let graph = Arc::new(InMemoryGraph::new());
        let pause = Arc::new(RecordingPause::new());
        let client = client(&graph, &pause);
        let drive = graph.seed_drive("Documents");

        let first = client
            .ensure_folder(&drive, None, "General")
            .expect("create");
        let second = client.ensure_folder(&drive, None, "General").expect("find");

        assert!(!first.existed);
        assert!(second.existed);
        assert_eq!(first.item.id, second.item.id);
        assert_eq!(graph.counts().create_folder, 1);
    }

    #[test]
    fn nickname_lookup_retries_with_fixed_interval() {
        let graph = Arc::new(InMemoryGraph::new());
        let pause = Arc::new(RecordingPause::new());
        let client = client(&graph, &pause);

        assert!(client.resolve_group_by_nickname("nobody", true).is_none());
        assert_eq!(
            pause.waits(),
            vec![Duration::from_secs(10), Duration::from_secs(10)]
        );

        assert!(client.resolve_group_by_nickname("nobody", false).is_none());
        assert_eq!(pause.waits().len(), 2);
    }

    #[test]
    fn nickname_lookup_picks_first_of_several() {
        let graph = Arc::new(InMemoryGraph::new());
        let pause = Arc::new(RecordingPause::new());
        let client = client(&graph, &pause);
        let first = graph.seed_group("Acme", "Acme-4711-Kund");
        graph.seed_group("Acme again", "Acme-4711-Kund");

        let found = client
            .resolve_group_by_nickname("Acme-4711-Kund", false)
            .expect("group");
        assert_eq!(found.id, first.id);
    }

    #[test]
    fn missing_group_by_id_is_none_not_error() {
        let graph = Arc::new(InMemoryGraph::new());
        let pause = Arc::new(RecordingPause::new());
        let client = client(&graph, &pause);
        assert!(client.resolve_group_by_id("group-404").is_none());
        assert!(client.resolve_group_by_id("").is_none());
    }

    #[test]
    fn plan_and_tab_are_created_once() {
        let graph = Arc::new(InMemoryGraph::new());
        let pause = Arc::new(RecordingPause::new());
        let client = client(&graph, &pause);
        let group = graph.seed_group("Acme", "Acme-4711-Kund");

        assert!(client.find_plan(&group.id, "P-1").is_none());
        let created = client.ensure_plan(&group.id, "P-1").expect("plan");
        let found = client
            .ensure_plan(&group.id, " p-1 ")
            .expect("existing plan");
        assert_eq!(created.id, found.id);

        let tab = NewTab {
            display_name: "P-1".to_string(),
            teams_app_id: "files".to_string(),
            content_url: "https://files.example/p-1".to_string(),
            website_url: "https://files.example/p-1".to_string(),
        };
        assert!(client.ensure_tab(&group.id, "channel-1", &tab));
        assert!(client.ensure_tab(&group.id, "channel-1", &tab));
        assert!(client.tab_exists(&group.id, "channel-1", "p-1"));

        let counts = graph.counts();
        assert_eq!(counts.create_plan, 1);
        assert_eq!(counts.create_tab, 1);
    }

    #[test]
    fn existing_membership_counts_as_success() {
        assert!(is_existing_membership(&RemoteError::Status {
            code: 400,
            body: "One or more added object references already exist".to_string(),
        }));
        assert!(!is_existing_membership(&RemoteError::Status {
            code: 400,
            body: "Invalid request".to_string(),
        }));
    }
}
