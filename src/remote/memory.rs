//! An in-process stand-in for the remote API, used for `--dry-run` and tests.
//!
//! Mirrors the behaviours the orchestrator depends on: case-insensitive names,
//! conflict on duplicate folder creation, and groups that only become visible
//! to nickname search after a configurable number of lookups.

use super::api::GraphApi;
use super::types::{
    Channel, Column, ColumnDefinition, Drive, DriveItem, FileFacet, FolderFacet, Group,
    InstalledApp, NewGroup, NewTab, Plan, Tab, Team, User,
};
use super::RemoteError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

/// Number of mutating calls observed, per primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create_group: usize,
    pub create_folder: usize,
    pub upload_file: usize,
    pub delete_item: usize,
    pub add_group_member: usize,
    pub create_team: usize,
    pub create_channel: usize,
    pub create_tab: usize,
    pub create_plan: usize,
    pub create_column: usize,
    pub install_app: usize,
}

#[derive(Debug, Clone)]
struct StoredItem {
    drive_id: String,
    parent_id: Option<String>,
    name: String,
    folder: bool,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    groups: BTreeMap<String, Group>,
    /// Nickname searches that still miss a freshly created group.
    hidden_lookups: BTreeMap<String, u32>,
    group_drives: BTreeMap<String, String>,
    site_drives: BTreeMap<String, String>,
    drives: BTreeMap<String, Drive>,
    items: BTreeMap<String, StoredItem>,
    users: BTreeMap<String, User>,
    members: BTreeMap<String, BTreeSet<String>>,
    teams: BTreeMap<String, Team>,
    channels: BTreeMap<String, Vec<Channel>>,
    tabs: BTreeMap<String, Vec<Tab>>,
    plans: BTreeMap<String, Vec<Plan>>,
    columns: BTreeMap<String, Vec<Column>>,
    apps: BTreeMap<String, Vec<InstalledApp>>,
    counts: CallCounts,
    visibility_delay: u32,
    provision_drive_with_group: bool,
    failing_uploads: BTreeSet<String>,
    failing_folders: BTreeSet<String>,
}

impl State {
    fn allocate(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn add_drive(&mut self, name: &str) -> String {
        let id = self.allocate("drive");
        self.drives.insert(
            id.clone(),
            Drive {
                id: id.clone(),
                name: name.to_string(),
                web_url: Some(format!("https://files.example/{id}")),
            },
        );
        id
    }

    fn children(&self, drive_id: &str, parent_id: Option<&str>) -> Vec<DriveItem> {
        self.items
            .iter()
            .filter(|(_, item)| item.drive_id == drive_id && item.parent_id.as_deref() == parent_id)
            .map(|(id, item)| to_drive_item(id, item))
            .collect()
    }

    fn child_named(&self, drive_id: &str, parent_id: Option<&str>, name: &str) -> Option<String> {
        self.items
            .iter()
            .find(|(_, item)| {
                item.drive_id == drive_id
                    && item.parent_id.as_deref() == parent_id
                    && item.name.eq_ignore_ascii_case(name)
            })
            .map(|(id, _)| id.clone())
    }

    fn insert_item(
        &mut self,
        drive_id: &str,
        parent_id: Option<&str>,
        name: &str,
        folder: bool,
        content: Vec<u8>,
    ) -> String {
        let id = self.allocate("item");
        self.items.insert(
            id.clone(),
            StoredItem {
                drive_id: drive_id.to_string(),
                parent_id: parent_id.map(str::to_string),
                name: name.to_string(),
                folder,
                content,
            },
        );
        id
    }

    fn item_in_drive(&self, drive_id: &str, item_id: &str) -> Result<&StoredItem, RemoteError> {
        self.items
            .get(item_id)
            .filter(|item| item.drive_id == drive_id)
            .ok_or_else(|| RemoteError::NotFound(format!("item {item_id}")))
    }

    fn resolve_path(&self, drive_id: &str, path: &str) -> Option<String> {
        let mut parent: Option<String> = None;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            parent = Some(self.child_named(drive_id, parent.as_deref(), segment)?);
        }
        parent
    }
}

fn to_drive_item(id: &str, item: &StoredItem) -> DriveItem {
    DriveItem {
        id: id.to_string(),
        name: item.name.clone(),
        web_url: Some(format!("https://files.example/{}/{id}", item.drive_id)),
        size: item.content.len() as u64,
        folder: item.folder.then(FolderFacet::default),
        file: (!item.folder).then(FileFacet::default),
    }
}

#[derive(Debug)]
pub struct InMemoryGraph {
    state: Mutex<State>,
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                provision_drive_with_group: true,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// New groups stay invisible to nickname search for `lookups` searches.
    pub fn set_group_visibility_delay(&self, lookups: u32) {
        self.state().visibility_delay = lookups;
    }

    /// When false, created groups get no drive, as if provisioning were still running.
    pub fn set_provision_drive_with_group(&self, enabled: bool) {
        self.state().provision_drive_with_group = enabled;
    }

    pub fn fail_uploads_named(&self, name: &str) {
        self.state()
            .failing_uploads
            .insert(name.to_ascii_lowercase());
    }

    pub fn fail_folders_named(&self, name: &str) {
        self.state()
            .failing_folders
            .insert(name.to_ascii_lowercase());
    }

    /// Seeds an existing group with its drive.
    pub fn seed_group(&self, display_name: &str, mail_nickname: &str) -> Group {
        let mut state = self.state();
        let id = state.allocate("group");
        let group = Group {
            id: id.clone(),
            display_name: display_name.to_string(),
            mail_nickname: mail_nickname.to_string(),
        };
        state.groups.insert(id.clone(), group.clone());
        let drive_id = state.add_drive("Documents");
        state.group_drives.insert(id, drive_id);
        group
    }

    pub fn seed_site_drive(&self, site_id: &str, name: &str) -> String {
        let mut state = self.state();
        let drive_id = state.add_drive(name);
        state
            .site_drives
            .insert(site_id.to_string(), drive_id.clone());
        drive_id
    }

    pub fn seed_drive(&self, name: &str) -> String {
        self.state().add_drive(name)
    }

    pub fn seed_folder(&self, drive_id: &str, parent_id: Option<&str>, name: &str) -> String {
        self.state()
            .insert_item(drive_id, parent_id, name, true, Vec::new())
    }

    pub fn seed_file(&self, drive_id: &str, parent_id: &str, name: &str, content: &[u8]) -> String {
        self.state()
            .insert_item(drive_id, Some(parent_id), name, false, content.to_vec())
    }

    /// Creates every missing folder along `path` and returns the last id.
    pub fn seed_path(&self, drive_id: &str, path: &str) -> String {
        let mut state = self.state();
        let mut parent: Option<String> = None;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let id = match state.child_named(drive_id, parent.as_deref(), segment) {
                Some(id) => id,
                None => state.insert_item(drive_id, parent.as_deref(), segment, true, Vec::new()),
            };
            parent = Some(id);
        }
        parent.unwrap_or_default()
    }

    pub fn seed_user(&self, user_principal_name: &str, display_name: &str) -> User {
        let mut state = self.state();
        let id = state.allocate("user");
        let user = User {
            id,
            display_name: display_name.to_string(),
            mail: Some(user_principal_name.to_string()),
            user_principal_name: user_principal_name.to_string(),
        };
        state
            .users
            .insert(user_principal_name.to_ascii_lowercase(), user.clone());
        user
    }

    pub fn remove_group_drive(&self, group_id: &str) {
        self.state().group_drives.remove(group_id);
    }

    pub fn attach_group_drive(&self, group_id: &str) -> String {
        let mut state = self.state();
        let drive_id = state.add_drive("Documents");
        state
            .group_drives
            .insert(group_id.to_string(), drive_id.clone());
        drive_id
    }

    pub fn counts(&self) -> CallCounts {
        self.state().counts
    }

    pub fn groups(&self) -> Vec<Group> {
        self.state().groups.values().cloned().collect()
    }

    pub fn group_drive_id(&self, group_id: &str) -> Option<String> {
        self.state().group_drives.get(group_id).cloned()
    }

    pub fn item_id_by_path(&self, drive_id: &str, path: &str) -> Option<String> {
        self.state().resolve_path(drive_id, path)
    }

    pub fn child_names(&self, drive_id: &str, parent_id: Option<&str>) -> Vec<String> {
        let mut names: Vec<String> = self
            .state()
            .children(drive_id, parent_id)
            .into_iter()
            .map(|item| item.name)
            .collect();
        names.sort();
        names
    }

    pub fn file_content(&self, drive_id: &str, path: &str) -> Option<Vec<u8>> {
        let state = self.state();
        let id = state.resolve_path(drive_id, path)?;
        state
            .items
            .get(&id)
            .filter(|item| !item.folder)
            .map(|item| item.content.clone())
    }

    pub fn members(&self, group_id: &str) -> Vec<String> {
        self.state()
            .members
            .get(group_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn team_for_group(&self, group_id: &str) -> Option<Team> {
        self.state().teams.get(group_id).cloned()
    }

    pub fn channel_names(&self, team_id: &str) -> Vec<String> {
        self.state()
            .channels
            .get(team_id)
            .map(|channels| channels.iter().map(|c| c.display_name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn column_names(&self, drive_id: &str) -> Vec<String> {
        self.state()
            .columns
            .get(drive_id)
            .map(|columns| columns.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn installed_app_ids(&self, team_id: &str) -> Vec<String> {
        self.state()
            .apps
            .get(team_id)
            .map(|apps| apps.iter().map(|a| a.teams_app_id.clone()).collect())
            .unwrap_or_default()
    }
}

impl GraphApi for InMemoryGraph {
    fn get_group(&self, group_id: &str) -> Result<Group, RemoteError> {
        self.state()
            .groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("group {group_id}")))
    }

    fn find_groups_by_mail_nickname(&self, mail_nickname: &str) -> Result<Vec<Group>, RemoteError> {
        let mut state = self.state();
        let matching: Vec<Group> = state
            .groups
            .values()
            .filter(|group| group.mail_nickname.eq_ignore_ascii_case(mail_nickname))
            .cloned()
            .collect();
        let mut visible = Vec::new();
        for group in matching {
            match state.hidden_lookups.get_mut(&group.id) {
                Some(remaining) if *remaining > 0 => *remaining -= 1,
                _ => visible.push(group),
            }
        }
        Ok(visible)
    }

    fn create_group(&self, group: &NewGroup) -> Result<Group, RemoteError> {
        let mut state = self.state();
        state.counts.create_group += 1;
        let id = state.allocate("group");
        let created = Group {
            id: id.clone(),
            display_name: group.display_name.clone(),
            mail_nickname: group.mail_nickname.clone(),
        };
        state.groups.insert(id.clone(), created.clone());
        let delay = state.visibility_delay;
        state.hidden_lookups.insert(id.clone(), delay);
        if state.provision_drive_with_group {
            let drive_id = state.add_drive("Documents");
            state.group_drives.insert(id.clone(), drive_id);
        }
        let owners: BTreeSet<String> = group.owner_ids.iter().cloned().collect();
        if !owners.is_empty() {
            state.members.insert(id, owners);
        }
        Ok(created)
    }

    fn add_group_member(&self, group_id: &str, user_id: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        if !state.groups.contains_key(group_id) {
            return Err(RemoteError::NotFound(format!("group {group_id}")));
        }
        state.counts.add_group_member += 1;
        state
            .members
            .entry(group_id.to_string())
            .or_default()
            .insert(user_id.to_string());
        Ok(())
    }

    fn find_user(&self, user_principal_name: &str) -> Result<User, RemoteError> {
        self.state()
            .users
            .get(&user_principal_name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("user {user_principal_name}")))
    }

    fn get_group_drive(&self, group_id: &str) -> Result<Drive, RemoteError> {
        let state = self.state();
        state
            .group_drives
            .get(group_id)
            .and_then(|drive_id| state.drives.get(drive_id))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("drive for group {group_id}")))
    }

    fn get_site_drive(&self, site_id: &str) -> Result<Drive, RemoteError> {
        let state = self.state();
        state
            .site_drives
            .get(site_id)
            .and_then(|drive_id| state.drives.get(drive_id))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("drive for site {site_id}")))
    }

    fn get_drive(&self, drive_id: &str) -> Result<Drive, RemoteError> {
        self.state()
            .drives
            .get(drive_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("drive {drive_id}")))
    }

    fn list_root_children(&self, drive_id: &str) -> Result<Vec<DriveItem>, RemoteError> {
        let state = self.state();
        if !state.drives.contains_key(drive_id) {
            return Err(RemoteError::NotFound(format!("drive {drive_id}")));
        }
        Ok(state.children(drive_id, None))
    }

    fn list_children(&self, drive_id: &str, item_id: &str) -> Result<Vec<DriveItem>, RemoteError> {
        let state = self.state();
        state.item_in_drive(drive_id, item_id)?;
        Ok(state.children(drive_id, Some(item_id)))
    }

    fn get_item_by_path(&self, drive_id: &str, path: &str) -> Result<DriveItem, RemoteError> {
        let state = self.state();
        let id = state
            .resolve_path(drive_id, path)
            .ok_or_else(|| RemoteError::NotFound(format!("path {path}")))?;
        let item = state.item_in_drive(drive_id, &id)?;
        Ok(to_drive_item(&id, item))
    }

    fn create_folder(
        &self,
        drive_id: &str,
        parent_id: Option<&str>,
        name: &str,
    ) -> Result<DriveItem, RemoteError> {
        let mut state = self.state();
        state.counts.create_folder += 1;
        if !state.drives.contains_key(drive_id) {
            return Err(RemoteError::NotFound(format!("drive {drive_id}")));
        }
        if let Some(parent) = parent_id {
            state.item_in_drive(drive_id, parent)?;
        }
        if state.failing_folders.contains(&name.to_ascii_lowercase()) {
            return Err(RemoteError::Status {
                code: 500,
                body: format!("injected failure creating {name}"),
            });
        }
        if state.child_named(drive_id, parent_id, name).is_some() {
            return Err(RemoteError::Conflict(format!("folder {name}")));
        }
        let id = state.insert_item(drive_id, parent_id, name, true, Vec::new());
        let item = state.item_in_drive(drive_id, &id)?;
        Ok(to_drive_item(&id, item))
    }

    fn download_file(&self, drive_id: &str, item_id: &str) -> Result<Vec<u8>, RemoteError> {
        let state = self.state();
        let item = state.item_in_drive(drive_id, item_id)?;
        Ok(item.content.clone())
    }

    fn upload_file(
        &self,
        drive_id: &str,
        parent_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<DriveItem, RemoteError> {
        let mut state = self.state();
        state.counts.upload_file += 1;
        state.item_in_drive(drive_id, parent_id)?;
        if state.failing_uploads.contains(&name.to_ascii_lowercase()) {
            return Err(RemoteError::Status {
                code: 500,
                body: format!("injected failure uploading {name}"),
            });
        }
        let id = match state.child_named(drive_id, Some(parent_id), name) {
            Some(existing) => {
                if let Some(item) = state.items.get_mut(&existing) {
                    item.content = content.to_vec();
                }
                existing
            }
            None => state.insert_item(drive_id, Some(parent_id), name, false, content.to_vec()),
        };
        let item = state.item_in_drive(drive_id, &id)?;
        Ok(to_drive_item(&id, item))
    }

    fn delete_item(&self, drive_id: &str, item_id: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.counts.delete_item += 1;
        state.item_in_drive(drive_id, item_id)?;
        let mut doomed = vec![item_id.to_string()];
        let mut idx = 0;
        while idx < doomed.len() {
            let current = doomed[idx].clone();
            doomed.extend(
                state
                    .items
                    .iter()
                    .filter(|(_, item)| item.parent_id.as_deref() == Some(current.as_str()))
                    .map(|(id, _)| id.clone()),
            );
            idx += 1;
        }
        for id in doomed {
            state.items.remove(&id);
        }
        Ok(())
    }

    fn get_team(&self, group_id: &str) -> Result<Team, RemoteError> {
        self.state()
            .teams
            .get(group_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("team for group {group_id}")))
    }

    fn create_team_from_group(&self, group_id: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.counts.create_team += 1;
        let group = state
            .groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("group {group_id}")))?;
        if state.teams.contains_key(group_id) {
            return Err(RemoteError::Conflict(format!("team for group {group_id}")));
        }
        state.teams.insert(
            group_id.to_string(),
            Team {
                id: group_id.to_string(),
                display_name: group.display_name,
                web_url: Some(format!("https://teams.example/{group_id}")),
            },
        );
        Ok(())
    }

    fn list_channels(&self, team_id: &str) -> Result<Vec<Channel>, RemoteError> {
        let state = self.state();
        if !state.teams.values().any(|team| team.id == team_id) {
            return Err(RemoteError::NotFound(format!("team {team_id}")));
        }
        Ok(state.channels.get(team_id).cloned().unwrap_or_default())
    }

    fn create_channel(
        &self,
        team_id: &str,
        display_name: &str,
        _description: &str,
    ) -> Result<Channel, RemoteError> {
        let mut state = self.state();
        state.counts.create_channel += 1;
        if !state.teams.values().any(|team| team.id == team_id) {
            return Err(RemoteError::NotFound(format!("team {team_id}")));
        }
        let exists = state
            .channels
            .get(team_id)
            .map(|channels| {
                channels
                    .iter()
                    .any(|c| c.display_name.eq_ignore_ascii_case(display_name))
            })
            .unwrap_or(false);
        if exists {
            return Err(RemoteError::Conflict(format!("channel {display_name}")));
        }
        let id = state.allocate("channel");
        let channel = Channel {
            id: id.clone(),
            display_name: display_name.to_string(),
            web_url: Some(format!("https://teams.example/{team_id}/{id}")),
        };
        state
            .channels
            .entry(team_id.to_string())
            .or_default()
            .push(channel.clone());
        Ok(channel)
    }

    fn list_tabs(&self, team_id: &str, channel_id: &str) -> Result<Vec<Tab>, RemoteError> {
        Ok(self
            .state()
            .tabs
            .get(&format!("{team_id}/{channel_id}"))
            .cloned()
            .unwrap_or_default())
    }

    fn create_tab(
        &self,
        team_id: &str,
        channel_id: &str,
        tab: &NewTab,
    ) -> Result<Tab, RemoteError> {
        let mut state = self.state();
        state.counts.create_tab += 1;
        let id = state.allocate("tab");
        let created = Tab {
            id,
            display_name: tab.display_name.clone(),
        };
        state
            .tabs
            .entry(format!("{team_id}/{channel_id}"))
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    fn list_plans(&self, group_id: &str) -> Result<Vec<Plan>, RemoteError> {
        Ok(self
            .state()
            .plans
            .get(group_id)
            .cloned()
            .unwrap_or_default())
    }

    fn create_plan(&self, group_id: &str, title: &str) -> Result<Plan, RemoteError> {
        let mut state = self.state();
        state.counts.create_plan += 1;
        let id = state.allocate("plan");
        let plan = Plan {
            id,
            title: title.to_string(),
        };
        state
            .plans
            .entry(group_id.to_string())
            .or_default()
            .push(plan.clone());
        Ok(plan)
    }

    fn list_drive_columns(&self, drive_id: &str) -> Result<Vec<Column>, RemoteError> {
        Ok(self
            .state()
            .columns
            .get(drive_id)
            .cloned()
            .unwrap_or_default())
    }

    fn create_drive_column(
        &self,
        drive_id: &str,
        column: &ColumnDefinition,
    ) -> Result<Column, RemoteError> {
        let mut state = self.state();
        state.counts.create_column += 1;
        let id = state.allocate("column");
        let created = Column {
            id,
            name: column.name.clone(),
            display_name: column.display_name.clone(),
        };
        state
            .columns
            .entry(drive_id.to_string())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    fn list_installed_apps(&self, team_id: &str) -> Result<Vec<InstalledApp>, RemoteError> {
        Ok(self.state().apps.get(team_id).cloned().unwrap_or_default())
    }

    fn install_app(&self, team_id: &str, teams_app_id: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.counts.install_app += 1;
        let id = state.allocate("app");
        state
            .apps
            .entry(team_id.to_string())
            .or_default()
            .push(InstalledApp {
                id,
                teams_app_id: teams_app_id.to_string(),
            });
        Ok(())
    }
}
