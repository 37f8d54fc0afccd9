use super::types::{
    Channel, Column, ColumnDefinition, Drive, DriveItem, Group, InstalledApp, NewGroup, NewTab,
    Plan, Tab, Team, User,
};
use super::RemoteError;

/// Raw collaboration-platform primitives. A missing resource is
/// `Err(RemoteError::NotFound)`; the idempotent layer on top in
/// [`super::ResourceClient`] turns that into "not found" results.
pub trait GraphApi: Send + Sync {
    fn get_group(&self, group_id: &str) -> Result<Group, RemoteError>;
    fn find_groups_by_mail_nickname(&self, mail_nickname: &str)
        -> Result<Vec<Group>, RemoteError>;
    fn create_group(&self, group: &NewGroup) -> Result<Group, RemoteError>;
    fn add_group_member(&self, group_id: &str, user_id: &str) -> Result<(), RemoteError>;
    fn find_user(&self, user_principal_name: &str) -> Result<User, RemoteError>;

    fn get_group_drive(&self, group_id: &str) -> Result<Drive, RemoteError>;
    fn get_site_drive(&self, site_id: &str) -> Result<Drive, RemoteError>;
    fn get_drive(&self, drive_id: &str) -> Result<Drive, RemoteError>;
    fn list_root_children(&self, drive_id: &str) -> Result<Vec<DriveItem>, RemoteError>;
    fn list_children(&self, drive_id: &str, item_id: &str) -> Result<Vec<DriveItem>, RemoteError>;
    fn get_item_by_path(&self, drive_id: &str, path: &str) -> Result<DriveItem, RemoteError>;
    /// Fails with `Conflict` when `parent_id` already has a child called `name`.
    /// `None` targets the drive root.
    fn create_folder(
        &self,
        drive_id: &str,
        parent_id: Option<&str>,
        name: &str,
    ) -> Result<DriveItem, RemoteError>;
    fn download_file(&self, drive_id: &str, item_id: &str) -> Result<Vec<u8>, RemoteError>;
    /// Replaces an existing file of the same name.
    fn upload_file(
        &self,
        drive_id: &str,
        parent_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<DriveItem, RemoteError>;
    fn delete_item(&self, drive_id: &str, item_id: &str) -> Result<(), RemoteError>;

    fn get_team(&self, group_id: &str) -> Result<Team, RemoteError>;
    fn create_team_from_group(&self, group_id: &str) -> Result<(), RemoteError>;
    fn list_channels(&self, team_id: &str) -> Result<Vec<Channel>, RemoteError>;
    fn create_channel(
        &self,
        team_id: &str,
        display_name: &str,
        description: &str,
    ) -> Result<Channel, RemoteError>;
    fn list_tabs(&self, team_id: &str, channel_id: &str) -> Result<Vec<Tab>, RemoteError>;
    fn create_tab(&self, team_id: &str, channel_id: &str, tab: &NewTab)
        -> Result<Tab, RemoteError>;
    fn list_plans(&self, group_id: &str) -> Result<Vec<Plan>, RemoteError>;
    fn create_plan(&self, group_id: &str, title: &str) -> Result<Plan, RemoteError>;

    fn list_drive_columns(&self, drive_id: &str) -> Result<Vec<Column>, RemoteError>;
    fn create_drive_column(
        &self,
        drive_id: &str,
        column: &ColumnDefinition,
    ) -> Result<Column, RemoteError>;
    fn list_installed_apps(&self, team_id: &str) -> Result<Vec<InstalledApp>, RemoteError>;
    fn install_app(&self, team_id: &str, teams_app_id: &str) -> Result<(), RemoteError>;
}
