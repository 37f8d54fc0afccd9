use super::api::GraphApi;
use super::types::{
    Channel, Column, ColumnDefinition, Drive, DriveItem, Group, InstalledApp, NewGroup, NewTab,
    Plan, Tab, Team, User,
};
use super::RemoteError;
use crate::config::GraphSettings;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Read;
use std::time::Duration;

/// HTTP client for the remote collaboration API.
#[derive(Debug, Clone)]
pub struct GraphClient {
    agent: ureq::Agent,
    api_base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(default, rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstalledAppData {
    id: String,
    #[serde(default)]
    teams_app: Option<TeamsAppData>,
}

#[derive(Debug, Deserialize)]
struct TeamsAppData {
    id: String,
}

impl GraphClient {
    pub fn new(api_base: &str, token: String, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_settings(settings: &GraphSettings) -> Result<Self, RemoteError> {
        let token = std::env::var(&settings.token_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| RemoteError::MissingToken(settings.token_env.clone()))?;
        Ok(Self::new(
            &settings.api_base,
            token,
            Duration::from_secs(settings.request_timeout_secs),
        ))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    /// `@odata.bind` reference to an app in the tenant's catalog.
    fn teams_app_ref(&self, teams_app_id: &str) -> String {
        self.endpoint(&format!("appCatalogs/teamsApps/{}", encode(teams_app_id)))
    }

    fn authorized(&self, request: ureq::Request) -> ureq::Request {
        request.set("Authorization", &format!("Bearer {}", self.token))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        self.get_json_url(&self.endpoint(path))
    }

    fn get_json_url<T: DeserializeOwned>(&self, url: &str) -> Result<T, RemoteError> {
        let response = self
            .authorized(self.agent.get(url))
            .call()
            .map_err(|e| map_ureq_error(url, e))?;
        decode(url, response)
    }

    /// Follows `@odata.nextLink` until the collection is exhausted.
    fn get_collection<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, RemoteError> {
        let mut all = Vec::new();
        let mut url = self.endpoint(path);
        loop {
            let page: Collection<T> = self.get_json_url(&url)?;
            all.extend(page.value);
            match page.next_link.filter(|link| !link.trim().is_empty()) {
                Some(next) => url = next,
                None => break,
            }
        }
        Ok(all)
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: &Value,
    ) -> Result<T, RemoteError> {
        let url = self.endpoint(path);
        let response = self
            .authorized(self.agent.request(method, &url))
            .send_json(body.clone())
            .map_err(|e| map_ureq_error(&url, e))?;
        decode(&url, response)
    }

    fn send_json_no_content(
        &self,
        method: &str,
        path: &str,
        body: &Value,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(path);
        self.authorized(self.agent.request(method, &url))
            .send_json(body.clone())
            .map_err(|e| map_ureq_error(&url, e))?;
        Ok(())
    }
}

impl GraphApi for GraphClient {
    fn get_group(&self, group_id: &str) -> Result<Group, RemoteError> {
        self.get_json(&format!("groups/{}", encode(group_id)))
    }

    fn find_groups_by_mail_nickname(&self, mail_nickname: &str) -> Result<Vec<Group>, RemoteError> {
        let filter = format!("mailNickname eq '{}'", mail_nickname.replace('\'', "''"));
        self.get_collection(&format!(
            "groups?$filter={}&$select=id,displayName,mailNickname",
            encode(&filter)
        ))
    }

    fn create_group(&self, group: &NewGroup) -> Result<Group, RemoteError> {
        let mut body = json!({
            "displayName": group.display_name,
            "mailNickname": group.mail_nickname,
            "description": group.description,
            "groupTypes": ["Unified"],
            "mailEnabled": true,
            "securityEnabled": false,
        });
        if !group.owner_ids.is_empty() {
            body["owners@odata.bind"] = json!(group
                .owner_ids
                .iter()
                .map(|id| format!("{}/users/{}", self.api_base, encode(id)))
                .collect::<Vec<_>>());
        }
        self.send_json("POST", "groups", &body)
    }

    fn add_group_member(&self, group_id: &str, user_id: &str) -> Result<(), RemoteError> {
        let body = json!({
            "@odata.id": format!("{}/directoryObjects/{}", self.api_base, encode(user_id)),
        });
        self.send_json_no_content(
            "POST",
            &format!("groups/{}/members/$ref", encode(group_id)),
            &body,
        )
    }

    fn find_user(&self, user_principal_name: &str) -> Result<User, RemoteError> {
        self.get_json(&format!("users/{}", encode(user_principal_name)))
    }

    fn get_group_drive(&self, group_id: &str) -> Result<Drive, RemoteError> {
        self.get_json(&format!("groups/{}/drive", encode(group_id)))
    }

    fn get_site_drive(&self, site_id: &str) -> Result<Drive, RemoteError> {
        self.get_json(&format!("sites/{}/drive", encode(site_id)))
    }

    fn get_drive(&self, drive_id: &str) -> Result<Drive, RemoteError> {
        self.get_json(&format!("drives/{}", encode(drive_id)))
    }

    fn list_root_children(&self, drive_id: &str) -> Result<Vec<DriveItem>, RemoteError> {
        self.get_collection(&format!("drives/{}/root/children", encode(drive_id)))
    }

    fn list_children(&self, drive_id: &str, item_id: &str) -> Result<Vec<DriveItem>, RemoteError> {
        self.get_collection(&format!(
            "drives/{}/items/{}/children",
            encode(drive_id),
            encode(item_id)
        ))
    }

    fn get_item_by_path(&self, drive_id: &str, path: &str) -> Result<DriveItem, RemoteError> {
        self.get_json(&format!(
            "drives/{}/root:/{}",
            encode(drive_id),
            encode_path(path)
        ))
    }

    fn create_folder(
        &self,
        drive_id: &str,
        parent_id: Option<&str>,
        name: &str,
    ) -> Result<DriveItem, RemoteError> {
        let path = match parent_id {
            Some(parent) => format!(
                "drives/{}/items/{}/children",
                encode(drive_id),
                encode(parent)
            ),
            None => format!("drives/{}/root/children", encode(drive_id)),
        };
        let body = json!({
            "name": name,
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail",
        });
        self.send_json("POST", &path, &body)
    }

    fn download_file(&self, drive_id: &str, item_id: &str) -> Result<Vec<u8>, RemoteError> {
        let url = self.endpoint(&format!(
            "drives/{}/items/{}/content",
            encode(drive_id),
            encode(item_id)
        ));
        let response = self
            .authorized(self.agent.get(&url))
            .call()
            .map_err(|e| map_ureq_error(&url, e))?;
        let mut content = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut content)
            .map_err(|e| RemoteError::Transport(format!("{url}: {e}")))?;
        Ok(content)
    }

    fn upload_file(
        &self,
        drive_id: &str,
        parent_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<DriveItem, RemoteError> {
        let url = self.endpoint(&format!(
            "drives/{}/items/{}:/{}:/content",
            encode(drive_id),
            encode(parent_id),
            encode(name)
        ));
        let response = self
            .authorized(self.agent.put(&url))
            .set("Content-Type", "application/octet-stream")
            .send_bytes(content)
            .map_err(|e| map_ureq_error(&url, e))?;
        decode(&url, response)
    }

    fn delete_item(&self, drive_id: &str, item_id: &str) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!(
            "drives/{}/items/{}",
            encode(drive_id),
            encode(item_id)
        ));
        self.authorized(self.agent.delete(&url))
            .call()
            .map_err(|e| map_ureq_error(&url, e))?;
        Ok(())
    }

    fn get_team(&self, group_id: &str) -> Result<Team, RemoteError> {
        self.get_json(&format!("groups/{}/team", encode(group_id)))
    }

    fn create_team_from_group(&self, group_id: &str) -> Result<(), RemoteError> {
        let body = json!({
            "memberSettings": { "allowCreatePrivateChannels": true },
            "messagingSettings": { "allowUserEditMessages": true },
        });
        self.send_json_no_content("PUT", &format!("groups/{}/team", encode(group_id)), &body)
    }

    fn list_channels(&self, team_id: &str) -> Result<Vec<Channel>, RemoteError> {
        self.get_collection(&format!("teams/{}/channels", encode(team_id)))
    }

    fn create_channel(
        &self,
        team_id: &str,
        display_name: &str,
        description: &str,
    ) -> Result<Channel, RemoteError> {
        let body = json!({
            "displayName": display_name,
            "description": description,
            "membershipType": "standard",
        });
        self.send_json(
            "POST",
            &format!("teams/{}/channels", encode(team_id)),
            &body,
        )
    }

    fn list_tabs(&self, team_id: &str, channel_id: &str) -> Result<Vec<Tab>, RemoteError> {
        self.get_collection(&format!(
            "teams/{}/channels/{}/tabs",
            encode(team_id),
            encode(channel_id)
        ))
    }

    fn create_tab(
        &self,
        team_id: &str,
        channel_id: &str,
        tab: &NewTab,
    ) -> Result<Tab, RemoteError> {
        let body = json!({
            "displayName": tab.display_name,
            "teamsApp@odata.bind": self.teams_app_ref(&tab.teams_app_id),
            "configuration": {
                "contentUrl": tab.content_url,
                "websiteUrl": tab.website_url,
            },
        });
        self.send_json(
            "POST",
            &format!(
                "teams/{}/channels/{}/tabs",
                encode(team_id),
                encode(channel_id)
            ),
            &body,
        )
    }

    fn list_plans(&self, group_id: &str) -> Result<Vec<Plan>, RemoteError> {
        self.get_collection(&format!("groups/{}/planner/plans", encode(group_id)))
    }

    fn create_plan(&self, group_id: &str, title: &str) -> Result<Plan, RemoteError> {
        let body = json!({ "owner": group_id, "title": title });
        self.send_json("POST", "planner/plans", &body)
    }

    fn list_drive_columns(&self, drive_id: &str) -> Result<Vec<Column>, RemoteError> {
        self.get_collection(&format!("drives/{}/list/columns", encode(drive_id)))
    }

    fn create_drive_column(
        &self,
        drive_id: &str,
        column: &ColumnDefinition,
    ) -> Result<Column, RemoteError> {
        let mut body = json!({
            "name": column.name,
            "displayName": column.display_name,
            "text": {},
        });
        if let Some(default_value) = &column.default_value {
            body["defaultValue"] = json!({ "value": default_value });
        }
        self.send_json(
            "POST",
            &format!("drives/{}/list/columns", encode(drive_id)),
            &body,
        )
    }

    fn list_installed_apps(&self, team_id: &str) -> Result<Vec<InstalledApp>, RemoteError> {
        let apps: Vec<InstalledAppData> = self.get_collection(&format!(
            "teams/{}/installedApps?$expand=teamsApp",
            encode(team_id)
        ))?;
        Ok(apps
            .into_iter()
            .map(|app| InstalledApp {
                id: app.id,
                teams_app_id: app.teams_app.map(|t| t.id).unwrap_or_default(),
            })
            .collect())
    }

    fn install_app(&self, team_id: &str, teams_app_id: &str) -> Result<(), RemoteError> {
        let body = json!({
            "teamsApp@odata.bind": self.teams_app_ref(teams_app_id),
        });
        self.send_json_no_content(
            "POST",
            &format!("teams/{}/installedApps", encode(team_id)),
            &body,
        )
    }
}

fn decode<T: DeserializeOwned>(url: &str, response: ureq::Response) -> Result<T, RemoteError> {
    response.into_json::<T>().map_err(|e| RemoteError::Decode {
        endpoint: url.to_string(),
        reason: e.to_string(),
    })
}

fn map_ureq_error(url: &str, err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(404, _) => RemoteError::NotFound(url.to_string()),
        ureq::Error::Status(409, _) => RemoteError::Conflict(url.to_string()),
        ureq::Error::Status(code, response) => RemoteError::Status {
            code,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => {
            let timed_out = std::error::Error::source(&transport)
                .and_then(|source| source.downcast_ref::<std::io::Error>())
                .map(|io| {
                    matches!(
                        io.kind(),
                        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                    )
                })
                .unwrap_or(false);
            if timed_out {
                RemoteError::Timeout(url.to_string())
            } else {
                RemoteError::Transport(format!("{url}: {transport}"))
            }
        }
    }
}

fn encode(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// Encodes each segment of a drive path, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(encode)
        .collect::<Vec<_>>()
        .join("/")
}
