use super::naming::mail_nickname;
use super::outcome::{status, Outcome, WorkflowReport};
use super::request::CustomerRequest;
use super::template::{clone_template, TemplateCopy};
use super::Provisioner;
use crate::remote::{ColumnDefinition, Group, NewGroup};
use crate::shared::ids::now_secs;
use crate::store::Customer;

pub const WORKFLOW: &str = "customer";

pub const CUSTOMER_NO_COLUMN: &str = "CustomerNo";
pub const CUSTOMER_NAME_COLUMN: &str = "CustomerName";
pub const CUSTOMER_TYPE_COLUMN: &str = "CustomerType";

impl Provisioner {
    /// Resolves or creates the customer's group, drive, general folder,
    /// template structure, metadata columns and (optionally) team and app.
    pub fn handle_customer(&self, request: &CustomerRequest) -> WorkflowReport {
        let report = WorkflowReport::new(WORKFLOW, &request.external_id);
        if let Err(reason) = request.validate() {
            tracing::warn!(external_id = %request.external_id, %reason, "customer request rejected");
            return report.rejected(reason);
        }
        let Some(mut customer) = self.load_or_create_customer(request) else {
            return report.rejected(format!(
                "customer {} could not be saved",
                request.external_id.trim()
            ));
        };

        let mut degraded = Vec::new();
        let outcome = match self.run_customer_steps(&mut customer, &mut degraded) {
            Err(reason) => Outcome::unprocessable(reason),
            Ok(()) => match degraded.first() {
                Some(reason) => Outcome::unprocessable(reason),
                None => Outcome::Completed,
            },
        };
        customer.status = match &outcome {
            Outcome::Unprocessable { reason } => reason.clone(),
            _ => terminal_status(&customer).to_string(),
        };
        self.persist_customer(&mut customer, "customer.status");
        tracing::info!(
            customer_id = %customer.id,
            external_id = %customer.external_id,
            status = %customer.status,
            "customer workflow finished"
        );
        report.finish(customer, outcome)
    }

    fn load_or_create_customer(&self, request: &CustomerRequest) -> Option<Customer> {
        let external_id = request.external_id.trim();
        let name = request.name.trim();
        if let Some(mut existing) =
            self.store
                .find_customer(external_id, request.customer_type, Some(name))
        {
            apply_customer_request(&mut existing, request);
            return Some(existing);
        }

        let mut customer = Customer::new(external_id, request.customer_type, name, now_secs());
        apply_customer_request(&mut customer, request);
        customer.status = status::CREATED.to_string();
        if !self.store.insert_customer(&customer) {
            tracing::warn!(external_id, "customer insert failed; re-querying");
        }
        let stored = self
            .store
            .find_customer(external_id, request.customer_type, Some(name));
        if stored.is_none() {
            tracing::error!(external_id, "customer record missing after insert");
        }
        stored.map(|mut stored| {
            apply_customer_request(&mut stored, request);
            stored
        })
    }

    /// `Err` carries the status of the step that could not complete.
    /// Steps that degrade without blocking the rest push their status onto
    /// `degraded`.
    fn run_customer_steps(
        &self,
        customer: &mut Customer,
        degraded: &mut Vec<&'static str>,
    ) -> Result<(), &'static str> {
        let group_id = self.resolve_customer_group(customer)?;

        let drive = self
            .client
            .get_group_drive(&group_id)
            .ok_or(status::DRIVE_NOT_FOUND)?;
        customer.drive_id = Some(drive.id.clone());
        customer.status = status::DRIVE_FOUND.to_string();
        self.persist_customer(customer, "customer.drive");

        let general = self
            .client
            .ensure_folder(&drive.id, None, &self.customer.general_folder_name)
            .ok_or(status::GENERAL_FOLDER_NOT_FOUND)?;
        customer.general_folder_id = Some(general.item.id.clone());
        customer.general_folder_created = true;
        customer.status = status::GENERAL_FOLDER_FOUND.to_string();
        self.persist_customer(customer, "customer.general_folder");

        if !customer.copied_root_structure {
            self.copy_root_structure(customer, &drive.id, &general.item.id, degraded);
        }

        if self.customer.create_columns && !customer.columns_created() {
            self.create_columns(customer, &drive.id, degraded);
        }

        if self.customer.create_team && !customer.team_created {
            match self.client.ensure_team(&group_id) {
                Some(team) => {
                    customer.team_id = Some(team.id);
                    customer.team_created = true;
                    customer.status = status::TEAM_CREATED.to_string();
                    self.persist_customer(customer, "customer.team");
                }
                None => degraded.push(status::TEAM_NOT_FOUND),
            }
        }

        if let (Some(app_id), Some(team_id)) = (
            self.customer.team_app_id.as_deref(),
            customer.team_id.clone(),
        ) {
            if !customer.installed_app {
                if self.client.ensure_app_installed(&team_id, app_id) {
                    customer.installed_app = true;
                    customer.status = status::APP_INSTALLED.to_string();
                    self.persist_customer(customer, "customer.app");
                } else {
                    degraded.push(status::APP_NOT_INSTALLED);
                }
            }
        }
        Ok(())
    }

    /// Stored id first, then the mail nickname. Only when both miss and no id
    /// was ever stored is a new group created.
    fn resolve_customer_group(&self, customer: &mut Customer) -> Result<String, &'static str> {
        if let Some(group) = customer
            .group_id
            .as_deref()
            .and_then(|id| self.client.resolve_group_by_id(id))
        {
            return Ok(self.record_customer_group(customer, &group));
        }

        let nickname = mail_nickname(
            &customer.name,
            &customer.external_id,
            customer.customer_type,
        );
        let previously_created = customer.group_id.is_some();
        if let Some(group) = self
            .client
            .resolve_group_by_nickname(&nickname, previously_created)
        {
            return Ok(self.record_customer_group(customer, &group));
        }
        if previously_created {
            tracing::warn!(
                customer_id = %customer.id,
                mail_nickname = %nickname,
                "stored group id no longer resolves"
            );
            return Err(status::GROUP_NOT_FOUND);
        }

        let created = self
            .client
            .create_group(&NewGroup {
                display_name: customer.name.clone(),
                mail_nickname: nickname.clone(),
                description: format!(
                    "{} {}",
                    customer.customer_type.as_str(),
                    customer.external_id
                ),
                owner_ids: self.customer.owner_user_ids.clone(),
            })
            .ok_or(status::GROUP_NOT_FOUND)?;
        customer.group_id = Some(created.id.clone());
        customer.status = status::GROUP_CREATED.to_string();
        self.persist_customer(customer, "customer.group_created");

        for user_id in &self.customer.owner_user_ids {
            self.client.add_member(&created.id, user_id);
        }

        if !self.client.wait_after_group_creation() {
            return Err(status::GROUP_NOT_FOUND);
        }
        let group = self
            .client
            .resolve_group_by_nickname(&nickname, true)
            .ok_or(status::GROUP_NOT_FOUND)?;
        Ok(self.record_customer_group(customer, &group))
    }

    fn record_customer_group(&self, customer: &mut Customer, group: &Group) -> String {
        if let Some(stored) = customer.group_id.as_deref() {
            if stored != group.id {
                tracing::warn!(
                    customer_id = %customer.id,
                    stored,
                    resolved = %group.id,
                    "stored group id replaced by nickname match"
                );
            }
        }
        customer.group_id = Some(group.id.clone());
        customer.group_created = true;
        customer.status = status::GROUP_FOUND.to_string();
        self.persist_customer(customer, "customer.group");
        group.id.clone()
    }

    fn copy_root_structure(
        &self,
        customer: &mut Customer,
        drive_id: &str,
        general_folder_id: &str,
        degraded: &mut Vec<&'static str>,
    ) {
        let template_path = self.templates.path_for_customer(customer.customer_type);
        match clone_template(
            &self.client,
            &self.templates,
            template_path,
            drive_id,
            general_folder_id,
        ) {
            TemplateCopy::NotConfigured => {}
            TemplateCopy::NotFound { .. } => degraded.push(status::TEMPLATE_NOT_FOUND),
            TemplateCopy::Copied(report) if report.is_complete() => {
                customer.copied_root_structure = true;
                customer.status = status::ROOT_STRUCTURE_COPIED.to_string();
                self.persist_customer(customer, "customer.root_structure");
            }
            TemplateCopy::Copied(report) => {
                tracing::warn!(
                    customer_id = %customer.id,
                    failures = report.failures.len(),
                    "root structure copied with failures"
                );
                degraded.push(status::ROOT_STRUCTURE_INCOMPLETE);
            }
        }
    }

    fn create_columns(
        &self,
        customer: &mut Customer,
        drive_id: &str,
        degraded: &mut Vec<&'static str>,
    ) {
        if !customer.customer_no_column_created {
            customer.customer_no_column_created = self.client.ensure_column(
                drive_id,
                &column(CUSTOMER_NO_COLUMN, "Customer no", &customer.external_id),
            );
        }
        if !customer.customer_name_column_created {
            customer.customer_name_column_created = self.client.ensure_column(
                drive_id,
                &column(CUSTOMER_NAME_COLUMN, "Customer name", &customer.name),
            );
        }
        if !customer.customer_type_column_created {
            customer.customer_type_column_created = self.client.ensure_column(
                drive_id,
                &column(
                    CUSTOMER_TYPE_COLUMN,
                    "Customer type",
                    customer.customer_type.as_str(),
                ),
            );
        }

        if customer.columns_created() {
            customer.status = status::COLUMNS_CREATED.to_string();
        } else {
            degraded.push(status::COLUMNS_INCOMPLETE);
        }
        self.persist_customer(customer, "customer.columns");
    }

    fn persist_customer(&self, customer: &mut Customer, operation: &'static str) {
        if self.store.update_customer(customer) {
            tracing::debug!(operation, customer_id = %customer.id, status = %customer.status, "customer saved");
        } else {
            tracing::error!(operation, customer_id = %customer.id, "customer update was not persisted");
        }
    }
}

/// Non-empty request fields overwrite the stored ones. Empty fields keep
/// what is stored, since every update rewrites the whole row.
fn apply_customer_request(customer: &mut Customer, request: &CustomerRequest) {
    for (target, value) in [
        (&mut customer.name, &request.name),
        (&mut customer.org_no, &request.org_no),
        (&mut customer.street, &request.street),
        (&mut customer.postal_code, &request.postal_code),
        (&mut customer.city, &request.city),
        (&mut customer.country, &request.country),
        (&mut customer.email, &request.email),
        (&mut customer.phone, &request.phone),
        (&mut customer.web, &request.web),
    ] {
        let value = value.trim();
        if !value.is_empty() {
            *target = value.to_string();
        }
    }
}

fn column(name: &str, display_name: &str, default_value: &str) -> ColumnDefinition {
    ColumnDefinition {
        name: name.to_string(),
        display_name: display_name.to_string(),
        default_value: Some(default_value.to_string()).filter(|v| !v.is_empty()),
    }
}

/// The furthest point the ledger has reached.
fn terminal_status(customer: &Customer) -> &'static str {
    if customer.installed_app {
        status::APP_INSTALLED
    } else if customer.team_created {
        status::TEAM_CREATED
    } else if customer.columns_created() {
        status::COLUMNS_CREATED
    } else if customer.copied_root_structure {
        status::ROOT_STRUCTURE_COPIED
    } else {
        status::GENERAL_FOLDER_FOUND
    }
}
