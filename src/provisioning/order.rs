use super::naming::{
    channel_display_name, mail_nickname, normalize_order_external_id, parent_folder_name,
    OrderType,
};
use super::outcome::{status, Outcome, WorkflowReport};
use super::request::OrderRequest;
use super::template::{clone_template, TemplateCopy};
use super::Provisioner;
use crate::remote::{FolderResult, NewTab};
use crate::shared::ids::now_secs;
use crate::store::{Customer, Order};

pub const WORKFLOW: &str = "order";

/// App id of the channel tab that shows a document library folder.
pub const FILES_TAB_APP_ID: &str = "com.microsoft.teamspace.tab.files.sharepoint";

impl Provisioner {
    /// Resolves the customer's group and drive, then finds or creates the
    /// order folder under the parent folder for the order type. A freshly
    /// created folder gets the order template; an existing one is left as is.
    pub fn handle_order(&self, request: &OrderRequest) -> WorkflowReport {
        let external_id = normalize_order_external_id(&request.no, request.order_type);
        let report = WorkflowReport::new(WORKFLOW, &external_id);
        if let Err(reason) = request.validate() {
            tracing::warn!(no = %request.no, %reason, "order request rejected");
            return report.rejected(reason);
        }
        let Some(mut order) = self.load_or_create_order(request, &external_id) else {
            return report.rejected(format!("order {external_id} could not be saved"));
        };
        if order.handled {
            tracing::info!(
                order_id = %order.id,
                external_id = %order.external_id,
                "order already handled"
            );
            return report.finish(order, Outcome::AlreadyHandled);
        }

        let outcome = match self.run_order_steps(&mut order) {
            Ok(()) => Outcome::Completed,
            Err(reason) => {
                order.status = reason.to_string();
                self.persist_order(&mut order, "order.status");
                Outcome::unprocessable(reason)
            }
        };
        tracing::info!(
            order_id = %order.id,
            external_id = %order.external_id,
            status = %order.status,
            "order workflow finished"
        );
        report.finish(order, outcome)
    }

    fn load_or_create_order(&self, request: &OrderRequest, external_id: &str) -> Option<Order> {
        if let Some(mut existing) = self.store.find_order(external_id) {
            apply_order_request(&mut existing, request);
            return Some(existing);
        }

        let mut order = Order::new(external_id, request.order_type, now_secs());
        apply_order_request(&mut order, request);
        order.status = status::CREATED.to_string();
        if !self.store.insert_order(&order) {
            tracing::warn!(external_id, "order insert failed; re-querying");
        }
        let stored = self.store.find_order(external_id);
        if stored.is_none() {
            tracing::error!(external_id, "order record missing after insert");
        }
        stored.map(|mut stored| {
            apply_order_request(&mut stored, request);
            stored
        })
    }

    fn run_order_steps(&self, order: &mut Order) -> Result<(), &'static str> {
        let customer = self
            .store
            .find_customer(&order.customer_no, order.customer_type, None)
            .ok_or(status::CUSTOMER_NOT_FOUND)?;
        order.customer_id = Some(customer.id.clone());

        let group_id = self
            .resolve_order_group(&customer)
            .ok_or(status::GROUP_NOT_FOUND)?;
        order.group_found = true;
        order.status = status::GROUP_FOUND.to_string();
        self.persist_order(order, "order.group");

        let drive = self
            .client
            .get_group_drive(&group_id)
            .ok_or(status::DRIVE_NOT_FOUND)?;
        order.drive_id = Some(drive.id.clone());
        order.drive_found = true;
        order.status = status::DRIVE_FOUND.to_string();
        self.persist_order(order, "order.drive");

        let general = self
            .client
            .find_item_by_path(&drive.id, &self.customer.general_folder_name, true)
            .ok_or(status::GENERAL_FOLDER_NOT_FOUND)?;
        order.general_folder_found = true;
        order.status = status::GENERAL_FOLDER_FOUND.to_string();
        self.persist_order(order, "order.general_folder");

        let parent = self
            .client
            .ensure_folder(
                &drive.id,
                Some(&general.id),
                parent_folder_name(order.order_type),
            )
            .ok_or(status::PARENT_FOLDER_NOT_FOUND)?;
        order.mark_parent_folder_found(order.order_type.parent_folder());
        self.persist_order(order, "order.parent_folder");

        let folder = self
            .client
            .ensure_folder(&drive.id, Some(&parent.item.id), &order.external_id)
            .ok_or(status::ORDER_FOLDER_NOT_FOUND)?;
        order.folder_id = Some(folder.item.id.clone());
        let mut handled_status = status::HANDLED;
        if folder.existed {
            tracing::info!(
                order_id = %order.id,
                folder_id = %folder.item.id,
                "order folder already existed; structure assumed present"
            );
            self.persist_order(order, "order.folder");
        } else {
            order.created_folder = true;
            order.status = status::ORDER_FOLDER_CREATED.to_string();
            self.persist_order(order, "order.folder");
            if let Some(degraded) = self.copy_order_structure(order, &drive.id, &folder.item.id) {
                handled_status = degraded;
            }
        }

        if order.order_type == OrderType::Project {
            self.provision_project(order, &group_id, &folder)?;
        }

        order.handled = true;
        order.status = handled_status.to_string();
        self.persist_order(order, "order.handled");
        Ok(())
    }

    fn resolve_order_group(&self, customer: &Customer) -> Option<String> {
        if let Some(group) = customer
            .group_id
            .as_deref()
            .and_then(|id| self.client.resolve_group_by_id(id))
        {
            return Some(group.id);
        }
        let nickname = mail_nickname(
            &customer.name,
            &customer.external_id,
            customer.customer_type,
        );
        self.client
            .resolve_group_by_nickname(&nickname, true)
            .map(|group| group.id)
    }

    /// A missing or partial template does not block the order. Returns the
    /// handled status that records the shortfall, if any.
    fn copy_order_structure(
        &self,
        order: &mut Order,
        drive_id: &str,
        folder_id: &str,
    ) -> Option<&'static str> {
        let template_path = self.templates.path_for_order(order.order_type);
        let degraded = match clone_template(
            &self.client,
            &self.templates,
            template_path,
            drive_id,
            folder_id,
        ) {
            TemplateCopy::NotConfigured => return None,
            TemplateCopy::NotFound { path } => {
                tracing::warn!(order_id = %order.id, template = %path, "order template missing");
                order.status = status::TEMPLATE_NOT_FOUND.to_string();
                Some(status::HANDLED_TEMPLATE_NOT_FOUND)
            }
            TemplateCopy::Copied(report) if report.is_complete() => {
                order.structure_created = true;
                order.status = status::STRUCTURE_CREATED.to_string();
                None
            }
            TemplateCopy::Copied(report) => {
                tracing::warn!(
                    order_id = %order.id,
                    failures = ?report.failures,
                    "order structure copied with failures"
                );
                order.status = status::STRUCTURE_INCOMPLETE.to_string();
                Some(status::HANDLED_STRUCTURE_INCOMPLETE)
            }
        };
        self.persist_order(order, "order.structure");
        degraded
    }

    /// Members, then channel, tab and plan in the customer's team.
    fn provision_project(
        &self,
        order: &mut Order,
        group_id: &str,
        folder: &FolderResult,
    ) -> Result<(), &'static str> {
        if !order.members_added {
            self.add_project_members(order, group_id);
        }

        let team = self
            .client
            .get_team(group_id)
            .ok_or(status::TEAM_NOT_FOUND)?;

        let channel_id = match order.channel_id.clone().filter(|_| order.channel_created) {
            Some(channel_id) => channel_id,
            None => {
                let name = channel_display_name(&order.external_id, &order.additional_info);
                let channel = self
                    .client
                    .ensure_channel(&team.id, &name, &order.additional_info)
                    .ok_or(status::CHANNEL_NOT_CREATED)?;
                order.channel_id = Some(channel.id.clone());
                order.channel_created = true;
                self.persist_order(order, "order.channel");
                channel.id
            }
        };

        if !order.tab_created {
            let url = folder.item.web_url.clone().ok_or(status::TAB_NOT_CREATED)?;
            let tab = NewTab {
                display_name: order.external_id.clone(),
                teams_app_id: FILES_TAB_APP_ID.to_string(),
                content_url: url.clone(),
                website_url: url,
            };
            if !self.client.ensure_tab(&team.id, &channel_id, &tab) {
                return Err(status::TAB_NOT_CREATED);
            }
            order.tab_created = true;
            self.persist_order(order, "order.tab");
        }

        if !order.plan_created {
            let plan = self
                .client
                .ensure_plan(group_id, &order.external_id)
                .ok_or(status::PLAN_NOT_CREATED)?;
            order.plan_id = Some(plan.id);
            order.plan_created = true;
            self.persist_order(order, "order.plan");
        }
        Ok(())
    }

    /// Best effort: an unknown seller or manager is logged and skipped.
    fn add_project_members(&self, order: &mut Order, group_id: &str) {
        let mut all_added = true;
        for upn in [&order.seller, &order.project_manager] {
            if upn.trim().is_empty() {
                continue;
            }
            let added = self
                .client
                .find_user(upn)
                .map(|user| self.client.add_member(group_id, &user.id))
                .unwrap_or(false);
            if !added {
                tracing::warn!(order_id = %order.id, user = %upn, "project member not added");
                all_added = false;
            }
        }
        order.members_added = all_added;
        self.persist_order(order, "order.members");
    }

    fn persist_order(&self, order: &mut Order, operation: &'static str) {
        if self.store.update_order(order) {
            tracing::debug!(operation, order_id = %order.id, status = %order.status, "order saved");
        } else {
            tracing::error!(operation, order_id = %order.id, "order update was not persisted");
        }
    }
}

/// Non-empty request fields overwrite the stored ones.
fn apply_order_request(order: &mut Order, request: &OrderRequest) {
    order.order_type = request.order_type;
    order.customer_type = request.customer_type;
    for (target, value) in [
        (&mut order.customer_no, &request.customer_no),
        (&mut order.seller, &request.seller),
        (&mut order.project_manager, &request.project_manager),
        (&mut order.additional_info, &request.additional_info),
    ] {
        let value = value.trim();
        if !value.is_empty() {
            *target = value.to_string();
        }
    }
}
