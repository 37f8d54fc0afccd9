use provisio::config::{CustomerSettings, TemplateSettings};
use provisio::provisioning::{
    status, CustomerRequest, CustomerType, OrderRequest, OrderType, Outcome, ProvisionedRecord,
    Provisioner,
};
use provisio::remote::{InMemoryGraph, ResourceClient, RetryPolicy};
use provisio::shared::pause::RecordingPause;
use provisio::store::{Customer, RecordStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const SITE_ID: &str = "site-templates";

struct Harness {
    _dir: TempDir,
    graph: Arc<InMemoryGraph>,
    pause: Arc<RecordingPause>,
    provisioner: Provisioner,
    template_drive: String,
}

impl Harness {
    fn new() -> Self {
        Self::with_customer_settings(CustomerSettings::default())
    }

    fn with_customer_settings(customer: CustomerSettings) -> Self {
        let dir = tempdir().expect("tempdir");
        let store = RecordStore::open(&dir.path().join("provisio.db")).expect("open store");
        store.ensure_schema().expect("schema");

        let graph = Arc::new(InMemoryGraph::new());
        let template_drive = graph.seed_site_drive(SITE_ID, "Templates");
        let avtal = graph.seed_path(&template_drive, "Templates/Customer/Avtal");
        graph.seed_file(&template_drive, &avtal, "Ramavtal.docx", b"ramavtal");
        graph.seed_path(&template_drive, "Templates/Customer/Ekonomi/Fakturor");
        let kalkyl = graph.seed_path(&template_drive, "Templates/Offert/Kalkyl");
        graph.seed_file(&template_drive, &kalkyl, "kalkyl.xlsx", b"kalkyl");
        graph.seed_path(&template_drive, "Templates/Order/Ritningar");
        graph.seed_path(&template_drive, "Templates/Project/Dokument");

        let pause = Arc::new(RecordingPause::new());
        let policy = RetryPolicy {
            jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };
        let client = ResourceClient::new(graph.clone(), policy, pause.clone());
        let templates = TemplateSettings {
            site_id: Some(SITE_ID.to_string()),
            ..TemplateSettings::default()
        };
        let provisioner = Provisioner::with_sections(store, client, templates, customer);

        Self {
            _dir: dir,
            graph,
            pause,
            provisioner,
            template_drive,
        }
    }

    fn customer(&self, external_id: &str, customer_type: CustomerType) -> Customer {
        self.provisioner
            .store()
            .find_customer(external_id, customer_type, None)
            .expect("customer stored")
    }

    fn provision_acme(&self) -> Customer {
        let report = self
            .provisioner
            .handle_customer(&CustomerRequest::new("4711", CustomerType::Customer, "Acme"));
        assert_eq!(
            report.outcome,
            Outcome::Completed,
            "status: {}",
            report.status
        );
        self.customer("4711", CustomerType::Customer)
    }

    fn drive_of(&self, customer: &Customer) -> String {
        customer.drive_id.clone().expect("drive recorded")
    }
}

#[test]
fn new_customer_gets_group_drive_folder_template_and_columns() {
    let harness = Harness::new();
    let report = harness
        .provisioner
        .handle_customer(&CustomerRequest::new("4711", CustomerType::Customer, "Acme"));

    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.status, status::COLUMNS_CREATED);

    let groups = harness.graph.groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].mail_nickname, "Acme-4711-Kund");
    assert_eq!(groups[0].display_name, "Acme");

    let customer = harness.customer("4711", CustomerType::Customer);
    assert_eq!(report.record_id.as_deref(), Some(customer.id.as_str()));
    assert_eq!(customer.group_id.as_deref(), Some(groups[0].id.as_str()));
    assert!(customer.group_created);
    assert!(customer.general_folder_created);
    assert!(customer.copied_root_structure);
    assert!(customer.columns_created());
    assert_eq!(customer.status, status::COLUMNS_CREATED);

    let drive = harness.drive_of(&customer);
    assert_eq!(
        harness.graph.group_drive_id(&groups[0].id),
        Some(drive.clone())
    );
    assert_eq!(
        harness.graph.item_id_by_path(&drive, "General"),
        customer.general_folder_id
    );
    assert_eq!(
        harness
            .graph
            .child_names(&drive, customer.general_folder_id.as_deref()),
        vec!["Avtal".to_string(), "Ekonomi".to_string()]
    );
    assert!(harness
        .graph
        .item_id_by_path(&drive, "General/Ekonomi/Fakturor")
        .is_some());
    assert_eq!(
        harness
            .graph
            .file_content(&drive, "General/Avtal/Ramavtal.docx"),
        Some(b"ramavtal".to_vec())
    );
    assert_eq!(
        harness.graph.column_names(&drive),
        vec![
            "CustomerNo".to_string(),
            "CustomerName".to_string(),
            "CustomerType".to_string()
        ]
    );
    assert_eq!(harness.pause.waits(), vec![Duration::from_secs(60)]);
}

#[test]
fn replaying_a_customer_message_creates_nothing_new() {
    let harness = Harness::new();
    let first = harness.provision_acme();
    let after_first = harness.graph.counts();

    let report = harness
        .provisioner
        .handle_customer(&CustomerRequest::new("4711", CustomerType::Customer, "Acme"));
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.record_id.as_deref(), Some(first.id.as_str()));

    let after_second = harness.graph.counts();
    assert_eq!(after_second.create_group, 1);
    assert_eq!(after_second, after_first);
    assert_eq!(
        harness
            .provisioner
            .store()
            .find_customers("4711", CustomerType::Customer)
            .len(),
        1
    );
}

#[test]
fn existing_group_is_found_by_nickname_instead_of_created() {
    let harness = Harness::new();
    let seeded = harness.graph.seed_group("Acme", "Acme-4711-Kund");

    let customer = harness.provision_acme();
    assert_eq!(customer.group_id.as_deref(), Some(seeded.id.as_str()));
    assert_eq!(harness.graph.counts().create_group, 0);
    assert!(harness.pause.waits().is_empty());
}

#[test]
fn slow_group_visibility_is_bridged_by_lookup_retries() {
    let harness = Harness::new();
    harness.graph.set_group_visibility_delay(2);

    harness.provision_acme();
    assert_eq!(harness.graph.counts().create_group, 1);
    assert_eq!(
        harness.pause.waits(),
        vec![
            Duration::from_secs(60),
            Duration::from_secs(10),
            Duration::from_secs(10)
        ]
    );
}

#[test]
fn invisible_group_is_redelivered_without_creating_a_second_one() {
    let harness = Harness::new();
    harness.graph.set_group_visibility_delay(5);
    let request = CustomerRequest::new("4711", CustomerType::Customer, "Acme");

    let first = harness.provisioner.handle_customer(&request);
    assert_eq!(
        first.outcome,
        Outcome::unprocessable(status::GROUP_NOT_FOUND)
    );
    let stored = harness.customer("4711", CustomerType::Customer);
    assert_eq!(stored.status, status::GROUP_NOT_FOUND);
    assert!(stored.group_id.is_some(), "created group id is kept");

    let second = harness.provisioner.handle_customer(&request);
    assert_eq!(second.outcome, Outcome::Completed);
    assert_eq!(harness.graph.counts().create_group, 1);
}

#[test]
fn missing_customer_template_is_unprocessable_but_keeps_progress() {
    let harness = Harness::new();
    let request = CustomerRequest::new("77", CustomerType::Supplier, "Bygg AB");
    let report = harness.provisioner.handle_customer(&request);

    assert_eq!(
        report.outcome,
        Outcome::unprocessable(status::TEMPLATE_NOT_FOUND)
    );
    let supplier = harness.customer("77", CustomerType::Supplier);
    assert!(supplier.general_folder_created);
    assert!(!supplier.copied_root_structure);
    assert!(supplier.columns_created(), "later steps still run");
    assert_eq!(harness.graph.groups()[0].mail_nickname, "ByggAB-77-Lev");
}

#[test]
fn failed_template_file_leaves_root_structure_unmarked() {
    let harness = Harness::new();
    harness.graph.fail_uploads_named("Ramavtal.docx");

    let report = harness
        .provisioner
        .handle_customer(&CustomerRequest::new("4711", CustomerType::Customer, "Acme"));
    assert_eq!(
        report.outcome,
        Outcome::unprocessable(status::ROOT_STRUCTURE_INCOMPLETE)
    );
    let customer = harness.customer("4711", CustomerType::Customer);
    assert!(!customer.copied_root_structure);
    let drive = harness.drive_of(&customer);
    let avtal = harness.graph.item_id_by_path(&drive, "General/Avtal");
    assert!(avtal.is_some());
}

#[test]
fn failed_nested_template_folder_degrades_the_copy_without_aborting_it() {
    let harness = Harness::new();
    harness.graph.fail_folders_named("Fakturor");

    let report = harness
        .provisioner
        .handle_customer(&CustomerRequest::new("4711", CustomerType::Customer, "Acme"));
    assert_eq!(
        report.outcome,
        Outcome::unprocessable(status::ROOT_STRUCTURE_INCOMPLETE)
    );

    let customer = harness.customer("4711", CustomerType::Customer);
    assert!(!customer.copied_root_structure);
    assert!(customer.columns_created(), "later steps still run");
    let drive = harness.drive_of(&customer);
    assert!(harness
        .graph
        .item_id_by_path(&drive, "General/Ekonomi")
        .is_some());
    assert!(harness
        .graph
        .item_id_by_path(&drive, "General/Ekonomi/Fakturor")
        .is_none());
    assert_eq!(
        harness
            .graph
            .file_content(&drive, "General/Avtal/Ramavtal.docx"),
        Some(b"ramavtal".to_vec())
    );
}

#[test]
fn customer_without_drive_is_unprocessable_until_drive_appears() {
    let harness = Harness::new();
    harness.graph.set_provision_drive_with_group(false);
    let request = CustomerRequest::new("4711", CustomerType::Customer, "Acme");

    let first = harness.provisioner.handle_customer(&request);
    assert_eq!(
        first.outcome,
        Outcome::unprocessable(status::DRIVE_NOT_FOUND)
    );

    let group_id = harness.graph.groups()[0].id.clone();
    harness.graph.attach_group_drive(&group_id);
    let second = harness.provisioner.handle_customer(&request);
    assert_eq!(second.outcome, Outcome::Completed);
    assert_eq!(harness.graph.counts().create_group, 1);
}

#[test]
fn team_and_app_are_provisioned_when_enabled() {
    let harness = Harness::with_customer_settings(CustomerSettings {
        create_team: true,
        team_app_id: Some("app-crm".to_string()),
        ..CustomerSettings::default()
    });

    let report = harness
        .provisioner
        .handle_customer(&CustomerRequest::new("4711", CustomerType::Customer, "Acme"));
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.status, status::APP_INSTALLED);

    let customer = harness.customer("4711", CustomerType::Customer);
    let group_id = customer.group_id.clone().expect("group");
    let team = harness.graph.team_for_group(&group_id).expect("team");
    assert_eq!(customer.team_id.as_deref(), Some(team.id.as_str()));
    assert!(customer.team_created);
    assert!(customer.installed_app);
    assert_eq!(
        harness.graph.installed_app_ids(&team.id),
        vec!["app-crm".to_string()]
    );
    assert_eq!(
        harness.pause.waits(),
        vec![Duration::from_secs(60), Duration::from_secs(90)]
    );
}

#[test]
fn quote_lands_in_offer_folder_with_revision_stripped() {
    let harness = Harness::new();
    let customer = harness.provision_acme();
    let drive = harness.drive_of(&customer);

    let report = harness
        .provisioner
        .handle_order(&OrderRequest::new("A12345-07", OrderType::Quote, "4711"));
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.external_id, "A12345");
    assert_eq!(report.status, status::HANDLED);

    assert!(harness
        .graph
        .item_id_by_path(&drive, "General/Offert/A12345")
        .is_some());
    assert_eq!(
        harness
            .graph
            .file_content(&drive, "General/Offert/A12345/Kalkyl/kalkyl.xlsx"),
        Some(b"kalkyl".to_vec())
    );

    let order = harness
        .provisioner
        .store()
        .find_order("A12345")
        .expect("order stored");
    assert!(order.handled);
    assert!(order.created_folder);
    assert!(order.structure_created);
    assert!(order.offers_folder_found);
    assert!(!order.orders_folder_found);
    assert_eq!(order.customer_id.as_deref(), Some(customer.id.as_str()));
    assert_eq!(
        order.folder_id,
        harness
            .graph
            .item_id_by_path(&drive, "General/Offert/A12345")
    );
}

#[test]
fn partially_copied_order_template_stays_visible_in_status() {
    let harness = Harness::new();
    harness.provision_acme();
    harness.graph.fail_uploads_named("kalkyl.xlsx");
    let request = OrderRequest::new("A9-01", OrderType::Quote, "4711");

    let report = harness.provisioner.handle_order(&request);
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.status, status::HANDLED_STRUCTURE_INCOMPLETE);
    let Some(ProvisionedRecord::Order(returned)) = &report.record else {
        panic!("expected order snapshot, got {:?}", report.record);
    };
    assert_eq!(returned.status, status::HANDLED_STRUCTURE_INCOMPLETE);

    let order = harness.provisioner.store().find_order("A9").expect("order");
    assert!(order.handled);
    assert!(order.created_folder);
    assert!(!order.structure_created);
    assert_eq!(order.status, status::HANDLED_STRUCTURE_INCOMPLETE);

    let replay = harness.provisioner.handle_order(&request);
    assert_eq!(replay.outcome, Outcome::AlreadyHandled);
    assert_eq!(replay.status, status::HANDLED_STRUCTURE_INCOMPLETE);
}

#[test]
fn missing_order_template_is_recorded_on_handled_order() {
    let harness = Harness::new();
    let customer = harness.provision_acme();
    let drive = harness.drive_of(&customer);

    let report = harness
        .provisioner
        .handle_order(&OrderRequest::new("IK-5", OrderType::Purchase, "4711"));
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.status, status::HANDLED_TEMPLATE_NOT_FOUND);

    let order = harness
        .provisioner
        .store()
        .find_order("IK-5")
        .expect("order");
    assert!(order.handled);
    assert!(!order.structure_created);
    assert_eq!(order.status, status::HANDLED_TEMPLATE_NOT_FOUND);
    assert!(harness
        .graph
        .item_id_by_path(&drive, "General/Inköp/IK-5")
        .is_some());
}

#[test]
fn order_for_customer_without_drive_is_unprocessable() {
    let harness = Harness::new();
    let customer = harness.provision_acme();
    harness
        .graph
        .remove_group_drive(customer.group_id.as_deref().expect("group"));

    let report = harness
        .provisioner
        .handle_order(&OrderRequest::new("O-3", OrderType::Order, "4711"));
    assert_eq!(
        report.outcome,
        Outcome::unprocessable(status::DRIVE_NOT_FOUND)
    );

    let order = harness
        .provisioner
        .store()
        .find_order("O-3")
        .expect("order");
    assert!(order.group_found);
    assert!(!order.drive_found);
    assert_eq!(order.status, status::DRIVE_NOT_FOUND);
}

#[test]
fn handled_order_is_not_processed_again() {
    let harness = Harness::new();
    harness.provision_acme();
    let request = OrderRequest::new("A12345-07", OrderType::Quote, "4711");

    harness.provisioner.handle_order(&request);
    let before = harness.graph.counts();
    let replay = harness.provisioner.handle_order(&request);

    assert_eq!(replay.outcome, Outcome::AlreadyHandled);
    assert!(replay.outcome.is_success());
    assert_eq!(harness.graph.counts(), before);
}

#[test]
fn existing_order_folder_is_not_filled_from_template() {
    let harness = Harness::new();
    let customer = harness.provision_acme();
    let drive = harness.drive_of(&customer);
    harness.graph.seed_path(&drive, "General/Order/O-1");
    let uploads_before = harness.graph.counts().upload_file;

    let report = harness
        .provisioner
        .handle_order(&OrderRequest::new("O-1", OrderType::Order, "4711"));
    assert_eq!(report.outcome, Outcome::Completed);

    let folder = harness
        .graph
        .item_id_by_path(&drive, "General/Order/O-1")
        .expect("folder");
    assert!(harness.graph.child_names(&drive, Some(&folder)).is_empty());
    assert_eq!(harness.graph.counts().upload_file, uploads_before);

    let order = harness
        .provisioner
        .store()
        .find_order("O-1")
        .expect("order");
    assert!(order.handled);
    assert!(!order.created_folder);
    assert!(!order.structure_created);
}

#[test]
fn order_for_unknown_customer_is_unprocessable() {
    let harness = Harness::new();
    let report = harness
        .provisioner
        .handle_order(&OrderRequest::new("O-9", OrderType::Order, "9999"));

    assert_eq!(
        report.outcome,
        Outcome::unprocessable(status::CUSTOMER_NOT_FOUND)
    );
    let order = harness
        .provisioner
        .store()
        .find_order("O-9")
        .expect("order");
    assert_eq!(order.status, status::CUSTOMER_NOT_FOUND);
    assert!(!order.handled);
}

#[test]
fn order_without_general_folder_waits_for_customer_workflow() {
    let harness = Harness::new();
    let group = harness.graph.seed_group("Acme", "Acme-4711-Kund");
    let mut customer = Customer::new("4711", CustomerType::Customer, "Acme", 1);
    customer.group_id = Some(group.id);
    assert!(harness.provisioner.store().insert_customer(&customer));

    let report = harness
        .provisioner
        .handle_order(&OrderRequest::new("O-2", OrderType::Order, "4711"));
    assert_eq!(
        report.outcome,
        Outcome::unprocessable(status::GENERAL_FOLDER_NOT_FOUND)
    );
    assert_eq!(harness.graph.counts().create_folder, 0);
}

#[test]
fn project_order_gets_members_channel_tab_and_plan() {
    let harness = Harness::with_customer_settings(CustomerSettings {
        create_team: true,
        ..CustomerSettings::default()
    });
    let customer = harness.provision_acme();
    let group_id = customer.group_id.clone().expect("group");
    let seller = harness.graph.seed_user("anna@example.com", "Anna");
    let manager = harness.graph.seed_user("bo@example.com", "Bo");

    let mut request = OrderRequest::new("P-100", OrderType::Project, "4711");
    request.seller = seller.user_principal_name.clone();
    request.project_manager = manager.user_principal_name.clone();
    request.additional_info = "Nybygge: hus #2".to_string();

    let report = harness.provisioner.handle_order(&request);
    assert_eq!(
        report.outcome,
        Outcome::Completed,
        "status: {}",
        report.status
    );

    let members = harness.graph.members(&group_id);
    assert!(members.contains(&seller.id));
    assert!(members.contains(&manager.id));
    assert_eq!(
        harness.graph.channel_names(&group_id),
        vec!["P-100 Nybygge hus 2".to_string()]
    );

    let order = harness
        .provisioner
        .store()
        .find_order("P-100")
        .expect("order");
    assert!(order.members_added);
    assert!(order.channel_created);
    assert!(order.tab_created);
    assert!(order.plan_created);
    assert!(order.channel_id.is_some());
    assert!(order.plan_id.is_some());
    let counts = harness.graph.counts();
    assert_eq!(counts.create_tab, 1);
    assert_eq!(counts.create_plan, 1);
}

#[test]
fn project_order_without_team_is_retried_later() {
    let harness = Harness::new();
    harness.provision_acme();

    let report = harness
        .provisioner
        .handle_order(&OrderRequest::new("P-200", OrderType::Project, "4711"));
    assert_eq!(
        report.outcome,
        Outcome::unprocessable(status::TEAM_NOT_FOUND)
    );

    let order = harness
        .provisioner
        .store()
        .find_order("P-200")
        .expect("order");
    assert!(order.created_folder);
    assert!(!order.handled);
    assert_eq!(harness.graph.counts().create_channel, 0);
}

#[test]
fn redelivered_project_order_reuses_existing_channel_and_plan() {
    let harness = Harness::new();
    let customer = harness.provision_acme();
    let group_id = customer.group_id.clone().expect("group");
    let request = OrderRequest::new("P-300", OrderType::Project, "4711");

    let first = harness.provisioner.handle_order(&request);
    assert_eq!(
        first.outcome,
        Outcome::unprocessable(status::TEAM_NOT_FOUND)
    );

    let client = harness.provisioner.client();
    let team = client.ensure_team(&group_id).expect("team");
    let channel = client
        .ensure_channel(&team.id, "P-300", "")
        .expect("channel");
    let plan = client.ensure_plan(&group_id, "P-300").expect("plan");

    let second = harness.provisioner.handle_order(&request);
    assert_eq!(
        second.outcome,
        Outcome::Completed,
        "status: {}",
        second.status
    );
    assert_eq!(second.status, status::HANDLED);

    let order = harness
        .provisioner
        .store()
        .find_order("P-300")
        .expect("order");
    assert_eq!(order.channel_id.as_deref(), Some(channel.id.as_str()));
    assert_eq!(order.plan_id.as_deref(), Some(plan.id.as_str()));
    assert!(order.tab_created);
    assert_eq!(
        harness.graph.channel_names(&team.id),
        vec!["P-300".to_string()]
    );

    let counts = harness.graph.counts();
    assert_eq!(counts.create_channel, 1);
    assert_eq!(counts.create_plan, 1);
    assert_eq!(counts.create_tab, 1);

    let replay = harness.provisioner.handle_order(&request);
    assert_eq!(replay.outcome, Outcome::AlreadyHandled);
    assert_eq!(harness.graph.counts(), counts);
}

#[test]
fn template_drive_is_resolved_from_site() {
    let harness = Harness::new();
    let customer = harness.provision_acme();
    assert_ne!(harness.drive_of(&customer), harness.template_drive);
    assert!(harness
        .graph
        .item_id_by_path(&harness.template_drive, "Templates/Customer/Avtal")
        .is_some());
}

#[test]
fn invalid_requests_are_rejected_without_records() {
    let harness = Harness::new();
    let report = harness
        .provisioner
        .handle_customer(&CustomerRequest::new(" ", CustomerType::Customer, "Acme"));
    assert!(matches!(report.outcome, Outcome::Unprocessable { .. }));
    assert!(report.record_id.is_none());
    assert!(harness.graph.groups().is_empty());
}
