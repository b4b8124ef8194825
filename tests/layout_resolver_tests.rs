//! Layout resolution order and layout field listing against the standard
//! schema

use crmrust::layout::{fields_for_layout, resolve_layout, RecordLayoutRef};
use crmrust::schema::{
    create_standard_schema, CustomField, CustomObject, FieldType, LayoutSection, LayoutTab,
    PageLayout, SchemaSnapshot,
};
use pretty_assertions::assert_eq;

fn schema() -> SchemaSnapshot {
    create_standard_schema().unwrap()
}

fn resolved_id(reference: &RecordLayoutRef, object: &CustomObject) -> Option<String> {
    resolve_layout(reference, object).map(|l| l.id.clone())
}

#[test]
fn test_single_active_layout_resolves() {
    let schema = schema();
    let account = schema.object("Account").unwrap();
    let layout = resolve_layout(&RecordLayoutRef::new(), account).unwrap();
    assert_eq!(layout.name, "Default Layout");
    assert_eq!(layout.id, "Account-default");
}

#[test]
fn test_explicit_layout_wins() {
    let schema = schema();
    let deal = schema.object("Deal").unwrap();
    let reference = RecordLayoutRef::new()
        .with_layout("Deal-create")
        .with_record_type("Deal-renewal");
    assert_eq!(resolved_id(&reference, deal).as_deref(), Some("Deal-create"));
}

#[test]
fn test_record_type_layout() {
    let schema = schema();
    let deal = schema.object("Deal").unwrap();
    let reference = RecordLayoutRef::new().with_record_type("Deal-renewal");
    assert_eq!(resolved_id(&reference, deal).as_deref(), Some("Deal-renewal"));
}

#[test]
fn test_inactive_explicit_layout_falls_through() {
    let mut schema = schema();
    schema
        .object_mut("Deal")
        .unwrap()
        .deactivate_layout("Deal-create")
        .unwrap();
    let deal = schema.object("Deal").unwrap();

    let reference = RecordLayoutRef::new()
        .with_layout("Deal-create")
        .with_record_type("Deal-renewal");
    assert_eq!(resolved_id(&reference, deal).as_deref(), Some("Deal-renewal"));
}

#[test]
fn test_first_active_record_type_is_used_without_one_on_the_record() {
    let schema = schema();
    let deal = schema.object("Deal").unwrap();
    // Deal-new-business is first and points at Deal-default
    assert_eq!(
        resolved_id(&RecordLayoutRef::new(), deal).as_deref(),
        Some("Deal-default")
    );
}

#[test]
fn test_inactive_record_type_layout_falls_back_to_first_active_layout() {
    let mut schema = schema();
    let deal = schema.object_mut("Deal").unwrap();
    deal.deactivate_layout("Deal-renewal").unwrap();
    deal.deactivate_layout("Deal-default").unwrap();
    let deal = schema.object("Deal").unwrap();

    let reference = RecordLayoutRef::new().with_record_type("Deal-renewal");
    assert_eq!(resolved_id(&reference, deal).as_deref(), Some("Deal-create"));
}

#[test]
fn test_no_active_layout() {
    let mut schema = schema();
    schema
        .object_mut("Account")
        .unwrap()
        .deactivate_layout("Account-default")
        .unwrap();
    let account = schema.object("Account").unwrap();
    assert!(resolve_layout(&RecordLayoutRef::new(), account).is_none());
}

#[test]
fn test_resolution_is_idempotent() {
    let schema = schema();
    let deal = schema.object("Deal").unwrap();
    let reference = RecordLayoutRef::new().with_record_type("Deal-renewal");
    let first = resolve_layout(&reference, deal).unwrap();
    let second = resolve_layout(&reference, deal).unwrap();
    assert!(std::ptr::eq(first, second));
}

#[test]
fn test_layout_of_another_object_is_never_returned() {
    let schema = schema();
    let contact = schema.object("Contact").unwrap();
    let reference = RecordLayoutRef::new().with_layout("Account-default");
    let layout = resolve_layout(&reference, contact).unwrap();
    assert_eq!(layout.id, "Contact-default");
    assert_eq!(layout.object_id, contact.id);
}

#[test]
fn test_fields_for_layout_in_object_order() {
    let schema = schema();
    let account = schema.object("Account").unwrap();
    let layout = account.layout("Account-default").unwrap();
    let names: Vec<&str> = fields_for_layout(account, layout)
        .iter()
        .map(|f| f.api_name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "accountName",
            "accountNumber",
            "industry",
            "phone",
            "website",
            "annualRevenue",
            "numberOfEmployees",
            "billingAddress",
            "parentAccountId",
        ]
    );
}

#[test]
fn test_fields_for_layout_skips_duplicates_and_inactive_fields() {
    let mut object = CustomObject::new("Ticket", "Ticket");
    for name in ["subject", "body", "priority"] {
        object
            .add_field(CustomField::new(name, name, FieldType::Text))
            .unwrap();
    }
    object
        .add_layout(PageLayout::new("Ticket-main", "Main").with_tab(
            LayoutTab::new("t", "Tab")
                .with_section(
                    LayoutSection::new("a", "A", 2)
                        .with_field("priority", 0, 0)
                        .with_field("Ticket__subject", 1, 1),
                )
                .with_section(
                    LayoutSection::new("b", "B", 1)
                        .with_field("subject", 0, 0)
                        .with_field("body", 0, 1),
                ),
        ))
        .unwrap();
    object.deactivate_field("body").unwrap();

    let layout = object.layout("Ticket-main").unwrap();
    let names: Vec<&str> = fields_for_layout(&object, layout)
        .iter()
        .map(|f| f.api_name.as_str())
        .collect();
    assert_eq!(names, vec!["subject", "priority"]);
}
