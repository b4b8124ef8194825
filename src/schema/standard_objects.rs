//! Built-in sample CRM schema
//!
//! Account, Contact, Deal, Lead and Property with a default layout each.
//! Used by the demo binary and as a fixture by the tests.

use crate::expr::{ConditionExpr, Operator};
use crate::schema::error::SchemaResult;
use crate::schema::field::{CustomField, FieldType, Relationship};
use crate::schema::layout::{LayoutSection, LayoutTab, LayoutType, PageLayout};
use crate::schema::object::{CustomObject, RecordType, ValidationRule};
use crate::schema::snapshot::SchemaSnapshot;

pub const DEAL_STAGES: [&str; 6] = [
    "Prospecting",
    "Qualification",
    "Proposal",
    "Negotiation",
    "Closed Won",
    "Closed Lost",
];

/// Create a snapshot with the standard CRM objects
pub fn create_standard_schema() -> SchemaResult<SchemaSnapshot> {
    SchemaSnapshot::from_objects(vec![
        create_account()?,
        create_contact()?,
        create_deal()?,
        create_lead()?,
        create_property()?,
    ])
}

/// A section placing `fields` in reading order across `columns`
fn section(id: &str, label: &str, columns: u8, fields: &[&str]) -> LayoutSection {
    fields
        .iter()
        .enumerate()
        .fold(LayoutSection::new(id, label, columns), |section, (i, field)| {
            section.with_field(*field, (i % columns as usize) as u8, i as u32)
        })
}

fn add_fields(object: &mut CustomObject, fields: Vec<CustomField>) -> SchemaResult<()> {
    for field in fields {
        object.add_field(field)?;
    }
    Ok(())
}

/// Account object
fn create_account() -> SchemaResult<CustomObject> {
    let mut obj = CustomObject::new("Account", "Account")
        .with_description("Companies and organizations you do business with");
    add_fields(
        &mut obj,
        vec![
            CustomField::new("accountName", "Account Name", FieldType::Text)
                .required()
                .with_length(None, Some(255)),
            CustomField::new("accountNumber", "Account Number", FieldType::Text)
                .unique()
                .with_length(None, Some(40)),
            CustomField::new("industry", "Industry", FieldType::Picklist).with_picklist_values([
                "Technology",
                "Finance",
                "Healthcare",
                "Manufacturing",
                "Retail",
            ]),
            CustomField::new("phone", "Phone", FieldType::Phone),
            CustomField::new("website", "Website", FieldType::Url),
            CustomField::new("annualRevenue", "Annual Revenue", FieldType::Currency)
                .with_precision(18, 2)
                .with_range(Some(0.0), None),
            CustomField::new("numberOfEmployees", "Employees", FieldType::Number)
                .with_precision(9, 0)
                .with_range(Some(0.0), None),
            CustomField::new("billingAddress", "Billing Address", FieldType::Address),
            CustomField::new("parentAccountId", "Parent Account", FieldType::Lookup).with_relationship(
                Relationship::new("Account").with_relationship_name("ChildAccounts"),
            ),
        ],
    )?;

    obj.add_layout(
        PageLayout::new("Account-default", "Default Layout")
            .as_default()
            .with_tab(
                LayoutTab::new("Account-details", "Details")
                    .with_section(section(
                        "Account-info",
                        "Account Information",
                        2,
                        &["accountName", "accountNumber", "industry", "parentAccountId"],
                    ))
                    .with_section(section(
                        "Account-contact",
                        "Contact Details",
                        2,
                        &["phone", "website", "Account__billingAddress"],
                    ))
                    .with_section(section(
                        "Account-financials",
                        "Financials",
                        2,
                        &["annualRevenue", "numberOfEmployees"],
                    )),
            ),
    )?;
    Ok(obj)
}

/// Contact object
fn create_contact() -> SchemaResult<CustomObject> {
    let mut obj = CustomObject::new("Contact", "Contact");
    add_fields(
        &mut obj,
        vec![
            CustomField::new("firstName", "First Name", FieldType::Text).with_length(None, Some(40)),
            CustomField::new("lastName", "Last Name", FieldType::Text)
                .required()
                .with_length(None, Some(80)),
            CustomField::new("email", "Email", FieldType::Email).unique(),
            CustomField::new("phone", "Phone", FieldType::Phone),
            CustomField::new("title", "Title", FieldType::Text),
            CustomField::new("accountId", "Account", FieldType::Lookup)
                .with_relationship(Relationship::new("Account").with_relationship_name("Contacts")),
            CustomField::new("birthdate", "Birthdate", FieldType::Date),
            CustomField::new("mailingAddress", "Mailing Address", FieldType::Address),
            CustomField::new("fullName", "Full Name", FieldType::Formula)
                .with_formula(r#"TRIM(CONCAT(firstName, " ", lastName))"#),
        ],
    )?;

    obj.add_layout(
        PageLayout::new("Contact-default", "Default Layout")
            .as_default()
            .with_tab(
                LayoutTab::new("Contact-details", "Details")
                    .with_section(section(
                        "Contact-name",
                        "Name",
                        2,
                        &["firstName", "lastName", "title", "accountId"],
                    ))
                    .with_section(section(
                        "Contact-reach",
                        "Contact Information",
                        2,
                        &["email", "phone", "birthdate", "mailingAddress"],
                    )),
            ),
    )?;
    Ok(obj)
}

/// Deal object, with two record types selecting different layouts
fn create_deal() -> SchemaResult<CustomObject> {
    let mut obj = CustomObject::new("Deal", "Deal")
        .with_description("Sales opportunities tracked through the pipeline");
    add_fields(
        &mut obj,
        vec![
            CustomField::new("dealName", "Deal Name", FieldType::Text)
                .required()
                .with_length(None, Some(120)),
            CustomField::new("stage", "Stage", FieldType::Picklist)
                .required()
                .with_picklist_values(DEAL_STAGES)
                .with_default("Prospecting"),
            CustomField::new("amount", "Amount", FieldType::Currency).with_precision(18, 2),
            CustomField::new("probability", "Probability", FieldType::Percent)
                .with_range(Some(0.0), Some(100.0))
                .with_default(10),
            CustomField::new("closeDate", "Close Date", FieldType::Date),
            CustomField::new("accountId", "Account", FieldType::Lookup)
                .with_relationship(Relationship::new("Account").with_relationship_name("Deals")),
            CustomField::new("contactId", "Primary Contact", FieldType::Lookup).with_lookup("Contact"),
            CustomField::new("lostReason", "Lost Reason", FieldType::TextArea).with_visible_if(vec![
                ConditionExpr::new("stage", Operator::Equal, "Closed Lost"),
            ]),
            CustomField::new("expectedRevenue", "Expected Revenue", FieldType::Formula)
                .with_formula("ROUND(amount * probability / 100, 2)"),
            CustomField::new("competitors", "Competitors", FieldType::MultiPicklist)
                .with_picklist_values(["Acme", "Globex", "Initech"]),
        ],
    )?;

    obj.add_layout(
        PageLayout::new("Deal-default", "Default Layout")
            .as_default()
            .with_tab(
                LayoutTab::new("Deal-details", "Details")
                    .with_section(section(
                        "Deal-info",
                        "Deal Information",
                        2,
                        &["dealName", "stage", "amount", "probability", "closeDate", "expectedRevenue"],
                    ))
                    .with_section(section(
                        "Deal-parties",
                        "Parties",
                        2,
                        &["accountId", "contactId"],
                    ))
                    .with_section(section(
                        "Deal-outcome",
                        "Outcome",
                        1,
                        &["lostReason", "competitors"],
                    )),
            ),
    )?;
    obj.add_layout(
        PageLayout::new("Deal-renewal", "Renewal Layout").with_tab(
            LayoutTab::new("Deal-renewal-details", "Renewal").with_section(section(
                "Deal-renewal-info",
                "Renewal",
                1,
                &["dealName", "accountId", "amount", "closeDate"],
            )),
        ),
    )?;
    obj.add_layout(
        PageLayout::new("Deal-create", "Quick Create")
            .with_type(LayoutType::Create)
            .with_tab(LayoutTab::new("Deal-create-main", "New Deal").with_section(section(
                "Deal-create-info",
                "Deal",
                1,
                &["dealName", "stage", "amount"],
            ))),
    )?;

    obj.add_record_type(RecordType::new("Deal-new-business", "New Business").with_layout("Deal-default"))?;
    obj.add_record_type(RecordType::new("Deal-renewal", "Renewal").with_layout("Deal-renewal"))?;

    obj.add_validation_rule(
        ValidationRule::new("amount_not_negative", "amount < 0", "Amount cannot be negative")
            .on_field("amount"),
    )?;
    obj.add_validation_rule(
        ValidationRule::new(
            "lost_reason_required",
            r#"stage == "Closed Lost" && ISBLANK(lostReason)"#,
            "Enter a reason when closing a deal as lost",
        )
        .on_field("lostReason"),
    )?;
    Ok(obj)
}

/// Lead object
fn create_lead() -> SchemaResult<CustomObject> {
    let mut obj = CustomObject::new("Lead", "Lead");
    add_fields(
        &mut obj,
        vec![
            CustomField::new("firstName", "First Name", FieldType::Text),
            CustomField::new("lastName", "Last Name", FieldType::Text).required(),
            CustomField::new("company", "Company", FieldType::Text).required(),
            CustomField::new("email", "Email", FieldType::Email),
            CustomField::new("status", "Status", FieldType::Picklist)
                .required()
                .with_picklist_values(["Open", "Working", "Converted", "Unqualified"])
                .with_default("Open"),
            CustomField::new("rating", "Rating", FieldType::Picklist)
                .with_picklist_values(["Hot", "Warm", "Cold"]),
            CustomField::new("unqualifiedReason", "Unqualified Reason", FieldType::Text).with_visible_if(
                vec![ConditionExpr::new("status", Operator::Equal, "Unqualified")],
            ),
            CustomField::new("leadSource", "Lead Source", FieldType::Picklist)
                .with_picklist_values(["Web", "Referral", "Event", "Partner"]),
        ],
    )?;

    obj.add_layout(
        PageLayout::new("Lead-default", "Default Layout")
            .as_default()
            .with_tab(LayoutTab::new("Lead-details", "Details").with_section(section(
                "Lead-info",
                "Lead Information",
                2,
                &["firstName", "lastName", "company", "email", "status", "rating", "unqualifiedReason", "leadSource"],
            ))),
    )?;
    Ok(obj)
}

/// Property object, listing real estate owned by a contact
fn create_property() -> SchemaResult<CustomObject> {
    let mut obj = CustomObject::new("Property", "Property").with_plural_label("Properties");
    add_fields(
        &mut obj,
        vec![
            CustomField::new("name", "Property Name", FieldType::Text).required(),
            CustomField::new("address", "Address", FieldType::Address),
            CustomField::new("location", "Location", FieldType::Geolocation),
            CustomField::new("price", "Price", FieldType::Currency)
                .with_precision(18, 2)
                .with_range(Some(0.0), None),
            CustomField::new("bedrooms", "Bedrooms", FieldType::Number).with_precision(3, 0),
            CustomField::new("features", "Features", FieldType::MultiPicklist)
                .with_picklist_values(["Garage", "Pool", "Garden", "Fireplace"]),
            CustomField::new("listedOn", "Listed On", FieldType::DateTime),
            CustomField::new("ownerId", "Owner", FieldType::Lookup).with_lookup("Contact"),
        ],
    )?;

    obj.add_layout(
        PageLayout::new("Property-default", "Default Layout")
            .as_default()
            .with_tab(
                LayoutTab::new("Property-details", "Details")
                    .with_section(section(
                        "Property-info",
                        "Property",
                        3,
                        &["name", "price", "bedrooms", "features", "listedOn", "ownerId"],
                    )),
            )
            .with_tab(LayoutTab::new("Property-where", "Location").with_section(section(
                "Property-map",
                "Map",
                1,
                &["address", "location"],
            ))),
    )?;
    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_schema_builds() {
        let schema = create_standard_schema().unwrap();
        let names: Vec<_> = schema.objects().map(|o| o.api_name.as_str()).collect();
        assert_eq!(names, vec!["Account", "Contact", "Deal", "Lead", "Property"]);
    }

    #[test]
    fn test_every_lookup_targets_a_known_object() {
        let schema = create_standard_schema().unwrap();
        for object in schema.objects() {
            for field in object.fields.iter().filter(|f| f.field_type.is_reference()) {
                let target = field.lookup_object().unwrap();
                assert!(schema.object(target).is_some(), "{} -> {}", field.api_name, target);
            }
        }
    }

    #[test]
    fn test_section_helper_reading_order() {
        let s = section("s", "S", 2, &["a", "b", "c"]);
        let placed: Vec<_> = s.fields.iter().map(|f| (f.column, f.order)).collect();
        assert_eq!(placed, vec![(0, 0), (1, 1), (0, 2)]);
    }
}
