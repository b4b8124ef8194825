use crmrust::expr::ExpressionEngine;
use crmrust::layout::RecordLayoutRef;
use crmrust::record::{MemoryStore, RecordService, RecordStore};
use crmrust::render::{RenderMode, RenderedView, Renderer};
use crmrust::schema::create_standard_schema;
use crmrust::RenderConfig;
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== CRM Core Demo ===\n");

    let schema = create_standard_schema()?;
    println!("--- Schema ---");
    for object in schema.active_objects() {
        println!(
            "{} ({} fields, {} layouts)",
            object.api_name,
            object.active_fields().count(),
            object.active_layouts().count()
        );
    }
    println!();

    let store = MemoryStore::new(schema);
    let engine = ExpressionEngine::new();
    let service = RecordService::new(&store, &engine);

    // Validation errors come back together
    println!("--- Creating an empty Deal ---");
    let empty = serde_json::Map::new();
    match service.create("Deal", &empty, RecordLayoutRef::new(), "demo-user") {
        Ok(record) => println!("Unexpectedly created {}", record.id),
        Err(e) => {
            for error in e.validation_errors() {
                println!("  {} ({}): {}", error.field, error.reason, error.message);
            }
        }
    }
    println!();

    println!("--- Creating records ---");
    let account = service.create(
        "Account",
        &object(json!({ "accountName": "Acme Corp", "industry": "Technology" })),
        RecordLayoutRef::new(),
        "demo-user",
    )?;
    println!("Account {} (#{})", account.id, account.record_number);

    let deal = service.create(
        "Deal",
        &object(json!({
            "dealName": "Acme Expansion",
            "amount": "125000",
            "probability": 40,
            "closeDate": "2026-12-31",
            "accountId": account.id,
            "competitors": ["Globex", "Initech"],
        })),
        RecordLayoutRef::new(),
        "demo-user",
    )?;
    println!("Deal {} (#{})", deal.id, deal.record_number);

    let deal = service.update(
        &deal.id,
        &object(json!({ "stage": "Closed Lost", "lostReason": "Budget cut" })),
        Some(deal.version),
        "demo-user",
    )?;
    println!("Deal updated to version {}\n", deal.version);

    println!("--- Rendering the Deal ---");
    let object = store.find_object_by_api_name("Deal")?;
    let config = RenderConfig::default();
    let view = Renderer::new(&engine, &config)
        .with_lookups(&store)
        .render_record(&object, &deal, RenderMode::Detail);
    print_view(&view);

    Ok(())
}

fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

fn print_view(view: &RenderedView) {
    match view {
        RenderedView::Layout {
            layout_name, tabs, ..
        } => {
            println!("Layout: {}", layout_name);
            for tab in tabs {
                println!("[{}]", tab.label);
                for section in &tab.sections {
                    println!("  {} ({} columns)", section.label, section.columns);
                    for row in &section.rows {
                        let cells: Vec<String> = row
                            .iter()
                            .map(|cell| match cell {
                                Some(field) => match &field.link {
                                    Some(link) => format!("{}: {} <{}>", field.label, field.display, link),
                                    None => format!("{}: {}", field.label, field.display),
                                },
                                None => String::new(),
                            })
                            .collect();
                        println!("    {}", cells.join(" | "));
                    }
                }
            }
        }
        RenderedView::Unconfigured { fields } => {
            println!("No layout configured");
            for field in fields {
                println!("  {}: {}", field.label, field.display);
            }
        }
    }
}
