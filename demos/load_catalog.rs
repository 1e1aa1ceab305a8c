//! Catalog loading example.
//!
//! Writes a few definition files, loads them as a catalog, seals them into
//! a bundle, and drives casting from a YAML configuration file.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p schema-cast-demos --example load_catalog
//! ```
//!
//! This example creates temporary files to demonstrate the API.

use schema_cast_catalog::{CastingConfig, SchemaBundle, SchemaCatalog, read_definition};
use schema_cast_core::{DocumentCaster, FilterCaster};
use serde_json::json;

fn main() {
    let dir = std::env::temp_dir().join("schema_cast_demo_catalog");
    let schemas = dir.join("schemas");
    std::fs::create_dir_all(&schemas).unwrap();

    std::fs::write(
        schemas.join("bands.json"),
        serde_json::to_string_pretty(&json!({
            "name": "String",
            "founded": "Number",
            "members": ["ObjectId"],
        }))
        .unwrap(),
    )
    .unwrap();
    std::fs::write(
        schemas.join("people.yaml"),
        "name:\n  first: String\n  last: String\nborn: Number\n",
    )
    .unwrap();

    // Load the directory
    let start = std::time::Instant::now();
    let catalog = SchemaCatalog::from_dir(&schemas).unwrap();
    println!(
        "Loaded {} collections in {:.2?}: {:?}",
        catalog.len(),
        start.elapsed(),
        catalog.collections()
    );

    let mut filter = json!({ "founded": { "$lte": "1990" } });
    FilterCaster::new(catalog.index("bands").unwrap())
        .cast(&mut filter)
        .unwrap();
    println!("  bands filter: {filter}");
    println!();

    // Seal the same definitions into a bundle
    let mut bundle = SchemaBundle::new("1.0.0", chrono::Utc::now().to_rfc3339());
    bundle.name = Some("music".into());
    for name in catalog.collections() {
        let ext = if name == "people" { "yaml" } else { "json" };
        let definition = read_definition(schemas.join(format!("{name}.{ext}"))).unwrap();
        bundle.insert(name, definition);
    }
    bundle.seal().unwrap();
    let bundle_path = dir.join("schemas.json");
    bundle.save(&bundle_path).unwrap();
    println!(
        "Bundle hash: {}",
        bundle.bundle_hash.as_deref().unwrap_or_default()
    );

    // A tampered bundle is rejected
    let mut tampered = bundle.clone();
    tampered
        .collections
        .insert("bands".into(), json!({ "founded": "String" }));
    let tampered_path = dir.join("tampered.json");
    tampered.save(&tampered_path).unwrap();
    match SchemaCatalog::from_bundle(&tampered_path) {
        Ok(_) => println!("  tampered bundle loaded (unexpected)"),
        Err(err) => println!("  tampered bundle: {err}"),
    }
    println!();

    // Configuration-driven loading with a fallback chain
    let config_path = dir.join("schema-cast.yml");
    std::fs::write(
        &config_path,
        r#"version: "1.0"
sources:
  - bundle: tampered.json
  - bundle: schemas.json
document:
  policy: accumulate
update:
  overwrite: false
"#,
    )
    .unwrap();
    let config = CastingConfig::load(&config_path).unwrap();
    let catalog = config.catalog().unwrap();
    println!("Config catalog source: {:?}", catalog.source());

    let people = catalog.index("people").unwrap();
    let outcome = DocumentCaster::with_options(people, config.document_options())
        .cast(json!({ "name": { "first": "Axl", "last": 1 }, "born": "1962" }));
    println!("  people document: {}", outcome.value);

    std::fs::remove_dir_all(&dir).ok();
}
