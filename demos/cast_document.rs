//! Document casting example.
//!
//! Compiles a schema definition, casts a document with the accumulating
//! caster, and shows how every independent failure is reported at once.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p schema-cast-demos --example cast_document
//! ```

use schema_cast_core::{
    CoercionRegistry, CompileOptions, DocumentCaster, DocumentOptions, ErrorPolicy,
    compile_definition,
};
use serde_json::json;

fn main() {
    let definition = json!({
        "name": "String",
        "founded": "Number",
        "active": "Boolean",
        "formed": "Date",
        "members": [{ "name": { "first": "String", "last": "String" }, "born": "Number" }],
        "extra": { "$lookUp": "venues" },
    });
    let index = compile_definition(
        &definition,
        &CoercionRegistry::default(),
        &CompileOptions::default(),
    )
    .unwrap();

    println!("Compiled {} paths:", index.len());
    for (path, entry) in index.entries() {
        match &entry.declared_type {
            Some(ty) => println!("  {path:<24} {ty}"),
            None => println!("  {path:<24} (untyped)"),
        }
    }
    println!();

    // Leaves are converted, unknown keys dropped, a lone member promoted
    let outcome = DocumentCaster::new(&index).cast(json!({
        "_id": "5f0c4b9e8d1a2b3c4d5e6f70",
        "name": 1987,
        "founded": " 1985 ",
        "active": 1,
        "formed": "1985-03-01T00:00:00Z",
        "members": { "name": { "first": "Axl", "last": "Rose" }, "born": "1962" },
        "label": "Geffen",
        "extra": { "anything": ["goes"] },
    }));
    println!("Cast document:");
    println!("{}", serde_json::to_string_pretty(&outcome.value).unwrap());
    println!();

    // Every failing leaf is recorded, the rest of the document is still cast
    let outcome = DocumentCaster::new(&index).cast(json!({
        "founded": "soon",
        "members": [{ "born": "never" }, { "born": "1965" }],
        "formed": "yesterday",
    }));
    if let Some(errors) = &outcome.errors {
        println!("{} error(s):", errors.len());
        for (path, error) in errors.iter() {
            println!("  {path}: {error}");
        }
    }
    println!("  members.1.born = {}", outcome.value["members"][1]["born"]);
    println!();

    // Fail-fast stops at the first problem
    let options = DocumentOptions {
        policy: ErrorPolicy::FailFast,
        ..DocumentOptions::default()
    };
    let outcome = DocumentCaster::with_options(&index, options).cast(json!({
        "founded": "soon",
        "formed": "yesterday",
    }));
    println!("Fail-fast: {}", outcome.into_result().unwrap_err());
}
