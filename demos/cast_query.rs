//! Query filter and update casting example.
//!
//! Casts MongoDB-style filters and update expressions against a schema,
//! converting operands to the declared types of the fields they target.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p schema-cast-demos --example cast_query
//! ```

use schema_cast_core::{
    CoercionRegistry, CompileOptions, FilterCaster, UpdateCaster, UpdateOptions,
    compile_definition,
};
use serde_json::{Value, json};

fn main() {
    let index = compile_definition(
        &json!({
            "name": { "first": "String", "last": "String" },
            "born": "Number",
            "tags": ["String"],
            "albums": [{ "title": "String", "year": "Number" }],
        }),
        &CoercionRegistry::default(),
        &CompileOptions::default(),
    )
    .unwrap();

    let filters = [
        json!({ "born": { "$gte": "1960", "$lt": "1970" } }),
        json!({ "_id": { "$in": ["5f0c4b9e8d1a2b3c4d5e6f70"] }, "name.first": 5 }),
        json!({ "$or": [{ "tags": 1 }, { "albums.year": "1987" }] }),
        json!({ "albums": { "$elemMatch": { "year": { "$gt": "1990" } } } }),
        json!({ "tags": { "$size": "2" }, "born": { "$exists": 1 } }),
        json!({ "born": { "$in": ["1962", "later"] } }),
    ];

    let caster = FilterCaster::new(&index);
    println!("Filters:");
    for filter in filters {
        let before = filter.to_string();
        let mut filter = filter;
        match caster.cast(&mut filter) {
            Ok(()) => println!("  {before}\n    -> {filter}"),
            Err(err) => println!("  {before}\n    !! {err}"),
        }
    }
    println!();

    let updates: [(Value, bool); 5] = [
        (json!({ "born": "1962", "unknown": true }), false),
        (json!({ "born": "1962" }), true),
        (json!({ "$inc": { "born": "1" }, "$push": { "tags": { "$each": [1, 2] } } }), false),
        (json!({ "$set": { "albums.$.year": "1991" }, "$pop": { "tags": "-1" } }), false),
        (json!({ "$set": { "born": 1 }, "name": "mixed" }), false),
    ];

    println!("Updates:");
    for (update, overwrite) in updates {
        let before = update.to_string();
        let caster = UpdateCaster::with_options(&index, UpdateOptions { overwrite });
        match caster.cast(update) {
            Ok(cast) => println!("  {before} (overwrite: {overwrite})\n    -> {cast}"),
            Err(err) => println!("  {before}\n    !! {err}"),
        }
    }
}
