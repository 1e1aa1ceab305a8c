use schema_cast_core::{
    CastError, CoercionRegistry, CompileOptions, SchemaIndex, UpdateOptions, cast_document,
    cast_filter, cast_update, compile_definition,
};
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn compile(definition: Value) -> SchemaIndex {
    compile_definition(&definition, &CoercionRegistry::default(), &CompileOptions::default())
        .unwrap()
}

fn oid(hex: &str) -> Value {
    json!({ "$oid": hex })
}

fn person_schema() -> SchemaIndex {
    compile(json!({
        "_id": { "$type": "ObjectId" },
        "name": { "$type": "String" },
        "born": { "$type": "Number" },
    }))
}

fn full_name_schema() -> SchemaIndex {
    compile(json!({
        "name": {
            "first": { "$type": "String" },
            "last": { "$type": "String" },
        }
    }))
}

fn query_schema() -> SchemaIndex {
    compile(json!({
        "_id": "ObjectId",
        "test": "Number",
        "tags": "String",
    }))
}

// ---------------------------------------------------------------------------
// Document casting
// ---------------------------------------------------------------------------

#[test]
fn test_document_prunes_undeclared_paths() {
    let index = compile(json!({ "name": { "$type": "String" } }));
    let mut doc = json!({ "name": "Axl Rose", "role": "Lead Singer" });
    assert!(cast_document(&mut doc, &index).is_none());
    assert_eq!(doc, json!({ "name": "Axl Rose" }));
}

#[test]
fn test_document_casts_declared_types() {
    let mut doc = json!({ "_id": "000000000000000000000001", "born": "1962" });
    assert!(cast_document(&mut doc, &person_schema()).is_none());
    assert_eq!(
        doc,
        json!({ "_id": oid("000000000000000000000001"), "born": 1962 })
    );
}

#[test]
fn test_document_casts_into_arrays() {
    let index = compile(json!({ "members": [{ "$type": "ObjectId" }] }));
    let expected = json!({ "members": [oid("000000000000000000000001")] });

    let mut doc = json!({ "members": "000000000000000000000001" });
    assert!(cast_document(&mut doc, &index).is_none());
    assert_eq!(doc, expected);

    let mut doc = json!({ "members": ["000000000000000000000001"] });
    assert!(cast_document(&mut doc, &index).is_none());
    assert_eq!(doc, expected);

    let mut doc = expected.clone();
    assert!(cast_document(&mut doc, &index).is_none());
    assert_eq!(doc, expected);
}

#[test]
fn test_document_casts_deeply_nested_arrays() {
    let index = compile(json!({ "points": [[{ "$type": "Number" }]] }));

    let mut doc = json!({ "points": 1 });
    assert!(cast_document(&mut doc, &index).is_none());
    assert_eq!(doc, json!({ "points": [[1]] }));

    let mut doc = json!({ "points": [[1]] });
    assert!(cast_document(&mut doc, &index).is_none());
    assert_eq!(doc, json!({ "points": [[1]] }));
}

#[test]
fn test_document_reports_scalar_for_object() {
    let index = full_name_schema();

    let mut doc = json!({ "name": "Axl Rose" });
    let errors = cast_document(&mut doc, &index).unwrap();
    assert_eq!(errors.paths().collect::<Vec<_>>(), vec!["name"]);
    assert_eq!(
        errors.get("name").unwrap().to_string(),
        "Could not cast 'Axl Rose' to Object"
    );
    assert_eq!(doc, json!({ "name": "Axl Rose" }));

    let mut doc = json!({ "name": { "first": "Axl", "last": "Rose" } });
    assert!(cast_document(&mut doc, &index).is_none());
}

#[test]
fn test_document_ignores_untyped_paths() {
    let index = compile(json!({
        "members": { "$lookUp": { "ref": "Test" } },
        "tags": { "$type": "Array" },
    }));

    let mut doc = json!({ "members": { "x": 1 }, "tags": [1] });
    assert!(cast_document(&mut doc, &index).is_none());
    assert_eq!(doc, json!({ "members": { "x": 1 }, "tags": [1] }));
}

#[test]
fn test_document_reports_array_of_objects_mismatch() {
    let index = compile(json!({
        "names": [{
            "first": { "$type": "String" },
            "last": { "$type": "String" },
        }]
    }));

    let mut doc = json!({ "names": ["Axl Rose"] });
    let errors = cast_document(&mut doc, &index).unwrap();
    assert_eq!(errors.paths().collect::<Vec<_>>(), vec!["names.0"]);
    assert_eq!(
        errors.get("names.0").unwrap().to_string(),
        "Could not cast 'Axl Rose' to Object"
    );
    assert_eq!(doc, json!({ "names": ["Axl Rose"] }));

    let mut doc = json!({ "names": [["Axl Rose"]] });
    let errors = cast_document(&mut doc, &index).unwrap();
    assert_eq!(errors.paths().collect::<Vec<_>>(), vec!["names.0"]);
    assert_eq!(
        errors.get("names.0").unwrap().to_string(),
        "Could not cast [ 'Axl Rose' ] to Object"
    );

    let mut doc = json!({ "names": [{ "first": "Axl", "last": "Rose" }] });
    assert!(cast_document(&mut doc, &index).is_none());
}

#[test]
fn test_document_removes_null_objects() {
    let mut doc = json!({ "_id": oid("000000000000000000000001"), "name": null });
    assert!(cast_document(&mut doc, &full_name_schema()).is_none());
    assert_eq!(doc, json!({ "_id": oid("000000000000000000000001") }));
}

#[test]
fn test_document_casts_nested_sets() {
    let index = full_name_schema();

    let mut doc = json!({ "name": { "first": "Axl", "last": "Rose", "band": "Guns N' Roses" }, "other": "abc" });
    assert!(cast_document(&mut doc, &index).is_none());
    assert_eq!(doc, json!({ "name": { "first": "Axl", "last": "Rose" } }));

    let mut doc = json!({ "name": { "first": "Axl", "last": 123, "nested": { "x": 1 } } });
    assert!(cast_document(&mut doc, &index).is_none());
    assert_eq!(doc, json!({ "name": { "first": "Axl", "last": "123" } }));
}

#[test]
fn test_document_accumulates_across_subtrees() {
    let index = compile(json!({
        "born": "Number",
        "names": [{ "first": "String", "age": "Number" }],
        "points": [["Number"]],
    }));
    let mut doc = json!({
        "born": "soon",
        "names": [{ "first": "Axl", "age": "old" }, "Slash"],
        "points": [[1, "x"]],
    });

    let errors = cast_document(&mut doc, &index).unwrap();
    assert_eq!(
        errors.paths().collect::<Vec<_>>(),
        vec!["born", "names.0.age", "names.1", "points.0.1"]
    );
    assert_eq!(
        errors.to_string(),
        "born: Could not cast 'soon' to Number, \
         names.0.age: Could not cast 'old' to Number, \
         names.1: Could not cast 'Slash' to Object, \
         points.0.1: Could not cast 'x' to Number"
    );
}

// ---------------------------------------------------------------------------
// Filter casting
// ---------------------------------------------------------------------------

#[test]
fn test_filter_element_selectors() {
    let mut filter = json!({ "_id": { "$type": "7" }, "test": { "$exists": 1 } });
    cast_filter(&mut filter, &query_schema()).unwrap();
    assert_eq!(filter, json!({ "_id": { "$type": 7 }, "test": { "$exists": true } }));
}

#[test]
fn test_filter_comparison_and_array_selectors() {
    let mut filter = json!({
        "_id": "000000000000000000000001",
        "test": { "$not": { "$eq": "123" } },
        "tags": { "$in": [123] },
    });
    cast_filter(&mut filter, &query_schema()).unwrap();
    assert_eq!(
        filter,
        json!({
            "_id": oid("000000000000000000000001"),
            "test": { "$not": { "$eq": 123 } },
            "tags": { "$in": ["123"] },
        })
    );
}

#[test]
fn test_filter_fails_on_uncastable_literal() {
    let mut filter = json!({ "test": "not a number" });
    let err = cast_filter(&mut filter, &query_schema()).unwrap_err();
    assert!(matches!(err, CastError::TypeMismatch { .. }));
    assert!(err.to_string().contains("Could not cast 'not a number' to Number"));
}

#[test]
fn test_filter_logical_operators() {
    let mut filter = json!({
        "$or": [{ "_id": "000000000000000000000001" }, { "tags": { "$in": [123] } }]
    });
    cast_filter(&mut filter, &query_schema()).unwrap();
    assert_eq!(
        filter,
        json!({
            "$or": [
                { "_id": oid("000000000000000000000001") },
                { "tags": { "$in": ["123"] } },
            ]
        })
    );

    let mut filter = json!({ "$or": { "test": "1" } });
    cast_filter(&mut filter, &query_schema()).unwrap();
    assert_eq!(filter, json!({ "$or": [{ "test": 1 }] }));
}

#[test]
fn test_filter_passthrough_operators_unchanged() {
    for filter in [
        json!({ "$where": "this._id = 3" }),
        json!({ "test": { "$near": { "$geometry": { "type": "Point", "coordinates": ["1", 2] } } } }),
        json!({ "$text": { "$search": "guns" } }),
        json!({ "test": { "$geoIntersects": "x" } }),
    ] {
        let mut cast = filter.clone();
        cast_filter(&mut cast, &query_schema()).unwrap();
        assert_eq!(cast, filter);
    }
}

#[test]
fn test_filter_nor_casts_each_branch() {
    let mut filter = json!({ "$nor": [{ "test": "1" }, { "tags": 2 }] });
    cast_filter(&mut filter, &query_schema()).unwrap();
    assert_eq!(filter, json!({ "$nor": [{ "test": 1 }, { "tags": "2" }] }));

    let mut filter = json!({ "$nor": [{ "test": "one" }] });
    let err = cast_filter(&mut filter, &query_schema()).unwrap_err();
    assert_eq!(err.to_string(), "Could not cast 'one' to Number");
}

#[test]
fn test_filter_geo_and_unknown_operators_on_containers_unchanged() {
    let schema = compile(json!({
        "loc": ["Number"],
        "venue": { "city": "String" },
        "members": [{ "name": "String" }],
    }));
    for filter in [
        json!({ "loc": { "$nearSphere": [1, "2"], "$maxDistance": "10" } }),
        json!({ "loc": { "$bitsAnySet": "3" } }),
        json!({ "venue": { "$foo": { "city": 1 } } }),
        json!({ "members": { "$bar": [1] } }),
    ] {
        let mut cast = filter.clone();
        cast_filter(&mut cast, &schema).unwrap();
        assert_eq!(cast, filter);
    }
}

#[test]
fn test_filter_keeps_unknown_fields() {
    let mut filter = json!({ "role": "singer", "test": "5" });
    cast_filter(&mut filter, &query_schema()).unwrap();
    assert_eq!(filter, json!({ "role": "singer", "test": 5 }));
}

// ---------------------------------------------------------------------------
// Update casting
// ---------------------------------------------------------------------------

fn update_schema() -> SchemaIndex {
    compile(json!({ "test": "Number", "tags": "String", "name": { "first": "String" } }))
}

#[test]
fn test_update_operator_form() {
    let update = cast_update(
        json!({ "$set": { "tags": 123 }, "$inc": { "test": "1" } }),
        &update_schema(),
        &UpdateOptions::default(),
    )
    .unwrap();
    assert_eq!(update, json!({ "$set": { "tags": "123" }, "$inc": { "test": 1 } }));
}

#[test]
fn test_update_field_form() {
    let index = update_schema();
    let update = cast_update(json!({ "test": "1" }), &index, &UpdateOptions::default()).unwrap();
    assert_eq!(update, json!({ "$set": { "test": 1 } }));

    let update =
        cast_update(json!({ "test": "1" }), &index, &UpdateOptions { overwrite: true }).unwrap();
    assert_eq!(update, json!({ "test": 1 }));

    let err = cast_update(json!({ "test": "not a number" }), &index, &UpdateOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("Could not cast 'not a number' to Number"));
}

#[test]
fn test_update_rejects_mixed_keys() {
    let err = cast_update(
        json!({ "$set": { "a": 1 }, "b": 2 }),
        &update_schema(),
        &UpdateOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CastError::InvalidUpdateShape { .. }));
}

#[test]
fn test_update_dotted_set() {
    let update = cast_update(
        json!({ "$set": { "name.first": 5 } }),
        &update_schema(),
        &UpdateOptions::default(),
    )
    .unwrap();
    assert_eq!(update, json!({ "$set": { "name.first": "5" } }));
}

// ---------------------------------------------------------------------------
// Custom coercions
// ---------------------------------------------------------------------------

#[test]
fn test_custom_coercion_registered_by_name() {
    let mut registry = CoercionRegistry::default();
    registry.register_fn(
        "Cents",
        |v| v.is_i64(),
        |v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.parse::<f64>().ok()))
                .map(|f| json!((f * 100.0).round() as i64))
                .ok_or_else(|| CastError::type_mismatch(v, "Cents"))
        },
    );

    let index = compile_definition(
        &json!({ "price": "Cents" }),
        &registry,
        &CompileOptions::default(),
    )
    .unwrap();

    let mut doc = json!({ "price": "12.34" });
    assert!(cast_document(&mut doc, &index).is_none());
    assert_eq!(doc, json!({ "price": 1234 }));

    let mut filter = json!({ "price": { "$lt": 9.99 } });
    cast_filter(&mut filter, &index).unwrap();
    assert_eq!(filter, json!({ "price": { "$lt": 999 } }));
}
