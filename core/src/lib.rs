//! Schema-driven casting for documents, query filters and update expressions.
//!
//! A schema is compiled once into a [`SchemaIndex`], a flat map from
//! canonical dotted paths (array levels collapsed to `$`) to declared types.
//! Three casters then walk raw [`serde_json::Value`] trees against it:
//!
//! - [`DocumentCaster`] / [`cast_document`] prunes undeclared fields,
//!   promotes scalars assigned to arrays, and coerces every leaf, collecting
//!   every failure into a [`CastErrors`] aggregate.
//! - [`FilterCaster`] / [`cast_filter`] casts the literals of a query
//!   predicate, operator by operator, keeping unknown fields and failing on
//!   the first bad literal.
//! - [`UpdateCaster`] / [`cast_update`] casts update operands, rejects
//!   updates mixing operators and fields, and wraps replacement-shaped
//!   updates in `$set`.
//!
//! Leaf conversion is driven by a [`CoercionRegistry`] of named
//! [`Coercion`] rules, resolved while the schema is compiled.
//!
//! # Example
//!
//! ```
//! use schema_cast_core::*;
//! use serde_json::json;
//!
//! let index = compile_definition(
//!     &json!({
//!         "name": { "first": "String", "last": "String" },
//!         "born": "Number",
//!         "members": ["ObjectId"],
//!     }),
//!     &CoercionRegistry::default(),
//!     &CompileOptions::default(),
//! )
//! .unwrap();
//!
//! let mut doc = json!({
//!     "name": { "first": "Axl", "last": 123, "nested": { "x": 1 } },
//!     "born": "1962",
//!     "members": "000000000000000000000001",
//! });
//! assert!(cast_document(&mut doc, &index).is_none());
//! assert_eq!(doc, json!({
//!     "name": { "first": "Axl", "last": "123" },
//!     "born": 1962,
//!     "members": [{ "$oid": "000000000000000000000001" }],
//! }));
//!
//! let mut filter = json!({ "born": { "$gte": "1960" } });
//! cast_filter(&mut filter, &index).unwrap();
//! assert_eq!(filter, json!({ "born": { "$gte": 1960 } }));
//!
//! let update = cast_update(json!({ "born": "1963" }), &index, &UpdateOptions::default()).unwrap();
//! assert_eq!(update, json!({ "$set": { "born": 1963 } }));
//! ```

mod coerce;
mod definition;
mod document;
mod error;
mod filter;
mod inspect;
mod operator;
mod path;
mod types;
mod update;

pub use coerce::{
    ARRAY, BOOLEAN, Coercion, CoercionRegistry, DATE, NUMBER, OBJECT, OBJECT_ID, REGEXP, STRING,
    ScalarType, coerce,
};
pub use definition::{CompileOptions, ID_PATH, TYPE_KEY, compile_definition};
pub use document::{CastOutcome, DocumentCaster, DocumentOptions, ErrorPolicy, cast_document};
pub use error::{CastError, CastErrors, SchemaError};
pub use filter::{FilterCaster, cast_filter};
pub use inspect::inspect;
pub use operator::{
    ElementSelector, FilterOperator, UpdateOperator, filter_operator, is_operator, update_operator,
};
pub use path::{FieldPath, Segment, WILDCARD, instance_key, is_positional, schema_key};
pub use types::{DeclaredType, Lookup, PathEntry, SchemaIndex, SchemaIndexBuilder};
pub use update::{UpdateCaster, UpdateOptions, cast_update};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_casters_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SchemaIndex>();
        assert_send_sync::<CoercionRegistry>();
        assert_send_sync::<DocumentCaster<'static>>();
        assert_send_sync::<FilterCaster<'static>>();
        assert_send_sync::<UpdateCaster<'static>>();
    }

    #[test]
    fn test_index_shared_across_threads() {
        let index = compile_definition(
            &json!({ "born": "Number" }),
            &CoercionRegistry::default(),
            &CompileOptions::default(),
        )
        .unwrap();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let index = &index;
                    scope.spawn(move || {
                        let mut doc = json!({ "born": i.to_string() });
                        assert!(cast_document(&mut doc, index).is_none());
                        doc
                    })
                })
                .collect();
            for (i, handle) in handles.into_iter().enumerate() {
                assert_eq!(handle.join().unwrap(), json!({ "born": i }));
            }
        });
    }
}
