//! Query and update operator tables.

use crate::coerce::ScalarType;

/// Fixed operand type of an element selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementSelector {
    /// `$exists`, cast to `Boolean`.
    Exists,
    /// `$type`, cast to `Number`.
    Type,
    /// `$size`, cast to `Number`.
    Size,
    /// `$regex`, cast to `RegExp`.
    Regex,
}

impl ElementSelector {
    /// Type the operand is cast to, regardless of the field's type.
    pub fn operand_type(self) -> ScalarType {
        match self {
            ElementSelector::Exists => ScalarType::boolean(),
            ElementSelector::Type | ElementSelector::Size => ScalarType::number(),
            ElementSelector::Regex => ScalarType::regexp(),
        }
    }
}

/// Casting category of a query operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// `$or`, `$and`, `$nor`, `$all`: array of sub-filters at the same path.
    Logical,
    /// `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$not`: operand has the
    /// field's type.
    Comparison,
    /// `$in`, `$nin`: array of values of the field's type.
    Array,
    /// `$exists`, `$type`, `$size`, `$regex`: operand has a fixed type.
    Element(ElementSelector),
    /// `$elemMatch`: operand is matched against array elements.
    Container,
    /// Backend-specific operators whose operands are never cast.
    Ignored,
    /// Anything else; left untouched.
    Unknown,
}

static FILTER_OPERATORS: &[(&str, FilterOperator)] = &[
    ("$or", FilterOperator::Logical),
    ("$and", FilterOperator::Logical),
    ("$nor", FilterOperator::Logical),
    ("$all", FilterOperator::Logical),
    ("$eq", FilterOperator::Comparison),
    ("$ne", FilterOperator::Comparison),
    ("$gt", FilterOperator::Comparison),
    ("$gte", FilterOperator::Comparison),
    ("$lt", FilterOperator::Comparison),
    ("$lte", FilterOperator::Comparison),
    ("$not", FilterOperator::Comparison),
    ("$in", FilterOperator::Array),
    ("$nin", FilterOperator::Array),
    ("$exists", FilterOperator::Element(ElementSelector::Exists)),
    ("$type", FilterOperator::Element(ElementSelector::Type)),
    ("$size", FilterOperator::Element(ElementSelector::Size)),
    ("$regex", FilterOperator::Element(ElementSelector::Regex)),
    ("$elemMatch", FilterOperator::Container),
    ("$where", FilterOperator::Ignored),
    ("$geoWithin", FilterOperator::Ignored),
    ("$geoIntersects", FilterOperator::Ignored),
    ("$mod", FilterOperator::Ignored),
    ("$near", FilterOperator::Ignored),
    ("$nearSphere", FilterOperator::Ignored),
    ("$text", FilterOperator::Ignored),
    ("$expr", FilterOperator::Ignored),
    ("$jsonSchema", FilterOperator::Ignored),
    ("$comment", FilterOperator::Ignored),
];

/// Classifies a query operator by name.
///
/// # Examples
///
/// ```
/// use schema_cast_core::{ElementSelector, FilterOperator, filter_operator};
///
/// assert_eq!(filter_operator("$or"), FilterOperator::Logical);
/// assert_eq!(filter_operator("$exists"), FilterOperator::Element(ElementSelector::Exists));
/// assert_eq!(filter_operator("$where"), FilterOperator::Ignored);
/// assert_eq!(filter_operator("$bogus"), FilterOperator::Unknown);
/// ```
pub fn filter_operator(name: &str) -> FilterOperator {
    FILTER_OPERATORS
        .iter()
        .find(|(op, _)| *op == name)
        .map_or(FilterOperator::Unknown, |(_, category)| *category)
}

/// Casting category of an update operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    /// `$set`, `$setOnInsert`, `$inc`, `$mul`, `$min`, `$max`: field values.
    Fields,
    /// `$push`, `$addToSet`: array elements, optionally under `$each`.
    Append,
    /// `$pullAll`: arrays of elements.
    PullAll,
    /// `$pull`: element values or element conditions.
    Pull,
    /// `$pop`: `1` or `-1`.
    Pop,
    /// `$unset`, `$rename`, `$currentDate`: only the paths matter.
    PathsOnly,
    /// Anything else; passed through.
    Unknown,
}

static UPDATE_OPERATORS: &[(&str, UpdateOperator)] = &[
    ("$set", UpdateOperator::Fields),
    ("$setOnInsert", UpdateOperator::Fields),
    ("$inc", UpdateOperator::Fields),
    ("$mul", UpdateOperator::Fields),
    ("$min", UpdateOperator::Fields),
    ("$max", UpdateOperator::Fields),
    ("$push", UpdateOperator::Append),
    ("$addToSet", UpdateOperator::Append),
    ("$pullAll", UpdateOperator::PullAll),
    ("$pull", UpdateOperator::Pull),
    ("$pop", UpdateOperator::Pop),
    ("$unset", UpdateOperator::PathsOnly),
    ("$rename", UpdateOperator::PathsOnly),
    ("$currentDate", UpdateOperator::PathsOnly),
];

/// Classifies an update operator by name.
pub fn update_operator(name: &str) -> UpdateOperator {
    UPDATE_OPERATORS
        .iter()
        .find(|(op, _)| *op == name)
        .map_or(UpdateOperator::Unknown, |(_, category)| *category)
}

/// Returns `true` for keys written with the operator marker.
pub fn is_operator(key: &str) -> bool {
    key.starts_with('$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_table_has_no_duplicates() {
        let mut names: Vec<&str> = FILTER_OPERATORS.iter().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FILTER_OPERATORS.len());
    }

    #[test]
    fn test_element_selector_types() {
        assert_eq!(ElementSelector::Exists.operand_type().name(), "Boolean");
        assert_eq!(ElementSelector::Type.operand_type().name(), "Number");
        assert_eq!(ElementSelector::Size.operand_type().name(), "Number");
        assert_eq!(ElementSelector::Regex.operand_type().name(), "RegExp");
    }

    #[test]
    fn test_update_table() {
        assert_eq!(update_operator("$set"), UpdateOperator::Fields);
        assert_eq!(update_operator("$addToSet"), UpdateOperator::Append);
        assert_eq!(update_operator("$rename"), UpdateOperator::PathsOnly);
        assert_eq!(update_operator("$bit"), UpdateOperator::Unknown);
    }

    #[test]
    fn test_is_operator() {
        assert!(is_operator("$set"));
        assert!(!is_operator("name"));
    }
}
