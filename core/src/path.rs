//! Schema and instance path construction.
//!
//! Every position in a value tree has two dotted paths:
//!
//! - the **schema key**, used to look the position up in a
//!   [`SchemaIndex`](crate::SchemaIndex), where each array level collapses to
//!   the [`WILDCARD`] segment (`names.$.first`);
//! - the **instance key**, which keeps literal array indices
//!   (`names.3.first`) and is only used to report where a failure happened.

/// Segment standing in for "any array element" in schema keys.
pub const WILDCARD: &str = "$";

/// One step from a parent position to a child position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// A named object field.
    Key(&'a str),
    /// A position inside an array.
    Index(usize),
}

impl<'a> From<&'a str> for Segment<'a> {
    fn from(key: &'a str) -> Self {
        Segment::Key(key)
    }
}

impl From<usize> for Segment<'_> {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

/// Extends a schema key by one segment; array indices become [`WILDCARD`].
///
/// # Examples
///
/// ```
/// use schema_cast_core::{Segment, schema_key};
///
/// assert_eq!(schema_key("", Segment::Key("names")), "names");
/// assert_eq!(schema_key("names", Segment::Index(3)), "names.$");
/// assert_eq!(schema_key("names.$", Segment::Key("first")), "names.$.first");
/// ```
pub fn schema_key(prefix: &str, segment: Segment<'_>) -> String {
    match segment {
        Segment::Key(key) => join(prefix, key),
        Segment::Index(_) => join(prefix, WILDCARD),
    }
}

/// Extends an instance key by one segment, keeping literal indices.
///
/// # Examples
///
/// ```
/// use schema_cast_core::{Segment, instance_key};
///
/// assert_eq!(instance_key("names", Segment::Index(3)), "names.3");
/// assert_eq!(instance_key("", Segment::Key("born")), "born");
/// ```
pub fn instance_key(prefix: &str, segment: Segment<'_>) -> String {
    match segment {
        Segment::Key(key) => join(prefix, key),
        Segment::Index(index) => join(prefix, &index.to_string()),
    }
}

/// Returns `true` if a dotted-path segment addresses array elements rather
/// than a named field: a numeric index, the positional operator `$`, or the
/// all/filtered positional operators `$[]` and `$[name]`.
pub fn is_positional(segment: &str) -> bool {
    if segment == WILDCARD {
        return true;
    }
    if segment.starts_with("$[") && segment.ends_with(']') {
        return true;
    }
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// The paired schema and instance key of one position in a value tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    schema: String,
    instance: String,
}

impl FieldPath {
    /// The root of a value tree (both keys empty).
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a dotted instance path, collapsing positional segments in the
    /// schema key.
    ///
    /// # Examples
    ///
    /// ```
    /// use schema_cast_core::FieldPath;
    ///
    /// let path = FieldPath::parse("names.0.first");
    /// assert_eq!(path.schema_key(), "names.$.first");
    /// assert_eq!(path.instance_key(), "names.0.first");
    /// ```
    pub fn parse(dotted: &str) -> Self {
        let mut path = Self::root();
        for segment in dotted.split('.').filter(|s| !s.is_empty()) {
            path = if is_positional(segment) {
                path.push_positional(segment)
            } else {
                path.child(Segment::Key(segment))
            };
        }
        path
    }

    /// Returns `true` for the root position.
    pub fn is_root(&self) -> bool {
        self.instance.is_empty() && self.schema.is_empty()
    }

    /// Key used for schema lookups.
    pub fn schema_key(&self) -> &str {
        &self.schema
    }

    /// Key used for error reporting.
    pub fn instance_key(&self) -> &str {
        &self.instance
    }

    /// The position one segment below this one.
    pub fn child(&self, segment: Segment<'_>) -> Self {
        Self {
            schema: schema_key(&self.schema, segment),
            instance: instance_key(&self.instance, segment),
        }
    }

    /// The "any element" position of the array at this path, used where no
    /// concrete index exists (`$elemMatch`, `$push`).
    pub fn element(&self) -> Self {
        Self {
            schema: join(&self.schema, WILDCARD),
            instance: join(&self.instance, WILDCARD),
        }
    }

    /// Descends through a positional segment, keeping its literal text in
    /// the instance key.
    pub(crate) fn push_positional(&self, segment: &str) -> Self {
        Self {
            schema: join(&self.schema, WILDCARD),
            instance: join(&self.instance, segment),
        }
    }

    /// Descends into an array element implied by dotted-path traversal; the
    /// instance key is unchanged because no segment was written.
    pub(crate) fn implicit_element(&self) -> Self {
        Self {
            schema: join(&self.schema, WILDCARD),
            instance: self.instance.clone(),
        }
    }
}
