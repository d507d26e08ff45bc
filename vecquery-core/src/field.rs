//! Output field selection tree.

use crate::error::{QueryError, QueryResult};
use crate::graphql;

/// Name of the metadata namespace in every result object.
pub const ADDITIONAL: &str = "_additional";

const FRAGMENT_PREFIX: &str = "... on ";

/// One node of the output projection.
///
/// Leaves name a property; nodes with children select a nested structure
/// such as `_additional { group { hits { question } } }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSelector {
    pub name: String,
    pub fields: Vec<FieldSelector>,
}

impl FieldSelector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// `_additional` with the given children.
    pub fn additional<I>(fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldSelector>,
    {
        Self::new(ADDITIONAL).with_fields(fields)
    }

    /// Inline fragment `... on Class { .. }` for cross-reference properties.
    pub fn fragment<I>(class: &str, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldSelector>,
    {
        Self::new(format!("{}{}", FRAGMENT_PREFIX, class)).with_fields(fields)
    }

    /// Append nested selectors.
    pub fn with_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldSelector>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn is_additional(&self) -> bool {
        self.name == ADDITIONAL
    }

    /// Fragments select fields of one possible type; the server does not
    /// return a key for them.
    pub fn is_fragment(&self) -> bool {
        self.name.starts_with(FRAGMENT_PREFIX)
    }

    /// Direct child by name.
    pub fn child(&self, name: &str) -> Option<&FieldSelector> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Render as a GraphQL selection, e.g. `_additional{distance}`.
    pub fn render(&self) -> String {
        if self.is_leaf() {
            self.name.clone()
        } else {
            format!("{}{{{}}}", self.name, render_selection(&self.fields))
        }
    }

    pub(crate) fn validate(&self) -> QueryResult<()> {
        if let Some(class) = self.name.strip_prefix(FRAGMENT_PREFIX) {
            if !graphql::is_name(class) {
                return Err(QueryError::invalid(
                    "fields",
                    format!("invalid fragment type in {:?}", self.name),
                ));
            }
            if self.is_leaf() {
                return Err(QueryError::invalid("fields", "fragment must select fields"));
            }
            return self.fields.iter().try_for_each(FieldSelector::validate);
        }
        if self.name.trim().is_empty() {
            return Err(QueryError::invalid("fields", "field name must not be empty"));
        }
        if !graphql::is_name(&self.name) {
            return Err(QueryError::invalid(
                "fields",
                format!("field name {:?} is not a valid GraphQL name", self.name),
            ));
        }
        self.fields.iter().try_for_each(FieldSelector::validate)
    }
}

impl From<&str> for FieldSelector {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FieldSelector {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Render a list of selectors separated by single spaces.
pub fn render_selection(fields: &[FieldSelector]) -> String {
    fields
        .iter()
        .map(FieldSelector::render)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find a selector by name in a list.
pub fn find<'a>(fields: &'a [FieldSelector], name: &str) -> Option<&'a FieldSelector> {
    fields.iter().find(|f| f.name == name)
}
