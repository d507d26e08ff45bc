//! Search request model and its immutable builder.

use crate::error::{QueryError, QueryResult};
use crate::field::{self, FieldSelector};
use crate::filter::WhereFilter;
use crate::graphql;
use crate::near::{NearClause, NearObject, NearText, NearVector};

/// Query operation used for similarity searches.
pub const GET_OPERATION: &str = "Get";

/// Largest count accepted for limit/offset/autocut/groupBy (GraphQL `Int`).
pub const MAX_COUNT: i64 = i32::MAX as i64;

// ============================================================================
// GROUP BY
// ============================================================================

/// Server-side grouping of results by a property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBy {
    pub path: Vec<String>,
    pub groups: u32,
    pub objects_per_group: u32,
}

impl GroupBy {
    /// Counts are checked when the request is built.
    pub fn new<I, S>(path: I, groups: i64, objects_per_group: i64) -> GroupByArgs
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GroupByArgs {
            path: path.into_iter().map(Into::into).collect(),
            groups,
            objects_per_group,
        }
    }

    pub fn render(&self) -> String {
        format!(
            "groupBy:{{path:{} groups:{} objectsPerGroup:{}}}",
            graphql::quote_list(&self.path),
            self.groups,
            self.objects_per_group
        )
    }
}

/// Unvalidated group-by arguments as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupByArgs {
    pub path: Vec<String>,
    pub groups: i64,
    pub objects_per_group: i64,
}

impl GroupByArgs {
    fn validate(self) -> QueryResult<GroupBy> {
        if self.path.is_empty() || self.path.iter().any(|p| p.trim().is_empty()) {
            return Err(QueryError::invalid("group_by.path", "path must not be empty"));
        }
        let groups = positive("group_by.groups", self.groups)?;
        let objects_per_group = positive("group_by.objects_per_group", self.objects_per_group)?;
        Ok(GroupBy {
            path: self.path,
            groups,
            objects_per_group,
        })
    }
}

fn non_negative(field: &'static str, n: i64) -> QueryResult<u32> {
    if n < 0 {
        return Err(QueryError::invalid(field, format!("must be >= 0, got {}", n)));
    }
    if n > MAX_COUNT {
        return Err(QueryError::invalid(
            field,
            format!("must be <= {}, got {}", MAX_COUNT, n),
        ));
    }
    Ok(n as u32)
}

fn positive(field: &'static str, n: i64) -> QueryResult<u32> {
    if n == 0 {
        return Err(QueryError::invalid(field, "must be > 0, got 0"));
    }
    non_negative(field, n)
}

// ============================================================================
// SEARCH REQUEST
// ============================================================================

/// A validated similarity-search query. Immutable once built.
///
/// Only [`SearchRequestBuilder::build`] produces one.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    class_name: String,
    fields: Vec<FieldSelector>,
    near: Option<NearClause>,
    limit: Option<u32>,
    offset: Option<u32>,
    autocut: Option<u32>,
    group_by: Option<GroupBy>,
    filter: Option<WhereFilter>,
}

impl SearchRequest {
    pub fn builder() -> SearchRequestBuilder {
        SearchRequestBuilder::default()
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn fields(&self) -> &[FieldSelector] {
        &self.fields
    }

    pub fn near(&self) -> Option<&NearClause> {
        self.near.as_ref()
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn offset(&self) -> Option<u32> {
        self.offset
    }

    pub fn autocut(&self) -> Option<u32> {
        self.autocut
    }

    pub fn group_by(&self) -> Option<&GroupBy> {
        self.group_by.as_ref()
    }

    pub fn filter(&self) -> Option<&WhereFilter> {
        self.filter.as_ref()
    }

    /// Render the GraphQL query document.
    ///
    /// Argument order is `where`, near clause, `limit`, `offset`, `groupBy`,
    /// `autocut`; the argument list is omitted entirely when empty.
    pub fn to_query(&self) -> String {
        let mut args = Vec::new();
        if let Some(filter) = &self.filter {
            args.push(format!("where:{}", filter.render()));
        }
        if let Some(near) = &self.near {
            args.push(near.render());
        }
        if let Some(limit) = self.limit {
            args.push(format!("limit:{}", limit));
        }
        if let Some(offset) = self.offset {
            args.push(format!("offset:{}", offset));
        }
        if let Some(group_by) = &self.group_by {
            args.push(group_by.render());
        }
        if let Some(autocut) = self.autocut {
            args.push(format!("autocut:{}", autocut));
        }

        let args = if args.is_empty() {
            String::new()
        } else {
            format!("({})", args.join(" "))
        };
        format!(
            "{{{}{{{}{}{{{}}}}}}}",
            GET_OPERATION,
            self.class_name,
            args,
            field::render_selection(&self.fields)
        )
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Consuming builder for [`SearchRequest`].
///
/// Each `with_*` call returns a new builder value. The first invalid
/// argument is kept and returned by [`SearchRequestBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct SearchRequestBuilder {
    class_name: Option<String>,
    fields: Vec<FieldSelector>,
    near: Option<NearClause>,
    limit: Option<u32>,
    offset: Option<u32>,
    autocut: Option<u32>,
    group_by: Option<GroupBy>,
    filter: Option<WhereFilter>,
    error: Option<QueryError>,
}

impl SearchRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target collection. A later call replaces the earlier name.
    pub fn with_class_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if let Some(previous) = &self.class_name {
            if *previous != name {
                tracing::debug!(previous = %previous, class = %name, "overriding class name");
            }
        }
        self.class_name = Some(name);
        self
    }

    pub fn with_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldSelector>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Set the near clause. The last clause set wins.
    pub fn with_near(mut self, near: impl Into<NearClause>) -> Self {
        let near = near.into();
        if let Some(previous) = &self.near {
            tracing::debug!(
                previous = previous.kind(),
                next = near.kind(),
                "replacing near clause"
            );
        }
        self.near = Some(near);
        self
    }

    pub fn with_near_text(self, near: NearText) -> Self {
        self.with_near(near)
    }

    pub fn with_near_object(self, near: NearObject) -> Self {
        self.with_near(near)
    }

    pub fn with_near_vector(self, near: NearVector) -> Self {
        self.with_near(near)
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        match non_negative("limit", limit) {
            Ok(n) => self.limit = Some(n),
            Err(err) => self.record(err),
        }
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        match non_negative("offset", offset) {
            Ok(n) => self.offset = Some(n),
            Err(err) => self.record(err),
        }
        self
    }

    /// Cut results after `jumps` natural score gaps.
    pub fn with_autocut(mut self, jumps: i64) -> Self {
        match non_negative("autocut", jumps) {
            Ok(n) => self.autocut = Some(n),
            Err(err) => self.record(err),
        }
        self
    }

    pub fn with_group_by(mut self, args: GroupByArgs) -> Self {
        match args.validate() {
            Ok(group_by) => self.group_by = Some(group_by),
            Err(err) => self.record(err),
        }
        self
    }

    pub fn with_where(mut self, filter: WhereFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn record(&mut self, err: QueryError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    pub fn build(self) -> QueryResult<SearchRequest> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let class_name = match self.class_name {
            Some(name) if !name.trim().is_empty() => name,
            Some(_) => return Err(QueryError::invalid("class_name", "must not be blank")),
            None => return Err(QueryError::IncompleteRequest { field: "class_name" }),
        };
        if !is_class_name(&class_name) {
            return Err(QueryError::invalid(
                "class_name",
                format!("{:?} is not a valid collection name", class_name),
            ));
        }
        if self.fields.is_empty() {
            return Err(QueryError::invalid("fields", "at least one field must be selected"));
        }
        self.fields.iter().try_for_each(FieldSelector::validate)?;
        if let Some(near) = &self.near {
            near.validate()?;
        }
        if let Some(filter) = &self.filter {
            filter.validate()?;
        }

        Ok(SearchRequest {
            class_name,
            fields: self.fields,
            near: self.near,
            limit: self.limit,
            offset: self.offset,
            autocut: self.autocut,
            group_by: self.group_by,
            filter: self.filter,
        })
    }
}

fn is_class_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
