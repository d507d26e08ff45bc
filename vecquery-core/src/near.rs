//! Near clauses: the anchor of a similarity search.

use crate::error::{QueryError, QueryResult};
use crate::graphql;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Optional distance / certainty threshold shared by every near clause.
///
/// Only one of the two may be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certainty: Option<f32>,
}

impl Threshold {
    fn validate(&self) -> QueryResult<()> {
        match (self.distance, self.certainty) {
            (Some(_), Some(_)) => Err(QueryError::invalid(
                "near",
                "distance and certainty are mutually exclusive",
            )),
            (Some(d), None) if !d.is_finite() => {
                Err(QueryError::invalid("near.distance", "must be finite"))
            }
            (None, Some(c)) if !(0.0..=1.0).contains(&c) => Err(QueryError::invalid(
                "near.certainty",
                format!("must be within [0, 1], got {}", c),
            )),
            _ => Ok(()),
        }
    }

    fn render_into(&self, parts: &mut Vec<String>) {
        if let Some(distance) = self.distance {
            parts.push(format!("distance:{}", graphql::float(distance)));
        }
        if let Some(certainty) = self.certainty {
            parts.push(format!("certainty:{}", graphql::float(certainty)));
        }
    }
}

/// Search by free-text concepts, vectorized by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NearText {
    pub concepts: Vec<String>,
    #[serde(flatten)]
    pub threshold: Threshold,
}

impl NearText {
    /// Concepts behave as a set: repeats are dropped, first occurrence wins.
    pub fn new<I, S>(concepts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_concepts(concepts)
    }

    pub fn with_concepts<I, S>(mut self, concepts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for concept in concepts {
            let concept = concept.into();
            if !self.concepts.contains(&concept) {
                self.concepts.push(concept);
            }
        }
        self
    }

    /// Only return objects closer than `max_distance`.
    pub fn with_distance(mut self, max_distance: f32) -> Self {
        self.threshold.distance = Some(max_distance);
        self
    }

    pub fn with_certainty(mut self, certainty: f32) -> Self {
        self.threshold.certainty = Some(certainty);
        self
    }
}

/// Search around an existing object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearObject {
    pub id: String,
    #[serde(flatten)]
    pub threshold: Threshold,
}

impl NearObject {
    /// `id` is checked to be a UUID when the request is built.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            threshold: Threshold::default(),
        }
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self::new(id.to_string())
    }

    pub fn with_distance(mut self, max_distance: f32) -> Self {
        self.threshold.distance = Some(max_distance);
        self
    }

    pub fn with_certainty(mut self, certainty: f32) -> Self {
        self.threshold.certainty = Some(certainty);
        self
    }
}

/// Search around an explicit embedding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NearVector {
    pub vector: Vec<f32>,
    #[serde(flatten)]
    pub threshold: Threshold,
}

impl NearVector {
    pub fn new(vector: impl Into<Vec<f32>>) -> Self {
        Self {
            vector: vector.into(),
            threshold: Threshold::default(),
        }
    }

    pub fn with_distance(mut self, max_distance: f32) -> Self {
        self.threshold.distance = Some(max_distance);
        self
    }

    pub fn with_certainty(mut self, certainty: f32) -> Self {
        self.threshold.certainty = Some(certainty);
        self
    }
}

/// Exactly one anchor per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NearClause {
    NearText(NearText),
    NearObject(NearObject),
    NearVector(NearVector),
}

impl NearClause {
    /// GraphQL argument name.
    pub fn kind(&self) -> &'static str {
        match self {
            NearClause::NearText(_) => "nearText",
            NearClause::NearObject(_) => "nearObject",
            NearClause::NearVector(_) => "nearVector",
        }
    }

    pub fn threshold(&self) -> &Threshold {
        match self {
            NearClause::NearText(c) => &c.threshold,
            NearClause::NearObject(c) => &c.threshold,
            NearClause::NearVector(c) => &c.threshold,
        }
    }

    /// Maximum distance requested, if any.
    pub fn max_distance(&self) -> Option<f32> {
        self.threshold().distance
    }

    pub(crate) fn validate(&self) -> QueryResult<()> {
        match self {
            NearClause::NearText(c) => {
                if c.concepts.is_empty() {
                    return Err(QueryError::invalid(
                        "near_text.concepts",
                        "at least one concept is required",
                    ));
                }
                if c.concepts.iter().any(|s| s.trim().is_empty()) {
                    return Err(QueryError::invalid(
                        "near_text.concepts",
                        "concepts must not be blank",
                    ));
                }
            }
            NearClause::NearObject(c) => {
                Uuid::parse_str(&c.id).map_err(|e| {
                    QueryError::invalid("near_object.id", format!("{:?} is not a UUID: {}", c.id, e))
                })?;
            }
            NearClause::NearVector(c) => {
                if c.vector.is_empty() {
                    return Err(QueryError::invalid(
                        "near_vector.vector",
                        "vector must not be empty",
                    ));
                }
                if let Some(i) = c.vector.iter().position(|v| !v.is_finite()) {
                    return Err(QueryError::invalid(
                        "near_vector.vector",
                        format!("component {} is not finite", i),
                    ));
                }
            }
        }
        self.threshold().validate()
    }

    /// Render as `nearText:{concepts:["a"] distance:0.2}`.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        match self {
            NearClause::NearText(c) => {
                parts.push(format!("concepts:{}", graphql::quote_list(&c.concepts)))
            }
            NearClause::NearObject(c) => parts.push(format!("id:{}", graphql::quote(&c.id))),
            NearClause::NearVector(c) => {
                parts.push(format!("vector:{}", graphql::vector(&c.vector)))
            }
        }
        self.threshold().render_into(&mut parts);
        format!("{}:{{{}}}", self.kind(), parts.join(" "))
    }
}

impl From<NearText> for NearClause {
    fn from(c: NearText) -> Self {
        NearClause::NearText(c)
    }
}

impl From<NearObject> for NearClause {
    fn from(c: NearObject) -> Self {
        NearClause::NearObject(c)
    }
}

impl From<NearVector> for NearClause {
    fn from(c: NearVector) -> Self {
        NearClause::NearVector(c)
    }
}
