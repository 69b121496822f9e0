//! Documented parameters.

use crate::validation::Location;
use serde::Serialize;

/// Where a documented parameter is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    /// Query string
    Query,
    /// Body
    Body,
    /// Headers
    Headers,
    /// Path segment
    Route,
}

impl From<Location> for ParamLocation {
    fn from(location: Location) -> Self {
        match location {
            Location::Query => Self::Query,
            Location::Body => Self::Body,
            Location::Headers => Self::Headers,
        }
    }
}

/// Whether a parameter must be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequiredState {
    /// Always
    Yes,
    /// Never
    #[default]
    No,
    /// Depends on the request
    Sometimes,
}

/// One documented parameter of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClayParam {
    /// Location
    #[serde(rename = "type")]
    pub location: ParamLocation,
    /// Name
    pub name: String,
    /// Required state
    pub required: RequiredState,
    /// Free-form description
    pub description: String,
}

impl ClayParam {
    /// A parameter with no description
    #[must_use]
    pub fn new(location: ParamLocation, name: impl Into<String>, required: RequiredState) -> Self {
        Self {
            location,
            name: name.into(),
            required,
            description: String::new(),
        }
    }
}
