//! Request parsing
//!
//! A request is a single JSON object. Its keys select the strategy:
//! `type` + `attributes` is declarative, `resource_class` + `resource_name`
//! is imperative.

use crate::error::{Error, Result};
use crate::facts::FactContext;
use crate::types::PropertyMap;
use serde::Deserialize;
use serde_json::Value;

/// Declarative request: evaluate desired attributes and converge
#[derive(Debug, Clone, PartialEq)]
pub struct DeclarativeRequest {
    pub kind: String,
    pub attributes: PropertyMap,
    pub facts: FactContext,
    pub noop: bool,
}

/// Imperative request: configure properties, run an action, report state
#[derive(Debug, Clone, PartialEq)]
pub struct ImperativeRequest {
    pub resource_class: String,
    pub resource_name: String,
    pub properties: PropertyMap,
    pub action: Option<String>,
    pub facts: FactContext,
    pub noop: bool,
}

// Wire shapes. Fact fields are listed explicitly because serde cannot
// combine `flatten` with `deny_unknown_fields`.

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDeclarative {
    #[serde(rename = "type")]
    kind: String,
    attributes: PropertyMap,
    #[serde(default)]
    os: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    platform_family: Option<String>,
    #[serde(default)]
    platform_version: Option<String>,
    #[serde(default)]
    noop: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawImperative {
    resource_class: String,
    resource_name: String,
    #[serde(default)]
    properties: PropertyMap,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    os: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    platform_family: Option<String>,
    #[serde(default)]
    platform_version: Option<String>,
    #[serde(default)]
    noop: bool,
}

impl From<RawDeclarative> for DeclarativeRequest {
    fn from(raw: RawDeclarative) -> Self {
        Self {
            kind: raw.kind,
            attributes: raw.attributes,
            facts: FactContext {
                os: raw.os,
                platform: raw.platform,
                platform_family: raw.platform_family,
                platform_version: raw.platform_version,
            },
            noop: raw.noop,
        }
    }
}

impl From<RawImperative> for ImperativeRequest {
    fn from(raw: RawImperative) -> Self {
        Self {
            resource_class: raw.resource_class,
            resource_name: raw.resource_name,
            properties: raw.properties,
            action: raw.action,
            facts: FactContext {
                os: raw.os,
                platform: raw.platform,
                platform_family: raw.platform_family,
                platform_version: raw.platform_version,
            },
            noop: raw.noop,
        }
    }
}

/// A parsed request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Declarative(DeclarativeRequest),
    Imperative(ImperativeRequest),
}

impl Request {
    /// Parse a request from its JSON text
    pub fn from_json(input: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_value(value)
    }

    /// Parse a request from an already decoded JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(object) = &value else {
            return Err(Error::MalformedInput(
                "request must be a JSON object".to_string(),
            ));
        };

        match (object.contains_key("type"), object.contains_key("resource_class")) {
            (true, true) => Err(Error::MalformedInput(
                "request has both 'type' and 'resource_class'".to_string(),
            )),
            (false, false) => Err(Error::MalformedInput(
                "request needs 'type' (declarative) or 'resource_class' (imperative)".to_string(),
            )),
            (true, false) => Ok(Self::Declarative(
                serde_json::from_value::<RawDeclarative>(value)?.into(),
            )),
            (false, true) => Ok(Self::Imperative(
                serde_json::from_value::<RawImperative>(value)?.into(),
            )),
        }
    }

    /// Facts supplied with the request (possibly empty)
    pub fn facts(&self) -> &FactContext {
        match self {
            Self::Declarative(r) => &r.facts,
            Self::Imperative(r) => &r.facts,
        }
    }

    /// Replace the request facts, typically after merging defaults
    pub fn set_facts(&mut self, facts: FactContext) {
        match self {
            Self::Declarative(r) => r.facts = facts,
            Self::Imperative(r) => r.facts = facts,
        }
    }

    pub fn noop(&self) -> bool {
        match self {
            Self::Declarative(r) => r.noop,
            Self::Imperative(r) => r.noop,
        }
    }

    pub fn set_noop(&mut self, noop: bool) {
        match self {
            Self::Declarative(r) => r.noop = noop,
            Self::Imperative(r) => r.noop = noop,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Declarative(r) => &r.kind,
            Self::Imperative(r) => &r.resource_class,
        }
    }
}
