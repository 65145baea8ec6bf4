//! Live resource identity and observed attributes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::output::TypedValue;

/// Kind of provider resource a live check reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vpc,
    Subnet,
    SecurityGroup,
    DbInstance,
    EcsCluster,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vpc => "vpc",
            Self::Subnet => "subnet",
            Self::SecurityGroup => "security_group",
            Self::DbInstance => "db_instance",
            Self::EcsCluster => "ecs_cluster",
        })
    }
}

/// A resource identifier plus its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: String,
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.id)
    }
}

/// Where to look a resource up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub region: String,
    pub profile: Option<String>,
}

/// Provider-observed attributes of a live resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceAttributes {
    pub id: String,
    /// Lifecycle state as reported by the provider (`available`, `ACTIVE`, ...).
    pub status: Option<String>,
    pub tags: BTreeMap<String, String>,
    /// Remaining top-level scalar fields, keyed by provider field name.
    pub attributes: BTreeMap<String, Value>,
}

impl ResourceAttributes {
    /// Resolve an attribute selector to a typed value.
    ///
    /// Selectors: `status`, `tags`, `tags.<Key>`, `attributes.<Field>`, or a
    /// bare `<Field>` (shorthand for `attributes.<Field>`). Returns `None`
    /// when the selected attribute does not exist.
    #[must_use]
    pub fn select(&self, selector: &str) -> Option<TypedValue> {
        if selector == "status" {
            return self
                .status
                .as_ref()
                .map(|s| TypedValue::Scalar(Value::String(s.clone())));
        }
        if selector == "tags" {
            let map: Map<String, Value> = self
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            return Some(TypedValue::Mapping(map));
        }
        if let Some(key) = selector.strip_prefix("tags.") {
            return self
                .tags
                .get(key)
                .map(|v| TypedValue::Scalar(Value::String(v.clone())));
        }
        let field = selector.strip_prefix("attributes.").unwrap_or(selector);
        self.attributes.get(field).map(|v| match v {
            Value::Array(items) => TypedValue::Sequence(items.clone()),
            Value::Object(map) => TypedValue::Mapping(map.clone()),
            other => TypedValue::Scalar(other.clone()),
        })
    }
}
