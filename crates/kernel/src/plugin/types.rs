//! Plugin registry types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a closed string enumeration with its wire spellings.
///
/// The same spelling is used in JSON bodies and in the database.
macro_rules! catalog_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every accepted value, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Accepted spellings, for error payloads.
            pub fn names() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(other.to_string()),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

catalog_enum!(
    /// License a plugin is published under.
    License {
        Mit => "MIT",
        Apache2 => "Apache-2.0",
        Gpl3 => "GPL-3.0",
        Bsd3Clause => "BSD-3-Clause",
        Isc => "ISC",
        Custom => "Custom",
    }
);

catalog_enum!(
    /// Client a plugin targets.
    Platform {
        Extera => "Extera",
        AltUi => "AltUI",
    }
);

catalog_enum!(
    /// Catalog tag.
    Tag {
        Utility => "Utility",
        Fun => "Fun",
        Interface => "Interface",
        Media => "Media",
        Productivity => "Productivity",
        Social => "Social",
        Customization => "Customization",
        Developer => "Developer",
        Library => "Library",
    }
);

/// A plugin node in the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plugin {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub license: License,
    pub author_id: Uuid,
    pub target_platforms: Vec<Platform>,
    pub tags: Vec<Tag>,
    pub fork_origin_id: Option<Uuid>,
    pub reactions: serde_json::Value,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Plugin {
    pub fn summary(&self) -> PluginSummary {
        PluginSummary {
            id: self.id,
            name: self.name.clone(),
            author_id: self.author_id,
        }
    }
}

/// Short reference to a plugin, embedded in other payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginSummary {
    pub id: Uuid,
    pub name: String,
    pub author_id: Uuid,
}

/// A directed dependency edge: `dependent_plugin_id` requires `dependency_plugin_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Dependency {
    pub dependent_plugin_id: Uuid,
    pub dependency_plugin_id: Uuid,
    pub version: Option<String>,
    pub is_optional: bool,
}

/// A dependency edge as shown on the dependent plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencySummary {
    pub plugin: PluginSummary,
    pub version: Option<String>,
    pub is_optional: bool,
}

/// A plugin together with its graph neighbourhood.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginDetails {
    #[serde(flatten)]
    pub plugin: Plugin,
    pub fork_origin: Option<PluginSummary>,
    pub dependencies: Vec<DependencySummary>,
    pub forks: Vec<PluginSummary>,
}

/// Request body for plugin creation. Enumerated fields arrive as raw
/// strings so that unknown values can be reported precisely.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePlugin {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub license: String,
    #[serde(default)]
    pub target_platforms: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub fork_origin_id: Option<Uuid>,
    #[serde(default)]
    pub dependencies: Vec<DependencyRequest>,
}

/// A requested dependency: either a bare plugin id or an object carrying
/// a version constraint and optional flag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DependencyRequest {
    Id(Uuid),
    Detailed {
        plugin_id: Uuid,
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        optional: bool,
    },
}

impl DependencyRequest {
    pub fn into_candidate(self) -> DependencyCandidate {
        match self {
            DependencyRequest::Id(plugin_id) => DependencyCandidate {
                plugin_id,
                version: None,
                optional: false,
            },
            DependencyRequest::Detailed {
                plugin_id,
                version,
                optional,
            } => DependencyCandidate {
                plugin_id,
                version: version.filter(|v| !v.trim().is_empty()),
                optional,
            },
        }
    }
}

/// A de-duplicated dependency candidate awaiting the cycle check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCandidate {
    pub plugin_id: Uuid,
    pub version: Option<String>,
    pub optional: bool,
}

/// Validated plugin fields, ready for insertion. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewPlugin {
    pub name: String,
    pub description: Option<String>,
    pub license: License,
    pub author_id: Uuid,
    pub target_platforms: Vec<Platform>,
    pub tags: Vec<Tag>,
    pub fork_origin_id: Option<Uuid>,
}

/// Validated edge, ready for insertion.
#[derive(Debug, Clone)]
pub struct NewDependency {
    pub dependent_plugin_id: Uuid,
    pub dependency_plugin_id: Uuid,
    pub version: Option<String>,
    pub is_optional: bool,
}

/// Request body for a scalar plugin update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlugin {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Validated scalar changes. `description: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<Tag>>,
}

impl PluginChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.tags.is_none()
    }
}

/// Body of `POST /plugins/{id}/dependencies`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddDependency {
    pub dependency_id: Uuid,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub optional: bool,
}
