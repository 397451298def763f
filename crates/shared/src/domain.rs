use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! uuid_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

uuid_newtype!(ServerUuid);
uuid_newtype!(ReplicasetUuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverMode {
    #[default]
    Disabled,
    Eventual,
    Stateful,
}

impl FailoverMode {
    pub fn label(self) -> &'static str {
        match self {
            FailoverMode::Disabled => "disabled",
            FailoverMode::Eventual => "eventual",
            FailoverMode::Stateful => "stateful",
        }
    }
}

impl fmt::Display for FailoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for FailoverMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disabled" => Ok(FailoverMode::Disabled),
            "eventual" => Ok(FailoverMode::Eventual),
            "stateful" => Ok(FailoverMode::Stateful),
            other => Err(format!("unknown failover mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Healthy,
    Unhealthy,
    Unconfigured,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Replica set a server belongs to, as reported inside a server record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicasetRef {
    pub uuid: ReplicasetUuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<ServerUuid>,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub status: ServerStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicaset: Option<ReplicasetRef>,
}

impl Server {
    pub fn is_configured(&self) -> bool {
        self.replicaset.is_some()
    }

    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.uri)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStatistics {
    #[serde(default)]
    pub quota_size: u64,
    #[serde(default)]
    pub arena_used: u64,
    #[serde(default)]
    pub items_used: u64,
    #[serde(default)]
    pub quota_used: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<ServerUuid>,
    #[serde(default)]
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<MemoryStatistics>,
}

impl ServerStat {
    /// A statistics record is only usable when it names the server it describes.
    pub fn has_identity(&self) -> bool {
        self.uuid.as_ref().is_some_and(|uuid| !uuid.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replicaset {
    pub uuid: ReplicasetUuid,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub status: ServerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub all_rw: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vshard_group: Option<String>,
    #[serde(default)]
    pub servers: Vec<Server>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSelf {
    #[serde(default)]
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<ServerUuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub known_roles: Vec<String>,
    #[serde(default)]
    pub vshard_groups: Vec<String>,
    #[serde(default)]
    pub can_bootstrap_vshard: bool,
    #[serde(default)]
    pub vshard_bootstrapped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo_uri: Option<String>,
}

impl ClusterSelf {
    pub fn is_configured(&self) -> bool {
        self.uuid.as_ref().is_some_and(|uuid| !uuid.is_empty())
    }
}
