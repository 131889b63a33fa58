//! Closed set of resource kinds the dashboard backend streams.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! kinds {
    ($($variant:ident),+ $(,)?) => {
        /// A Kubernetes kind with its own store.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Kind {
            $($variant),+
        }

        impl Kind {
            /// Every kind, in declaration order.
            pub const ALL: &'static [Kind] = &[$(Kind::$variant),+];

            /// Kubernetes `kind` string, e.g. `"Pod"`.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Kind::$variant => stringify!($variant)),+
                }
            }
        }

        impl FromStr for Kind {
            type Err = UnknownKind;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok(Kind::$variant),)+
                    other => Err(UnknownKind(other.to_string())),
                }
            }
        }
    };
}

kinds!(
    ClusterRoleBinding,
    ClusterRole,
    ClusterVersion,
    ConfigMap,
    CronJob,
    CustomResourceDefinition,
    DaemonSet,
    DeploymentConfig,
    Deployment,
    Endpoints,
    Event,
    HorizontalPodAutoscaler,
    Ingress,
    Job,
    Namespace,
    Node,
    PersistentVolumeClaim,
    PersistentVolume,
    Pod,
    ReplicaSet,
    ReplicationController,
    RoleBinding,
    Role,
    Route,
    Secret,
    Service,
    ServiceAccount,
    StatefulSet,
);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown kind: {0}")]
pub struct UnknownKind(pub String);

impl Kind {
    /// Case-insensitive lookup, also accepting the lowercase plural used in
    /// dashboard routes (`pods`, `clusterrolebindings`, `endpoints`).
    pub fn parse_loose(s: &str) -> Option<Kind> {
        let wanted = s.to_ascii_lowercase();
        Kind::ALL.iter().copied().find(|k| {
            let name = k.as_str().to_ascii_lowercase();
            name == wanted || k.plural() == wanted
        })
    }

    /// Lowercase plural resource name.
    pub fn plural(&self) -> String {
        let lower = self.as_str().to_ascii_lowercase();
        if lower.ends_with("ss") {
            format!("{lower}es")
        } else if lower.ends_with('s') {
            lower
        } else {
            format!("{lower}s")
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Kind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Kind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
