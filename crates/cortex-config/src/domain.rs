//! Scheduling domains.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The kind of resource a scheduling request or pipeline is about.
///
/// New domains are added here as the upstream control planes Cortex fronts
/// grow; the engine and controller are domain-agnostic and only switch on
/// this value to pick a default pipeline name and an admission path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulingDomain {
    /// Virtual machine / compute instance placement.
    Compute,
    /// Block storage volume placement.
    BlockStorage,
    /// Shared/file storage placement.
    SharedFs,
}

impl SchedulingDomain {
    /// Returns the conventional default pipeline name for this domain, used
    /// when a scheduling request does not name one explicitly.
    #[must_use]
    pub const fn default_pipeline_name(self) -> &'static str {
        match self {
            Self::Compute => "nova-external-scheduler",
            Self::BlockStorage => "cinder-external-scheduler",
            Self::SharedFs => "manila-external-scheduler",
        }
    }

    /// Returns the URL path segment used to address this domain's scheduler
    /// endpoint, e.g. `/scheduler/compute/external`.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::BlockStorage => "block-storage",
            Self::SharedFs => "shared-fs",
        }
    }

    /// Parses a URL path segment back into a domain, the inverse of
    /// [`SchedulingDomain::path_segment`].
    #[must_use]
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "compute" => Some(Self::Compute),
            "block-storage" => Some(Self::BlockStorage),
            "shared-fs" => Some(Self::SharedFs),
            _ => None,
        }
    }
}

impl std::fmt::Display for SchedulingDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path_segment())
    }
}
