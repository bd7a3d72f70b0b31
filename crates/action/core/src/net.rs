//! Network roles and execution policies.

use strum::{Display, EnumIter, EnumString};

/// Role of the local machine for the owning actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(ascii_case_insensitive)]
pub enum NetRole {
    /// Server or standalone game: owns gameplay state.
    #[default]
    Authority,
    /// Locally controlled client that predicts its own actions.
    AutonomousProxy,
    /// Remote copy that only mirrors replicated state.
    SimulatedProxy,
    /// No networking context.
    None,
}

impl NetRole {
    pub const fn has_authority(self) -> bool {
        matches!(self, Self::Authority)
    }

    pub const fn is_locally_controlled(self) -> bool {
        matches!(self, Self::Authority | Self::AutonomousProxy)
    }
}

/// Where a phase behavior is allowed to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Display, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NetExecutionPolicy {
    ServerOnly,
    ClientOnly,
    #[default]
    All,
}

impl NetExecutionPolicy {
    pub const fn allows(self, role: NetRole) -> bool {
        match self {
            Self::ServerOnly => matches!(role, NetRole::Authority),
            Self::ClientOnly => matches!(role, NetRole::AutonomousProxy),
            Self::All => true,
        }
    }
}
