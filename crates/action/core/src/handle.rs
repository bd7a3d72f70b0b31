//! Lightweight handles issued by the action system component.

use core::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub u32);

        impl $name {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Returns this handle and advances the counter.
            pub fn bump(&mut self) -> Self {
                let current = *self;
                self.0 = self.0.wrapping_add(1);
                current
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Identifies a granted action on its component.
    ActionSpecHandle,
    "spec"
);
id_type!(
    /// Identifies one activation of an action.
    ActiveActionHandle,
    "active"
);
id_type!(
    /// Client-side key for an activation awaiting server confirmation.
    PredictionKey,
    "pred"
);
id_type!(
    /// Identifies a task inside its owning instance.
    TaskId,
    "task"
);
id_type!(
    /// Identifies an actor known to the host.
    ActorId,
    "actor"
);
