//! Opaque identifiers assigned by the host platform

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! platform_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The raw identifier
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

platform_id!(
    /// Identifier of a channel or category; ticket records are keyed by it
    ChannelId
);

platform_id!(
    /// Identifier of a user
    UserId
);

platform_id!(
    /// Identifier of a server role
    RoleId
);

impl ChannelId {
    /// Inline channel reference for message content
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<#{}>", self.0)
    }
}

impl UserId {
    /// Inline user reference for message content
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}
