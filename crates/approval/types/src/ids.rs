//! Identifier newtypes

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a node in the institution tree
    InstitutionId
);

string_id!(
    /// Identifier of a user in the directory
    UserId
);

string_id!(
    /// Identifier of a workflow definition
    WorkflowId
);

string_id!(
    /// Reference to the resource under approval (a survey response, a
    /// document, ...). Stable across resubmission cycles.
    ResourceRef
);

string_id!(
    /// Identifier of one approval request (one submission cycle)
    RequestId
);

impl RequestId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
