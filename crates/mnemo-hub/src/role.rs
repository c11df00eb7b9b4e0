//! Connection roles and the audience policy between them.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::errors::HubError;

/// Role assigned to a connection when it is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Privileged: presented the shared professor key.
    Professor,
    /// Unprivileged: everyone else.
    Student,
    /// Not resolved. Connections with this role cannot broadcast.
    Unknown,
}

impl Role {
    /// Resolve a role from the request credential.
    ///
    /// Only an exact match with the configured key yields `Professor`. With
    /// no key configured every connection is a `Student`.
    pub fn from_credential(credential: Option<&str>, professor_key: Option<&SecretString>) -> Self {
        match (credential, professor_key) {
            (Some(presented), Some(key)) if presented == key.expose_secret() => Self::Professor,
            _ => Self::Student,
        }
    }

    /// The role whose members receive this role's broadcasts.
    pub fn audience(self) -> Result<Self, HubError> {
        match self {
            Self::Professor => Ok(Self::Student),
            Self::Student => Ok(Self::Professor),
            Self::Unknown => Err(HubError::UnknownRole(self)),
        }
    }

    /// Wire/log name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Professor => "professor",
            Self::Student => "student",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
