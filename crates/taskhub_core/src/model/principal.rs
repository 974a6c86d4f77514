//! Actor and assignee identities.
//!
//! # Responsibility
//! - Represent who acts on or is assigned to project data.
//! - Validate externally supplied identity tags at the boundary.
//!
//! # Invariants
//! - A principal is exactly one of `User` or `Agent`; there is no free-text kind.
//! - `PrincipalId` is trimmed, non-empty and at most 255 chars.
//! - Storage uses two columns: `<prefix>_type` (`USER|AGENT`) and `<prefix>_id`.

use crate::model::validation::{required_text, ValidationError, PRINCIPAL_ID_MAX_CHARS};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Stable identifier issued by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(value: impl AsRef<str>) -> Result<Self, ValidationError> {
        required_text("principal id", value.as_ref(), PRINCIPAL_ID_MAX_CHARS).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for PrincipalId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PrincipalId> for String {
    fn from(value: PrincipalId) -> Self {
        value.0
    }
}

impl Display for PrincipalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discriminant of [`Principal`], as stored in `*_type` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrincipalKind {
    User,
    Agent,
}

impl PrincipalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Agent => "AGENT",
        }
    }

    /// Parses the exact upper-case tag; no case folding.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "USER" => Ok(Self::User),
            "AGENT" => Ok(Self::Agent),
            other => Err(ValidationError::InvalidPrincipalType(other.to_string())),
        }
    }
}

/// A human user or an automated agent.
///
/// Serialized as `{"type": "USER", "id": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Principal {
    User(PrincipalId),
    Agent(PrincipalId),
}

impl Principal {
    pub fn user(id: impl AsRef<str>) -> Result<Self, ValidationError> {
        PrincipalId::new(id).map(Self::User)
    }

    pub fn agent(id: impl AsRef<str>) -> Result<Self, ValidationError> {
        PrincipalId::new(id).map(Self::Agent)
    }

    /// Builds a principal from a `(type, id)` pair as received from a client
    /// or read back from storage.
    pub fn parse(kind: &str, id: &str) -> Result<Self, ValidationError> {
        let id = PrincipalId::new(id)?;
        Ok(match PrincipalKind::parse(kind)? {
            PrincipalKind::User => Self::User(id),
            PrincipalKind::Agent => Self::Agent(id),
        })
    }

    pub fn kind(&self) -> PrincipalKind {
        match self {
            Self::User(_) => PrincipalKind::User,
            Self::Agent(_) => PrincipalKind::Agent,
        }
    }

    pub fn id(&self) -> &PrincipalId {
        match self {
            Self::User(id) | Self::Agent(id) => id,
        }
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::{Principal, PrincipalKind};
    use crate::model::validation::ValidationError;

    #[test]
    fn parse_accepts_only_exact_tags() {
        let user = Principal::parse("USER", " alice ").unwrap();
        assert_eq!(user.kind(), PrincipalKind::User);
        assert_eq!(user.id().as_str(), "alice");

        assert_eq!(
            Principal::parse("user", "alice").unwrap_err(),
            ValidationError::InvalidPrincipalType("user".to_string())
        );
        assert_eq!(
            Principal::parse("ROBOT", "r2").unwrap_err(),
            ValidationError::InvalidPrincipalType("ROBOT".to_string())
        );
    }

    #[test]
    fn blank_id_is_rejected() {
        assert_eq!(
            Principal::agent("  ").unwrap_err(),
            ValidationError::EmptyField("principal id")
        );
    }

    #[test]
    fn wire_shape_is_tagged() {
        let agent = Principal::agent("planner-7").unwrap();
        let json = serde_json::to_value(&agent).unwrap();
        assert_eq!(json["type"], "AGENT");
        assert_eq!(json["id"], "planner-7");

        let decoded: Principal = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, agent);
    }

    #[test]
    fn deserialization_validates_id() {
        let err = serde_json::from_str::<Principal>(r#"{"type":"USER","id":"   "}"#);
        assert!(err.is_err());
        let err = serde_json::from_str::<Principal>(r#"{"type":"BOT","id":"x"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn display_includes_kind() {
        assert_eq!(Principal::user("bob").unwrap().to_string(), "USER:bob");
    }
}
