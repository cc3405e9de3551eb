use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConsolidationError, Result};

/// Name of the default role carried by every track until labelled.
pub const IGNORE: &str = "Ignore";

/// Semantic label assigned to a consolidated track.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn ignore() -> Self {
        Self(IGNORE.to_string())
    }

    #[inline]
    pub fn is_default(&self) -> bool {
        self.0 == IGNORE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::ignore()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of roles a session may assign.
///
/// Deserializes through [`Cast::new`], so the default role and duplicates
/// never become cast members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Cast(Vec<Role>);

impl Cast {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut roles: Vec<Role> = Vec::new();
        for name in names {
            let role = Role::new(name);
            if !role.is_default() && !roles.contains(&role) {
                roles.push(role);
            }
        }
        Self(roles)
    }

    pub fn roles(&self) -> &[Role] {
        &self.0
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.0.contains(role)
    }

    /// Look up `name`, accepting the default role as well as cast members.
    pub fn role(&self, name: &str) -> Result<Role> {
        let role = Role::new(name);
        if role.is_default() || self.contains(&role) {
            Ok(role)
        } else {
            Err(ConsolidationError::UnknownRole(name.to_string()))
        }
    }
}

impl From<Vec<String>> for Cast {
    fn from(names: Vec<String>) -> Self {
        Self::new(names)
    }
}

impl From<Cast> for Vec<String> {
    fn from(cast: Cast) -> Self {
        cast.0.into_iter().map(|role| role.0).collect()
    }
}

impl Default for Cast {
    fn default() -> Self {
        Self::new(["Target", "Confederate_1", "Confederate_2"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_role() {
        assert!(Role::default().is_default());
        assert!(!Role::new("Target").is_default());
        assert_eq!(Role::ignore().to_string(), IGNORE);
    }

    #[test]
    fn test_cast_lookup() {
        let cast = Cast::default();
        assert_eq!(cast.role("Target").unwrap(), Role::new("Target"));
        assert!(cast.role(IGNORE).unwrap().is_default());
        assert!(matches!(
            cast.role("Stranger"),
            Err(ConsolidationError::UnknownRole(name)) if name == "Stranger"
        ));
    }

    #[test]
    fn test_cast_from_json_drops_default() {
        let cast: Cast = serde_json::from_str(r#"["Target", "Ignore", "Target"]"#).unwrap();
        assert_eq!(cast.roles(), &[Role::new("Target")]);
        assert_eq!(serde_json::to_string(&cast).unwrap(), r#"["Target"]"#);
    }

    #[test]
    fn test_cast_drops_default_and_duplicates() {
        let cast = Cast::new(["A", IGNORE, "A", "B"]);
        assert_eq!(cast.roles(), &[Role::new("A"), Role::new("B")]);
    }
}
