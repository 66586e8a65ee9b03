use std::{collections::BTreeMap, fmt, str::FromStr};

/// Capability a protected operation demands. Bound per operation, not per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyRequirement {
    /// The token must carry this exact role.
    Role(String),
    /// An external policy decision point decides.
    Delegated { policy: String },
}

impl PolicyRequirement {
    pub fn role(name: impl Into<String>) -> Self {
        Self::Role(name.into())
    }

    pub fn delegated(policy: impl Into<String>) -> Self {
        Self::Delegated {
            policy: policy.into(),
        }
    }
}

impl fmt::Display for PolicyRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role(role) => write!(f, "role:{role}"),
            Self::Delegated { policy } => write!(f, "policy:{policy}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid policy requirement '{0}' (expected role:<name> or policy:<name>)")]
pub struct RequirementParseError(pub String);

/// `role:<name>` or `policy:<name>`.
impl FromStr for PolicyRequirement {
    type Err = RequirementParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RequirementParseError(s.to_string());
        let (kind, name) = s.trim().split_once(':').ok_or_else(invalid)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid());
        }
        match kind.trim() {
            "role" => Ok(Self::role(name)),
            "policy" => Ok(Self::delegated(name)),
            _ => Err(invalid()),
        }
    }
}

pub const PROFILE_READ: &str = "profile.read";
pub const ADMIN_READ: &str = "admin.read";
pub const DOCUMENTS_READ: &str = "documents.read";

pub const OPERATIONS: [&str; 3] = [PROFILE_READ, ADMIN_READ, DOCUMENTS_READ];

/// Operation name -> requirement, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyBindings {
    bindings: BTreeMap<String, PolicyRequirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("binding '{0}' is not of the form <operation>=<requirement>")]
    Syntax(String),
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
    #[error(transparent)]
    Requirement(#[from] RequirementParseError),
}

impl Default for PolicyBindings {
    fn default() -> Self {
        let bindings = [
            (PROFILE_READ, PolicyRequirement::role("user")),
            (ADMIN_READ, PolicyRequirement::role("admin")),
            (DOCUMENTS_READ, PolicyRequirement::delegated("document-access")),
        ]
        .into_iter()
        .map(|(op, req)| (op.to_string(), req))
        .collect();

        Self { bindings }
    }
}

impl PolicyBindings {
    /// Defaults overridden by a list like `admin.read=role:ops,documents.read=policy:docs`.
    pub fn with_overrides(overrides: &str) -> Result<Self, BindingError> {
        let mut bindings = Self::default();
        for entry in overrides.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (operation, requirement) = entry
                .split_once('=')
                .ok_or_else(|| BindingError::Syntax(entry.to_string()))?;
            let operation = operation.trim();
            if !OPERATIONS.contains(&operation) {
                return Err(BindingError::UnknownOperation(operation.to_string()));
            }
            bindings
                .bindings
                .insert(operation.to_string(), requirement.parse()?);
        }
        Ok(bindings)
    }

    pub fn requirement_for(&self, operation: &str) -> Option<&PolicyRequirement> {
        self.bindings.get(operation)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PolicyRequirement)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }
}
