//! Visibility scopes over the shared event stream
//!
//! Three nested scopes read the same events: a principal sees its own usage,
//! a company member's view covers every member of the company, and a global
//! admin sees everything. Identity and project data belong to external
//! collaborators and are reached through the [`IdentityDirectory`] and
//! [`ProjectDirectory`] traits; [`StaticDirectory`] is a file-backed
//! implementation of both.

use crate::error::{MeterError, Result};
use crate::types::{PrincipalId, ProjectId, ScopeId};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Identity and company-membership collaborator
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Whether the principal holds the global admin capability
    async fn is_global_admin(&self, principal: &PrincipalId) -> Result<bool>;

    /// Members of a scope; empty when the scope has none
    async fn members_of(&self, scope: &ScopeId) -> Result<BTreeSet<PrincipalId>>;

    /// The scope a principal belongs to, if any
    async fn scope_of(&self, principal: &PrincipalId) -> Result<Option<ScopeId>>;

    /// Display names for the given principals; unknown principals are omitted
    async fn display_names(
        &self,
        principals: &BTreeSet<PrincipalId>,
    ) -> Result<HashMap<PrincipalId, String>>;
}

/// Project display-name collaborator
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn project_names(
        &self,
        projects: &BTreeSet<ProjectId>,
    ) -> Result<HashMap<ProjectId, String>>;
}

/// What a principal is allowed to see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    /// Unrestricted
    Global,
    /// Every member of the company
    Company(ScopeId),
    /// Only the principal's own events
    SelfOnly(PrincipalId),
}

/// Expands scopes into principal sets and decides access levels
#[derive(Clone)]
pub struct ScopeResolver {
    identity: Arc<dyn IdentityDirectory>,
}

impl ScopeResolver {
    pub fn new(identity: Arc<dyn IdentityDirectory>) -> Self {
        Self { identity }
    }

    pub async fn is_global_admin(&self, principal: &PrincipalId) -> Result<bool> {
        self.identity.is_global_admin(principal).await
    }

    pub async fn members_of(&self, scope: &ScopeId) -> Result<BTreeSet<PrincipalId>> {
        let members = self.identity.members_of(scope).await?;
        debug!("Scope {} has {} members", scope, members.len());
        Ok(members)
    }

    /// Widest scope the principal may query
    pub async fn access_for(&self, principal: &PrincipalId) -> Result<AccessScope> {
        if self.is_global_admin(principal).await? {
            return Ok(AccessScope::Global);
        }
        Ok(match self.identity.scope_of(principal).await? {
            Some(scope) => AccessScope::Company(scope),
            None => AccessScope::SelfOnly(principal.clone()),
        })
    }

    /// Principal restriction for an access scope; `None` means unrestricted
    pub async fn visible_principals(
        &self,
        access: &AccessScope,
    ) -> Result<Option<BTreeSet<PrincipalId>>> {
        match access {
            AccessScope::Global => Ok(None),
            AccessScope::Company(scope) => self.members_of(scope).await.map(Some),
            AccessScope::SelfOnly(principal) => Ok(Some(BTreeSet::from([principal.clone()]))),
        }
    }

    pub async fn display_names(
        &self,
        principals: &BTreeSet<PrincipalId>,
    ) -> Result<HashMap<PrincipalId, String>> {
        if principals.is_empty() {
            return Ok(HashMap::new());
        }
        self.identity.display_names(principals).await
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryDoc {
    #[serde(default)]
    admins: Vec<String>,
    #[serde(default)]
    scopes: HashMap<String, Vec<String>>,
    #[serde(default)]
    principals: HashMap<String, String>,
    #[serde(default)]
    projects: HashMap<String, String>,
}

/// Directory loaded once from configuration
///
/// JSON layout:
/// ```json
/// {
///   "admins": ["root"],
///   "scopes": { "acme": ["alice", "bob"] },
///   "principals": { "alice": "Alice Doe" },
///   "projects": { "p-1": "Website relaunch" }
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    admins: BTreeSet<PrincipalId>,
    members: HashMap<ScopeId, BTreeSet<PrincipalId>>,
    membership: HashMap<PrincipalId, ScopeId>,
    names: HashMap<PrincipalId, String>,
    projects: HashMap<ProjectId, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(mut self, principal: PrincipalId) -> Self {
        self.admins.insert(principal);
        self
    }

    /// Add a principal to a scope; a principal belongs to at most one scope
    pub fn with_member(mut self, scope: ScopeId, principal: PrincipalId) -> Result<Self> {
        self.add_member(scope, principal)?;
        Ok(self)
    }

    /// Register a scope even if it has no members yet
    pub fn with_scope(mut self, scope: ScopeId) -> Self {
        self.members.entry(scope).or_default();
        self
    }

    pub fn with_name(mut self, principal: PrincipalId, name: impl Into<String>) -> Self {
        self.names.insert(principal, name.into());
        self
    }

    pub fn with_project(mut self, project: ProjectId, name: impl Into<String>) -> Self {
        self.projects.insert(project, name.into());
        self
    }

    fn add_member(&mut self, scope: ScopeId, principal: PrincipalId) -> Result<()> {
        if let Some(existing) = self.membership.get(&principal)
            && existing != &scope
        {
            return Err(MeterError::Config(format!(
                "principal '{principal}' belongs to both '{existing}' and '{scope}'"
            )));
        }
        self.membership.insert(principal.clone(), scope.clone());
        self.members.entry(scope).or_default().insert(principal);
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: DirectoryDoc = serde_json::from_str(json)?;
        let mut directory = Self::new();

        for admin in doc.admins {
            directory = directory.with_admin(PrincipalId::new(admin));
        }
        for (scope, members) in doc.scopes {
            let scope = ScopeId::new(scope);
            directory = directory.with_scope(scope.clone());
            for member in members {
                directory = directory.with_member(scope.clone(), PrincipalId::new(member))?;
            }
        }
        for (principal, name) in doc.principals {
            directory = directory.with_name(PrincipalId::new(principal), name);
        }
        for (project, name) in doc.projects {
            directory = directory.with_project(ProjectId::new(project), name);
        }

        Ok(directory)
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&json)
    }
}

#[async_trait]
impl IdentityDirectory for StaticDirectory {
    async fn is_global_admin(&self, principal: &PrincipalId) -> Result<bool> {
        Ok(self.admins.contains(principal))
    }

    async fn members_of(&self, scope: &ScopeId) -> Result<BTreeSet<PrincipalId>> {
        Ok(self.members.get(scope).cloned().unwrap_or_default())
    }

    async fn scope_of(&self, principal: &PrincipalId) -> Result<Option<ScopeId>> {
        Ok(self.membership.get(principal).cloned())
    }

    async fn display_names(
        &self,
        principals: &BTreeSet<PrincipalId>,
    ) -> Result<HashMap<PrincipalId, String>> {
        Ok(principals
            .iter()
            .filter_map(|p| self.names.get(p).map(|name| (p.clone(), name.clone())))
            .collect())
    }
}

#[async_trait]
impl ProjectDirectory for StaticDirectory {
    async fn project_names(
        &self,
        projects: &BTreeSet<ProjectId>,
    ) -> Result<HashMap<ProjectId, String>> {
        Ok(projects
            .iter()
            .filter_map(|p| self.projects.get(p).map(|name| (p.clone(), name.clone())))
            .collect())
    }
}
