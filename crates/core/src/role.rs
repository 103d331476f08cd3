//! The role capability: named content processors and their registry.
//!
//! A role is a named handler that accepts items of certain categories.
//! Roles are registered once at startup in a [`RoleRegistry`]; the registry
//! is then shared read-only with the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use crate::content::{Category, ContentItem};
use crate::error::{DispatchError, HandlerError, RoleError};

/// Step parameters handed to a role alongside each item.
pub type Params = BTreeMap<String, serde_json::Value>;

/// What a handler produces for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RoleOutput {
    /// Free-form text.
    Text(String),
    /// A structured record.
    Structured(serde_json::Map<String, serde_json::Value>),
}

impl RoleOutput {
    /// Build a structured output from a JSON object value.
    ///
    /// Non-object values are wrapped under a `"value"` key.
    pub fn structured(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => RoleOutput::Structured(map),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".into(), other);
                RoleOutput::Structured(map)
            }
        }
    }
}

/// The processing half of a role.
///
/// Handlers may perform I/O and may be slow. The orchestrator runs each
/// call in its own task and enforces the timeout from outside it, so on a
/// multi-thread runtime even a handler that blocks its thread is cut off.
/// The blocked worker stays busy until the handler returns, so blocking
/// work still belongs in `spawn_blocking`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, item: &ContentItem, params: &Params)
    -> Result<RoleOutput, HandlerError>;
}

/// Adapter that turns an async closure into a [`Handler`].
pub struct FnHandler<F>(F);

/// Wrap an async closure `(ContentItem, Params) -> Result<RoleOutput, HandlerError>`.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(ContentItem, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RoleOutput, HandlerError>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(ContentItem, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RoleOutput, HandlerError>> + Send + 'static,
{
    async fn handle(
        &self,
        item: &ContentItem,
        params: &Params,
    ) -> Result<RoleOutput, HandlerError> {
        (self.0)(item.clone(), params.clone()).await
    }
}

/// What to do when a matched item's category is not accepted by the role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Record the item as skipped with a reason.
    #[default]
    Skip,
    /// Record the item as a failed dispatch.
    Fail,
}

impl FromStr for MismatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(MismatchPolicy::Skip),
            "fail" => Ok(MismatchPolicy::Fail),
            other => Err(format!("invalid mismatch policy '{other}' (expected skip or fail)")),
        }
    }
}

impl fmt::Display for MismatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchPolicy::Skip => f.write_str("skip"),
            MismatchPolicy::Fail => f.write_str("fail"),
        }
    }
}

/// A named capability that processes items of certain categories.
#[derive(Clone)]
pub struct Role {
    name: String,
    description: String,
    accepts: BTreeSet<Category>,
    handler: Arc<dyn Handler>,
}

impl Role {
    pub fn new(
        name: impl Into<String>,
        accepts: impl IntoIterator<Item = Category>,
        handler: impl Handler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            accepts: accepts.into_iter().collect(),
            handler: Arc::new(handler),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn accepts(&self) -> &BTreeSet<Category> {
        &self.accepts
    }

    /// Fails with [`RoleError::CategoryMismatch`] if the item's category is not accepted.
    pub fn check(&self, item: &ContentItem) -> Result<(), RoleError> {
        if self.accepts.contains(&item.category) {
            Ok(())
        } else {
            Err(RoleError::CategoryMismatch {
                role: self.name.clone(),
                category: item.category,
            })
        }
    }

    /// Call the handler without the category check.
    pub async fn invoke(
        &self,
        item: &ContentItem,
        params: &Params,
    ) -> Result<RoleOutput, DispatchError> {
        self.handler
            .handle(item, params)
            .await
            .map_err(|source| DispatchError::Handler {
                role: self.name.clone(),
                source,
            })
    }

    /// Check the category, then call the handler.
    pub async fn dispatch(
        &self,
        item: &ContentItem,
        params: &Params,
    ) -> Result<RoleOutput, DispatchError> {
        self.check(item)?;
        self.invoke(item, params).await
    }

    pub fn info(&self) -> RoleInfo {
        RoleInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            accepts: self.accepts.iter().copied().collect(),
        }
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Role")
            .field("name", &self.name)
            .field("accepts", &self.accepts)
            .finish_non_exhaustive()
    }
}

/// Serializable description of a registered role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub accepts: Vec<Category>,
}

/// A registry of available roles.
///
/// Populated at startup, then wrapped in an `Arc` and shared. There is no
/// way to re-register or remove a role afterwards.
#[derive(Debug, Default)]
pub struct RoleRegistry {
    roles: BTreeMap<String, Arc<Role>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name`. Fails if the name is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        accepts: impl IntoIterator<Item = Category>,
        handler: impl Handler + 'static,
    ) -> Result<(), RoleError> {
        self.register_role(Role::new(name, accepts, handler))
    }

    /// Register a fully built role. Fails if the name is taken.
    pub fn register_role(&mut self, role: Role) -> Result<(), RoleError> {
        if self.roles.contains_key(role.name()) {
            return Err(RoleError::Duplicate(role.name().to_string()));
        }
        tracing::debug!(role = %role.name(), accepts = ?role.accepts(), "Registered role");
        self.roles.insert(role.name().to_string(), Arc::new(role));
        Ok(())
    }

    /// Look up a role by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<Role>, RoleError> {
        self.roles
            .get(name)
            .cloned()
            .ok_or_else(|| RoleError::Unknown(name.to_string()))
    }

    /// Dispatch an item to a role, enforcing its accepted categories.
    pub async fn dispatch(
        &self,
        role: &Role,
        item: &ContentItem,
        params: &Params,
    ) -> Result<RoleOutput, DispatchError> {
        role.dispatch(item, params).await
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    /// Registered role names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.roles.keys().map(String::as_str).collect()
    }

    pub fn infos(&self) -> Vec<RoleInfo> {
        self.roles.values().map(|r| r.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
