use super::AppKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named set of application identities whose usage is limited together.
///
/// Membership is by identity only; the group never owns application state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationGroup {
    pub name: String,
    #[serde(default)]
    members: BTreeSet<AppKey>,
}

impl ApplicationGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeSet::new(),
        }
    }

    /// Returns false if the application was already a member.
    pub fn add(&mut self, app: AppKey) -> bool {
        self.members.insert(app)
    }

    pub fn remove(&mut self, app: &AppKey) -> bool {
        self.members.remove(app)
    }

    /// Whether any member entry covers the given identity.
    pub fn contains(&self, app: &AppKey) -> bool {
        self.members.iter().any(|member| member.covers(app))
    }

    pub fn members(&self) -> impl Iterator<Item = &AppKey> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
