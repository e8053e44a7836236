//! Static role -> path permission table.
//!
//! Persisted as JSON mapping role names to ordered lists of exact request
//! paths (no wildcards):
//!
//! ```json
//! { "admin": ["/mock", "/admin-mock"], "user": ["/mock"] }
//! ```
//!
//! The table is built once before the server starts and shared read-only.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::Role;

#[derive(Debug, Error)]
pub enum PermissionsError {
    #[error("failed to read permissions file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid permissions document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionTable {
    paths: HashMap<Role, HashSet<String>>,
}

impl PermissionTable {
    /// Table in which every role is denied every path.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the JSON document form.
    ///
    /// Role names outside the known set are logged and skipped.
    ///
    /// # Errors
    /// Returns an error if the document is not a map of string lists.
    pub fn from_json(document: &str) -> Result<Self, PermissionsError> {
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(document)?;

        let mut paths: HashMap<Role, HashSet<String>> = HashMap::new();
        for (name, allowed) in raw {
            match name.parse::<Role>() {
                Ok(role) => {
                    paths.entry(role).or_default().extend(allowed);
                }
                Err(err) => warn!("Ignoring permissions for {err}"),
            }
        }

        Ok(Self { paths })
    }

    /// Read and parse the permissions file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PermissionsError> {
        let path = path.as_ref();
        let document = fs::read_to_string(path).map_err(|source| PermissionsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&document)
    }

    /// Load the permissions file, falling back to the empty table on any error.
    #[must_use]
    pub fn load(path: impl AsRef<Path>) -> Self {
        match Self::from_file(path) {
            Ok(table) => {
                info!(
                    roles = table.paths.len(),
                    "Loaded permissions configuration"
                );
                for role in Role::ALL {
                    debug!(%role, paths = ?table.paths_for(role), "Role permissions");
                }
                table
            }
            Err(err) => {
                error!("Error loading permissions configuration: {err}; denying all roles");
                Self::empty()
            }
        }
    }

    /// Whether `role` may access exactly `path`.
    #[must_use]
    pub fn allows(&self, role: Role, path: &str) -> bool {
        self.paths
            .get(&role)
            .is_some_and(|allowed| allowed.contains(path))
    }

    /// Paths granted to `role`, sorted for display.
    #[must_use]
    pub fn paths_for(&self, role: Role) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .paths
            .get(&role)
            .map(|allowed| allowed.iter().map(String::as_str).collect())
            .unwrap_or_default();
        paths.sort_unstable();
        paths
    }
}

impl<I, P> FromIterator<(Role, I)> for PermissionTable
where
    I: IntoIterator<Item = P>,
    P: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (Role, I)>>(iter: T) -> Self {
        let mut paths: HashMap<Role, HashSet<String>> = HashMap::new();
        for (role, allowed) in iter {
            paths
                .entry(role)
                .or_default()
                .extend(allowed.into_iter().map(Into::into));
        }
        Self { paths }
    }
}
