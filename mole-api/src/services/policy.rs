//! Group to permission mapping.

use std::collections::{HashMap, HashSet};

/// Group whose permissions every caller holds.
pub const DEFAULT_GROUP: &str = "Default";

pub const OWNED_LESIONS_READ: &str = "owned.lesions.read";
pub const OWNED_LESIONS_WRITE: &str = "owned.lesions.write";
pub const OWNED_REQUESTS_CREATE: &str = "owned.requests.create";
pub const REQUESTS_READ: &str = "requests.read";
pub const REQUESTS_RESPOND: &str = "requests.respond";
pub const REQUESTS_CREATE: &str = "requests.create";
pub const REPORTS_READ: &str = "reports.read";
pub const LESIONS_READ: &str = "lesions.read";
pub const LESIONS_WRITE: &str = "lesions.write";
pub const BODY_PARTS_WRITE: &str = "body-parts.write";
pub const QUESTIONS_WRITE: &str = "questions.write";

/// Immutable table built once and shared by reference.
#[derive(Debug, Clone)]
pub struct PermissionTable {
    groups: HashMap<String, HashSet<String>>,
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::new([
            (
                DEFAULT_GROUP,
                &[OWNED_LESIONS_READ, OWNED_LESIONS_WRITE, OWNED_REQUESTS_CREATE][..],
            ),
            (
                "Doctors",
                &[REQUESTS_READ, REPORTS_READ, LESIONS_READ, REQUESTS_RESPOND][..],
            ),
            (
                "Administrators",
                &[
                    BODY_PARTS_WRITE,
                    QUESTIONS_WRITE,
                    LESIONS_READ,
                    LESIONS_WRITE,
                    REQUESTS_CREATE,
                    REQUESTS_RESPOND,
                ][..],
            ),
        ])
    }
}

impl PermissionTable {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, &'a [&'a str])>) -> Self {
        let groups = entries
            .into_iter()
            .map(|(group, permissions)| {
                (
                    group.to_string(),
                    permissions.iter().map(|p| p.to_string()).collect(),
                )
            })
            .collect();
        Self { groups }
    }

    /// Union of the default set and every known group's set. Unknown groups
    /// contribute nothing.
    pub fn granted<'a, I>(&'a self, groups: I) -> HashSet<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        std::iter::once(DEFAULT_GROUP)
            .chain(groups)
            .filter_map(|group| self.groups.get(group))
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// True iff every required permission is granted.
    pub fn lookup<S: AsRef<str>>(&self, groups: &[S], required: &[&str]) -> bool {
        let granted = self.granted(groups.iter().map(|g| g.as_ref()));
        required.iter().all(|permission| granted.contains(permission))
    }
}
