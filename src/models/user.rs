// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Closed set of roles gating authorization checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
            Role::Moderator => "MODERATOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            "MODERATOR" => Ok(Role::Moderator),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// User document as persisted by the store.
///
/// Holds the password hash, so it never leaves the service layer; handlers
/// only ever see [`User`].
#[derive(Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    /// Unique, compared case-sensitively as stored
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    /// Firebase Cloud Messaging device token
    #[serde(default)]
    pub fcm_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl UserRecord {
    /// Create a new active user record with a fresh id.
    pub fn new(email: String, password_hash: String, name: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            password_hash,
            name,
            role,
            is_active: true,
            fcm_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Public view without the password hash.
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Sanitized user returned by every read path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user (registration or admin create).
#[derive(Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Option<Role>,
}

/// Partial update applied by administrators.
#[derive(Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

/// Field-level changes to a stored user.
///
/// Stores write only the `Some` fields (plus `updated_at`), so concurrent
/// changes to different fields never overwrite each other.
#[derive(Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub fcm_token: Option<String>,
}

impl UserChanges {
    /// Apply the changes to `record` and stamp `updated_at`.
    pub fn apply_to(&self, record: &mut UserRecord, now: DateTime<Utc>) {
        if let Some(email) = &self.email {
            record.email = email.clone();
        }
        if let Some(password_hash) = &self.password_hash {
            record.password_hash = password_hash.clone();
        }
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(role) = self.role {
            record.role = role;
        }
        if let Some(is_active) = self.is_active {
            record.is_active = is_active;
        }
        if let Some(fcm_token) = &self.fcm_token {
            record.fcm_token = Some(fcm_token.clone());
        }
        record.updated_at = now;
    }

    /// Stored field names touched by these changes, `updated_at` included.
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = Vec::new();
        if self.email.is_some() {
            paths.push("email");
        }
        if self.password_hash.is_some() {
            paths.push("password_hash");
        }
        if self.name.is_some() {
            paths.push("name");
        }
        if self.role.is_some() {
            paths.push("role");
        }
        if self.is_active.is_some() {
            paths.push("is_active");
        }
        if self.fcm_token.is_some() {
            paths.push("fcm_token");
        }
        paths.push("updated_at");
        paths
    }
}

// ─── Listing ─────────────────────────────────────────────────

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
    Email,
    Role,
}

impl SortField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "createdAt" => Some(Self::CreatedAt),
            "updatedAt" => Some(Self::UpdatedAt),
            "name" => Some(Self::Name),
            "email" => Some(Self::Email),
            "role" => Some(Self::Role),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Anything other than `asc` (case-insensitive) sorts descending.
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

/// Filtering, sorting and pagination for user listings.
#[derive(Debug, Clone)]
pub struct UserQuery {
    pub page: u32,
    pub limit: u32,
    /// Case-insensitive substring over name and email
    pub search: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub sort_by: SortField,
    pub order: SortOrder,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            search: None,
            role: None,
            is_active: None,
            sort_by: SortField::default(),
            order: SortOrder::default(),
        }
    }
}

impl UserQuery {
    /// Clamp page to >= 1 and limit to 1..=MAX_LIMIT.
    pub fn with_paging(mut self, page: Option<u32>, limit: Option<u32>) -> Self {
        self.page = page.unwrap_or(DEFAULT_PAGE).max(1);
        self.limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        self
    }

    fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.limit as usize)
    }

    /// Whether a record passes the search/role/active filters.
    pub fn matches(&self, user: &UserRecord) -> bool {
        if let Some(role) = self.role {
            if user.role != role {
                return false;
            }
        }
        if let Some(active) = self.is_active {
            if user.is_active != active {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref() {
            let needle = search.to_lowercase();
            return user.name.to_lowercase().contains(&needle)
                || user.email.to_lowercase().contains(&needle);
        }
        true
    }

    /// Filter, sort and slice a set of records.
    ///
    /// Returns the requested page together with the total number of matches.
    pub fn apply(&self, records: impl IntoIterator<Item = UserRecord>) -> (Vec<UserRecord>, u64) {
        let mut matched: Vec<UserRecord> = records.into_iter().filter(|u| self.matches(u)).collect();
        let total = matched.len() as u64;

        matched.sort_by(|a, b| {
            let ordering = match self.sort_by {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortField::Name => a.name.cmp(&b.name),
                SortField::Email => a.email.cmp(&b.email),
                SortField::Role => a.role.as_str().cmp(b.role.as_str()),
            }
            .then_with(|| a.id.cmp(&b.id));

            match self.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let page = matched
            .into_iter()
            .skip(self.offset())
            .take(self.limit as usize)
            .collect();

        (page, total)
    }
}

/// Pagination metadata returned alongside list results.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PaginationMeta {
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        let total_pages = total.div_ceil(limit.max(1) as u64);
        Self {
            total,
            page,
            limit,
            total_pages,
            has_next_page: (page as u64) < total_pages,
            has_prev_page: page > 1,
        }
    }
}
