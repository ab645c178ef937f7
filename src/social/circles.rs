//! Read-only view over follow relationships and circle membership
//!
//! Backs the alert router's audience resolution. Implementations return
//! plain value collections; there is no lazy relationship traversal.

use crate::error::Result;
use crate::types::{CircleKind, UserId};
use async_trait::async_trait;
use std::collections::HashSet;

/// Read-only graph queries used to resolve "who sees this"
#[async_trait]
pub trait CircleGraph: Send + Sync {
    /// Members of one of `owner`'s circles; empty set if no such circle
    async fn circle_members(&self, owner: UserId, kind: CircleKind) -> Result<HashSet<UserId>>;

    /// Users following `owner`
    async fn followers(&self, owner: UserId) -> Result<HashSet<UserId>>;

    /// Whether `follower` follows `followed`
    async fn is_following(&self, follower: UserId, followed: UserId) -> Result<bool>;
}
