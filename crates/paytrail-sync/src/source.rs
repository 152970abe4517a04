//! Where register records come from.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use paytrail_core::{Category, InterestRecord, Member};
use serde::Deserialize;
use tracing::debug;

use crate::SyncError;

/// Filter for an interest listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestQuery {
    pub category_id: Option<u32>,
    /// Empty means every member.
    pub member_ids: Vec<u32>,
    /// Nest child interests under their parent instead of listing them as
    /// separate top-level records.
    pub expand_child_interests: bool,
}

/// Inbound fetches. Every error returned here is fatal to a sync run.
#[async_trait]
pub trait RegisterSource: Send + Sync {
    async fn fetch_categories(&self) -> Result<Vec<Category>, SyncError>;
    async fn fetch_members(&self) -> Result<Vec<Member>, SyncError>;
    async fn fetch_interests(&self, query: &InterestQuery) -> Result<Vec<InterestRecord>, SyncError>;
}

/// A source backed by records already in memory, usually loaded from a JSON
/// dump of the register.
///
/// Interests are held in nested form. A listing without child expansion
/// returns children as separate top-level records, as the live register does.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticSource {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub interests: Vec<InterestRecord>,
    /// Make every interest fetch fail.
    #[serde(skip)]
    pub unavailable: bool,
    /// Pause before answering each fetch.
    #[serde(skip)]
    pub latency: Option<Duration>,
}

impl StaticSource {
    /// Load `{"categories": [...], "members": [...], "interests": [...]}`.
    pub fn from_json_file(path: &Path) -> Result<Self, SyncError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn wait(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn flatten_into(record: &InterestRecord, out: &mut Vec<InterestRecord>) {
    let mut top = record.clone();
    top.child_interests.clear();
    out.push(top);
    for child in &record.child_interests {
        let mut child = child.clone();
        child.parent_interest_id.get_or_insert(record.id);
        flatten_into(&child, out);
    }
}

#[async_trait]
impl RegisterSource for StaticSource {
    async fn fetch_categories(&self) -> Result<Vec<Category>, SyncError> {
        self.wait().await;
        Ok(self.categories.clone())
    }

    async fn fetch_members(&self) -> Result<Vec<Member>, SyncError> {
        self.wait().await;
        Ok(self.members.clone())
    }

    async fn fetch_interests(&self, query: &InterestQuery) -> Result<Vec<InterestRecord>, SyncError> {
        self.wait().await;
        if self.unavailable {
            return Err(SyncError::Unavailable("interest listing".into()));
        }

        let mut out = Vec::new();
        for record in &self.interests {
            if query.expand_child_interests {
                out.push(record.clone());
            } else {
                flatten_into(record, &mut out);
            }
        }
        out.retain(|r| {
            query.category_id.is_none_or(|c| r.category.id == c)
                && (query.member_ids.is_empty() || query.member_ids.contains(&r.member.id))
        });
        debug!(count = out.len(), ?query, "served interests");
        Ok(out)
    }
}
