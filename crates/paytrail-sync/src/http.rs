//! HTTP client for the public interests register and members listing.

use std::time::Duration;

use async_trait::async_trait;
use paytrail_core::{Category, InterestRecord, Member, SyncOptions};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{InterestQuery, RegisterSource, SyncError};

/// One page of a register listing.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    total_results: Option<usize>,
}

#[derive(Deserialize)]
struct MemberItem {
    value: MemberValue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberValue {
    id: u32,
    name_display_as: String,
    #[serde(default)]
    latest_party: Option<Named>,
    #[serde(default)]
    latest_house_membership: Option<HouseMembership>,
}

#[derive(Deserialize)]
struct Named {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HouseMembership {
    #[serde(default)]
    membership_from: Option<String>,
}

impl From<MemberItem> for Member {
    fn from(item: MemberItem) -> Self {
        let v = item.value;
        Member {
            id: v.id,
            name: v.name_display_as,
            party: v.latest_party.and_then(|p| p.name),
            constituency: v.latest_house_membership.and_then(|h| h.membership_from),
        }
    }
}

/// HTTP client for the register's listing endpoints.
///
/// Listings are paged with `Skip`/`Take`. Pages are requested one at a time,
/// each fully drained before the next, with a fixed pause in between to stay
/// under the upstream rate limit.
pub struct RegisterClient {
    client: reqwest::Client,
    interests_url: String,
    members_url: String,
    page_size: usize,
    page_delay: Duration,
}

impl RegisterClient {
    /// `interests_url` and `members_url` are API roots like
    /// `https://interests-api.parliament.uk/api/v1` (no trailing slash needed).
    pub fn new(interests_url: String, members_url: String, options: &SyncOptions) -> Self {
        Self {
            client: reqwest::Client::new(),
            interests_url: interests_url.trim_end_matches('/').to_string(),
            members_url: members_url.trim_end_matches('/').to_string(),
            page_size: options.page_size.max(1),
            page_delay: Duration::from_millis(options.page_delay_ms),
        }
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Page<T>, SyncError> {
        let resp = self.client.get(url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Drain every page of a listing.
    async fn paged<T: DeserializeOwned>(
        &self,
        url: &str,
        filters: &[(&str, String)],
        skip_key: &str,
        take_key: &str,
    ) -> Result<Vec<T>, SyncError> {
        let mut all = Vec::new();
        loop {
            let mut query = filters.to_vec();
            query.push((skip_key, all.len().to_string()));
            query.push((take_key, self.page_size.to_string()));

            let page: Page<T> = self.get_page(url, &query).await?;
            let fetched = page.items.len();
            all.extend(page.items);
            debug!(url, fetched, total = ?page.total_results, "fetched page");

            let done = fetched == 0
                || fetched < self.page_size
                || page.total_results.is_some_and(|total| all.len() >= total);
            if done {
                break;
            }
            tokio::time::sleep(self.page_delay).await;
        }
        Ok(all)
    }
}

#[async_trait]
impl RegisterSource for RegisterClient {
    async fn fetch_categories(&self) -> Result<Vec<Category>, SyncError> {
        let url = format!("{}/Categories", self.interests_url);
        info!(url = %url, "fetching categories");
        let categories: Vec<Category> = self.paged(&url, &[], "Skip", "Take").await?;
        info!(count = categories.len(), "fetched categories");
        Ok(categories)
    }

    async fn fetch_members(&self) -> Result<Vec<Member>, SyncError> {
        let url = format!("{}/Members/Search", self.members_url);
        info!(url = %url, "fetching members");
        let filters = [
            ("House", "1".to_string()),
            ("IsCurrentMember", "true".to_string()),
        ];
        let items: Vec<MemberItem> = self.paged(&url, &filters, "skip", "take").await?;
        let members: Vec<Member> = items.into_iter().map(Member::from).collect();
        info!(count = members.len(), "fetched members");
        Ok(members)
    }

    async fn fetch_interests(&self, query: &InterestQuery) -> Result<Vec<InterestRecord>, SyncError> {
        let url = format!("{}/Interests", self.interests_url);
        let mut filters = Vec::new();
        if let Some(category_id) = query.category_id {
            filters.push(("CategoryId", category_id.to_string()));
        }
        if query.expand_child_interests {
            filters.push(("ExpandChildInterests", "true".to_string()));
        }
        info!(url = %url, ?query, "fetching interests");

        // The listing filters on one member at a time.
        let interests: Vec<InterestRecord> = if query.member_ids.is_empty() {
            self.paged(&url, &filters, "Skip", "Take").await?
        } else {
            let mut all = Vec::new();
            for member_id in &query.member_ids {
                let mut member_filters = filters.clone();
                member_filters.push(("MemberId", member_id.to_string()));
                all.extend(self.paged::<InterestRecord>(&url, &member_filters, "Skip", "Take").await?);
            }
            all
        };
        info!(count = interests.len(), "fetched interests");
        Ok(interests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> RegisterClient {
        RegisterClient::new(url.into(), "http://members.test/api/".into(), &SyncOptions::default())
    }

    #[test]
    fn register_client_trims_trailing_slash() {
        let client = client("http://localhost:4000/");
        assert_eq!(client.interests_url, "http://localhost:4000");
        assert_eq!(client.members_url, "http://members.test/api");
        assert_eq!(client.page_size, 20);
    }

    #[test]
    fn interest_page_deserializes() {
        let json = r#"{
            "skip": 0,
            "take": 20,
            "totalResults": 1,
            "items": [{
                "id": 9001,
                "summary": "Consultancy",
                "category": {"id": 12, "name": "Employment and earnings"},
                "member": {"id": 172, "nameDisplayAs": "Jane Example"},
                "fields": [{"name": "PayerName", "value": "Example Ltd"}]
            }]
        }"#;
        let page: Page<InterestRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(page.total_results, Some(1));
        assert_eq!(page.items[0].id, 9001);
        assert_eq!(page.items[0].member.id, 172);
    }

    #[test]
    fn member_item_maps_to_member() {
        let json = r#"{
            "items": [{
                "value": {
                    "id": 172,
                    "nameDisplayAs": "Jane Example",
                    "latestParty": {"id": 15, "name": "Labour (Co-op)"},
                    "latestHouseMembership": {"membershipFrom": "Example North"}
                },
                "links": []
            }],
            "totalResults": 1
        }"#;
        let page: Page<MemberItem> = serde_json::from_str(json).unwrap();
        let member: Member = page.items.into_iter().next().unwrap().into();
        assert_eq!(member.id, 172);
        assert_eq!(member.name, "Jane Example");
        assert_eq!(member.party.as_deref(), Some("Labour (Co-op)"));
        assert_eq!(member.constituency.as_deref(), Some("Example North"));
    }

    #[test]
    fn empty_page_has_no_items() {
        let page: Page<Category> = serde_json::from_str(r#"{"totalResults": 0}"#).unwrap();
        assert!(page.items.is_empty());
    }
}
