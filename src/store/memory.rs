use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Alert, Bid, Capability, Job, JobStatus, Vendor};
use crate::store::{DispatchStore, JobGuard, JobPatch, RevokeScope, UnbidQuery};

#[derive(Debug, Default)]
struct Tables {
    jobs: HashMap<Uuid, Job>,
    /// Append-only, in submission order.
    bids: Vec<Bid>,
    bid_index: HashMap<Uuid, usize>,
    bid_counts: HashMap<Uuid, usize>,
    vendors: HashMap<Uuid, Vendor>,
    vendor_by_phone: HashMap<String, Uuid>,
    capabilities: HashMap<String, Capability>,
    alerts: Vec<Alert>,
}

/// In-process store. Each conditional write runs under one write guard, so
/// exactly one of any set of racing writers observes its guard as matching.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DispatchStore for MemoryStore {
    async fn insert_job(&self, job: Job) -> Result<()> {
        self.tables.write().await.jobs.insert(job.id, job);
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        let tables = self.tables.read().await;
        let mut jobs: Vec<Job> = tables.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn compare_and_swap(
        &self,
        id: Uuid,
        guard: &JobGuard,
        patch: &JobPatch,
    ) -> Result<Option<Job>> {
        let mut tables = self.tables.write().await;
        match tables.jobs.get_mut(&id) {
            Some(job) if guard.matches(job) => {
                patch.apply(job);
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn unbid_candidates(&self, query: &UnbidQuery) -> Result<Vec<Job>> {
        let tables = self.tables.read().await;
        let mut candidates: Vec<Job> = tables
            .jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Unassigned
                    && !j.cancelled
                    && j.bidding_open
                    && j.unbid_alert_sent_at.is_none()
                    && j.created_at <= query.created_before
                    && tables.bid_counts.get(&j.id).copied().unwrap_or(0) == 0
            })
            .cloned()
            .collect();
        candidates.sort_by_key(|j| j.created_at);
        candidates.truncate(query.limit);
        Ok(candidates)
    }

    async fn append_bid(&self, bid: Bid, guard: &JobGuard) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let accepted = tables
            .jobs
            .get(&bid.job_id)
            .map(|job| guard.matches(job))
            .unwrap_or(false);
        if !accepted {
            return Ok(false);
        }
        let position = tables.bids.len();
        tables.bid_index.insert(bid.id, position);
        *tables.bid_counts.entry(bid.job_id).or_insert(0) += 1;
        tables.bids.push(bid);
        Ok(true)
    }

    async fn get_bid(&self, id: Uuid) -> Result<Option<Bid>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bid_index
            .get(&id)
            .and_then(|&i| tables.bids.get(i))
            .cloned())
    }

    async fn bids_for_job(&self, job_id: Uuid) -> Result<Vec<Bid>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bids
            .iter()
            .filter(|b| b.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn count_bids(&self, job_id: Uuid) -> Result<usize> {
        Ok(self
            .tables
            .read()
            .await
            .bid_counts
            .get(&job_id)
            .copied()
            .unwrap_or(0))
    }

    async fn put_capability(&self, capability: Capability) -> Result<()> {
        self.tables
            .write()
            .await
            .capabilities
            .insert(capability.token.clone(), capability);
        Ok(())
    }

    async fn get_capability(&self, token: &str) -> Result<Option<Capability>> {
        Ok(self.tables.read().await.capabilities.get(token).cloned())
    }

    async fn revoke_capabilities(&self, job_id: Uuid, scope: RevokeScope) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let Tables {
            jobs, capabilities, ..
        } = &mut *tables;
        let current: Vec<String> = jobs
            .get(&job_id)
            .map(|j| {
                [j.vendor_token.clone(), j.customer_token.clone()]
                    .into_iter()
                    .flatten()
                    .collect()
            })
            .unwrap_or_default();

        let mut revoked = 0;
        for cap in capabilities.values_mut() {
            if cap.job_id != job_id || cap.revoked {
                continue;
            }
            let selected = match scope {
                RevokeScope::Superseded => !current.contains(&cap.token),
                RevokeScope::Role(role) => cap.role == role,
                RevokeScope::All => true,
            };
            if selected {
                cap.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn find_vendor_by_phone(&self, phone: &str) -> Result<Option<Vendor>> {
        let tables = self.tables.read().await;
        Ok(tables
            .vendor_by_phone
            .get(phone)
            .and_then(|id| tables.vendors.get(id))
            .cloned())
    }

    async fn upsert_vendor(&self, vendor: Vendor) -> Result<Vendor> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .vendor_by_phone
            .get(&vendor.phone)
            .and_then(|id| tables.vendors.get(id))
        {
            return Ok(existing.clone());
        }
        tables.vendor_by_phone.insert(vendor.phone.clone(), vendor.id);
        tables.vendors.insert(vendor.id, vendor.clone());
        Ok(vendor)
    }

    async fn list_vendors(&self) -> Result<Vec<Vendor>> {
        let tables = self.tables.read().await;
        let mut vendors: Vec<Vendor> = tables.vendors.values().cloned().collect();
        vendors.sort_by_key(|v| v.created_at);
        Ok(vendors)
    }

    async fn claim_unbid_alert(&self, alert: Alert) -> Result<Option<Job>> {
        let mut tables = self.tables.write().await;
        let claimed = match tables.jobs.get_mut(&alert.job_id) {
            Some(job) if JobGuard::alert_unclaimed().matches(job) => {
                job.unbid_alert_sent_at = Some(alert.created_at);
                job.clone()
            }
            _ => return Ok(None),
        };
        tables.alerts.push(alert);
        Ok(Some(claimed))
    }

    async fn list_alerts(&self) -> Result<Vec<Alert>> {
        Ok(self.tables.read().await.alerts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BidSubmission, CapabilityRole, JobDraft};
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn open_job() -> Job {
        let mut job = Job::from_draft(JobDraft::new("Towing", "1 Main St"), Utc::now()).unwrap();
        job.bidding_open = true;
        job
    }

    #[tokio::test]
    async fn cas_applies_once() {
        let store = MemoryStore::new();
        let job = open_job();
        let id = job.id;
        store.insert_job(job).await.unwrap();

        let patch = JobPatch {
            status: Some(JobStatus::Assigned),
            bidding_open: Some(false),
            vendor_id: Some(Some(Uuid::new_v4())),
            ..Default::default()
        };
        let first = store
            .compare_and_swap(id, &JobGuard::open_for_bids(), &patch)
            .await
            .unwrap();
        assert!(first.is_some());
        let second = store
            .compare_and_swap(id, &JobGuard::open_for_bids(), &patch)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn cas_on_missing_job_matches_nothing() {
        let store = MemoryStore::new();
        let result = store
            .compare_and_swap(Uuid::new_v4(), &JobGuard::any(), &JobPatch::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn concurrent_alert_claims_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let job = open_job();
        let id = job.id;
        store.insert_job(job.clone()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let alert = Alert::unbid(&job, 10, Utc::now());
            handles.push(tokio::spawn(async move {
                store.claim_unbid_alert(alert).await.unwrap().is_some()
            }));
        }
        let mut wins = 0;
        for h in handles {
            if h.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);

        let alerts = store.list_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        let stored = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(stored.unbid_alert_sent_at, Some(alerts[0].created_at));
    }

    #[tokio::test]
    async fn alert_claim_on_missing_job_stores_nothing() {
        let store = MemoryStore::new();
        let alert = Alert::unbid(&open_job(), 10, Utc::now());
        assert!(store.claim_unbid_alert(alert).await.unwrap().is_none());
        assert!(store.list_alerts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_bid_respects_guard_and_order() {
        let store = MemoryStore::new();
        let job = open_job();
        let job_id = job.id;
        store.insert_job(job).await.unwrap();

        for price in [150.0, 120.0, 135.0] {
            let bid = BidSubmission::new("V", "555", price, 20)
                .into_bid(job_id, Utc::now())
                .unwrap();
            assert!(store.append_bid(bid, &JobGuard::open_for_bids()).await.unwrap());
        }
        let prices: Vec<f64> = store
            .bids_for_job(job_id)
            .await
            .unwrap()
            .iter()
            .map(|b| b.price)
            .collect();
        assert_eq!(prices, vec![150.0, 120.0, 135.0]);
        assert_eq!(store.count_bids(job_id).await.unwrap(), 3);

        store
            .compare_and_swap(
                job_id,
                &JobGuard::any(),
                &JobPatch {
                    bidding_open: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let late = BidSubmission::new("V", "555", 99.0, 20)
            .into_bid(job_id, Utc::now())
            .unwrap();
        assert!(!store.append_bid(late, &JobGuard::open_for_bids()).await.unwrap());
        assert_eq!(store.count_bids(job_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn unbid_candidates_filters_and_orders() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut old = open_job();
        old.created_at = now - Duration::minutes(30);
        let mut older = open_job();
        older.created_at = now - Duration::minutes(60);
        let mut fresh = open_job();
        fresh.created_at = now;
        let mut closed = open_job();
        closed.created_at = now - Duration::minutes(45);
        closed.bidding_open = false;
        let mut bid_on = open_job();
        bid_on.created_at = now - Duration::minutes(50);

        let (old_id, older_id, bid_on_id) = (old.id, older.id, bid_on.id);
        for job in [old, older, fresh, closed, bid_on] {
            store.insert_job(job).await.unwrap();
        }
        let bid = BidSubmission::new("V", "555", 10.0, 5)
            .into_bid(bid_on_id, now)
            .unwrap();
        store.append_bid(bid, &JobGuard::any()).await.unwrap();

        let query = UnbidQuery {
            created_before: now - Duration::minutes(10),
            limit: 25,
        };
        let ids: Vec<Uuid> = store
            .unbid_candidates(&query)
            .await
            .unwrap()
            .iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(ids, vec![older_id, old_id]);

        let capped = store
            .unbid_candidates(&UnbidQuery { limit: 1, ..query })
            .await
            .unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, older_id);
    }

    #[tokio::test]
    async fn vendor_upsert_is_keyed_by_phone() {
        let store = MemoryStore::new();
        let first = store
            .upsert_vendor(Vendor::shell(Uuid::new_v4(), "Ace".into(), "555".into(), Utc::now()))
            .await
            .unwrap();
        let second = store
            .upsert_vendor(Vendor::shell(Uuid::new_v4(), "Ace Towing".into(), "555".into(), Utc::now()))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_vendors().await.unwrap().len(), 1);
        assert!(store.find_vendor_by_phone("555").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn revoke_superseded_keeps_current_tokens() {
        let store = MemoryStore::new();
        let mut job = open_job();
        let job_id = job.id;
        let current = Capability::mint(job_id, CapabilityRole::Vendor, Utc::now());
        let stale = Capability::mint(job_id, CapabilityRole::Vendor, Utc::now());
        let customer = Capability::mint(job_id, CapabilityRole::Customer, Utc::now());
        job.vendor_token = Some(current.token.clone());
        job.customer_token = Some(customer.token.clone());
        store.insert_job(job).await.unwrap();
        for cap in [current.clone(), stale.clone(), customer.clone()] {
            store.put_capability(cap).await.unwrap();
        }

        let revoked = store
            .revoke_capabilities(job_id, RevokeScope::Superseded)
            .await
            .unwrap();
        assert_eq!(revoked, 1);
        assert!(store.get_capability(&stale.token).await.unwrap().unwrap().revoked);
        assert!(!store.get_capability(&current.token).await.unwrap().unwrap().revoked);

        let revoked = store
            .revoke_capabilities(job_id, RevokeScope::Role(CapabilityRole::Vendor))
            .await
            .unwrap();
        assert_eq!(revoked, 1);
        assert!(!store.get_capability(&customer.token).await.unwrap().unwrap().revoked);

        let revoked = store
            .revoke_capabilities(job_id, RevokeScope::All)
            .await
            .unwrap();
        assert_eq!(revoked, 1);
    }
}
