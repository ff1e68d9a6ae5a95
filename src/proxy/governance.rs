//! DRep status lookups
//!
//! Status and delegator queries go through per-service TTL caches. An
//! unregistered DRep is a valid answer and is cached as `None`; a failed
//! request is returned to the caller and leaves the cache untouched.

use crate::ledger::types::quantity;
use crate::ledger::{LedgerError, LedgerIndex};
use crate::proxy::error::ProxyError;
use crate::storage::{Clock, TtlCache};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Registration state of a DRep as reported by the ledger index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrepInfo {
    pub drep_id: String,
    #[serde(default)]
    pub hex: String,
    /// Voting power delegated to the DRep
    #[serde(default, with = "quantity")]
    pub amount: u128,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub active_epoch: Option<u64>,
    #[serde(default)]
    pub has_script: bool,
    #[serde(default)]
    pub retired: bool,
    #[serde(default)]
    pub expired: bool,
}

/// A stake account delegating to a DRep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrepDelegator {
    pub address: String,
    #[serde(with = "quantity")]
    pub amount: u128,
}

pub fn drep_path(drep_id: &str) -> String {
    format!("governance/dreps/{}", drep_id)
}

pub fn drep_delegators_path(drep_id: &str) -> String {
    format!("governance/dreps/{}/delegators", drep_id)
}

/// Cached DRep queries over a ledger index
pub struct DrepStatusService {
    ledger: Arc<dyn LedgerIndex>,
    status: TtlCache<String, Option<DrepInfo>>,
    delegators: TtlCache<String, Vec<DrepDelegator>>,
}

impl DrepStatusService {
    pub fn new(ledger: Arc<dyn LedgerIndex>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            status: TtlCache::new(ttl, clock.clone()),
            delegators: TtlCache::new(ttl, clock),
        }
    }

    /// Registration state of a DRep, `None` when it is not registered
    pub async fn get_drep_status(
        &self,
        drep_id: &str,
        force_refresh: bool,
    ) -> Result<Option<DrepInfo>, ProxyError> {
        let ledger = self.ledger.clone();
        let path = drep_path(drep_id);
        let status = self
            .status
            .get_or_fetch(drep_id.to_string(), force_refresh, || async move {
                match ledger.get(&path).await {
                    Ok(doc) => serde_json::from_value::<DrepInfo>(doc)
                        .map(Some)
                        .map_err(LedgerError::from),
                    Err(LedgerError::NotFound(_)) => Ok(None),
                    Err(err) => Err(err),
                }
            })
            .await?;
        log::debug!(
            "DRep {} is {}",
            drep_id,
            match &status {
                Some(info) if info.active => "active",
                Some(_) => "inactive",
                None => "not registered",
            }
        );
        Ok(status)
    }

    /// Accounts delegating to a DRep; empty when it is not registered
    pub async fn get_drep_delegators(
        &self,
        drep_id: &str,
        force_refresh: bool,
    ) -> Result<Vec<DrepDelegator>, ProxyError> {
        let ledger = self.ledger.clone();
        let path = drep_delegators_path(drep_id);
        let delegators = self
            .delegators
            .get_or_fetch(drep_id.to_string(), force_refresh, || async move {
                match ledger.get(&path).await {
                    Ok(doc) => serde_json::from_value::<Vec<DrepDelegator>>(doc)
                        .map_err(LedgerError::from),
                    Err(LedgerError::NotFound(_)) => Ok(Vec::new()),
                    Err(err) => Err(err),
                }
            })
            .await?;
        Ok(delegators)
    }

    /// Forget everything cached for a DRep
    pub async fn invalidate(&self, drep_id: &str) {
        let key = drep_id.to_string();
        self.status.invalidate(&key).await;
        self.delegators.invalidate(&key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::storage::ManualClock;
    use serde_json::json;

    const DREP: &str = "drep1test";

    fn service(ledger: &Arc<MemoryLedger>, clock: &Arc<ManualClock>) -> DrepStatusService {
        DrepStatusService::new(ledger.clone(), Duration::seconds(300), clock.clone())
    }

    #[tokio::test]
    async fn test_status_cached_within_ttl() {
        let ledger = Arc::new(MemoryLedger::new());
        let clock = Arc::new(ManualClock::default());
        ledger.set_document(
            &drep_path(DREP),
            json!({"drep_id": DREP, "amount": "2000000", "active": true, "has_script": true}),
        );
        let service = service(&ledger, &clock);

        let info = service.get_drep_status(DREP, false).await.unwrap().unwrap();
        assert!(info.active);
        assert_eq!(info.amount, 2_000_000);
        service.get_drep_status(DREP, false).await.unwrap();
        assert_eq!(ledger.call_count(&drep_path(DREP)), 1);

        clock.advance(Duration::seconds(301));
        service.get_drep_status(DREP, false).await.unwrap();
        assert_eq!(ledger.call_count(&drep_path(DREP)), 2);

        service.get_drep_status(DREP, true).await.unwrap();
        assert_eq!(ledger.call_count(&drep_path(DREP)), 3);
    }

    #[tokio::test]
    async fn test_not_found_cached_as_absent() {
        let ledger = Arc::new(MemoryLedger::new());
        let clock = Arc::new(ManualClock::default());
        let service = service(&ledger, &clock);

        assert_eq!(service.get_drep_status(DREP, false).await.unwrap(), None);
        assert_eq!(service.get_drep_status(DREP, false).await.unwrap(), None);
        assert_eq!(ledger.call_count(&drep_path(DREP)), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_not_cached() {
        let ledger = Arc::new(MemoryLedger::new());
        let clock = Arc::new(ManualClock::default());
        let service = service(&ledger, &clock);
        ledger.fail_on(&drep_path(DREP), "timeout");

        let err = service.get_drep_status(DREP, false).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ExternalFetch);

        ledger.clear_failure(&drep_path(DREP));
        assert_eq!(service.get_drep_status(DREP, false).await.unwrap(), None);
        assert_eq!(ledger.call_count(&drep_path(DREP)), 2);
    }

    #[tokio::test]
    async fn test_delegators() {
        let ledger = Arc::new(MemoryLedger::new());
        let clock = Arc::new(ManualClock::default());
        ledger.set_document(
            &drep_delegators_path(DREP),
            json!([{"address": "stake_test1x", "amount": "5000000"}]),
        );
        let service = service(&ledger, &clock);

        let delegators = service.get_drep_delegators(DREP, false).await.unwrap();
        assert_eq!(delegators.len(), 1);
        assert_eq!(delegators[0].amount, 5_000_000);
        assert!(service
            .get_drep_delegators("drep1other", false)
            .await
            .unwrap()
            .is_empty());
    }
}
