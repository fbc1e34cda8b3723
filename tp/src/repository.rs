//! Trip persistence

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use tripstore::{Store, StoreError};

use crate::domain::TripPlan;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Where trip plans live between requests
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn save(&self, plan: &TripPlan) -> Result<(), RepositoryError>;
    async fn load(&self, trip_id: &str) -> Result<Option<TripPlan>, RepositoryError>;
    async fn list(&self) -> Result<Vec<TripPlan>, RepositoryError>;
    async fn delete(&self, trip_id: &str) -> Result<bool, RepositoryError>;
}

/// JSON documents on disk via tripstore
///
/// Store calls are blocking file IO, so each runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct FileTripRepository {
    store: Arc<Store>,
}

impl FileTripRepository {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        debug!(dir = %dir.as_ref().display(), "FileTripRepository::open: called");
        Ok(Self {
            store: Arc::new(Store::open(dir)?),
        })
    }
}

#[async_trait]
impl TripRepository for FileTripRepository {
    async fn save(&self, plan: &TripPlan) -> Result<(), RepositoryError> {
        let store = self.store.clone();
        let plan = plan.clone();
        Ok(tokio::task::spawn_blocking(move || store.put(&plan)).await??)
    }

    async fn load(&self, trip_id: &str) -> Result<Option<TripPlan>, RepositoryError> {
        let store = self.store.clone();
        let trip_id = trip_id.to_string();
        Ok(tokio::task::spawn_blocking(move || store.get::<TripPlan>(&trip_id)).await??)
    }

    async fn list(&self) -> Result<Vec<TripPlan>, RepositoryError> {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || store.list::<TripPlan>()).await??)
    }

    async fn delete(&self, trip_id: &str) -> Result<bool, RepositoryError> {
        let store = self.store.clone();
        let trip_id = trip_id.to_string();
        Ok(tokio::task::spawn_blocking(move || store.delete::<TripPlan>(&trip_id)).await??)
    }
}

/// In-process map, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryTripRepository {
    plans: Mutex<HashMap<String, TripPlan>>,
}

impl MemoryTripRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn plans(&self) -> std::sync::MutexGuard<'_, HashMap<String, TripPlan>> {
        self.plans.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TripRepository for MemoryTripRepository {
    async fn save(&self, plan: &TripPlan) -> Result<(), RepositoryError> {
        self.plans().insert(plan.trip_id.clone(), plan.clone());
        Ok(())
    }

    async fn load(&self, trip_id: &str) -> Result<Option<TripPlan>, RepositoryError> {
        Ok(self.plans().get(trip_id).cloned())
    }

    async fn list(&self) -> Result<Vec<TripPlan>, RepositoryError> {
        let mut plans: Vec<TripPlan> = self.plans().values().cloned().collect();
        plans.sort_by_key(|p| std::cmp::Reverse(p.updated_at));
        Ok(plans)
    }

    async fn delete(&self, trip_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.plans().remove(trip_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TripPlanRequest;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn plan(id: &str) -> TripPlan {
        let start = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 6, 4).unwrap();
        TripPlan::new(
            id.to_string(),
            "Lisbon".to_string(),
            None,
            Vec::new(),
            Vec::new(),
            TripPlanRequest::new("Lisbon", start, end, 800.0),
        )
    }

    #[tokio::test]
    async fn test_file_repository_roundtrip() {
        let temp = TempDir::new().unwrap();
        let repo = FileTripRepository::open(temp.path()).unwrap();

        let original = plan("t-1");
        repo.save(&original).await.unwrap();
        assert_eq!(repo.load("t-1").await.unwrap(), Some(original));
        assert_eq!(repo.list().await.unwrap().len(), 1);

        assert!(repo.delete("t-1").await.unwrap());
        assert!(repo.load("t-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_repository_rejects_bad_id() {
        let temp = TempDir::new().unwrap();
        let repo = FileTripRepository::open(temp.path()).unwrap();
        assert!(matches!(
            repo.load("../etc").await,
            Err(RepositoryError::Store(StoreError::InvalidId(_)))
        ));
    }

    #[tokio::test]
    async fn test_memory_repository() {
        let repo = MemoryTripRepository::new();
        repo.save(&plan("a")).await.unwrap();
        repo.save(&plan("b")).await.unwrap();

        assert_eq!(repo.list().await.unwrap().len(), 2);
        assert!(repo.delete("a").await.unwrap());
        assert!(!repo.delete("a").await.unwrap());
        assert!(repo.load("b").await.unwrap().is_some());
    }
}
