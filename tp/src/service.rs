//! TripService - the request boundary
//!
//! Wires plan generation, span allocation, persistence and price refresh.
//! Only generation, allocation and storage failures abort a request; per-span
//! pricing problems travel inside the [`RefreshReport`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{PriceCache, PriceCacheEntry};
use crate::domain::{IdResolver, TripPlan, TripPlanRequest, TripStatus, generate_id};
use crate::enrich::EnrichmentFetcher;
use crate::planner::{PlanGenerationError, PlanGenerator};
use crate::refresh::{RefreshController, RefreshReport};
use crate::repository::{RepositoryError, TripRepository};
use crate::spans::{SpanAllocationError, SpanAllocator};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Plan(#[from] PlanGenerationError),

    #[error(transparent)]
    Allocation(#[from] SpanAllocationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Trip not found: {0}")]
    NotFound(String),

    #[error("Ambiguous trip reference '{reference}', candidates: {}", candidates.join(", "))]
    Ambiguous { reference: String, candidates: Vec<String> },

    #[error("No planning provider configured")]
    PlannerUnavailable,
}

/// A stored plan with its current price picture
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    pub plan: TripPlan,
    pub prices: RefreshReport,
}

impl PlanView {
    pub fn trip_id(&self) -> &str {
        &self.plan.trip_id
    }
}

pub struct TripService {
    repository: Arc<dyn TripRepository>,
    controller: RefreshController,
    allocator: SpanAllocator,
    generator: Option<PlanGenerator>,
    enrichment: Option<Arc<EnrichmentFetcher>>,
}

impl TripService {
    pub fn new(repository: Arc<dyn TripRepository>, controller: RefreshController, allocator: SpanAllocator) -> Self {
        Self {
            repository,
            controller,
            allocator,
            generator: None,
            enrichment: None,
        }
    }

    pub fn with_generator(mut self, generator: PlanGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Context passed to the planner alongside the request
    pub fn with_enrichment(mut self, fetcher: Arc<EnrichmentFetcher>) -> Self {
        self.enrichment = Some(fetcher);
        self
    }

    fn cache(&self) -> &Arc<PriceCache> {
        self.controller.dispatcher().cache()
    }

    /// Generate, allocate, persist and price a new trip
    pub async fn create_plan(&self, request: TripPlanRequest) -> Result<PlanView, ServiceError> {
        debug!(location = %request.location, "TripService::create_plan: called");
        let generator = self.generator.as_ref().ok_or(ServiceError::PlannerUnavailable)?;
        request.validate().map_err(PlanGenerationError::InvalidRequest)?;

        let enrichment = match &self.enrichment {
            Some(fetcher) => Some(fetcher.fetch(&request.location).await),
            None => None,
        };
        let context = enrichment.as_ref().and_then(|e| e.text());

        let generated = generator.generate(&request, context).await?;
        let spans = self.allocator.allocate(&generated.booking_needed)?;

        let trip_id = generate_id("trip", &generated.title);
        let mut plan = TripPlan::new(
            trip_id.clone(),
            generated.title,
            generated.summary,
            generated.days,
            spans,
            request,
        );
        plan.alternatives = generated.alternatives;
        self.repository.save(&plan).await?;
        info!(%trip_id, spans = plan.spans.len(), attempts = generated.attempts, "Draft plan saved");

        let report = self.controller.refresh_with_context(&plan, true, None, enrichment).await;
        report.apply_to(&mut plan);
        plan.status = TripStatus::Active;
        plan.touch();
        self.repository.save(&plan).await?;

        Ok(PlanView { plan, prices: report })
    }

    /// Stored plan overlaid with last-known cache entries, no dispatch
    pub async fn get_plan(&self, reference: &str) -> Result<PlanView, ServiceError> {
        debug!(%reference, "TripService::get_plan: called");
        let plan = self.load(reference).await?;
        let prices = self.controller.refresh(&plan, false, None).await;
        Ok(PlanView { plan, prices })
    }

    /// Refresh prices; `max_age` additionally treats older entries as stale
    pub async fn refresh_prices(
        &self,
        reference: &str,
        live: bool,
        max_age: Option<Duration>,
    ) -> Result<PlanView, ServiceError> {
        debug!(%reference, live, ?max_age, "TripService::refresh_prices: called");
        let mut plan = self.load(reference).await?;
        let before = plan.clone();

        let report = self.controller.refresh(&plan, live, max_age).await;
        report.apply_to(&mut plan);
        if plan.spans != before.spans {
            plan.touch();
            self.repository.save(&plan).await?;
            debug!(trip_id = %plan.trip_id, version = plan.version, "TripService::refresh_prices: span states saved");
        }

        Ok(PlanView { plan, prices: report })
    }

    /// Remove a trip and its cached prices, returning the resolved id
    pub async fn delete_plan(&self, reference: &str) -> Result<String, ServiceError> {
        debug!(%reference, "TripService::delete_plan: called");
        let trip_id = self.resolve(reference).await?;
        if !self.repository.delete(&trip_id).await? {
            return Err(ServiceError::NotFound(reference.to_string()));
        }
        let dropped = self.cache().invalidate_trip(&trip_id);
        info!(%trip_id, dropped, "Trip deleted");
        Ok(trip_id)
    }

    pub async fn list_plans(&self) -> Result<Vec<TripPlan>, ServiceError> {
        Ok(self.repository.list().await?)
    }

    async fn load(&self, reference: &str) -> Result<TripPlan, ServiceError> {
        let trip_id = self.resolve(reference).await?;
        let plan = self
            .repository
            .load(&trip_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(reference.to_string()))?;
        self.warm_cache(&plan);
        Ok(plan)
    }

    /// Full id for an exact id, hex prefix or slug fragment
    async fn resolve(&self, reference: &str) -> Result<String, ServiceError> {
        let ids: HashMap<String, String> = self
            .repository
            .list()
            .await?
            .into_iter()
            .map(|p| (p.trip_id, p.title))
            .collect();
        match IdResolver::new(&ids).resolve(reference) {
            Ok(Some(id)) => Ok(id),
            Ok(None) => Err(ServiceError::NotFound(reference.to_string())),
            Err(candidates) => Err(ServiceError::Ambiguous {
                reference: reference.to_string(),
                candidates,
            }),
        }
    }

    /// Seed the cache from prices recorded on the plan
    ///
    /// The cache lives in memory, so a fresh process starts empty. Entries
    /// already present win over the persisted copy.
    fn warm_cache(&self, plan: &TripPlan) {
        let cache = self.cache();
        for span in &plan.spans {
            if cache.get(&plan.trip_id, span.span_id()).is_some() {
                continue;
            }
            if let (Some(price), Some(currency), Some(fetched_at), Some(expires_at)) =
                (span.price, span.currency.as_ref(), span.fetched_at, span.ttl_expiry)
            {
                let entry = PriceCacheEntry {
                    price,
                    currency: currency.clone(),
                    fetched_at,
                    expires_at,
                };
                cache.put(&plan.trip_id, span.span_id(), entry);
            }
        }
    }
}
