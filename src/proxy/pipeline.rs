//! End-to-end pipeline wiring: aggregate, confirm, probe, persist

use crate::proxy::aggregator::Aggregator;
use crate::proxy::geo::GeoValidator;
use crate::proxy::models::QualifiedProxy;
use crate::proxy::probe::TargetProbe;
use crate::proxy::sources::ProxySource;
use crate::proxy::store::ResultStore;
use crate::Result;
use tracing::info;

/// Outcome of one full run.
#[derive(Debug)]
pub struct RunSummary {
    /// Unique candidates harvested across all sources
    pub candidates: usize,
    /// Candidates confirmed to be in the target country
    pub confirmed: usize,
    /// Proxies that opened the target login page; None when the probe stage
    /// was skipped
    pub qualified: Option<Vec<QualifiedProxy>>,
}

/// Runs the stages in order and persists a snapshot after each validation.
///
/// Stage outputs are moved, never shared: each stage consumes the previous
/// stage's result. Only a snapshot write failure aborts the run; finding
/// nothing is a normal outcome.
pub struct Pipeline {
    aggregator: Aggregator,
    geo: GeoValidator,
    probe: Option<TargetProbe>,
    store: ResultStore,
}

impl Pipeline {
    pub fn new(
        aggregator: Aggregator,
        geo: GeoValidator,
        probe: Option<TargetProbe>,
        store: ResultStore,
    ) -> Self {
        Self {
            aggregator,
            geo,
            probe,
            store,
        }
    }

    pub async fn run(&self, sources: &[Box<dyn ProxySource>]) -> Result<RunSummary> {
        let harvest = self.aggregator.collect(sources, self.geo.country()).await;
        let candidates = harvest.total();
        info!(
            candidates,
            pre_confirmed = harvest.confirmed.len(),
            "aggregation finished"
        );

        let mut confirmed = harvest.confirmed;
        confirmed.extend(self.geo.confirm(harvest.pending).await);
        info!(confirmed = confirmed.len(), "geolocation finished");

        self.store.write_confirmed(&confirmed)?;

        let qualified = match &self.probe {
            Some(probe) => {
                let qualified = probe.qualify(&confirmed).await;
                info!(qualified = qualified.len(), "target probe finished");
                self.store.write_qualified(&qualified)?;
                Some(qualified)
            }
            None => None,
        };

        Ok(RunSummary {
            candidates,
            confirmed: confirmed.len(),
            qualified,
        })
    }
}
