use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::applier;
use crate::changes::ChangeSet;
use crate::dns::{self, Record, Transport, TransportError, Zone};
use crate::domain_filter::DomainFilter;
use crate::endpoint::{
    is_supported_record_type, merge_endpoints, Endpoint, PlanChanges, RECORD_TYPE_CNAME,
    RECORD_TYPE_MX,
};
use crate::hostname::{from_provider_target, make_fqdn};
use crate::reconciler::{Reconciler, RecordsByZone, ZoneIndex};

pub const DEFAULT_BATCH_SIZE: u32 = 100;
pub const DEFAULT_TTL: i64 = 7200;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub dry_run: bool,
    pub batch_size: u32,
    pub default_ttl: i64,
    /// Consecutive zone listing failures tolerated; zero or less disables
    /// the limit.
    pub max_fail_count: i32,
    pub domain_filter: DomainFilter,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_size: DEFAULT_BATCH_SIZE,
            default_ttl: DEFAULT_TTL,
            max_fail_count: -1,
            domain_filter: DomainFilter::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneSnapshot {
    pub zones: Vec<Zone>,
    pub records: RecordsByZone,
}

impl ZoneSnapshot {
    pub fn index(&self) -> ZoneIndex {
        ZoneIndex::new(&self.zones)
    }

    fn records_of(&self, zone_id: &str) -> &[Record] {
        self.records.get(zone_id).map(Vec::as_slice).unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct HetznerProvider<T> {
    transport: T,
    config: ProviderConfig,

    fail_count: AtomicU32,
    filtered_out_zones: AtomicU64,
}

impl HetznerProvider<dns::hetzner::HetznerClient> {
    /// Builds a provider talking to the Hetzner API. An empty key is
    /// rejected before any request is made.
    pub fn connect(
        api_key: &str,
        base_url: &str,
        requests_per_second: u64,
        config: ProviderConfig,
    ) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }
        let client = dns::hetzner::HetznerClient::new(api_key, base_url, requests_per_second)?;
        Ok(Self::new(client, config))
    }
}

impl<T: Transport> HetznerProvider<T> {
    pub fn new(transport: T, config: ProviderConfig) -> Self {
        Self {
            transport,
            config,
            fail_count: AtomicU32::new(0),
            filtered_out_zones: AtomicU64::new(0),
        }
    }

    pub fn domain_filter(&self) -> &DomainFilter {
        &self.config.domain_filter
    }

    /// Zones skipped by the domain filter since start-up.
    pub fn filtered_out_zones(&self) -> u64 {
        self.filtered_out_zones.load(Ordering::Relaxed)
    }

    pub fn fail_count(&self) -> u32 {
        self.fail_count.load(Ordering::Relaxed)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn zones(&self) -> Result<Vec<Zone>, ProviderError> {
        let zones = match dns::fetch_all_zones(&self.transport, self.config.batch_size).await {
            Ok(zones) => zones,
            Err(e) => return Err(self.zone_fetch_failed(e)),
        };
        self.fail_count.store(0, Ordering::Relaxed);

        let total = zones.len();
        let zones: Vec<Zone> = zones
            .into_iter()
            .filter(|z| {
                let keep = self.config.domain_filter.matches(&z.name);
                if !keep {
                    debug!(zone = %z.name, "zone filtered out");
                }
                keep
            })
            .collect();

        let skipped = (total - zones.len()) as u64;
        self.filtered_out_zones.fetch_add(skipped, Ordering::Relaxed);
        debug!(total, kept = zones.len(), skipped, "listed zones");

        Ok(zones)
    }

    fn zone_fetch_failed(&self, source: TransportError) -> ProviderError {
        let max = self.config.max_fail_count;
        if max <= 0 {
            warn!(error = %source, "failed to list zones");
            return ProviderError::Transport(source);
        }

        let failures = self.fail_count.fetch_add(1, Ordering::Relaxed) + 1;
        if i64::from(failures) >= i64::from(max) {
            error!(failures, max, error = %source, "zone listing keeps failing, giving up");
            ProviderError::Exhausted { failures, source }
        } else {
            warn!(failures, max, error = %source, "failed to list zones");
            ProviderError::Transport(source)
        }
    }

    pub async fn fetch_records(&self) -> Result<ZoneSnapshot, ProviderError> {
        let zones = self.zones().await?;
        let mut records = RecordsByZone::with_capacity(zones.len());

        for zone in &zones {
            let zone_records =
                dns::fetch_all_records(&self.transport, &zone.id, self.config.batch_size).await?;
            debug!(zone = %zone.name, count = zone_records.len(), "fetched records");
            records.insert(zone.id.clone(), zone_records);
        }

        Ok(ZoneSnapshot { zones, records })
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn records(&self) -> Result<Vec<Endpoint>, ProviderError> {
        let snapshot = self.fetch_records().await?;
        let mut endpoints = Vec::new();

        for zone in &snapshot.zones {
            for record in snapshot.records_of(&zone.id) {
                if !is_supported_record_type(&record.record_type) {
                    debug!(
                        zone = %zone.name,
                        name = %record.name,
                        record_type = %record.record_type,
                        "skipping unsupported record type"
                    );
                    continue;
                }

                let target = from_provider_target(&zone.name, &record.record_type, &record.value);
                endpoints.push(
                    Endpoint::new(
                        make_fqdn(&zone.name, &record.name),
                        record.record_type.clone(),
                        vec![target],
                    )
                    .with_ttl(record.ttl),
                );
            }
        }

        Ok(merge_endpoints(endpoints))
    }

    /// Drops trailing dots from targets that are not host references.
    pub fn adjust_endpoints(
        &self,
        mut endpoints: Vec<Endpoint>,
    ) -> Result<Vec<Endpoint>, ProviderError> {
        for ep in &mut endpoints {
            if ep.record_type == RECORD_TYPE_CNAME || ep.record_type == RECORD_TYPE_MX {
                continue;
            }
            for target in &mut ep.targets {
                if let Some(trimmed) = target.strip_suffix('.') {
                    *target = trimmed.to_owned();
                }
            }
        }
        Ok(endpoints)
    }

    #[tracing::instrument(skip_all, level = "debug")]
    pub async fn apply_changes(&self, plan: &PlanChanges) -> Result<(), ProviderError> {
        if !plan.has_changes() {
            debug!("no changes in plan");
            return Ok(());
        }

        let snapshot = self.fetch_records().await?;
        let index = snapshot.index();

        let mut changes = ChangeSet::new(self.config.dry_run, self.config.default_ttl);
        Reconciler::new(&index, &snapshot.records).reconcile(plan, &mut changes);

        info!(
            dry_run = self.config.dry_run,
            creates = changes.creates().len(),
            updates = changes.updates().len(),
            deletes = changes.deletes().len(),
            "applying changes"
        );
        applier::apply_changes(&changes, &self.transport).await?;

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("zone listing failed {failures} times in a row: {source}")]
    Exhausted {
        failures: u32,
        #[source]
        source: TransportError,
    },
    #[error("missing api key")]
    MissingApiKey,
}

impl ProviderError {
    /// Whether the caller should stop retrying and let a supervisor
    /// restart the process.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, ProviderError::Exhausted { .. })
    }
}
