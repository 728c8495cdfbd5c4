use std::time::Duration;

use tokio::{time, time::MissedTickBehavior};
use tracing::{error, info};

use crate::dns::Transport;
use crate::provider::{HetznerProvider, ProviderError};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Refresh: Send + Sync {
    async fn refresh(&self) -> Result<usize, ProviderError>;
}

#[async_trait::async_trait]
impl<T: Transport> Refresh for HetznerProvider<T> {
    async fn refresh(&self) -> Result<usize, ProviderError> {
        Ok(self.records().await?.len())
    }
}

/// Periodically refreshes the provider and owns the give-up policy: once
/// zone listing is exhausted the loop ends so the process can exit and be
/// restarted from outside.
#[derive(Debug)]
pub struct Supervisor<P: Refresh> {
    provider: P,
    interval: Duration,
}

impl<P: Refresh> Supervisor<P> {
    pub fn new(provider: P, interval: Duration) -> Self {
        Self { provider, interval }
    }

    pub async fn run(&self) -> Result<(), ProviderError> {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            match time::timeout(self.interval, self.provider.refresh()).await {
                Ok(Ok(count)) => info!(endpoints = count, "refreshed provider records"),
                Ok(Err(e)) if e.is_exhausted() => {
                    error!(error = %e, "giving up on provider");
                    return Err(e);
                }
                Ok(Err(e)) => error!(error = %e, "refreshing records returned an error"),
                Err(_) => error!("refreshing records timed out"),
            }
        }
    }
}
