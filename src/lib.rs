pub mod applier;
pub mod changes;
pub mod dns;
pub mod domain_filter;
pub mod endpoint;
pub mod hostname;
pub mod matcher;
pub mod provider;
pub mod rate_limit;
pub mod reconciler;
pub mod settings;
pub mod supervisor;
