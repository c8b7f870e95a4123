//! Discovery request handed to every engine, and its builder

use std::collections::BTreeSet;
use std::fmt;

use super::{DiscoveryFilter, DiscoverySelector};
use crate::config::ConfigurationParameters;

/// Restricts which registered engines take part in discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineFilter {
    Include(BTreeSet<String>),
    Exclude(BTreeSet<String>),
}

impl EngineFilter {
    pub fn include<I, S>(engine_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EngineFilter::Include(engine_ids.into_iter().map(Into::into).collect())
    }

    pub fn exclude<I, S>(engine_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EngineFilter::Exclude(engine_ids.into_iter().map(Into::into).collect())
    }

    pub fn accepts(&self, engine_id: &str) -> bool {
        match self {
            EngineFilter::Include(ids) => ids.contains(engine_id),
            EngineFilter::Exclude(ids) => !ids.contains(engine_id),
        }
    }

    pub fn engine_ids(&self) -> &BTreeSet<String> {
        match self {
            EngineFilter::Include(ids) | EngineFilter::Exclude(ids) => ids,
        }
    }
}

impl fmt::Display for EngineFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (mode, ids) = match self {
            EngineFilter::Include(ids) => ("include", ids),
            EngineFilter::Exclude(ids) => ("exclude", ids),
        };
        let ids: Vec<_> = ids.iter().map(String::as_str).collect();
        write!(f, "{mode} engines [{}]", ids.join(", "))
    }
}

/// Immutable query shared read-only by every engine during discovery
#[derive(Debug, Clone, Default)]
pub struct EngineDiscoveryRequest {
    selectors: Vec<DiscoverySelector>,
    filters: Vec<DiscoveryFilter>,
    engine_filters: Vec<EngineFilter>,
    configuration: ConfigurationParameters,
}

impl EngineDiscoveryRequest {
    pub fn builder() -> LauncherDiscoveryRequestBuilder {
        LauncherDiscoveryRequestBuilder::new()
    }

    pub fn selectors(&self) -> &[DiscoverySelector] {
        &self.selectors
    }

    /// Selectors for which `predicate` holds, typically a `matches!` on one kind
    pub fn selectors_matching<F>(&self, predicate: F) -> impl Iterator<Item = &DiscoverySelector>
    where
        F: Fn(&DiscoverySelector) -> bool,
    {
        self.selectors.iter().filter(move |selector| predicate(selector))
    }

    pub fn filters(&self) -> &[DiscoveryFilter] {
        &self.filters
    }

    pub fn engine_filters(&self) -> &[EngineFilter] {
        &self.engine_filters
    }

    pub fn configuration(&self) -> &ConfigurationParameters {
        &self.configuration
    }

    /// Whether every engine filter lets `engine_id` take part
    pub fn accepts_engine(&self, engine_id: &str) -> bool {
        self.engine_filters.iter().all(|filter| filter.accepts(engine_id))
    }
}

/// Builder for [`EngineDiscoveryRequest`]
#[derive(Debug, Default)]
pub struct LauncherDiscoveryRequestBuilder {
    selectors: Vec<DiscoverySelector>,
    filters: Vec<DiscoveryFilter>,
    engine_filters: Vec<EngineFilter>,
    configuration: Option<ConfigurationParameters>,
    parameters: Vec<(String, String)>,
}

impl LauncherDiscoveryRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, selector: DiscoverySelector) -> Self {
        self.selectors.push(selector);
        self
    }

    pub fn select_all(mut self, selectors: impl IntoIterator<Item = DiscoverySelector>) -> Self {
        self.selectors.extend(selectors);
        self
    }

    pub fn filter(mut self, filter: DiscoveryFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = DiscoveryFilter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn engine_filter(mut self, filter: EngineFilter) -> Self {
        self.engine_filters.push(filter);
        self
    }

    /// Base configuration; explicit parameters added with
    /// [`configuration_parameter`](Self::configuration_parameter) win over it
    pub fn configuration(mut self, configuration: ConfigurationParameters) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn configuration_parameter(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }

    pub fn build(self) -> EngineDiscoveryRequest {
        let base = self.configuration.unwrap_or_default();
        let configuration = if self.parameters.is_empty() {
            base
        } else {
            base.with_overrides(self.parameters)
        };

        EngineDiscoveryRequest {
            selectors: self.selectors,
            filters: self.filters,
            engine_filters: self.engine_filters,
            configuration,
        }
    }
}
