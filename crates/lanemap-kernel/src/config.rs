//! Runtime configuration
//!
//! Decides which resource `KernelPolicy::run` launches on and how large the
//! host pool is.

use crate::error::{KernelError, Result};
use lanemap_backends::{DeviceLimits, ExecutionResource, HostResource, QueueResource};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::sync::Arc;

/// Which execution resource kernels launch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Lanes run inside `submit`.
    #[default]
    Host,
    /// Lanes run on a background thread until `wait`.
    Queue,
}

impl FromStr for ResourceKind {
    type Err = KernelError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "host" => Ok(Self::Host),
            "queue" => Ok(Self::Queue),
            other => Err(KernelError::Config(format!("unknown resource kind `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub resource: ResourceKind,
    /// Host pool size; `None` uses rayon's global pool.
    pub threads: Option<usize>,
    /// Limits replacing the resource's preset.
    pub limits: Option<DeviceLimits>,
}

impl RuntimeConfig {
    /// Build a configuration from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `LANEMAP_RESOURCE` - `host` (default) or `queue`
    /// - `LANEMAP_THREADS` - host pool size
    /// - `LANEMAP_DEVICE_LIMITS` - path to a JSON [`DeviceLimits`] file
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(resource) = lookup("LANEMAP_RESOURCE").filter(|value| !value.trim().is_empty()) {
            config.resource = resource.parse()?;
        }

        if let Some(threads) = lookup("LANEMAP_THREADS").filter(|value| !value.trim().is_empty()) {
            let threads = threads
                .trim()
                .parse::<usize>()
                .map_err(|err| KernelError::Config(format!("LANEMAP_THREADS=`{threads}`: {err}")))?;
            config.threads = Some(threads);
        }

        if let Some(path) = lookup("LANEMAP_DEVICE_LIMITS").filter(|value| !value.trim().is_empty()) {
            config.limits = Some(DeviceLimits::from_json_file(path.trim())?);
        }

        Ok(config)
    }

    pub fn with_resource(mut self, resource: ResourceKind) -> Self {
        self.resource = resource;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn build_resource(&self) -> Result<Arc<dyn ExecutionResource>> {
        let resource: Arc<dyn ExecutionResource> = match (self.resource, self.limits.clone()) {
            (ResourceKind::Host, None) => Arc::new(HostResource::new()),
            (ResourceKind::Host, Some(limits)) => Arc::new(HostResource::with_limits(limits)),
            (ResourceKind::Queue, None) => Arc::new(QueueResource::new()),
            (ResourceKind::Queue, Some(limits)) => Arc::new(QueueResource::with_limits(limits)),
        };
        tracing::debug!(resource = resource.name(), "execution resource ready");
        Ok(resource)
    }

    /// A dedicated pool when `threads` is set.
    pub fn build_pool(&self) -> Result<Option<rayon::ThreadPool>> {
        let Some(threads) = self.threads else {
            return Ok(None);
        };
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("lanemap-worker-{index}"))
            .build()
            .map(Some)
            .map_err(|err| KernelError::ThreadPool(err.to_string()))
    }
}
