//! Availability of the decoding backend behind a reader.
//!
//! Readers for proprietary formats usually sit on top of a native library
//! that may be missing or not loadable. The probe runs at most once per
//! [`BackendCapability`]; every loader sharing the capability through an
//! `Arc` reuses the cached answer.

use std::fmt;
use std::sync::OnceLock;

use tracing::{debug, warn};

type Probe = Box<dyn Fn() -> Result<(), String> + Send + Sync>;

pub struct BackendCapability {
    name: String,
    probe: Probe,
    available: OnceLock<bool>,
}

impl BackendCapability {
    /// A backend whose probe runs lazily on first use.
    pub fn probe<F>(name: impl Into<String>, probe: F) -> Self
    where
        F: Fn() -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            probe: Box::new(probe),
            available: OnceLock::new(),
        }
    }

    /// A backend that is always usable, e.g. a pure Rust reader.
    pub fn available(name: impl Into<String>) -> Self {
        let capability = Self::probe(name, || Ok(()));
        let _ = capability.available.set(true);
        capability
    }

    pub fn unavailable(name: impl Into<String>) -> Self {
        let capability = Self::probe(name, || Err("backend disabled".to_string()));
        let _ = capability.available.set(false);
        capability
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the backend loaded. The first call runs the probe.
    pub fn is_available(&self) -> bool {
        *self.available.get_or_init(|| match (self.probe)() {
            Ok(()) => {
                debug!(backend = %self.name, "Backend loaded");
                true
            }
            Err(reason) => {
                warn!(backend = %self.name, "Backend not available: {}", reason);
                false
            }
        })
    }
}

impl fmt::Debug for BackendCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendCapability")
            .field("name", &self.name)
            .field("available", &self.available.get())
            .finish()
    }
}
