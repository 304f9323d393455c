//! Capability detection
//!
//! Support flags and the microphone grant are fetched lazily and cached;
//! they change only through an explicit re-check.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::platform::SpeechPlatform;

/// What the host can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub recognition_supported: bool,
    pub synthesis_supported: bool,
}

/// Cached capability probe over a platform
pub struct CapabilityProbe {
    platform: Arc<dyn SpeechPlatform>,
    capabilities: Mutex<Option<Capabilities>>,
    microphone: tokio::sync::Mutex<Option<bool>>,
}

impl CapabilityProbe {
    #[must_use]
    pub fn new(platform: Arc<dyn SpeechPlatform>) -> Self {
        Self {
            platform,
            capabilities: Mutex::new(None),
            microphone: tokio::sync::Mutex::new(None),
        }
    }

    /// Support flags, queried from the platform on first use
    #[must_use]
    pub fn probe(&self) -> Capabilities {
        let mut cached = self
            .capabilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cached.get_or_insert_with(|| self.query())
    }

    /// Query the platform again and replace the cached flags
    #[must_use]
    pub fn reprobe(&self) -> Capabilities {
        let fresh = self.query();
        *self
            .capabilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(fresh);
        fresh
    }

    /// Whether microphone access can be granted
    ///
    /// Concurrent callers share one platform request; later calls return the
    /// cached answer.
    pub async fn check_microphone(&self) -> bool {
        let mut cached = self.microphone.lock().await;
        if let Some(granted) = *cached {
            return granted;
        }
        let granted = self.platform.request_microphone().await;
        tracing::debug!(granted, "microphone checked");
        *cached = Some(granted);
        granted
    }

    /// Ask the platform again, ignoring the cached answer
    pub async fn recheck_microphone(&self) -> bool {
        let mut cached = self.microphone.lock().await;
        let granted = self.platform.request_microphone().await;
        tracing::debug!(granted, "microphone rechecked");
        *cached = Some(granted);
        granted
    }

    /// Cached microphone answer, `None` until a check has completed
    #[must_use]
    pub fn cached_microphone(&self) -> Option<bool> {
        self.microphone.try_lock().ok().and_then(|cached| *cached)
    }

    fn query(&self) -> Capabilities {
        let capabilities = Capabilities {
            recognition_supported: self.platform.supports_recognition(),
            synthesis_supported: self.platform.supports_synthesis(),
        };
        tracing::debug!(
            recognition = capabilities.recognition_supported,
            synthesis = capabilities.synthesis_supported,
            "capabilities probed"
        );
        capabilities
    }
}
