use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use pagelift_kernel::{LoadConfig, LoadError, PageExtractor};
use serde::Serialize;
use tokio::time::Instant;

pub(crate) type LoadOutcome = Result<Arc<dyn PageExtractor>, LoadError>;

/// A load in flight, awaitable by any number of callers.
pub(crate) type PendingLoad = Shared<BoxFuture<'static, LoadOutcome>>;

/// Observable lifecycle state of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePhase {
    Absent,
    Loading,
    Loaded,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecyclePhase::Absent => "absent",
            LifecyclePhase::Loading => "loading",
            LifecyclePhase::Loaded => "loaded",
        };
        f.write_str(s)
    }
}

enum Slot {
    Absent,
    Loading {
        generation: u64,
        pending: PendingLoad,
    },
    Loaded {
        generation: u64,
        resource: Arc<dyn PageExtractor>,
    },
}

/// Holds the nullable resource, its load parameters and last-use time.
///
/// Every load gets a fresh generation number so that late completions of a
/// superseded load cannot overwrite newer state. Mutation is crate-private:
/// only [`LifecycleGate`](super::LifecycleGate) changes a handle, always
/// under its lock.
pub struct ResourceHandle {
    slot: Slot,
    last_used_at: Option<Instant>,
    load_config: LoadConfig,
    next_generation: u64,
}

impl ResourceHandle {
    pub fn new(load_config: LoadConfig) -> Self {
        Self {
            slot: Slot::Absent,
            last_used_at: None,
            load_config,
            next_generation: 1,
        }
    }

    pub fn load_config(&self) -> &LoadConfig {
        &self.load_config
    }

    pub fn phase(&self) -> LifecyclePhase {
        match self.slot {
            Slot::Absent => LifecyclePhase::Absent,
            Slot::Loading { .. } => LifecyclePhase::Loading,
            Slot::Loaded { .. } => LifecyclePhase::Loaded,
        }
    }

    pub fn last_used_at(&self) -> Option<Instant> {
        self.last_used_at
    }

    /// How long the loaded resource has gone unused. `None` unless loaded.
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        match self.slot {
            Slot::Loaded { .. } => self
                .last_used_at
                .map(|at| now.saturating_duration_since(at)),
            _ => None,
        }
    }

    pub(crate) fn loaded(&self) -> Option<(u64, Arc<dyn PageExtractor>)> {
        match &self.slot {
            Slot::Loaded {
                generation,
                resource,
            } => Some((*generation, Arc::clone(resource))),
            _ => None,
        }
    }

    pub(crate) fn pending(&self) -> Option<(u64, PendingLoad)> {
        match &self.slot {
            Slot::Loading {
                generation,
                pending,
            } => Some((*generation, pending.clone())),
            _ => None,
        }
    }

    pub(crate) fn loaded_generation(&self) -> Option<u64> {
        match self.slot {
            Slot::Loaded { generation, .. } => Some(generation),
            _ => None,
        }
    }

    /// `Absent → Loading`. Returns the generation assigned to this load.
    pub(crate) fn begin_load(&mut self, pending: PendingLoad) -> u64 {
        debug_assert!(matches!(self.slot, Slot::Absent));
        let generation = self.next_generation;
        self.next_generation += 1;
        self.slot = Slot::Loading {
            generation,
            pending,
        };
        generation
    }

    /// `Loading → Loaded` for the given generation. Returns false (and changes
    /// nothing) if that load is no longer the current one.
    pub(crate) fn set(
        &mut self,
        generation: u64,
        resource: Arc<dyn PageExtractor>,
        now: Instant,
    ) -> bool {
        if !self.is_loading(generation) {
            return false;
        }
        self.slot = Slot::Loaded {
            generation,
            resource,
        };
        self.last_used_at = Some(now);
        true
    }

    /// `Loading → Absent` after a failed load of the given generation.
    pub(crate) fn abandon_load(&mut self, generation: u64) -> bool {
        if !self.is_loading(generation) {
            return false;
        }
        self.slot = Slot::Absent;
        true
    }

    /// Drop back to `Absent` and forget the last-use time. Returns the
    /// resource so the caller can release it outside the lock.
    pub(crate) fn clear(&mut self) -> Option<Arc<dyn PageExtractor>> {
        self.last_used_at = None;
        match std::mem::replace(&mut self.slot, Slot::Absent) {
            Slot::Loaded { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// Record a use. Ignored unless the resource is loaded.
    pub(crate) fn touch(&mut self, now: Instant) {
        if matches!(self.slot, Slot::Loaded { .. }) {
            self.last_used_at = Some(now);
        }
    }

    fn is_loading(&self, generation: u64) -> bool {
        matches!(self.slot, Slot::Loading { generation: g, .. } if g == generation)
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("phase", &self.phase())
            .field("last_used_at", &self.last_used_at)
            .field("load_config", &self.load_config)
            .field("next_generation", &self.next_generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use image::{DynamicImage, GrayImage};
    use pagelift_kernel::{ExtractError, Extraction};

    struct Noop;

    impl PageExtractor for Noop {
        fn variant(&self) -> &str {
            "noop"
        }

        fn extract_page(
            &self,
            image: &DynamicImage,
            _prompt: &str,
        ) -> Result<Extraction, ExtractError> {
            Ok(Extraction {
                mask: GrayImage::new(image.width(), image.height()),
                score: 1.0,
                cropped: image.clone(),
            })
        }
    }

    fn resource() -> Arc<dyn PageExtractor> {
        Arc::new(Noop)
    }

    fn pending() -> PendingLoad {
        futures::future::ready(Ok(resource())).boxed().shared()
    }

    fn handle() -> ResourceHandle {
        ResourceHandle::new(LoadConfig::new("noop", "cpu"))
    }

    #[test]
    fn starts_absent_without_timestamp() {
        let h = handle();
        assert_eq!(h.phase(), LifecyclePhase::Absent);
        assert!(h.last_used_at().is_none());
        assert!(h.idle_for(Instant::now()).is_none());
    }

    #[test]
    fn load_then_set_marks_loaded_and_used() {
        let mut h = handle();
        let generation = h.begin_load(pending());
        assert_eq!(h.phase(), LifecyclePhase::Loading);

        let now = Instant::now();
        assert!(h.set(generation, resource(), now));
        assert_eq!(h.phase(), LifecyclePhase::Loaded);
        assert_eq!(h.last_used_at(), Some(now));
        assert_eq!(h.loaded_generation(), Some(generation));
    }

    #[test]
    fn stale_generation_is_ignored() {
        let mut h = handle();
        let first = h.begin_load(pending());
        assert!(h.abandon_load(first));

        let second = h.begin_load(pending());
        assert_ne!(first, second);
        assert!(!h.set(first, resource(), Instant::now()));
        assert!(!h.abandon_load(first));
        assert_eq!(h.phase(), LifecyclePhase::Loading);
    }

    #[test]
    fn clear_returns_resource_and_forgets_timestamp() {
        let mut h = handle();
        let generation = h.begin_load(pending());
        h.set(generation, resource(), Instant::now());

        assert!(h.clear().is_some());
        assert_eq!(h.phase(), LifecyclePhase::Absent);
        assert!(h.last_used_at().is_none());
        assert!(h.clear().is_none());
    }

    #[test]
    fn touch_only_applies_when_loaded() {
        let mut h = handle();
        h.touch(Instant::now());
        assert!(h.last_used_at().is_none());

        let generation = h.begin_load(pending());
        h.touch(Instant::now());
        assert!(h.last_used_at().is_none());

        let loaded_at = Instant::now();
        h.set(generation, resource(), loaded_at);
        let later = loaded_at + Duration::from_secs(5);
        h.touch(later);
        assert_eq!(h.last_used_at(), Some(later));
        assert_eq!(h.idle_for(later + Duration::from_secs(2)), Some(Duration::from_secs(2)));
    }
}
