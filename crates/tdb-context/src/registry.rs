//! Context registry: maps chip names to implementations and caches one
//! context per chip.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use tdb_target::Target;
use tracing::{debug, info};

use crate::chips;
use crate::config::BackendConfig;
use crate::context::TargetContext;
use crate::contract::ChipContract;
use crate::error::{ContextError, Result};

/// Static registration of one chip implementation.
#[derive(Clone, Copy)]
pub struct ChipRegistration {
    pub target: Target,
    pub construct: fn() -> tdb_target::Result<Box<dyn ChipContract>>,
}

impl std::fmt::Debug for ChipRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChipRegistration")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl ChipRegistration {
    /// Build a fresh chip implementation.
    pub fn build(&self) -> tdb_target::Result<Box<dyn ChipContract>> {
        (self.construct)()
    }
}

/// Registry of chip implementations bound to one backend configuration.
///
/// At most one [`TargetContext`] exists per chip per registry; independent
/// registries share nothing.
#[derive(Debug)]
pub struct ContextRegistry {
    config: BackendConfig,
    table: BTreeMap<Target, ChipRegistration>,
    instances: Mutex<HashMap<Target, Arc<TargetContext>>>,
}

impl ContextRegistry {
    /// Registry over the built-in chips.
    pub fn new(config: BackendConfig) -> Result<Self> {
        Self::with_registrations(config, chips::builtin_registrations())
    }

    /// Registry that must cover every supported chip exactly once.
    pub fn with_registrations(
        config: BackendConfig,
        registrations: impl IntoIterator<Item = ChipRegistration>,
    ) -> Result<Self> {
        let registry = Self::partial(config, registrations)?;
        if let Some(target) = Target::ALL
            .into_iter()
            .find(|t| !registry.table.contains_key(t))
        {
            return Err(ContextError::ImplementationMissing { target });
        }
        Ok(registry)
    }

    /// Registry over any subset of chips.
    ///
    /// Chips left out resolve to [`ContextError::ImplementationMissing`].
    pub fn partial(
        config: BackendConfig,
        registrations: impl IntoIterator<Item = ChipRegistration>,
    ) -> Result<Self> {
        let mut table = BTreeMap::new();
        for reg in registrations {
            if table.insert(reg.target, reg).is_some() {
                return Err(ContextError::DuplicateRegistration { target: reg.target });
            }
        }
        info!(
            chips = table.len(),
            backend = %config.backend(),
            "context registry created"
        );
        Ok(Self {
            config,
            table,
            instances: Mutex::new(HashMap::new()),
        })
    }

    /// Chips with a registered implementation, in table order.
    pub fn supported(&self) -> Vec<Target> {
        self.table.keys().copied().collect()
    }

    /// Registration of a supported chip.
    pub fn registration(&self, target: Target) -> Result<ChipRegistration> {
        self.table
            .get(&target)
            .copied()
            .ok_or(ContextError::ImplementationMissing { target })
    }

    /// Look up the implementation for `name` without constructing it.
    ///
    /// # Errors
    ///
    /// [`ContextError::UnsupportedTarget`] for a name outside the supported
    /// set, [`ContextError::ImplementationMissing`] for a supported chip
    /// with no registration.
    pub fn resolve(&self, name: &str) -> Result<ChipRegistration> {
        self.registration(parse_target(name)?)
    }

    /// Construct a new, uncached context for `name`.
    pub fn create(&self, name: &str) -> Result<TargetContext> {
        self.build(self.resolve(name)?)
    }

    fn build(&self, reg: ChipRegistration) -> Result<TargetContext> {
        let chip = reg.build()?;
        if chip.target() != reg.target {
            return Err(ContextError::RegistrationMismatch {
                expected: reg.target,
                found: chip.target(),
            });
        }
        Ok(TargetContext::new(chip, &self.config))
    }

    /// The shared context for `target`, created on first request.
    pub fn instance(&self, target: Target) -> Result<Arc<TargetContext>> {
        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ctx) = instances.get(&target) {
            return Ok(Arc::clone(ctx));
        }
        let ctx = Arc::new(self.build(self.registration(target)?)?);
        debug!(target_chip = %target, "context cached");
        instances.insert(target, Arc::clone(&ctx));
        Ok(ctx)
    }

    /// The shared context for `name`.
    pub fn get(&self, name: &str) -> Result<Arc<TargetContext>> {
        self.instance(parse_target(name)?)
    }

    /// Whether a context for `target` has been cached.
    pub fn is_cached(&self, target: Target) -> bool {
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&target)
    }
}

fn parse_target(name: &str) -> Result<Target> {
    name.parse().map_err(|_| ContextError::UnsupportedTarget {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chips::{bm1684, bm1684x};

    #[test]
    fn resolve_every_builtin() {
        let registry = ContextRegistry::new(BackendConfig::cmodel()).unwrap();
        assert_eq!(registry.supported(), Target::ALL.to_vec());
        for target in Target::ALL {
            let reg = registry.resolve(target.name()).unwrap();
            assert_eq!(reg.target, target);
        }
    }

    #[test]
    fn unsupported_names() {
        let registry = ContextRegistry::new(BackendConfig::cmodel()).unwrap();
        for name in ["", "bm1684x", "BM1686", " BM1684X"] {
            let err = registry.resolve(name).unwrap_err();
            assert!(matches!(err, ContextError::UnsupportedTarget { .. }), "{name:?}");
        }
    }

    #[test]
    fn partial_registry_reports_missing() {
        let registry =
            ContextRegistry::partial(BackendConfig::cmodel(), [bm1684x::REGISTRATION]).unwrap();
        assert!(registry.resolve("BM1684X").is_ok());
        let err = registry.resolve("SG2260").unwrap_err();
        assert!(matches!(
            err,
            ContextError::ImplementationMissing {
                target: Target::Sg2260
            }
        ));
    }

    #[test]
    fn incomplete_table_rejected() {
        let err = ContextRegistry::with_registrations(
            BackendConfig::cmodel(),
            [bm1684x::REGISTRATION, bm1684::REGISTRATION],
        )
        .unwrap_err();
        assert!(matches!(err, ContextError::ImplementationMissing { .. }));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let err = ContextRegistry::partial(
            BackendConfig::cmodel(),
            [bm1684x::REGISTRATION, bm1684x::REGISTRATION],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ContextError::DuplicateRegistration {
                target: Target::Bm1684x
            }
        ));
    }

    #[test]
    fn mismatched_registration() {
        let wrong = ChipRegistration {
            target: Target::Bm1688,
            construct: bm1684x::REGISTRATION.construct,
        };
        let registry = ContextRegistry::partial(BackendConfig::cmodel(), [wrong]).unwrap();
        let err = registry.create("BM1688").unwrap_err();
        assert!(matches!(
            err,
            ContextError::RegistrationMismatch {
                expected: Target::Bm1688,
                found: Target::Bm1684x
            }
        ));
    }

    #[test]
    fn instance_is_shared() {
        let registry = ContextRegistry::new(BackendConfig::cmodel()).unwrap();
        assert!(!registry.is_cached(Target::Bm1684));
        let a = registry.get("BM1684").unwrap();
        let b = registry.instance(Target::Bm1684).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.is_cached(Target::Bm1684));
    }

    #[test]
    fn create_is_not_cached() {
        let registry = ContextRegistry::new(BackendConfig::cmodel()).unwrap();
        let ctx = registry.create("SG2260").unwrap();
        assert_eq!(ctx.target(), Target::Sg2260);
        assert!(!registry.is_cached(Target::Sg2260));
    }

    #[test]
    fn registries_are_independent() {
        let one = ContextRegistry::new(BackendConfig::cmodel()).unwrap();
        let two = ContextRegistry::new(BackendConfig::cmodel()).unwrap();
        let a = one.get("BM1688").unwrap();
        let b = two.get("BM1688").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn poisoned_cache_still_answers() {
        let registry = ContextRegistry::new(BackendConfig::cmodel()).unwrap();
        let first = registry.instance(Target::Bm1688).unwrap();
        let poison = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _held = registry.instances.lock().unwrap();
            panic!("poison the cache");
        }));
        assert!(poison.is_err());
        assert!(registry.is_cached(Target::Bm1688));
        assert!(!registry.is_cached(Target::Sg2260));
        assert!(Arc::ptr_eq(&first, &registry.instance(Target::Bm1688).unwrap()));
    }
}
