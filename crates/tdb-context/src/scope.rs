//! Scoped backend acquisition.

use std::ops::Deref;
use std::sync::Arc;

use tracing::trace;

use crate::context::TargetContext;
use crate::error::{ContextError, Result};
use crate::registry::ContextRegistry;

/// A context held for the duration of a scope.
///
/// Dropping the guard releases nothing today; the runner lives as long as
/// the registry's cached context.
#[derive(Debug)]
pub struct BackendGuard {
    context: Arc<TargetContext>,
}

impl BackendGuard {
    pub fn context(&self) -> &Arc<TargetContext> {
        &self.context
    }
}

impl Deref for BackendGuard {
    type Target = TargetContext;

    fn deref(&self) -> &TargetContext {
        &self.context
    }
}

impl Drop for BackendGuard {
    fn drop(&mut self) {
        trace!(target_chip = %self.context.target(), "backend guard released");
    }
}

impl ContextRegistry {
    /// Acquire the shared context for `name`.
    pub fn acquire(&self, name: &str) -> Result<BackendGuard> {
        let context = self.get(name)?;
        trace!(target_chip = %context.target(), "backend guard acquired");
        Ok(BackendGuard { context })
    }

    /// Run `f` with the context for `name`, releasing it afterwards even if
    /// `f` fails or panics.
    pub fn use_backend<T, E>(
        &self,
        name: &str,
        f: impl FnOnce(&TargetContext) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<ContextError>,
    {
        let guard = self.acquire(name)?;
        f(&guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use tdb_runner::Memory;
    use tdb_target::Target;

    #[test]
    fn guard_derefs_to_cached_context() {
        let registry = ContextRegistry::new(BackendConfig::cmodel()).unwrap();
        let guard = registry.acquire("BM1684X").unwrap();
        assert_eq!(guard.target(), Target::Bm1684x);
        let cached = registry.instance(Target::Bm1684x).unwrap();
        assert!(Arc::ptr_eq(guard.context(), &cached));
    }

    #[test]
    fn use_backend_returns_value() {
        let registry = ContextRegistry::new(BackendConfig::cmodel()).unwrap();
        let size = registry
            .use_backend("BM1688", |ctx| -> Result<u64> { Ok(ctx.memory()?.size()) })
            .unwrap();
        assert_eq!(size, registry.get("BM1688").unwrap().memory_size());
    }

    #[test]
    fn use_backend_propagates_errors() {
        let registry = ContextRegistry::new(BackendConfig::cmodel()).unwrap();
        let err = registry
            .use_backend("BM1684", |ctx| -> Result<()> {
                ctx.classify_address(0)?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ContextError::Target(tdb_target::TargetError::AddressUnmapped { address: 0 })
        ));

        let err = registry
            .use_backend("nope", |_| -> Result<()> { Ok(()) })
            .unwrap_err();
        assert!(matches!(err, ContextError::UnsupportedTarget { .. }));
    }

    #[test]
    fn guard_released_on_panic() {
        let registry = ContextRegistry::new(BackendConfig::cmodel()).unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = registry.use_backend("SG2260", |_| -> Result<()> { panic!("boom") });
        }));
        assert!(result.is_err());
        let ctx = registry.get("SG2260").unwrap();
        // registry and the handle above are the only owners left
        assert_eq!(Arc::strong_count(&ctx), 2);
    }
}
