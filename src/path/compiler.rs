//! Path Compiler
//!
//! Compiles parsed steps into search queries and caches compiled paths by
//! their source text.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use super::parser::{self, Axis};
use crate::error::{Error, Result};
use crate::search::Query;

/// Compiled path expression
#[derive(Debug, Clone)]
pub struct CompiledPath {
    pub source: String,
    pub steps: Vec<CompiledStep>,
}

/// Compiled step
#[derive(Debug, Clone)]
pub struct CompiledStep {
    /// `None` for a check-only step
    pub axis: Option<Axis>,
    pub check: Option<Query>,
}

impl CompiledPath {
    /// Compile a path expression
    pub fn compile(source: &str) -> Result<Self> {
        let steps = parser::parse(source)?
            .into_iter()
            .map(|step| {
                let check = match step.check {
                    Some(check) => Some(
                        Query::build(source, &check.constraints).map_err(|err| match err {
                            Error::MalformedCriteria { reason, .. } => {
                                Error::malformed_path(source, check.position, reason)
                            }
                            other => other,
                        })?,
                    ),
                    None => None,
                };
                Ok(CompiledStep {
                    axis: step.axis,
                    check,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CompiledPath {
            source: source.to_string(),
            steps,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// LRU cache of compiled paths keyed by source text
#[derive(Debug)]
pub struct PathCache {
    inner: Mutex<LruCache<String, Arc<CompiledPath>>>,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        PathCache {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get a compiled path, compiling and caching it on a miss
    pub fn get_or_compile(&self, source: &str) -> Result<Arc<CompiledPath>> {
        {
            let mut cache = self.inner.lock().map_err(|_| Error::Poisoned)?;
            if let Some(compiled) = cache.get(source) {
                return Ok(Arc::clone(compiled));
            }
        }
        // Compile outside the lock
        let compiled = Arc::new(CompiledPath::compile(source)?);
        let mut cache = self.inner.lock().map_err(|_| Error::Poisoned)?;
        cache.put(source.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map_or(0, |cache| cache.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
