//! Test-scoped fixture resolution
//!
//! A `FixtureScope` is a small dependency-injection context for one test.
//! Fixtures are resolved lazily by type, cached by name, and torn down in
//! reverse setup order. A fixture that asks for itself (directly or through
//! its dependencies) is reported as a cycle instead of recursing forever.
//!
//! A scope belongs to a single test task; concurrent tests build their own.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::infrastructure::log_messages::fixtures as messages;
use crate::{Error, Result};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Fixture dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<&'static str>),

    #[error("Fixture {fixture} is unavailable: {reason}")]
    Unavailable {
        fixture: &'static str,
        reason: String,
    },

    #[error("Fixture {0} was already resolved in this scope")]
    AlreadyResolved(&'static str),

    #[error("Fixture {0} is registered with a different output type")]
    TypeMismatch(&'static str),

    #[error("Setting up fixture {fixture} failed: {source}")]
    Setup {
        fixture: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("Tearing down fixture {fixture} failed: {source}")]
    Teardown {
        fixture: &'static str,
        #[source]
        source: Box<Error>,
    },
}

/// A named, test-scoped resource built from its dependencies
#[async_trait]
pub trait Fixture: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    /// Cache key; unique within a scope
    const NAME: &'static str;

    async fn setup(scope: &FixtureScope) -> Result<Self::Output>;

    async fn teardown(_output: Arc<Self::Output>) -> Result<()> {
        Ok(())
    }
}

type Teardown = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

pub struct FixtureScope {
    settings: Settings,
    values: Mutex<HashMap<&'static str, Arc<dyn Any + Send + Sync>>>,
    resolving: Mutex<Vec<&'static str>>,
    teardowns: Mutex<Vec<(&'static str, Teardown)>>,
}

impl Default for FixtureScope {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl FixtureScope {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            values: Mutex::new(HashMap::new()),
            resolving: Mutex::new(Vec::new()),
            teardowns: Mutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Supply `F` from outside; it is used as-is and never torn down here
    pub fn provide<F: Fixture>(&self, value: F::Output) -> Result<Arc<F::Output>> {
        let mut values = self.values.lock();
        if values.contains_key(F::NAME) {
            return Err(FixtureError::AlreadyResolved(F::NAME).into());
        }
        let value = Arc::new(value);
        values.insert(F::NAME, value.clone());
        debug!(fixture = F::NAME, "{}", messages::FIXTURE_PROVIDED);
        Ok(value)
    }

    /// Whether `F` has been set up or provided
    pub fn contains<F: Fixture>(&self) -> bool {
        self.values.lock().contains_key(F::NAME)
    }

    /// The cached `F`, setting it (and its dependencies) up on first use
    pub async fn resolve<F: Fixture>(&self) -> Result<Arc<F::Output>> {
        if let Some(value) = self.cached::<F>()? {
            return Ok(value);
        }

        {
            let mut resolving = self.resolving.lock();
            if resolving.contains(&F::NAME) {
                let mut cycle = resolving.clone();
                cycle.push(F::NAME);
                return Err(FixtureError::Cycle(cycle).into());
            }
            resolving.push(F::NAME);
        }

        let result = F::setup(self).await;
        self.resolving.lock().retain(|name| *name != F::NAME);

        let output = match result {
            Ok(output) => Arc::new(output),
            // Already names the fixture that failed
            Err(Error::Fixture(error)) => return Err(error.into()),
            Err(source) => {
                return Err(FixtureError::Setup {
                    fixture: F::NAME,
                    source: Box::new(source),
                }
                .into())
            }
        };

        self.values.lock().insert(F::NAME, output.clone());
        let for_teardown = output.clone();
        let teardown: Teardown = Box::new(move || F::teardown(for_teardown));
        self.teardowns.lock().push((F::NAME, teardown));

        info!(fixture = F::NAME, "{}", messages::FIXTURE_READY);
        Ok(output)
    }

    fn cached<F: Fixture>(&self) -> Result<Option<Arc<F::Output>>> {
        match self.values.lock().get(F::NAME) {
            None => Ok(None),
            Some(value) => value
                .clone()
                .downcast::<F::Output>()
                .map(Some)
                .map_err(|_| FixtureError::TypeMismatch(F::NAME).into()),
        }
    }

    /// Tear down after a setup that failed partway and hand back `error`.
    ///
    /// A teardown failure here is only logged, so the caller sees what
    /// stopped the setup.
    pub async fn abandon_setup(&self, error: Error) -> Error {
        warn!(error = %error, "{}", messages::SETUP_ABANDONED);
        if let Err(teardown_error) = self.teardown().await {
            warn!(error = %teardown_error, "{}", messages::TEARDOWN_FAILED);
        }
        error
    }

    /// Tear down everything set up so far, newest first.
    ///
    /// Every teardown runs even if an earlier one fails; the first failure
    /// is returned.
    pub async fn teardown(&self) -> Result<()> {
        let teardowns: Vec<_> = self.teardowns.lock().drain(..).rev().collect();
        let mut first_failure = None;

        for (fixture, teardown) in teardowns {
            debug!(fixture, "{}", messages::TEARING_DOWN);
            if let Err(source) = teardown().await {
                warn!(fixture, error = %source, "{}", messages::TEARDOWN_FAILED);
                first_failure.get_or_insert(FixtureError::Teardown {
                    fixture,
                    source: Box::new(source),
                });
            }
        }

        self.values.lock().clear();
        match first_failure {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}
