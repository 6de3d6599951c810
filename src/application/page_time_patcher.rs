//! Installing the `Date` override in the browser page

use derive_more::Display;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::application::ports::{BrowserError, BrowserPage};
use crate::domain::{LogicalDate, PatchScript};

/// Which half of an install failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PatchStage {
    #[display("registering the pre-navigation script")]
    Register,
    #[display("evaluating in the current page")]
    Evaluate,
}

/// The page clock could not be overridden
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed {stage} for the Date override: {source}")]
pub struct PatchApplicationError {
    pub stage: PatchStage,
    #[source]
    pub source: BrowserError,
}

/// Pins a page's `Date` to a logical date, now and after every navigation
#[derive(Clone)]
pub struct PageTimePatcher {
    page: Arc<dyn BrowserPage>,
}

impl PageTimePatcher {
    pub fn new(page: Arc<dyn BrowserPage>) -> Self {
        Self { page }
    }

    /// Register the patch for future navigations, then apply it in place.
    ///
    /// The in-place evaluation covers tests that never navigate again; the
    /// registration covers every later `goto` or reload.
    #[instrument(skip_all, fields(date = %date))]
    pub async fn install(&self, date: &LogicalDate) -> Result<PatchScript, PatchApplicationError> {
        let script = PatchScript::for_date(date);

        self.page
            .add_init_script(script.source())
            .await
            .map_err(|source| PatchApplicationError {
                stage: PatchStage::Register,
                source,
            })?;

        self.page
            .evaluate(script.source(), Vec::new())
            .await
            .map_err(|source| PatchApplicationError {
                stage: PatchStage::Evaluate,
                source,
            })?;

        debug!(epoch_millis = script.epoch_millis(), "page clock patched");
        Ok(script)
    }
}
