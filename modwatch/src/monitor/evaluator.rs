//! Per-mod update evaluation.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::Result;
use crate::catalog::{Credential, UpdateSource};
use crate::domain::{ModUpdate, TrackedMod};

/// Asks the catalog whether one tracked mod has a newer release.
///
/// No retries happen here; a failure is reported to the caller, which decides
/// whether the sweep continues.
#[derive(Clone)]
pub struct UpdateEvaluator {
    source: Arc<dyn UpdateSource>,
}

impl UpdateEvaluator {
    pub fn new(source: Arc<dyn UpdateSource>) -> Self {
        Self { source }
    }

    pub async fn evaluate(
        &self,
        tracked: &TrackedMod,
        credential: &Credential,
    ) -> Result<Option<ModUpdate>> {
        debug!(
            mod_id = tracked.id,
            curseforge_id = tracked.curseforge_id,
            last_updated = %tracked.last_updated,
            "Evaluating mod"
        );

        match self.source.check_mod_update(tracked, credential).await {
            Ok(update) => Ok(update),
            Err(e) => {
                warn!(mod_id = tracked.id, error = %e, "Update check failed for {}", tracked.name);
                Err(e)
            }
        }
    }
}
