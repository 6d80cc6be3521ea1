//! Built-in step implementations.

mod knowledge_threshold_filter;
mod knowledge_weigher;
mod stale_resource_detector;
mod static_weight_weigher;

use crate::NamedFactory;
use std::sync::Arc;

/// Returns every built-in step factory. Called once by
/// [`crate::builtin_factories`] to populate the process-wide registry.
pub fn all() -> Vec<Arc<dyn NamedFactory>> {
    vec![
        Arc::new(knowledge_threshold_filter::Factory),
        Arc::new(static_weight_weigher::Factory),
        Arc::new(knowledge_weigher::Factory),
        Arc::new(stale_resource_detector::Factory),
    ]
}
