use super::*;

#[path = "semantic_quality_checks.rs"]
mod semantic_quality_checks;
#[path = "semantic_quality_gates.rs"]
mod semantic_quality_gates;
#[path = "semantic_quality_eval.rs"]
mod semantic_quality_eval;
#[path = "semantic_quality_stats.rs"]
mod semantic_quality_stats;
#[path = "semantic_quality_exact.rs"]
mod semantic_quality_exact;
#[path = "semantic_quality_retrieval.rs"]
mod semantic_quality_retrieval;
#[path = "semantic_quality_manifest.rs"]
mod semantic_quality_manifest;
#[path = "semantic_quality_pinpoint.rs"]
mod semantic_quality_pinpoint;
#[path = "semantic_quality_baseline.rs"]
mod semantic_quality_baseline;

pub use self::semantic_quality_baseline::*;
pub use self::semantic_quality_checks::*;
pub use self::semantic_quality_eval::*;
pub use self::semantic_quality_exact::*;
pub use self::semantic_quality_manifest::*;
pub use self::semantic_quality_pinpoint::*;
pub use self::semantic_quality_retrieval::*;
pub use self::semantic_quality_gates::*;
pub use self::semantic_quality_stats::*;
