//! pwa-inspect: core types and pure analysis for Progressive Web App detection.
//!
//! Nothing in this crate performs I/O: fetching, rendering and audit
//! supervision live in `pwa-inspect-runtime`.

pub mod audit_output;
pub mod features;
pub mod manifest;
pub mod report;
pub mod types;

pub use features::{analyze, FeatureAnalyzer, MAX_RAW_BYTES, OVERSIZE_SENTINEL};
pub use manifest::{parse_manifest, strip_json_comments};
pub use report::{Artifacts, Audits, ManifestArtifact, Report, ServiceWorkerArtifact};
pub use types::*;
