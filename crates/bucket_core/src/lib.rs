pub mod beam;
pub mod bucket;
pub mod containment;
pub mod error;
pub mod minimize;
pub mod numerics;
pub mod partition;
pub mod polynomial;
pub mod separatrix;
pub mod spline;
/// The `bucket_core` crate provides the longitudinal phase-space engine behind RF bucket
/// analysis. Given a sampled potential well it derives the separatrix and bucket geometry,
/// decomposes multi-harmonic wells into nested sub-buckets, and solves for bunch outlines
/// matching a requested length, height or emittance.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric bound), `Minimizer` (1-D search), `RingProgram` and
///   `WellProgram` (per-sample machine parameters and potential wells).
/// - **Bucket**: separatrix, geometry, sub-bucket tree, outlines and frequency spread.
/// - **Partition / Containment**: inner-well detection and the nesting forest.
/// - **Beam**: batch bucket parameters through an acceleration cycle.
pub mod traits;
pub mod types;

pub use beam::{BeamParameters, BeamSettings, BucketTable, EmittanceProgram};
pub use bucket::frequency::{FrequencySpread, SpreadCurve, SpreadSettings};
pub use bucket::outline::OutlineSettings;
pub use bucket::{Bucket, OverfillPolicy};
pub use error::{BucketError, BucketResult};
pub use types::{BunchParameters, BunchQuantity, BunchTarget, Contour, PhysicalParameters, PotentialWell};
