//! Solver outputs packaged as immutable, named artifacts.
//!
//! An [`Artifact`] is produced once by the job that owns it and never
//! mutated afterwards. Encoders in [`encode`] turn solver results into
//! artifacts; [`codec`] holds the two small binary layouts (density
//! frames and coupling matrices) with matching decoders.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod artifact;
pub mod codec;
pub mod encode;
pub mod error;

pub use artifact::{Artifact, ArtifactData, ArtifactKind, ArtifactRef};
pub use codec::{decode_coupling, decode_density_frame, CouplingMatrix, DensityFrame};
pub use encode::{
    encode_coupling, encode_density_frame, encode_frames, encode_metrics, encode_particles,
    encode_policy_csv, encode_rollout, encode_value_csv, FRAMES_FORMAT, FRAMES_VERSION,
};
pub use error::ArtifactError;
