//! PK supermatrix algorithm: every unique two-electron integral is computed once, binned
//! into a Coulomb and an exchange supermatrix and stored on disk in batches of rows.
//! J and K matrices for any number of densities are then formed by streaming the batches
//! back in.

pub mod batch;
pub mod binner;
pub mod buffer;
pub mod engine;
pub mod index;
pub mod storage;
pub mod writer;

pub use batch::{plan_batches, Batch};
pub use binner::{is_shell_relevant, task_quartets, IntegralBinner};
pub use buffer::{PkBuffer, Stream};
pub use engine::{PkConfig, PkIntegralEngine, PkStrategy, ShardPlan, WorkerToken};
pub use storage::{label, PkFile, Record};
pub use writer::{AsyncBufferWriter, JobHandle, SlotState};
