use crate::periodic_table::ElementType;

/// Everything that can abort a PK or SCF computation.
///
/// Convergence failures are not errors, see [`crate::hf::ScfStatus`].
#[derive(Debug, thiserror::Error)]
pub enum ScfError {
    #[error("not enough memory for PK algorithm: {memory} doubles available, at least {required} required")]
    InsufficientMemory { memory: usize, required: usize },

    #[error("maximum number of PK batches exceeded: requested {requested}, at most {maximum} allowed")]
    TooManyBatches { requested: usize, maximum: usize },

    #[error("a multiplicity of {multiplicity} with {electrons} electrons is impossible")]
    ImpossibleMultiplicity { multiplicity: u32, electrons: i64 },

    #[error("there are not enough electrons ({electrons}) for multiplicity {multiplicity}")]
    NotEnoughElectrons { multiplicity: u32, electrons: i64 },

    #[error("the atomic guess solver needs exactly one atom, got {atoms}")]
    MultipleAtoms { atoms: usize },

    #[error("no basis functions for element {0:?}")]
    MissingBasis(ElementType),

    #[error("invalid occupation: {0}")]
    InvalidOccupation(String),

    #[error("buffer window [{start}, {stop}) is empty")]
    InvalidWindow { start: usize, stop: usize },

    #[error("buffer slot {slot} was flushed without being filled")]
    InactiveBuffer { slot: usize },

    #[error("record \"{0}\" not found in PK file")]
    MissingRecord(String),

    #[error("the background integral writer has stopped")]
    WriterDisconnected,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScfError>;
