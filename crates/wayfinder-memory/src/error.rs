use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Place {0} appears more than once in the fixture")]
    DuplicatePlace(u64),
    #[error("Place {place_id} refers to unknown parent {parent_place_id}")]
    UnknownParent { place_id: u64, parent_place_id: u64 },
    #[error("Parent chain of place {0} is cyclic")]
    CyclicParents(u64),
}
