use crate::broad::IndexId;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionError {
    /// The body is still owned by another index.
    #[error("body belongs to another collision system ({owner:?})")]
    ForeignBody { owner: IndexId },
    /// The handle was issued by another index.
    #[error("handle was issued by another collision system ({owner:?})")]
    ForeignHandle { owner: IndexId },
    /// The handle's body was removed, or never existed.
    #[error("body does not belong to this collision system")]
    UnknownBody,
    #[error("the vertex list of a point cannot be replaced")]
    PointVertices,
}
