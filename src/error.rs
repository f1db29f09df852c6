use crate::model::BoxId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("box {0} is not registered, perhaps add_box was never called")]
    NotFound(BoxId),
    #[error("box {0} is already registered")]
    IdConflict(BoxId),
    #[error("no connection from {parent} to {child}")]
    EdgeNotFound { parent: BoxId, child: BoxId },
    #[error("cut line {line} is outside box {host} (lines {first_line}..={last_line})")]
    InvalidSplit {
        host: BoxId,
        line: u32,
        first_line: u32,
        last_line: u32,
    },
    #[error("cut after line {line} leaves the second half of box {host} empty")]
    EmptySplit { host: BoxId, line: u32 },
    #[error("rendering surface has no rectangle for box {0}")]
    MissingGeometry(BoxId),
    #[error("connecting {parent} to {child} would create a cycle")]
    WouldCycle { parent: BoxId, child: BoxId },
}

pub type GraphResult<T> = Result<T, GraphError>;
