use crate::error::KanError;

pub type KanResult<T> = Result<T, KanError>;
