use thiserror::Error;

use crate::model::ProgressInvariantError;
use crate::model::ReviewError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    ProgressInvariant(#[from] ProgressInvariantError),
    #[error(transparent)]
    Review(#[from] ReviewError),
}
