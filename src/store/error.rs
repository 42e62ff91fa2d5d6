use std::time::Duration;

use snafu::{Location, Snafu};

use crate::model::ParseListingId;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    /// The listing reference is not a well-formed identifier, nothing was written.
    #[snafu(display("rejected listing reference at {location}: {source}"))]
    InvalidReference {
        source: ParseListingId,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("the view store is unavailable at {location}: {source}"))]
    StorageUnavailable {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("view store query exceeded its {budget:?} budget at {location}"))]
    QueryTimeout {
        budget: Duration,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("a view store has already been installed for this process at {location}"))]
    AlreadyInstalled {
        #[snafu(implicit)]
        location: Location,
    },
}

impl StoreError {
    /// Timeouts and unreachable storage are handled the same way by callers.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::StorageUnavailable { .. } | StoreError::QueryTimeout { .. }
        )
    }
}
