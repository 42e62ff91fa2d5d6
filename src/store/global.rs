use once_cell::sync::OnceCell;
use snafu::ensure;

use super::{AlreadyInstalledSnafu, Result, ViewEventStore};

static STORE: OnceCell<ViewEventStore> = OnceCell::new();

/// Install the process-wide store. Only the first call succeeds.
pub fn install(store: ViewEventStore) -> Result<&'static ViewEventStore> {
    let mut installed_now = false;
    let installed = STORE.get_or_init(|| {
        installed_now = true;
        store
    });

    ensure!(installed_now, AlreadyInstalledSnafu);
    Ok(installed)
}
