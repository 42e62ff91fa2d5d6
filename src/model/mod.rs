use derive_new::new;
use serde::{Deserialize, Serialize};

pub use listing_id::*;
pub use timestamp::*;
pub use view_event::*;

mod listing_id;
mod timestamp;
mod view_event;
