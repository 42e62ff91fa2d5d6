use derive_new::new;

use crate::config::TrendingConfig;
use crate::recorder::ViewRecorder;
use crate::store::ViewEventStore;

#[derive(Debug, Clone, new)]
pub struct App {
    pub store: ViewEventStore,
    pub recorder: ViewRecorder,
    pub trending: TrendingConfig,
}
