/// Shared application state for the webserver
///
/// One instance is built at startup and handed to every route handler.
use std::sync::Arc;
use tokio_util::task::TaskTracker;

use crate::alerts::AlertEngine;
use crate::config::Config;
use crate::db::Database;
use crate::helius::HeliusClient;
use crate::notifications::Dispatcher;
use crate::prices::PriceOracle;
use crate::store::WindowStore;

pub struct AppState {
    pub config: Config,
    pub engine: Arc<AlertEngine>,
    pub store: Arc<dyn WindowStore>,
    pub oracle: Arc<PriceOracle>,
    pub db: Arc<Database>,
    pub dispatcher: Arc<Dispatcher>,
    pub helius: HeliusClient,
    /// Tracks detached pipeline tasks so shutdown can drain them.
    pub pipeline_tasks: TaskTracker,
}
