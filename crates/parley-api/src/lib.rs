pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod users;

use std::sync::Arc;

use parley_db::Database;
use parley_gateway::dispatcher::Dispatcher;
use parley_media::Uploader;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub uploader: Arc<dyn Uploader>,
}
