use std::sync::Arc;

use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::service::{Deadline, Services};

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub config: Arc<Config>,
    pub services: Arc<Services>,
    pub deadline: Deadline,
}

impl AppState {
    pub fn new(db: Pool<Sqlite>, config: Arc<Config>, services: Services) -> Self {
        let deadline = Deadline::from_secs(config.request_timeout_secs);
        AppState {
            db,
            config,
            services: Arc::new(services),
            deadline,
        }
    }
}
