use crate::server::database::pool::Pool;
use crate::server::payment::gateway::LiveGateway;
use std::sync::Arc;
use tokio_postgres::Client;

#[derive(Clone)]
pub(crate) struct AppState {
    db_read_pool: Pool<Client>,
    db_write_pool: Pool<Client>,
    gateway: Arc<LiveGateway>,
}

impl AppState {
    pub fn new(
        db_read_pool: Pool<Client>,
        db_write_pool: Pool<Client>,
        gateway: Arc<LiveGateway>,
    ) -> Self {
        Self {
            db_read_pool,
            db_write_pool,
            gateway,
        }
    }

    pub fn get_db_read_pool(&self) -> Pool<Client> {
        self.db_read_pool.clone()
    }

    pub fn get_db_write_pool(&self) -> Pool<Client> {
        self.db_write_pool.clone()
    }

    pub fn gateway(&self) -> &LiveGateway {
        &self.gateway
    }
}
