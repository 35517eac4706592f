use std::sync::Arc;

use crate::{
    cart::CartRegistry,
    db::{DbPool, OrmConn},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub carts: Arc<CartRegistry>,
}
