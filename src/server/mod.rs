//! main file for the server

pub(crate) mod controller;
pub(crate) mod database;
pub(crate) mod domain;
pub(crate) mod model;
pub(crate) mod payment;
pub(crate) mod state;
pub(crate) mod util;

use crate::server::controller::{loyalty, orders, payment as payment_controller};
use crate::server::database::pool;
use crate::server::model::config::ServerConfig;
use crate::server::payment::gateway::PaymentGateway;
use crate::server::payment::token::{AccessTokenCache, KeycloakExchanger, SystemClock};
use crate::server::state::AppState;
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

/// Run the server
pub async fn run(config: ServerConfig) -> std::io::Result<()> {
    let db_read_pool = pool::connect(config.db_read_conn_str.as_str(), pool::DEFAULT_SIZE)
        .await
        .map_err(std::io::Error::other)?;
    let db_write_pool = pool::connect(config.db_write_conn_str.as_str(), pool::DEFAULT_SIZE)
        .await
        .map_err(std::io::Error::other)?;

    let tokens = AccessTokenCache::new(KeycloakExchanger::new(&config.auth), SystemClock);
    let gateway = Arc::new(PaymentGateway::new(config.gateway_base_url.clone(), tokens));
    let state = web::Data::new(AppState::new(db_read_pool, db_write_pool, gateway));

    let allowed_origins = config.allowed_origins.clone();
    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PATCH"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
            .max_age(3600);
        for origin in &allowed_origins {
            cors = cors.allowed_origin(origin);
        }
        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .service(payment_controller::post_payment_init)
            .service(payment_controller::get_payment_status)
            .service(payment_controller::health)
            .service(orders::post_order)
            .service(orders::get_order)
            .service(orders::get_orders)
            .service(orders::patch_order_status)
            .service(loyalty::post_credit_points)
    })
    .bind(config.addr)?
    .run()
    .await
}
