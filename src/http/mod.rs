//! C10 — HTTP Surface: six routes (§4.7) — one `HttpServer::new` closure
//! building an `App`
//! wrapped in `Logger` and `Cors`, sharing a single piece of `web::Data`
//! state across workers. Long-running work never touches a request
//! handler directly; everything here either reads session state already
//! published by the background worker, or hands a new submission off to
//! [`crate::session::SessionRegistry::submit`] and returns immediately.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};

use crate::config::Config;
use crate::session::SessionRegistry;

pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub config: Config,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::index))
        .route("/optimize", web::post().to(handlers::optimize))
        .route("/progress/{id}", web::get().to(handlers::progress))
        .route("/result/{id}", web::get().to(handlers::result))
        .route("/cancel/{id}", web::post().to(handlers::cancel))
        .route("/export/{id}", web::get().to(handlers::export));
}

pub async fn run(state: web::Data<AppState>) -> std::io::Result<()> {
    let bind = (state.config.bind_host.clone(), state.config.bind_port);
    log::info!("starting optimizer server on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%r %s %Ts"))
            .wrap(Cors::default().allow_any_origin().allow_any_method().allow_any_header())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(bind)?
    .run()
    .await
}
