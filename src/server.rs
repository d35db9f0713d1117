use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware, web, App, HttpServer};

use crate::error::DownloadError;
use crate::handlers;
use crate::state::AppState;

/// Open policy: any origin (echoed back), any method, any header, with credentials.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .expose_headers([header::CONTENT_DISPOSITION])
}

// Body parse failures get the same `{"detail": ...}` shape as every other error.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| DownloadError::Validation(err.to_string()).into())
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(web::resource("/").route(web::get().to(handlers::index)))
        .service(web::resource("/download").route(web::post().to(handlers::download)));
}

pub async fn run(state: web::Data<AppState>, bind_addr: &str) -> std::io::Result<()> {
    HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
