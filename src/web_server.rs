use actix_web::{App, HttpServer, dev::Server, middleware, web};
use sqlx::sqlite::SqlitePool;

use crate::config::ServerConfig;
use crate::grading::SubmissionGate;
use crate::routes;

pub fn build_server(
    server_config: ServerConfig,
    db_pool: SqlitePool,
    gate: SubmissionGate,
) -> std::io::Result<Server> {
    let db_pool = web::Data::new(db_pool);
    let gate = web::Data::new(gate);

    let bind_address = server_config
        .bind_address
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let bind_port = server_config.bind_port.unwrap_or(12345);
    log::info!("Listening on {bind_address}:{bind_port}");
    if gate.grader().is_degraded() {
        log::warn!("Serving in degraded mode, results are approximate");
    }

    let server = HttpServer::new(move || {
        App::new()
            .app_data(db_pool.clone())
            .app_data(gate.clone())
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind((bind_address, bind_port))?
    .run();

    Ok(server)
}
