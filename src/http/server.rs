use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use tracing::info;

use crate::application::LedgerService;
use crate::config::ServerConfig;

use super::configure;

/// Run the HTTP server until shutdown. The service handle is created once by
/// the caller and shared by every worker.
pub async fn serve(config: ServerConfig, service: LedgerService) -> std::io::Result<()> {
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(configure(service.clone()))
    })
    .bind((config.host.as_str(), config.port))?;

    info!(host = %config.host, port = config.port, "listening");
    server.run().await
}
