use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

use drawboard_server::connection::ws_index;
use drawboard_server::server::spawn_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let srv_tx = spawn_server();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3001);
    let allowed_origins: Vec<String> = match std::env::var("ALLOWED_ORIGINS") {
        Ok(value) => value
            .split(',')
            .map(|origin| origin.trim().to_string())
            .collect(),
        Err(_) => vec![
            "http://localhost:5173".to_string(),
            "http://localhost:5174".to_string(),
        ],
    };

    log::info!("drawboard server listening on port {}", port);
    HttpServer::new(move || {
        let mut cors = Cors::default().allowed_methods(vec!["GET", "POST"]);
        for origin in &allowed_origins {
            cors = cors.allowed_origin(origin);
        }
        App::new()
            .wrap(cors)
            .data(srv_tx.clone())
            .route("/ws/", web::get().to(ws_index))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
