use actix_web::{App, HttpServer, middleware, web};
use tracing_subscriber::EnvFilter;

use sql_chatbot::server::{AppState, configure, cors_headers};
use sql_chatbot::{Config, SqlChatbot};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // A missing .env is fine; the environment may already be populated.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().map_err(std::io::Error::other)?;
    let chatbot = SqlChatbot::from_config(&config).map_err(std::io::Error::other)?;

    let state = web::Data::new(AppState {
        router: chatbot.router(),
        pipeline: chatbot.pipeline(),
    });

    tracing::info!("Starting server at http://{}:{}/swagger-ui/", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors_headers())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    chatbot.close().await;
    Ok(())
}
