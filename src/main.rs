use actix_web::{middleware::Logger, web, App, HttpServer};

use pi_ledger_api::handlers;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    log::info!("listening on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .service(
                web::resource("/api/user")
                    .route(web::post().to(handlers::user)),
            )
            .service(
                web::resource("/api/member")
                    .route(web::post().to(handlers::member)),
            )
            .service(
                web::resource("/api/profile")
                    .route(web::post().to(handlers::profile)),
            )
            .service(
                web::resource("/api/invite/process")
                    .route(web::post().to(handlers::process_invite)),
            )
            .service(
                web::resource("/api/points/increase")
                    .route(web::post().to(handlers::increase_points)),
            )
            .service(
                web::resource("/api/points/query")
                    .route(web::post().to(handlers::query_points)),
            )
            .service(
                web::resource("/api/invite-points/recompute")
                    .route(web::post().to(handlers::recompute_invite_points)),
            )
            .service(
                web::resource("/api/invited-users")
                    .route(web::post().to(handlers::invited_users)),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
