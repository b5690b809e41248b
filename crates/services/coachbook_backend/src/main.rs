// File: services/coachbook_backend/src/main.rs
use axum::{routing::get, Router};
use chrono::Utc;
use coachbook_booking::admin::{parse_time_zone, seed_default_window};
use coachbook_common::{log_error, log_result};
use coachbook_config::{load_config, AppConfig};
use coachbook_db::{init_schema, DbClient};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Creates slots for the coming days when enabled. A failure is logged and the
/// server starts anyway.
async fn seed_if_enabled(db: &DbClient, config: &AppConfig) {
    if !config.booking.seed_on_startup {
        return;
    }
    let today = Utc::now()
        .with_timezone(&parse_time_zone(&config.booking.time_zone))
        .date_naive();
    match seed_default_window(db, &config.booking, today).await {
        Ok(created) => info!("Seeded {} slots from {}", created, today),
        Err(e) => log_error(e, "Slot seeding failed"),
    }
}

fn api_router(config: Arc<AppConfig>, db: DbClient) -> Router {
    #[allow(unused_mut)] // for the features it needs to be mutable
    let mut router = Router::new()
        .route("/", get(|| async { "Welcome to the coachbook API!" }))
        .merge(coachbook_booking::routes(config.clone(), db.clone()));

    #[cfg(feature = "stripe")]
    {
        router = router.merge(coachbook_stripe::routes(config.clone(), db.clone()));
    }
    #[cfg(feature = "paypal")]
    {
        router = router.merge(coachbook_paypal::routes(config.clone(), db.clone()));
    }
    router
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _log_guard = coachbook_common::logging::init();
    let config = Arc::new(load_config()?);

    let db = DbClient::new(&config).await?;
    log_result(
        init_schema(&db).await,
        "Database schema ready",
        "Schema initialization failed",
    )?;
    seed_if_enabled(&db, &config).await;

    info!(
        stripe = config.use_stripe,
        paypal = config.use_paypal,
        "Payment providers"
    );

    #[allow(unused_mut)]
    let mut app = Router::new().nest("/api", api_router(config.clone(), db));

    // Conditionally add Swagger UI and JSON endpoint if openapi feature enabled
    #[cfg(feature = "openapi")]
    {
        use coachbook_booking::doc::BookingApiDoc;
        #[cfg(feature = "paypal")]
        use coachbook_paypal::doc::PaypalApiDoc;
        #[cfg(feature = "stripe")]
        use coachbook_stripe::doc::StripeApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            info(
                title = "coachbook API",
                version = "0.1.0",
                description = "Coaching session booking with Stripe and PayPal checkout"
            ),
            servers((url = "/api", description = "Main API Prefix")),
        )]
        struct ApiDoc;

        #[allow(unused_mut)]
        let mut openapi_doc = ApiDoc::openapi();
        openapi_doc.merge(BookingApiDoc::openapi());
        #[cfg(feature = "stripe")]
        openapi_doc.merge(StripeApiDoc::openapi());
        #[cfg(feature = "paypal")]
        openapi_doc.merge(PaypalApiDoc::openapi());
        info!("Adding Swagger UI at /api/docs");

        let swagger_ui = SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", openapi_doc);
        app = app.merge(swagger_ui);
    }

    let app = app.layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
