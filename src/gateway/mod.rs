pub mod cache;
pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::user_auth::middleware::{jwt_auth_middleware, public_basic_auth_middleware};
use crate::{
    analytics, dimension, gallery, hotspot, job, licensing, notification, organization, product,
    product_link, search, storage, support, user_auth,
};
use state::AppState;

/// Any origin, method and header; the browser frontend is served from other origins.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}

/// Assemble every route under `/api/v1` plus the Swagger UI.
pub fn build_router(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // Open routes (no credentials)
    // ==========================================================================
    let open_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route("/health/live", get(handlers::health::liveness_check))
        .route("/auth/signup", post(user_auth::handlers::signup))
        .route("/auth/login", post(user_auth::handlers::login))
        .route("/auth/google", post(user_auth::handlers::google_login))
        .route("/subscriptions/plans", get(licensing::handlers::list_plans))
        .route("/analytics/events", post(analytics::handlers::track_event));

    // ==========================================================================
    // Public viewer routes - HTTP Basic
    // ==========================================================================
    let public_routes = Router::new()
        .route(
            "/public/products/{product_id}/assets",
            get(product::handlers::get_public_assets),
        )
        .layer(from_fn_with_state(state.clone(), public_basic_auth_middleware));

    // ==========================================================================
    // Account routes - JWT
    // ==========================================================================
    let protected_routes = Router::new()
        // Users, subscription, branding
        .route(
            "/users/me",
            get(user_auth::handlers::get_me).patch(user_auth::handlers::update_me),
        )
        .route("/subscriptions/me", get(licensing::handlers::get_my_subscription))
        .route(
            "/branding",
            get(organization::handlers::get_branding).patch(organization::handlers::update_branding),
        )
        // Reference data
        .route("/currencytypes", get(product::reference::list_currency_types))
        .route("/backgroundtypes", get(product::reference::list_background_types))
        .route("/backgrounds/{backgroundid}", get(product::reference::get_background))
        .route("/product-link-types", get(product_link::handlers::list_link_types))
        // Products
        .route(
            "/products",
            get(product::handlers::list_products).post(product::handlers::create_product),
        )
        .route(
            "/products/{product_id}",
            get(product::handlers::get_product)
                .patch(product::handlers::patch_product)
                .put(product::handlers::put_product)
                .delete(product::handlers::delete_product),
        )
        .route(
            "/products/{product_id}/configurator",
            axum::routing::patch(product::handlers::update_configurator),
        )
        .route("/products/{product_id}/publish", post(product::handlers::publish_product))
        .route(
            "/products/{product_id}/details",
            axum::routing::put(product::handlers::update_details),
        )
        .route("/products/{product_id}/assets", get(product::handlers::get_assets))
        .route("/products/{product_id}/status", get(product::handlers::get_status))
        .route(
            "/products/{product_id}/remove-background",
            post(product::handlers::remove_background),
        )
        .route(
            "/products/user/{user_id}/products",
            get(product::handlers::list_user_products),
        )
        .route("/createProduct", post(product::handlers::create_product_from_image))
        // Product links
        .route(
            "/products/{product_id}/links",
            get(product_link::handlers::list_links).post(product_link::handlers::create_links),
        )
        .route(
            "/links/{link_id}",
            axum::routing::patch(product_link::handlers::update_link)
                .delete(product_link::handlers::delete_link),
        )
        // Hotspots and dimensions
        .route("/products/{product_id}/hotspots", get(hotspot::handlers::list_hotspots))
        .route("/hotspots", post(hotspot::handlers::upsert_hotspot))
        .route(
            "/products/{product_id}/hotspots/{hotspot_id}",
            axum::routing::delete(hotspot::handlers::delete_hotspot),
        )
        .route(
            "/products/{product_id}/dimensions",
            get(dimension::handlers::list_dimensions)
                .post(dimension::handlers::save_dimensions)
                .put(dimension::handlers::replace_dimensions)
                .delete(dimension::handlers::delete_dimensions),
        )
        // Galleries
        .route(
            "/galleries",
            get(gallery::handlers::list_galleries).post(gallery::handlers::create_gallery),
        )
        .route(
            "/galleries/{gallery_id}",
            get(gallery::handlers::get_gallery)
                .patch(gallery::handlers::patch_gallery)
                .put(gallery::handlers::put_gallery)
                .delete(gallery::handlers::delete_gallery),
        )
        // Uploads, jobs, assets
        .route("/uploads", post(storage::handlers::create_upload))
        .route("/uploads/content", post(storage::handlers::upload_content))
        .route("/jobs", post(job::handlers::create_job))
        .route("/jobs/{job_id}", get(job::handlers::get_job))
        .route("/assets/{asset_id}", get(job::handlers::get_asset))
        // Insights
        .route("/analytics/overview", get(analytics::handlers::get_overview))
        .route("/dashboard/overview", get(analytics::handlers::get_dashboard))
        .route("/search", get(search::handlers::search))
        // Notifications and support
        .route("/notifications", get(notification::handlers::list_notifications))
        .route(
            "/notifications/{notification_id}/read",
            post(notification::handlers::mark_read),
        )
        .route("/support/contact", post(support::handlers::create_contact))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let api = Router::new()
        .merge(open_routes)
        .merge(public_routes)
        .merge(protected_routes);

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        // OpenAPI / Swagger UI (stateless, added after with_state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(cors_layer())
}

/// Bind and serve until the process is stopped.
pub async fn run_server(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        tracing::error!(
            "Failed to bind to {}: {} (port {} may already be in use)",
            addr,
            e,
            port
        );
        e
    })?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("API Docs: http://{}/docs", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_cors_preflight_allows_any_origin() {
        let app = Router::new()
            .route("/api/v1/products", post(|| async { "created" }))
            .layer(cors_layer());

        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/v1/products")
            .header(header::ORIGIN, "https://app.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(preflight).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );

        let simple = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/products")
            .header(header::ORIGIN, "https://app.example.com")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(simple).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
