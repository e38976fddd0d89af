//! OpenAPI / Swagger UI Documentation
//!
//! Auto-generated OpenAPI 3.1 documentation for the Rivollo API.
//!
//! - Swagger UI: `http://localhost:8000/docs`
//! - OpenAPI JSON: `http://localhost:8000/api-docs/openapi.json`

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::handlers::health::HealthResponse;
use crate::gateway::types::{ErrorBody, MessageResponse, PageMeta};

/// Bearer JWT for account routes, HTTP Basic for public viewer routes
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let mut bearer = Http::new(HttpAuthScheme::Bearer);
            bearer.bearer_format = Some("JWT".to_string());
            bearer.description =
                Some("Access token from /api/v1/auth/login, /signup or /google".to_string());
            components.add_security_scheme("bearer_auth", SecurityScheme::Http(bearer));

            let mut basic = Http::new(HttpAuthScheme::Basic);
            basic.description = Some("Shared credentials of the public viewer".to_string());
            components.add_security_scheme("basic_auth", SecurityScheme::Http(basic));
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rivollo API",
        version = "1.0.0",
        description = "Backend for the Rivollo 3D product catalog: products, galleries, hotspots, dimensions, uploads, image-to-3D jobs and subscriptions."
    ),
    servers(
        (url = "http://localhost:8000", description = "Development"),
    ),
    paths(
        // System
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::health::readiness_check,
        crate::gateway::handlers::health::liveness_check,
        // Auth and users
        crate::user_auth::handlers::signup,
        crate::user_auth::handlers::login,
        crate::user_auth::handlers::google_login,
        crate::user_auth::handlers::get_me,
        crate::user_auth::handlers::update_me,
        // Subscriptions and branding
        crate::licensing::handlers::get_my_subscription,
        crate::licensing::handlers::list_plans,
        crate::organization::handlers::get_branding,
        crate::organization::handlers::update_branding,
        // Reference data
        crate::product::reference::list_currency_types,
        crate::product::reference::list_background_types,
        crate::product::reference::get_background,
        crate::product_link::handlers::list_link_types,
        // Products
        crate::product::handlers::list_products,
        crate::product::handlers::create_product,
        crate::product::handlers::get_product,
        crate::product::handlers::patch_product,
        crate::product::handlers::put_product,
        crate::product::handlers::delete_product,
        crate::product::handlers::update_configurator,
        crate::product::handlers::publish_product,
        crate::product::handlers::update_details,
        crate::product::handlers::get_assets,
        crate::product::handlers::get_public_assets,
        crate::product::handlers::get_status,
        crate::product::handlers::list_user_products,
        crate::product::handlers::create_product_from_image,
        crate::product::handlers::remove_background,
        // Product links
        crate::product_link::handlers::create_links,
        crate::product_link::handlers::list_links,
        crate::product_link::handlers::update_link,
        crate::product_link::handlers::delete_link,
        // Hotspots and dimensions
        crate::hotspot::handlers::list_hotspots,
        crate::hotspot::handlers::upsert_hotspot,
        crate::hotspot::handlers::delete_hotspot,
        crate::dimension::handlers::save_dimensions,
        crate::dimension::handlers::replace_dimensions,
        crate::dimension::handlers::list_dimensions,
        crate::dimension::handlers::delete_dimensions,
        // Galleries
        crate::gallery::handlers::list_galleries,
        crate::gallery::handlers::create_gallery,
        crate::gallery::handlers::get_gallery,
        crate::gallery::handlers::patch_gallery,
        crate::gallery::handlers::put_gallery,
        crate::gallery::handlers::delete_gallery,
        // Uploads, jobs, assets
        crate::storage::handlers::create_upload,
        crate::storage::handlers::upload_content,
        crate::job::handlers::create_job,
        crate::job::handlers::get_job,
        crate::job::handlers::get_asset,
        // Insights
        crate::analytics::handlers::get_overview,
        crate::analytics::handlers::track_event,
        crate::analytics::handlers::get_dashboard,
        crate::search::handlers::search,
        // Notifications and support
        crate::notification::handlers::list_notifications,
        crate::notification::handlers::mark_read,
        crate::support::handlers::create_contact,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorBody,
            MessageResponse,
            PageMeta,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Sign-up, login and Google sign-in"),
        (name = "Users", description = "The caller's profile"),
        (name = "Subscriptions", description = "Plans, licenses and quota usage"),
        (name = "Branding", description = "Organisation branding"),
        (name = "Reference", description = "Currencies, backgrounds and other lookup data"),
        (name = "Products", description = "Product catalog, configurator and publishing"),
        (name = "Public", description = "Viewer endpoints behind HTTP Basic"),
        (name = "Product Links", description = "Purchase and info links of a product"),
        (name = "Hotspots", description = "Annotated points on a product model"),
        (name = "Dimensions", description = "Measured dimensions with their marker hotspots"),
        (name = "Galleries", description = "Product collections (Pro and Enterprise)"),
        (name = "Uploads", description = "Signed uploads and direct content uploads"),
        (name = "Jobs", description = "Standalone image-to-3D jobs and their assets"),
        (name = "Analytics", description = "Viewer events and reporting"),
        (name = "Dashboard", description = "Home screen overview"),
        (name = "Search", description = "Search across products and galleries"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "Support", description = "Support contact requests"),
        (name = "System", description = "Health, readiness and liveness checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_spec_generates() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "Rivollo API");
        assert_eq!(doc.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_json_serializable() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json();
        assert!(json.is_ok());
        assert!(json.unwrap().contains("Rivollo API"));
    }

    #[test]
    fn test_endpoints_registered() {
        let doc = ApiDoc::openapi();
        let paths = doc.paths.paths;
        for path in [
            "/api/v1/health",
            "/api/v1/auth/login",
            "/api/v1/products/{product_id}",
            "/api/v1/public/products/{product_id}/assets",
            "/api/v1/galleries/{gallery_id}",
            "/api/v1/products/{product_id}/dimensions",
            "/api/v1/jobs/{job_id}",
            "/api/v1/search",
            "/api/v1/notifications/{notification_id}/read",
        ] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_security_schemes_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("should have components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.security_schemes.contains_key("basic_auth"));
    }
}
