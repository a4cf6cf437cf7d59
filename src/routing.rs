//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    http::Method,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

use crate::{
    AppState, Error,
    analytics::get_analytics_endpoint,
    auth::{auth_guard, post_log_in, post_log_out, register_user},
    category::{create_category_endpoint, get_categories_endpoint},
    endpoints,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transactions_endpoint,
        update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::REGISTER, post(register_user))
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(endpoints::LOG_OUT, post(post_log_out));

    let protected_routes = Router::new()
        .route(
            endpoints::CATEGORIES,
            post(create_category_endpoint).get(get_categories_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            post(create_transaction_endpoint).get(get_transactions_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            put(update_transaction_endpoint).delete(delete_transaction_endpoint),
        )
        .route(endpoints::ANALYTICS, get(get_analytics_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .nest_service(endpoints::UPLOADS, ServeDir::new(&state.upload_dir))
        .fallback(get_404_not_found)
        .layer(cors_layer())
        .with_state(state)
}

/// Allow browser clients served from other origins to call the API.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(Any)
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}
