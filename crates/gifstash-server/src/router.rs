use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{admin, handler, middleware};

/// Object routes, mounted at the root and again under `/t/:tenant` so that
/// anonymous callers can name the tenant in the path.
fn gif_routes() -> Router<AppState> {
    Router::new()
        .route("/gifs", get(handler::list_categories))
        .route("/gifs/:key", get(handler::retrieve))
        .route("/gifs/:key/report", delete(handler::report))
        .route("/gifs/:key/random", get(handler::random_redirect))
        .route("/gifs/:key/random/:count", get(handler::random_sample))
        .route("/gifs/:key/:kind", post(handler::upload))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/accounts",
            get(admin::list_accounts).post(admin::create_account),
        )
        .route(
            "/admin/accounts/:id",
            get(admin::get_account).delete(admin::revoke_account),
        )
        .route(
            "/admin/accounts/:id/permissions",
            post(admin::grant_permissions).delete(admin::revoke_permissions),
        )
        .route("/admin/accounts/:id/datastore", put(admin::set_datastore))
}

/// Build the axum router with every gifstash endpoint.
///
/// All routes except the health check pass through request admission.
pub fn build_router(state: AppState) -> Router {
    let admitted = Router::new()
        .merge(gif_routes())
        .nest("/t/:tenant", gif_routes())
        .merge(admin_routes())
        .route_layer(from_fn_with_state(state.clone(), middleware::admit));

    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .merge(admitted)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
