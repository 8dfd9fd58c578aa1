//! Management API over the capture store.
//!
//! Mounted under `admin.path_prefix`. Routes are relative to the prefix.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use self::handlers::*;
use crate::http::server::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/apis", get(list_apis))
        .route(
            "/responses",
            get(list_responses)
                .post(create_response)
                .delete(delete_responses),
        )
        .route(
            "/responses/{id}",
            get(get_response)
                .put(update_response)
                .delete(delete_response),
        )
        .route("/responses/{id}/file", get(download_file).put(upload_file))
        .route(
            "/responses/{id}/histories",
            get(list_histories).delete(delete_histories),
        )
        .route(
            "/responses/{id}/histories/{sub_id}",
            get(get_history).delete(delete_history),
        )
        .route(
            "/responses/{id}/histories/{sub_id}/restore",
            post(restore_history),
        )
        .route(
            "/responses/{id}/histories/{sub_id}/file",
            get(download_history_file),
        )
}
