use axum::{
    Json,
    extract::{OriginalUri, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::server::AppState;

/// `/` sends the browser to the default app, if one is configured.
pub async fn root_handler(State(state): State<AppState>) -> Response {
    match state.default_app.as_deref() {
        Some(app) => Redirect::temporary(&format!("/{}/", app)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Settings shared with every client app
pub async fn settings_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.settings.as_ref().clone())
}

/// `/<app>` becomes `/<app>/` so the app's relative asset links resolve.
///
/// Runs inside the nested app service, where both forms arrive as `/`.
pub async fn app_trailing_slash(request: Request, next: Next) -> Response {
    let bare = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.path())
        .filter(|path| !path.ends_with('/'))
        .map(str::to_string);
    match bare {
        Some(path) if request.uri().path() == "/" => {
            Redirect::temporary(&format!("{}/", path)).into_response()
        }
        _ => next.run(request).await,
    }
}
