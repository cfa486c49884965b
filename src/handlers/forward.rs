//! Catch-all forwarding endpoint.
//!
//! Every method on every path lands here. The path and query of the inbound
//! request are ignored: the target comes entirely from `WannabeURL`.

use axum::extract::{Request, State};
use axum::response::Response;
use tracing::instrument;

use crate::proxy::InboundRequest;
use crate::state::AppState;

/// Forward the request through the pipeline.
#[instrument(skip_all, fields(method = %request.method()))]
pub async fn forward(State(state): State<AppState>, request: Request) -> Response {
    state.pipeline.handle(InboundRequest::from(request)).await
}
