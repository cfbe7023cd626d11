//! Query relay — raw statement in, daemon JSON out.

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};
use crate::proxy::ProxyError;
use crate::state::SharedState;

/// POST /query
///
/// The body is forwarded untouched; meta-commands such as `\dc` are not
/// special-cased. The daemon's status code and body are relayed verbatim.
pub async fn query_submit(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    debug!(bytes = body.len(), "Forwarding query to daemon");

    match state.proxy.forward(body).await {
        Ok(reply) => Ok((
            reply.status,
            [(header::CONTENT_TYPE, "application/json")],
            reply.body,
        ).into_response()),
        Err(e) => {
            warn!(error = %e, daemon = ?state.supervisor.state(), "Query forward failed");
            Err(e)
        }
    }
}
