//! Per-request resource scope.
//!
//! Every request gets its own [`ResourceScope`] in its extensions. Handlers
//! open units of work against it; whatever they acquired is released, newest
//! first, once the response has been produced.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use battlecards_core::scope::ResourceScope;

pub async fn resource_scope(mut req: Request, next: Next) -> Response {
    let scope = ResourceScope::new();
    req.extensions_mut().insert(scope.clone());

    let response = next.run(req).await;

    let held = scope.len().await;
    if held > 0 {
        tracing::trace!(held, "Releasing request-scoped resources");
    }
    scope.release_all().await;
    response
}
