use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use common::types::Actor;

/// Header naming the caller an operation runs for.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Copy `x-actor-id` into an [`Actor`] request extension. Requests without
/// the header pass through with no actor.
pub async fn extract_actor(mut req: Request, next: Next) -> Response {
    let actor = req
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(Actor::new);
    if let Some(actor) = actor {
        req.extensions_mut().insert(actor);
    }
    next.run(req).await
}
