use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::allocation::{Actor, ActorRole};
use crate::error::Error;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Caller identity forwarded by the gateway in `x-actor-id` / `x-actor-role`.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, Error> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| Error::Unauthorized(format!("missing {} header", name)))?
        .to_str()
        .map_err(|_| Error::Unauthorized(format!("malformed {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ACTOR_ID_HEADER)?
            .trim()
            .parse::<Uuid>()
            .map_err(|_| Error::Unauthorized("x-actor-id must be a UUID".to_string()))?;
        let role = header(parts, ACTOR_ROLE_HEADER)?
            .trim()
            .parse::<ActorRole>()
            .map_err(Error::Unauthorized)?;
        Ok(CurrentActor(Actor { id, role }))
    }
}
