use std::convert::Infallible;

use warp::{reject::Rejection, Filter};

use crate::error::Error;

use super::jwt::{verify_jwt_session, SessionData};

pub fn with_auth(
    secret: Vec<u8>,
) -> impl Filter<Extract = ((),), Error = Rejection> + Clone {
    warp::cookie::<String>("session").and_then(move |session: String| {
        let secret = secret.clone();
        async move {
            if verify_jwt_session(&session, &secret).is_ok() {
                Ok(())
            } else {
                Err(warp::reject::custom(Error::unauthorized("Invalid session")))
            }
        }
    })
}

pub fn with_session(
    secret: Vec<u8>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::cookie::<String>("session").and_then(move |session: String| {
        let secret = secret.clone();
        async move {
            match verify_jwt_session(&session, &secret) {
                Ok(data) => Ok(SessionData::from(data)),
                Err(_) => Err(warp::reject::custom(Error::unauthorized("Invalid session"))),
            }
        }
    })
}

/// Anonymous callers pass through with `None`; membership filters
/// degrade silently instead of rejecting them.
pub fn with_possible_session(
    secret: Vec<u8>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Infallible> + Clone {
    warp::cookie::optional::<String>("session").map(move |session: Option<String>| {
        session
            .and_then(|token| verify_jwt_session(&token, &secret).ok())
            .map(SessionData::from)
    })
}
