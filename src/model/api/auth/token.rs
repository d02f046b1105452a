use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, TokenData, Validation};
use rocket::{
    http::{Cookie, Status},
    request::{FromRequest, Outcome},
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{api::id::ApiId, mongodb::Id};

use super::user::{Rights, Role};

/// Cookie in which the membership system stores the signed token.
pub const AUTH_TOKEN_COOKIE: &str = "jwt";

/// A verified principal, holding rights that satisfy the role `U`.
///
/// Tokens are issued elsewhere in the membership system; here they are only
/// checked against the shared secret.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U> {
    #[serde(rename = "sub")]
    pub id: ApiId,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    pub fn new(id: Id, rights: Rights) -> Self {
        Self {
            id: id.into(),
            rights,
            phantom: PhantomData,
        }
    }

    /// The principal's member ID.
    pub fn member_id(&self) -> Id {
        *self.id
    }

    pub fn is_super_admin(&self) -> bool {
        self.rights == Rights::SuperAdmin
    }
}

impl<U> AuthToken<U>
where
    U: Role,
{
    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: Role + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that its rights satisfy
    /// the route's role.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = req.rocket().state::<Config>() else {
            let err = Error::Unauthorized("token verification is not configured".to_string());
            return Outcome::Error((Status::InternalServerError, err));
        };

        let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) else {
            let err = Error::Unauthorized("not signed in".to_string());
            return Outcome::Error((Status::Unauthorized, err));
        };

        let token: Self = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(err) => {
                debug!("Rejected auth token: {err}");
                return Outcome::Error((Status::Unauthorized, err));
            }
        };

        // Check it represents sufficient rights.
        if !U::permits(token.rights) {
            let err = Error::Unauthorized(format!(
                "{} rights are insufficient, {} rights required",
                token.rights,
                U::NAME
            ));
            return Outcome::Error((Status::Forbidden, err));
        }

        Outcome::Success(token)
    }
}


#[cfg(test)]
mod tests {
    use super::super::user::{Admin, Voter};
    use super::*;

    #[test]
    fn cookie_round_trip_preserves_claims() {
        let config = Config::example();
        let id = Id::new();
        let cookie = AuthToken::<Admin>::new(id, Rights::SuperAdmin).into_cookie(&config);

        let token = AuthToken::<Admin>::from_cookie(&cookie, &config).unwrap();
        assert_eq!(token.member_id(), id);
        assert!(token.is_super_admin());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let config = Config::example();
        let cookie = AuthToken::<Voter>::new(Id::new(), Rights::Member).into_cookie(&config);
        let forged = Cookie::new(AUTH_TOKEN_COOKIE, format!("{}x", cookie.value()));
        assert!(matches!(
            AuthToken::<Voter>::from_cookie(&forged, &config),
            Err(Error::Jwt(_))
        ));
    }
}
