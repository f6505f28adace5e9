use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use uuid::Uuid;

/// The authenticated identity, as asserted by the fronting auth layer.
///
/// Sign-in, sign-up, and session lifecycle live outside this service; the
/// proxy forwards the verified subject in `x-user-id` / `x-user-email`
/// headers and the store layer treats it as an opaque owner id. Every query
/// and mutation downstream is scoped to this id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

impl Identity {
    /// Local part of the email, used as a display-name fallback.
    pub fn email_local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "missing or invalid x-user-id header".to_string(),
            ))?;

        let email = parts
            .headers
            .get("x-user-email")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(Identity { id, email })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_local_part_falls_back_to_whole_string() {
        let user = Identity {
            id: Uuid::new_v4(),
            email: "sarah@example.com".to_string(),
        };
        assert_eq!(user.email_local_part(), "sarah");

        let odd = Identity {
            id: Uuid::new_v4(),
            email: "no-at-sign".to_string(),
        };
        assert_eq!(odd.email_local_part(), "no-at-sign");
    }
}
