/// Role gates and the `Identity` extractor
///
/// `JwtMiddleware` authenticates whole scopes. Routes that mix anonymous and
/// authenticated callers take `Identity` (or `Option<Identity>`) as an
/// extractor instead, which validates the bearer token on demand.

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::auth::{validate_access_token, Identity};
use crate::configuration::JwtSettings;
use crate::domain::Role;
use crate::error::{AppError, AuthError};
use crate::middleware::jwt_middleware::bearer_token;
use crate::store::UserStore;

fn authenticate(req: &HttpRequest) -> Result<Identity, AppError> {
    if let Some(identity) = req.extensions().get::<Identity>() {
        return Ok(identity.clone());
    }

    let jwt = req
        .app_data::<web::Data<JwtSettings>>()
        .ok_or_else(|| AppError::Internal("JWT settings not registered".to_string()))?;
    let token = bearer_token(req.headers()).ok_or(AuthError::MissingToken)?;

    validate_access_token(token, jwt)
}

impl FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

/// Fails with `Unauthenticated` when no identity is attached and
/// `Forbidden` when its role is not in `allowed`.
pub fn require_role(identity: Option<&Identity>, allowed: &[Role]) -> Result<(), AppError> {
    let identity = identity.ok_or(AuthError::Unauthenticated)?;
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        tracing::warn!(user_id = %identity.id, role = %identity.role, "Role not permitted");
        Err(AppError::Forbidden("Insufficient role".to_string()))
    }
}

/// Agents provisioned with a temporary password are locked out of agent
/// actions until they complete a password reset.
pub async fn require_password_change_cleared(
    identity: &Identity,
    users: &dyn UserStore,
) -> Result<(), AppError> {
    if identity.role != Role::Agent {
        return Ok(());
    }

    let user = users
        .find_by_id(identity.id)
        .await?
        .ok_or(AuthError::Unauthenticated)?;

    if user.must_change_password {
        tracing::info!(user_id = %identity.id, "Agent action blocked until password change");
        return Err(AuthError::PasswordChangeRequired.into());
    }
    Ok(())
}

/// Scope guard admitting only the listed roles. Must run inside
/// `JwtMiddleware`, i.e. be wrapped before it.
pub struct RequireRole {
    allowed: Rc<[Role]>,
}

impl RequireRole {
    pub fn new(allowed: &[Role]) -> Self {
        Self {
            allowed: allowed.into(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireRoleService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireRoleService {
            service: Rc::new(service),
            allowed: self.allowed.clone(),
        }))
    }
}

pub struct RequireRoleService<S> {
    service: Rc<S>,
    allowed: Rc<[Role]>,
}

impl<S, B> Service<ServiceRequest> for RequireRoleService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let verdict = {
            let extensions = req.extensions();
            require_role(extensions.get::<Identity>(), &self.allowed)
        };

        match verdict {
            Ok(()) => {
                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => Box::pin(async move { Err(e.into()) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewUser;
    use crate::store::MemoryStore;
    use actix_web::test::TestRequest;
    use uuid::Uuid;

    fn identity(role: Role) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            role,
            session_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_require_role() {
        let admin = identity(Role::Admin);
        let user = identity(Role::User);

        assert!(require_role(Some(&admin), &[Role::Admin]).is_ok());
        assert!(matches!(
            require_role(Some(&user), &[Role::Agent, Role::Admin]),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            require_role(None, &[Role::Admin]),
            Err(AppError::Auth(AuthError::Unauthenticated))
        ));
    }

    #[tokio::test]
    async fn test_password_gate_only_applies_to_flagged_agents() {
        let store = MemoryStore::new();
        let agent = store
            .insert_user(NewUser {
                email: "agent@example.com".to_string(),
                password_hash: "hash".to_string(),
                first_name: None,
                last_name: None,
                role: Role::Agent,
                verify_token: None,
                must_change_password: true,
                created_by_admin: true,
            })
            .await
            .unwrap();

        let mut caller = identity(Role::Agent);
        caller.id = agent.id;
        assert!(matches!(
            require_password_change_cleared(&caller, &store).await,
            Err(AppError::Auth(AuthError::PasswordChangeRequired))
        ));

        // admins are never gated, even without a stored record
        assert!(require_password_change_cleared(&identity(Role::Admin), &store)
            .await
            .is_ok());
    }

    #[test]
    fn test_extractor_prefers_attached_identity() {
        let attached = identity(Role::Agent);
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(attached.clone());

        assert_eq!(authenticate(&req).unwrap(), attached);
    }

    #[test]
    fn test_extractor_validates_bearer_token() {
        let jwt = JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            issuer: "test".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            remember_refresh_token_expiry: 2592000,
        };
        let caller = identity(Role::User);
        let token = crate::auth::generate_access_token(&caller, &jwt).unwrap();

        let req = TestRequest::default()
            .app_data(web::Data::new(jwt.clone()))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request();
        assert_eq!(authenticate(&req).unwrap(), caller);

        let anonymous = TestRequest::default()
            .app_data(web::Data::new(jwt))
            .to_http_request();
        assert!(matches!(
            authenticate(&anonymous),
            Err(AppError::Auth(AuthError::MissingToken))
        ));
    }
}
