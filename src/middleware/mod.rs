/// Middleware module
///
/// Authentication, role gates and the identity extractor.

mod access;
mod jwt_middleware;

pub use access::{require_password_change_cleared, require_role, RequireRole};
pub use jwt_middleware::{bearer_token, JwtMiddleware};
