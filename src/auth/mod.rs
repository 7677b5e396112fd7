/// Authentication module
///
/// Handles JWT issuance/validation, password hashing, opaque refresh and
/// recovery tokens, the refresh cookie, and the account service that ties
/// them together.

mod claims;
pub mod cookie;
mod jwt;
mod password;
mod service;
mod tokens;

pub use claims::{Claims, Identity};
pub use jwt::{generate_access_token, validate_access_token};
pub use password::{hash_password, verify_password};
pub use service::{
    AuthService, CreateAgentRequest, ForgotPasswordRequest, LoginOutcome, LoginRequest,
    ProvisionedAgent, RegisterRequest, Registration, ResetIssued, ResetPasswordRequest,
    SessionTokens, VerifyEmailRequest,
};
pub use tokens::{generate_opaque_token, generate_temp_password, hash_token, issue_token, IssuedToken};
