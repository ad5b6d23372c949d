//! Authentication and authorization module entry point.
//!
//! This module exposes the session lifecycle stack for keyplane: credential
//! verification, token issuance and rotation, the OTP second factor, RBAC
//! permission resolution, and the per-request authorization guard.

pub mod authenticator;
pub mod bootstrap;
pub mod guard;
mod hashing;
pub mod jwt;
pub mod login_service;
pub mod middleware;
pub mod models;
pub mod otp_service;
pub mod permissions;
pub mod revalidation;
pub mod role;
pub mod token_service;
pub mod user;
pub mod user_service;

pub use authenticator::Authenticator;
pub use guard::{Decision, RouteRequirement};
pub use hashing::{hash_password, password_hasher, verify_password};
pub use jwt::{AccessClaims, JwtService};
pub use login_service::LoginService;
pub use models::{CurrentUser, DeniedReason, LoginOutcome, TokenPair};
pub use otp_service::OtpService;
pub use revalidation::AdminRevalidator;
pub use token_service::TokenService;
pub use user_service::UserService;
