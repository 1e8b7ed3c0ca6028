//! `terminal-auth`: authentication and staff access policy.
//!
//! This crate is intentionally decoupled from HTTP and storage: it validates
//! token claims, maps staff roles to permissions and answers scope questions
//! ("may this person see this store / this order?").

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod roles;
pub mod staff;

pub use authorize::{AuthzError, authorize, has_access_to_departments, has_access_to_store};
pub use claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use permissions::Permission;
pub use roles::StaffRole;
pub use staff::StaffProfile;
