pub mod jwt;
pub mod password;
pub mod policy;

pub use jwt::{AuthUser, Claims, JwtKeys, TokenKind};
