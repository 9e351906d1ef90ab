mod request;
mod token;

pub use request::{LoginRequest, LoginResponse, RefreshResponse, UserSummary};
pub use token::{
    refresh_token_hmac, refresh_token_matches, Access, AdminRole, AnyRole, AuthToken, Refresh,
    Rights, Token, TokenKind, REFRESH_TOKEN_COOKIE,
};
