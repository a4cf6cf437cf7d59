//! User accounts, passwords and cookie based sessions.

mod cookie;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod register_user;
mod token;
mod user;

pub use cookie::{DEFAULT_COOKIE_DURATION, invalidate_auth_cookie, set_auth_cookie};
pub use log_in::post_log_in;
pub use log_out::post_log_out;
pub use middleware::auth_guard;
pub use password::PasswordHash;
pub use register_user::register_user;
pub(crate) use token::Token;
pub use user::{
    NewUser, User, UserID, create_user, create_user_table, get_user_by_email, get_user_by_id,
};

#[cfg(test)]
pub(crate) use cookie::COOKIE_TOKEN;
