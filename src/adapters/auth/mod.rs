//! Authentication adapters.
//!
//! - `static_tokens` - `SessionValidator` backed by a configured token table
//! - `token_hooks` - `LifecycleHooks` that authenticate `connection_init`

mod static_tokens;
mod token_hooks;

pub use static_tokens::StaticTokenValidator;
pub use token_hooks::{TokenAuthHooks, AUTH_TOKEN_PARAM};
