pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::AccountError;
pub use router::auth_routes;
pub use services::{account::AccountService, password::PasswordService};
