pub mod access;
pub mod context;
pub mod extract;
pub mod extractor;
pub mod jwt;
pub mod pagination;
pub mod test_utils;
pub mod validation;

pub use access::role_gate;
pub use context::AppContext;
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use extractor::auth_middleware;
pub use pagination::PageQuery;
pub use validation::Validator;
