pub mod api_errors;
pub mod http;
pub mod stripe;
