/// HTTP handlers
pub mod validate;

pub use validate::callback_routes;
