/// Business services for the callback pipeline
pub mod customers;
pub mod shipping;
pub mod validation;

pub use customers::CustomerService;
pub use validation::OrderValidationService;
