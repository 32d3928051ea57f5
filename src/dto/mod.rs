/// Wire-format types for the provider callback
pub mod callback;

pub use callback::{
    CheckoutPayload, DeliveryDetails, OrderLine, PayloadAddress, SelectedShippingOption,
};
