/// Persistence entities for the callback service
pub mod cart;
pub mod cart_address;
pub mod cart_item;
pub mod cart_payment;
pub mod cart_token;
pub mod customer;
pub mod provider_order;

// Re-export entities
pub use cart::{CartStatus, Entity as Cart, Model as CartModel};
pub use cart_address::{AddressType, Entity as CartAddress, Model as CartAddressModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use cart_payment::{Entity as CartPayment, Model as CartPaymentModel};
pub use cart_token::{Entity as CartToken, Model as CartTokenModel};
pub use customer::{CustomerStatus, Entity as Customer, Model as CustomerModel};
pub use provider_order::{Entity as ProviderOrder, Model as ProviderOrderModel};
