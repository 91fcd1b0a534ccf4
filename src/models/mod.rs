pub mod delivery;
pub mod order;
pub mod payment;

pub use delivery::{DeliveryData, DeliveryResponse, DeliveryStatus, QuoteRequest, QuoteResponse};
pub use order::{DisplayStatus, NewOrder, NewOrderItem, OrderItemView, OrderView, UpdateOrderStatus};
pub use payment::{PaymentIntent, PaymentIntentRequest, PaymentMethod};
