pub mod address;
pub mod cart_entry;
pub mod item;
pub mod message;
pub mod message_seen;
pub mod notification;
pub mod order;
pub mod order_item;

pub use address::Entity as Address;
pub use cart_entry::Entity as CartEntry;
pub use item::Entity as Item;
pub use message::Entity as Message;
pub use message_seen::Entity as MessageSeen;
pub use notification::Entity as Notification;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
