//! Outbound command ports and in-memory implementations.

pub mod inventory;
pub mod payment;

pub use inventory::{InMemoryInventoryCommandSender, InventoryCommandSender};
pub use payment::{InMemoryPaymentCommandSender, PaymentCommandSender};
