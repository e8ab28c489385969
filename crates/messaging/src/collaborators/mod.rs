//! In-process stand-ins for the payment and inventory services.
//!
//! Each simulator consumes its command topic and answers on its event topic
//! following the same contract the real services follow.

pub mod inventory;
pub mod payment;

pub use inventory::InventorySimulator;
pub use payment::PaymentSimulator;
