pub mod commands;
pub mod entity;

pub use entity::{Offer, OfferStatus, PaymentType};
