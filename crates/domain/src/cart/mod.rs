//! Cart submission parsing and validation.

mod raw;
mod submission;
mod validator;

pub use raw::{RawCartItem, RawCartSubmission};
pub use submission::{CartItem, CartSubmission, Recipient};
pub use validator::CartValidator;
