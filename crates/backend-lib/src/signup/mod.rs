//! Email-confirmed signup: registration sends the link, confirmation turns
//! it into a user.

mod confirmation;
mod registration;

pub use confirmation::ConfirmationFlow;
pub use registration::{IssuedConfirmation, RegistrationFlow};

/// Subject line of the confirmation email
pub const CONFIRMATION_SUBJECT: &str = "Confirm Your Email";

/// Plaintext body of the confirmation email
pub fn confirmation_body(link: &str) -> String {
    format!("Please click the following link to verify your email: {link}")
}
