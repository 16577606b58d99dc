//! Checkout form validation.
//!
//! Forms arrive as raw strings straight from the client. Each `validate`
//! collects every field failure (not just the first) into [`FieldErrors`]
//! keyed by the form's JSON field name, or returns the parsed, typed values.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{Email, EmailError, MerchantId, PhoneNumber};

/// Nairobi CBD pickup points offered at checkout.
pub const PICKUP_LOCATIONS: [&str; 10] = [
    "Moi Avenue - Tuskeys Supermarket",
    "Kimathi Street - Text Book Centre",
    "Kenyatta Avenue - Sarova Stanley",
    "Tom Mboya Street - Ambassadeur Hotel",
    "Haile Selassie Avenue - Afya Centre",
    "Mama Ngina Street - Nation Centre",
    "Moi Avenue - Bazaar Plaza",
    "Koinange Street - I&M Building",
    "Kaunda Street - Electricity House",
    "Muindi Mbingu Street - Jeevanjee Gardens",
];

const INVALID_PHONE: &str = "Invalid phone number format";

#[allow(clippy::unwrap_used)] // patterns are compile-time constants
static CARD_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9\s]+$").unwrap());

#[allow(clippy::unwrap_used)]
static CARD_EXPIRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/[0-9]{2}$").unwrap());

#[allow(clippy::unwrap_used)]
static CARD_CVC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{3,4}$").unwrap());

/// Per-field validation messages, serialized as `{ "field": "message" }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build with a single field error.
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record a failure. The first message for a field wins.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    /// Message recorded for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(value)` when no errors were recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` when any field failed.
    pub fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

fn required<'a>(errors: &mut FieldErrors, field: &str, value: &'a str, message: &str) -> Option<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, message);
        None
    } else {
        Some(trimmed)
    }
}

fn phone(errors: &mut FieldErrors, field: &str, value: &str, required_message: &str) -> Option<PhoneNumber> {
    let value = required(errors, field, value, required_message)?;
    PhoneNumber::parse(value)
        .map_err(|_| errors.add(field, INVALID_PHONE))
        .ok()
}

// =============================================================================
// Personal information
// =============================================================================

/// Customer details step, as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfoForm {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_number: String,
    pub use_pickup_point: bool,
    pub pickup_location: String,
    pub merchant_id: Option<i64>,
}

/// Validated customer details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub email: Email,
    pub mobile_number: PhoneNumber,
    /// Set only when the customer chose to collect from a pickup point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<MerchantId>,
}

impl PersonalInfoForm {
    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns all field failures when any field is missing or malformed.
    pub fn validate(&self) -> Result<PersonalInfo, FieldErrors> {
        let mut errors = FieldErrors::new();

        let first_name = required(&mut errors, "firstName", &self.first_name, "First name is required");
        let last_name = required(&mut errors, "lastName", &self.last_name, "Last name is required");

        let email = match Email::parse(&self.email) {
            Ok(email) => Some(email),
            Err(EmailError::Empty) => {
                errors.add("email", "Email is required");
                None
            }
            Err(_) => {
                errors.add("email", "Invalid email format");
                None
            }
        };

        let mobile_number = phone(&mut errors, "mobileNumber", &self.mobile_number, "Mobile number is required");

        let pickup_location = if self.use_pickup_point {
            match required(&mut errors, "pickupLocation", &self.pickup_location, "Please select a pickup location") {
                Some(loc) if PICKUP_LOCATIONS.contains(&loc) => Some(loc.to_string()),
                Some(_) => {
                    errors.add("pickupLocation", "Unknown pickup location");
                    None
                }
                None => None,
            }
        } else {
            None
        };

        match (first_name, last_name, email, mobile_number) {
            (Some(first), Some(last), Some(email), Some(mobile)) if errors.is_empty() => {
                let middle = self.middle_name.trim();
                Ok(PersonalInfo {
                    first_name: first.to_string(),
                    middle_name: (!middle.is_empty()).then(|| middle.to_string()),
                    last_name: last.to_string(),
                    email,
                    mobile_number: mobile,
                    pickup_location,
                    merchant_id: self.merchant_id.map(MerchantId::new),
                })
            }
            _ => Err(errors),
        }
    }
}

// =============================================================================
// Payment forms
// =============================================================================

/// M-Pesa payment step, as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MpesaForm {
    pub mpesa_number: String,
}

impl MpesaForm {
    /// Validate the number that receives the STK push.
    ///
    /// # Errors
    ///
    /// Returns a `mpesaNumber` failure when the number is missing or malformed.
    pub fn validate(&self) -> Result<PhoneNumber, FieldErrors> {
        let mut errors = FieldErrors::new();
        match phone(&mut errors, "mpesaNumber", &self.mpesa_number, "M-Pesa number is required") {
            Some(number) => Ok(number),
            None => Err(errors),
        }
    }
}

/// Card payment step, as submitted.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardForm {
    pub card_number: String,
    pub card_expiry: String,
    pub card_cvc: String,
}

impl std::fmt::Debug for CardForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardForm")
            .field("card_number", &"[REDACTED]")
            .field("card_expiry", &self.card_expiry)
            .field("card_cvc", &"[REDACTED]")
            .finish()
    }
}

/// What is kept of a card once validated: never the full number or CVC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    pub last_four: String,
    pub expiry: String,
}

impl CardForm {
    /// Validate card fields.
    ///
    /// # Errors
    ///
    /// Returns all field failures when any field is missing or malformed.
    pub fn validate(&self) -> Result<CardSummary, FieldErrors> {
        let mut errors = FieldErrors::new();

        if let Some(number) = required(&mut errors, "cardNumber", &self.card_number, "Card number is required")
            && !CARD_NUMBER.is_match(number)
        {
            errors.add("cardNumber", "Invalid card number format");
        }

        if let Some(expiry) = required(&mut errors, "cardExpiry", &self.card_expiry, "Expiry date is required")
            && !CARD_EXPIRY.is_match(expiry)
        {
            errors.add("cardExpiry", "Invalid format (MM/YY)");
        }

        if let Some(cvc) = required(&mut errors, "cardCvc", &self.card_cvc, "CVC is required")
            && !CARD_CVC.is_match(cvc)
        {
            errors.add("cardCvc", "Invalid CVC format");
        }

        errors.into_result(|| {
            let digits: Vec<char> = self.card_number.chars().filter(char::is_ascii_digit).collect();
            let last_four = digits[digits.len().saturating_sub(4)..].iter().collect();
            CardSummary {
                last_four,
                expiry: self.card_expiry.trim().to_string(),
            }
        })
    }
}
