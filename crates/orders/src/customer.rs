use serde::{Deserialize, Serialize};
use uuid::Uuid;

use terminal_core::{ClientId, CustomerId};

/// End customer of a client, identified by phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub uuid: Uuid,
    pub phone: String,
    pub client_id: Option<ClientId>,
}

impl Customer {
    pub fn new(id: CustomerId, phone: &str, client_id: Option<ClientId>) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            phone: normalize_phone(phone),
            client_id,
        }
    }

    /// Same person: equal normalised phone within the same client.
    pub fn matches(&self, phone: &str, client_id: Option<ClientId>) -> bool {
        self.client_id == client_id && self.phone == normalize_phone(phone)
    }
}

/// Normalise a phone number to `+7XXXXXXXXXX`.
///
/// Non-digits are dropped; a leading trunk `8` becomes the country code `7`
/// and ten-digit local numbers get the country code prepended. Numbers that
/// fit none of these shapes keep their digits as-is.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let digits = match digits.len() {
        10 => format!("7{digits}"),
        11 if digits.starts_with('8') => format!("7{}", &digits[1..]),
        _ => digits,
    };
    if digits.is_empty() {
        digits
    } else {
        format!("+{digits}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phones_normalise_to_international_form() {
        assert_eq!(normalize_phone("8 (701) 123-45-67"), "+77011234567");
        assert_eq!(normalize_phone("+7 701 123 45 67"), "+77011234567");
        assert_eq!(normalize_phone("7011234567"), "+77011234567");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn customers_match_by_phone_within_client() {
        let c = Customer::new(CustomerId(1), "87011234567", Some(ClientId(3)));
        assert!(c.matches("+7 701 123-45-67", Some(ClientId(3))));
        assert!(!c.matches("+7 701 123-45-67", Some(ClientId(4))));
    }
}
