//! Card number and verification code generation
//!
//! Card numbers are a fixed six-digit issuer prefix, nine random digits and a
//! Luhn check digit (sixteen digits in total). Randomness comes from the
//! operating system's CSPRNG.
//!
//! The Luhn validator is exposed on its own so request validation elsewhere
//! can reuse it.

use crate::types::CardError;
use rand::rngs::OsRng;
use rand::Rng;

/// Issuer prefix used when none is configured
pub const DEFAULT_ISSUER_PREFIX: &str = "400000";

/// Number of random digits between the prefix and the check digit
const RANDOM_DIGITS: usize = 9;

const ISSUER_PREFIX_LEN: usize = 6;

/// Produces checksum-valid card numbers and verification codes
#[derive(Debug, Clone)]
pub struct IdentifierGenerator {
    issuer_prefix: String,
}

impl IdentifierGenerator {
    /// Create a generator for the given issuer prefix
    ///
    /// # Errors
    ///
    /// Returns a validation error unless the prefix is exactly six ASCII digits.
    pub fn new(issuer_prefix: &str) -> Result<Self, CardError> {
        if issuer_prefix.len() != ISSUER_PREFIX_LEN
            || !issuer_prefix.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(CardError::validation(
                "issuer_prefix",
                "must be exactly six digits",
            ));
        }

        Ok(Self {
            issuer_prefix: issuer_prefix.to_string(),
        })
    }

    pub fn issuer_prefix(&self) -> &str {
        &self.issuer_prefix
    }

    /// Generate a new sixteen-digit card number
    pub fn generate_number(&self) -> String {
        let mut rng = OsRng;
        let mut number = String::with_capacity(ISSUER_PREFIX_LEN + RANDOM_DIGITS + 1);
        number.push_str(&self.issuer_prefix);

        for _ in 0..RANDOM_DIGITS {
            let digit: u8 = rng.gen_range(0..10);
            number.push(char::from(b'0' + digit));
        }

        // The payload is all digits by construction.
        let check = luhn_check_digit(&number).unwrap_or(0);
        number.push(char::from(b'0' + check));
        number
    }

    /// Generate a three-digit verification code, uniform over 000..=999
    pub fn generate_verification_code(&self) -> String {
        let code: u16 = OsRng.gen_range(0..1000);
        format!("{:03}", code)
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self {
            issuer_prefix: DEFAULT_ISSUER_PREFIX.to_string(),
        }
    }
}

/// Luhn sum of `digits`, doubling every second digit counted from the right
///
/// `double_first` selects whether the rightmost digit is doubled. Returns
/// `None` if any character is not an ASCII digit.
fn luhn_sum(digits: &str, double_first: bool) -> Option<u32> {
    let mut sum = 0;
    let mut double = double_first;

    for c in digits.chars().rev() {
        let mut digit = c.to_digit(10)?;
        if double {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        double = !double;
    }

    Some(sum)
}

/// Check digit that makes `payload` followed by the digit Luhn-valid
///
/// Returns `None` if the payload contains anything other than ASCII digits.
pub fn luhn_check_digit(payload: &str) -> Option<u8> {
    let sum = luhn_sum(payload, true)?;
    Some(((10 - sum % 10) % 10) as u8)
}

/// Validate a card number with the Luhn checksum
///
/// Whitespace is stripped first; the remainder must be 13 to 19 ASCII digits.
pub fn is_valid_card_number(input: &str) -> bool {
    let clean: String = input.chars().filter(|c| !c.is_whitespace()).collect();

    if !(13..=19).contains(&clean.len()) || !clean.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    luhn_sum(&clean, false).is_some_and(|sum| sum % 10 == 0)
}
