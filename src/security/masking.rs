//! Display masking for decrypted card fields
//!
//! These helpers only ever see plaintext that has already been decrypted for a
//! display context; they never touch stored ciphertext.

const MASK_CHAR: char = '*';
const VISIBLE_DIGITS: usize = 4;
const GROUP_LEN: usize = 4;
const MASKED_GROUPS: usize = 3;
const PLACEHOLDER_LEN: usize = 16;
const CVV_LEN: usize = 3;

fn strip_whitespace(input: &str) -> String {
    input.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Mask a card number, keeping only the last four digits
///
/// `4000001234567890` becomes `**** **** **** 7890`. Inputs with fewer than
/// four characters (after whitespace removal) yield a sixteen-character
/// placeholder.
pub fn mask_number(number: &str) -> String {
    let clean = strip_whitespace(number);
    let chars: Vec<char> = clean.chars().collect();

    if chars.len() < VISIBLE_DIGITS {
        return MASK_CHAR.to_string().repeat(PLACEHOLDER_LEN);
    }

    let mut masked = String::with_capacity(MASKED_GROUPS * (GROUP_LEN + 1) + VISIBLE_DIGITS);
    for _ in 0..MASKED_GROUPS {
        for _ in 0..GROUP_LEN {
            masked.push(MASK_CHAR);
        }
        masked.push(' ');
    }
    masked.extend(&chars[chars.len() - VISIBLE_DIGITS..]);
    masked
}

/// Fixed placeholder for a verification code
pub fn mask_verification_code() -> String {
    MASK_CHAR.to_string().repeat(CVV_LEN)
}

/// Insert a space every four characters without masking
///
/// Only for already-decrypted numbers shown in an authorised context.
pub fn format_number(number: &str) -> String {
    let clean = strip_whitespace(number);
    let mut formatted = String::with_capacity(clean.len() + clean.len() / GROUP_LEN);

    for (i, c) in clean.chars().enumerate() {
        if i > 0 && i % GROUP_LEN == 0 {
            formatted.push(' ');
        }
        formatted.push(c);
    }

    formatted
}
