//! Security module
//!
//! Leaf components that handle card identifiers and confidential fields:
//! - `generator` - Luhn-valid card numbers, verification codes, Luhn validation
//! - `codec` - Symmetric encryption of persisted card fields
//! - `masking` - Display-safe renderings of decrypted fields

pub mod codec;
pub mod generator;
pub mod masking;

pub use codec::{ConfidentialFieldCodec, KeyProvider, StaticSecret};
pub use generator::{is_valid_card_number, luhn_check_digit, IdentifierGenerator};
pub use masking::{format_number, mask_number, mask_verification_code};
