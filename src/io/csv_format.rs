//! CSV format for replayed operations and card summaries
//!
//! Input rows use the header `type,user,card,target,amount,holder,expiry,description`.
//! Columns a row does not need may be empty or left off at the end of the row.
//!
//! Output rows use the header `user,card,holder,expiry,status,balance`, sorted by
//! user then card label, with balances at two decimal places.

use crate::types::{CardSummary, OperationRecord, OperationType, UserId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Raw CSV row, before validation
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub op: String,
    pub user: UserId,
    pub card: Option<String>,
    pub target: Option<String>,
    pub amount: Option<String>,
    pub holder: Option<String>,
    pub expiry: Option<String>,
    pub description: Option<String>,
}

fn present(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Convert a raw CSV row into an `OperationRecord`
///
/// # Errors
///
/// Returns a message naming the row's user if the operation type is unknown,
/// a value does not parse, or a field the operation needs is missing.
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<OperationRecord, String> {
    let user = csv_record.user;
    let op = match csv_record.op.to_lowercase().as_str() {
        "user" => OperationType::User,
        "create" => OperationType::Create,
        "block" => OperationType::Block,
        "unblock" => OperationType::Unblock,
        "request_block" => OperationType::RequestBlock,
        "delete" => OperationType::Delete,
        "transfer" => OperationType::Transfer,
        _ => {
            return Err(format!(
                "Invalid operation type: '{}' for user {}",
                csv_record.op, user
            ))
        }
    };

    let amount = match present(csv_record.amount) {
        Some(amount) => Some(
            Decimal::from_str(&amount)
                .map_err(|_| format!("Invalid amount '{}' for user {}", amount, user))?,
        ),
        None => None,
    };

    let expiry = match present(csv_record.expiry) {
        Some(expiry) => Some(
            NaiveDate::parse_from_str(&expiry, "%Y-%m-%d")
                .map_err(|_| format!("Invalid expiry '{}' for user {}", expiry, user))?,
        ),
        None => None,
    };

    let card = present(csv_record.card);
    let target = present(csv_record.target);
    let holder = present(csv_record.holder);

    let missing = |field: &str| format!("{:?} operation for user {} requires {}", op, user, field);
    match op {
        OperationType::User => {
            holder.as_ref().ok_or_else(|| missing("a holder"))?;
        }
        OperationType::Create => {
            card.as_ref().ok_or_else(|| missing("a card"))?;
            holder.as_ref().ok_or_else(|| missing("a holder"))?;
            expiry.as_ref().ok_or_else(|| missing("an expiry"))?;
        }
        OperationType::Block
        | OperationType::Unblock
        | OperationType::RequestBlock
        | OperationType::Delete => {
            card.as_ref().ok_or_else(|| missing("a card"))?;
        }
        OperationType::Transfer => {
            card.as_ref().ok_or_else(|| missing("a card"))?;
            target.as_ref().ok_or_else(|| missing("a target"))?;
            amount.as_ref().ok_or_else(|| missing("an amount"))?;
        }
    }

    Ok(OperationRecord {
        op,
        user,
        card: card.unwrap_or_default(),
        target,
        amount,
        holder,
        expiry,
        description: present(csv_record.description),
    })
}

/// Write card summaries as CSV
///
/// Rows are sorted by user then label so the output is deterministic.
pub fn write_cards_csv(cards: &[CardSummary], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["user", "card", "holder", "expiry", "status", "balance"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted = cards.to_vec();
    sorted.sort_by(|a, b| (a.user, &a.label).cmp(&(b.user, &b.label)));

    for card in sorted {
        writer
            .write_record(&[
                card.user.to_string(),
                card.label,
                card.holder,
                card.expiry.to_string(),
                card.status.to_string(),
                format!("{:.2}", card.balance),
            ])
            .map_err(|e| format!("Failed to write card record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CardStatus;
    use rstest::rstest;

    fn csv_record(op: &str) -> CsvRecord {
        CsvRecord {
            op: op.to_string(),
            user: 1,
            card: Some("main".to_string()),
            target: Some("savings".to_string()),
            amount: Some("100.50".to_string()),
            holder: Some("Jane Doe".to_string()),
            expiry: Some("2031-12-31".to_string()),
            description: Some("rent".to_string()),
        }
    }

    #[rstest]
    #[case("user", OperationType::User)]
    #[case("create", OperationType::Create)]
    #[case("block", OperationType::Block)]
    #[case("unblock", OperationType::Unblock)]
    #[case("request_block", OperationType::RequestBlock)]
    #[case("delete", OperationType::Delete)]
    #[case("TRANSFER", OperationType::Transfer)] // case insensitive
    fn test_convert_csv_record_types(#[case] op: &str, #[case] expected: OperationType) {
        let record = convert_csv_record(csv_record(op)).unwrap();

        assert_eq!(record.op, expected);
        assert_eq!(record.user, 1);
        assert_eq!(record.card, "main");
        assert_eq!(record.amount, Some(Decimal::new(10050, 2)));
        assert_eq!(record.expiry, NaiveDate::from_ymd_opt(2031, 12, 31));
    }

    #[test]
    fn test_convert_csv_record_blank_fields_are_absent() {
        let record = convert_csv_record(CsvRecord {
            card: Some("  main ".to_string()),
            target: Some("  ".to_string()),
            amount: Some(String::new()),
            description: Some(String::new()),
            ..csv_record("block")
        })
        .unwrap();

        assert_eq!(record.card, "main");
        assert_eq!(record.target, None);
        assert_eq!(record.amount, None);
        assert_eq!(record.description, None);
    }

    #[rstest]
    #[case::invalid_type("withdraw", None, "Invalid operation type")]
    #[case::invalid_amount("transfer", Some(("amount", "lots")), "Invalid amount")]
    #[case::invalid_expiry("create", Some(("expiry", "12/31")), "Invalid expiry")]
    #[case::create_missing_holder("create", Some(("holder", "")), "requires a holder")]
    #[case::create_missing_expiry("create", Some(("expiry", "")), "requires an expiry")]
    #[case::block_missing_card("block", Some(("card", "")), "requires a card")]
    #[case::transfer_missing_target("transfer", Some(("target", "")), "requires a target")]
    #[case::transfer_missing_amount("transfer", Some(("amount", " ")), "requires an amount")]
    fn test_convert_csv_record_errors(
        #[case] op: &str,
        #[case] overwrite: Option<(&str, &str)>,
        #[case] expected_error: &str,
    ) {
        let mut record = csv_record(op);
        if let Some((field, value)) = overwrite {
            let slot = match field {
                "card" => &mut record.card,
                "target" => &mut record.target,
                "amount" => &mut record.amount,
                "holder" => &mut record.holder,
                "expiry" => &mut record.expiry,
                _ => unreachable!(),
            };
            *slot = Some(value.to_string());
        }

        let result = convert_csv_record(record);
        assert!(result.unwrap_err().contains(expected_error));
    }

    #[test]
    fn test_write_cards_csv_sorted_with_two_decimals() {
        let expiry = NaiveDate::from_ymd_opt(2031, 12, 31).unwrap();
        let summary = |user: UserId, label: &str, balance: Decimal| CardSummary {
            user,
            label: label.to_string(),
            holder: "JANE DOE".to_string(),
            expiry,
            status: CardStatus::Active,
            balance,
        };
        let cards = vec![
            summary(2, "main", Decimal::new(5, 0)),
            summary(1, "savings", Decimal::new(1005, 1)),
            summary(1, "main", Decimal::ZERO),
        ];

        let mut output = Vec::new();
        write_cards_csv(&cards, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "user,card,holder,expiry,status,balance\n\
             1,main,JANE DOE,2031-12-31,ACTIVE,0.00\n\
             1,savings,JANE DOE,2031-12-31,ACTIVE,100.50\n\
             2,main,JANE DOE,2031-12-31,ACTIVE,5.00\n"
        );
    }
}
