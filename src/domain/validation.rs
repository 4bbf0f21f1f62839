//! Business rules a payment request must satisfy before the settlement authority is
//! contacted.

use super::payment::PaymentRequest;
use chrono::{Local, Months, NaiveDate};

pub const SUPPORTED_CURRENCIES: [&str; 3] = ["USD", "EUR", "GBP"];

pub const CARD_NUMBER_REQUIRED: &str = "Card number is required";
pub const CARD_NUMBER_LENGTH: &str = "Card number must be between 14 and 19 characters long";
pub const CARD_NUMBER_NUMERIC: &str = "Card number must only contain numeric characters";
pub const EXPIRY_MONTH_RANGE: &str = "Expiry month must be between 1 and 12";
pub const EXPIRY_DATE_FUTURE: &str = "Expiry date must be in the future";
pub const CURRENCY_REQUIRED: &str = "Currency is required";
pub const CURRENCY_LENGTH: &str = "Currency must be 3 characters long";
pub const CURRENCY_SUPPORTED: &str = "Currency must be one of: USD, EUR, GBP";
pub const AMOUNT_POSITIVE: &str = "Amount must be greater than zero";
pub const CVV_REQUIRED: &str = "CVV is required";
pub const CVV_LENGTH: &str = "CVV must be between 3 and 4 characters long";
pub const CVV_NUMERIC: &str = "CVV must only contain numeric characters";

/// Validates `request` against today's local date.
pub fn validate(request: &PaymentRequest) -> Vec<String> {
    validate_at(request, Local::now().date_naive())
}

/// Validates `request` as of `today`.
///
/// Every rule is evaluated; the result holds one message per violated rule, in field
/// order, and is empty for a valid request.
pub fn validate_at(request: &PaymentRequest, today: NaiveDate) -> Vec<String> {
    let mut errors = Vec::new();

    let card_length = request.card_number.chars().count();
    if is_blank(&request.card_number) {
        errors.push(CARD_NUMBER_REQUIRED);
    }
    if !(14..=19).contains(&card_length) {
        errors.push(CARD_NUMBER_LENGTH);
    }
    if !is_numeric(&request.card_number) {
        errors.push(CARD_NUMBER_NUMERIC);
    }

    let month_in_range = (1..=12).contains(&request.expiry_month);
    if !month_in_range {
        errors.push(EXPIRY_MONTH_RANGE);
    }
    if month_in_range && !is_unexpired(request.expiry_month, request.expiry_year, today) {
        errors.push(EXPIRY_DATE_FUTURE);
    }

    if is_blank(&request.currency) {
        errors.push(CURRENCY_REQUIRED);
    }
    if request.currency.chars().count() != 3 {
        errors.push(CURRENCY_LENGTH);
    }
    if !is_supported_currency(&request.currency) {
        errors.push(CURRENCY_SUPPORTED);
    }

    if request.amount <= 0 {
        errors.push(AMOUNT_POSITIVE);
    }

    if is_blank(&request.cvv) {
        errors.push(CVV_REQUIRED);
    }
    if !(3..=4).contains(&request.cvv.chars().count()) {
        errors.push(CVV_LENGTH);
    }
    if !is_numeric(&request.cvv) {
        errors.push(CVV_NUMERIC);
    }

    errors.into_iter().map(String::from).collect()
}

/// Last calendar day of the given month, if the month and year form a real date.
pub fn valid_through(month: i32, year: i32) -> Option<NaiveDate> {
    if !(1..=9999).contains(&year) {
        return None;
    }
    let month = u32::try_from(month).ok()?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_months(Months::new(1))?.pred_opt()
}

fn is_unexpired(month: i32, year: i32, today: NaiveDate) -> bool {
    // A card stays usable through the last day of its expiry month.
    valid_through(month, year).is_some_and(|last_day| last_day >= today)
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

fn is_supported_currency(currency: &str) -> bool {
    SUPPORTED_CURRENCIES
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(currency))
}
