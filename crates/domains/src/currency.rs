//! Currency exponent table and satoshi conversion helpers.
//!
//! Peers declare listing prices in minor units (cents, satoshis); the
//! exponent says how many decimal places the currency carries. A
//! currency missing from the table cannot be converted and the price
//! step skips the listing.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Satoshis per bitcoin.
pub const SATS_PER_BTC: f64 = 100_000_000.0;

static EXPONENTS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    HashMap::from([
        // Coins peers price in natively.
        ("BTC", 8),
        ("BCH", 8),
        ("LTC", 8),
        ("ZEC", 8),
        ("DASH", 8),
        // ISO 4217 minor-unit exponents.
        ("USD", 2),
        ("EUR", 2),
        ("GBP", 2),
        ("CAD", 2),
        ("AUD", 2),
        ("NZD", 2),
        ("CHF", 2),
        ("CNY", 2),
        ("HKD", 2),
        ("SGD", 2),
        ("SEK", 2),
        ("NOK", 2),
        ("DKK", 2),
        ("PLN", 2),
        ("CZK", 2),
        ("HUF", 2),
        ("RON", 2),
        ("BGN", 2),
        ("RUB", 2),
        ("UAH", 2),
        ("TRY", 2),
        ("ILS", 2),
        ("AED", 2),
        ("SAR", 2),
        ("QAR", 2),
        ("INR", 2),
        ("PKR", 2),
        ("BDT", 2),
        ("THB", 2),
        ("MYR", 2),
        ("PHP", 2),
        ("IDR", 2),
        ("TWD", 2),
        ("BRL", 2),
        ("MXN", 2),
        ("ARS", 2),
        ("COP", 2),
        ("PEN", 2),
        ("ZAR", 2),
        ("NGN", 2),
        ("KES", 2),
        ("GHS", 2),
        ("EGP", 2),
        ("MAD", 2),
        ("JPY", 0),
        ("KRW", 0),
        ("VND", 0),
        ("CLP", 0),
        ("ISK", 0),
        ("BHD", 3),
        ("KWD", 3),
        ("OMR", 3),
        ("JOD", 3),
        ("TND", 3),
    ])
});

/// Minor-unit exponent for a currency code, if known.
pub fn exponent(currency: &str) -> Option<u32> {
    EXPONENTS.get(currency.to_ascii_uppercase().as_str()).copied()
}

/// Converts a minor-unit amount into major units of its currency.
pub fn to_major_units(amount: i64, exponent: u32) -> f64 {
    (amount as f64) * 10f64.powi(-(exponent as i32))
}

/// Truncates a BTC amount into whole satoshis.
pub fn btc_to_sats(btc: f64) -> i64 {
    (btc * SATS_PER_BTC) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponent_is_case_insensitive() {
        assert_eq!(exponent("usd"), Some(2));
        assert_eq!(exponent("USD"), Some(2));
        assert_eq!(exponent("btc"), Some(8));
        assert_eq!(exponent("WAT"), None);
    }

    #[test]
    fn test_minor_units_normalize_by_exponent() {
        assert_eq!(to_major_units(1000, 2), 10.0);
        assert_eq!(to_major_units(5, 0), 5.0);
        assert_eq!(to_major_units(150_000_000, 8), 1.5);
    }

    #[test]
    fn test_satoshi_conversion_truncates() {
        assert_eq!(btc_to_sats(0.0005), 50_000);
        assert_eq!(btc_to_sats(1.0), 100_000_000);
        assert_eq!(btc_to_sats(0.000000019), 1);
    }
}
