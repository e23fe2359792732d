//! Display formatting for decimal values.

use rust_decimal::Decimal;

/// Two decimal places with thousands separators: `1234567.891` → `1,234,567.89`.
pub fn format_number(x: Decimal) -> String {
    let rounded = x.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let digits = rounded.abs().to_string();

    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (digits, String::new()),
    };
    let frac = format!("{frac_part:0<2}");

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

/// Short form for large values: `1.2M`, `45.3K`; smaller values fall back
/// to `format_number`.
pub fn format_compact(x: Decimal) -> String {
    let million = Decimal::from(1_000_000);
    let thousand = Decimal::from(1_000);
    let abs = x.abs();
    if abs >= million {
        format!("{}M", (x / million).round_dp(1).normalize())
    } else if abs >= thousand {
        format!("{}K", (x / thousand).round_dp(1).normalize())
    } else {
        format_number(x)
    }
}
