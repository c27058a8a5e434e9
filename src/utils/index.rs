use crate::types::{AMOUNT_DECIMALS, Amount};

/// Fixed-width rendering of an amount for display, every decimal place
/// shown. Wire rendering lives on `Amount` itself; this form is for logs.
pub fn format_amount(amount: Amount) -> String {
    let scale = 10u64.pow(AMOUNT_DECIMALS);
    let minor = amount.minor_units();
    format!(
        "{}.{:0width$}",
        minor / scale,
        minor % scale,
        width = AMOUNT_DECIMALS as usize
    )
}
