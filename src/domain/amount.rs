/// Balances and order amounts are plain integers in the smallest unit.
/// Nothing here enforces a sign: balances may go negative and order amounts
/// are taken as given.
pub type Amount = i64;

/// The balance delta applied when an order of `amount` is placed.
/// Returns `None` when the negation does not fit in an `Amount`.
pub fn debit_delta(amount: Amount) -> Option<Amount> {
    amount.checked_neg()
}
