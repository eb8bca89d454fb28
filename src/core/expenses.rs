use std::collections::BTreeMap;

/// Parses `"category:amount,category:amount"` text into a category map.
///
/// Pairs without exactly one `:`, with an empty label, or with an amount that
/// is not a finite non-negative number are skipped. A label that appears more
/// than once accumulates.
pub fn parse_expenses(raw: &str) -> BTreeMap<String, f64> {
    let mut expenses = BTreeMap::new();
    for pair in raw.split(',') {
        let Some((label, amount)) = parse_pair(pair) else {
            continue;
        };
        *expenses.entry(label).or_insert(0.0) += amount;
    }
    expenses
}

/// Drops non-finite and negative amounts from an already structured mapping.
pub fn sanitize_expenses<I>(entries: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut expenses = BTreeMap::new();
    for (label, amount) in entries {
        let label = label.trim();
        if label.is_empty() || !is_valid_amount(amount) {
            continue;
        }
        *expenses.entry(label.to_string()).or_insert(0.0) += amount;
    }
    expenses
}

fn parse_pair(pair: &str) -> Option<(String, f64)> {
    let mut parts = pair.split(':');
    let label = parts.next()?.trim();
    let amount = parts.next()?.trim();
    if parts.next().is_some() || label.is_empty() {
        return None;
    }
    let amount = amount.parse::<f64>().ok()?;
    is_valid_amount(amount).then(|| (label.to_string(), amount))
}

fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount >= 0.0
}
