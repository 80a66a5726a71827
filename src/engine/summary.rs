//! Human-readable offer summaries for logs and verdicts.

use crate::items::classifier;
use crate::types::{CurrencyTotal, Item};

/// Non-currency item names in first-seen order, repeats folded to `xN`.
pub fn summarize_items<'a>(items: impl IntoIterator<Item = &'a Item>) -> String {
    let mut counts: Vec<(String, usize)> = Vec::new();

    for item in items {
        if classifier::is_key(item) || classifier::is_metal(item) {
            continue;
        }
        let name = classifier::display_name(item);
        match counts.iter_mut().find(|(n, _)| *n == name) {
            Some((_, count)) => *count += 1,
            None => counts.push((name, 1)),
        }
    }

    counts
        .into_iter()
        .map(|(name, count)| {
            if count > 1 {
                format!("{name} x{count}")
            } else {
                name
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn side(label: &str, currency: &CurrencyTotal, items: &str) -> String {
    let currency = currency.to_string();
    match (currency.is_empty(), items.is_empty()) {
        (true, true) => format!("{label}: nothing"),
        (false, true) => format!("{label}: {currency}"),
        (true, false) => format!("{label}: {items}"),
        (false, false) => format!("{label}: {currency} ({items})"),
    }
}

/// Two-line asked/offered summary, plus the bought items when any.
pub fn offer_summary(
    asked: &CurrencyTotal,
    given: &[Item],
    offered: &CurrencyTotal,
    received: &[Item],
    bought: &[usize],
) -> String {
    let mut out = format!(
        "{}\n{}",
        side("Asked", asked, &summarize_items(given)),
        side("Offered", offered, &summarize_items(received)),
    );

    if !bought.is_empty() {
        let names = summarize_items(bought.iter().filter_map(|&i| received.get(i)));
        out.push_str(&format!("\nBought items ({}): {names}", bought.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KEY_NAME, TF2_APP_ID};
    use rust_decimal_macros::dec;

    fn hat(asset: &str, name: &str) -> Item {
        Item::new(TF2_APP_ID, asset, name).unique()
    }

    #[test]
    fn test_repeats_are_counted() {
        let items = vec![
            hat("1", "Team Captain"),
            hat("2", "Bill's Hat"),
            hat("3", "Team Captain"),
            hat("4", KEY_NAME),
            hat("5", "Refined Metal"),
        ];
        assert_eq!(summarize_items(&items), "Team Captain x2, Bill's Hat");
    }

    #[test]
    fn test_offer_summary_lines() {
        let given = vec![hat("1", "Team Captain")];
        let received = vec![hat("2", "Bill's Hat"), hat("3", KEY_NAME)];
        let summary = offer_summary(
            &CurrencyTotal::new(dec!(0), dec!(5.33)),
            &given,
            &CurrencyTotal::new(dec!(1), dec!(0)),
            &received,
            &[0],
        );
        assert_eq!(
            summary,
            "Asked: 5.33 ref (Team Captain)\nOffered: 1.00 key (Bill's Hat)\nBought items (1): Bill's Hat"
        );
    }

    #[test]
    fn test_empty_side() {
        let summary = offer_summary(&CurrencyTotal::ZERO, &[], &CurrencyTotal::new(dec!(2), dec!(0)), &[], &[]);
        assert_eq!(summary, "Asked: nothing\nOffered: 2.00 keys");
    }
}
