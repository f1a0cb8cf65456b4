use crate::server::domain::price;
use crate::server::model::extras::{CatalogItem, ExtraList};
use crate::server::model::order::{LineItem, RawPrice};
use log::warn;
use std::collections::HashMap;

/// Flat fee used when an order carries no fee and the delivery zone is
/// unknown.
pub(crate) const DEFAULT_DELIVERY_FEE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Totals {
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub points_reduction: f64,
    pub total: f64,
}

/// Compute an order's money fields from its line items.
///
/// Missing catalog entries, unknown extra lists and out-of-range option
/// indexes contribute `0` and are logged; this function never fails and
/// never mutates its inputs.
pub(crate) fn compute_totals(
    items: &[LineItem],
    extra_lists_by_id: &HashMap<String, ExtraList>,
    catalog_by_id: &HashMap<String, CatalogItem>,
    delivery_fee: Option<f64>,
    points_reduction: Option<f64>,
) -> Totals {
    let mut subtotal = 0.0;
    for item in items {
        let unit_price = match &item.price {
            // captured at order time, preferred so historical orders stay stable
            RawPrice::Missing => match catalog_by_id.get(&item.dish_id) {
                Some(entry) => price::normalize(&entry.price),
                None => {
                    warn!("no captured or catalog price for dish={}", item.dish_id);
                    0.0
                }
            },
            captured => price::normalize(captured),
        };

        let mut extras = 0.0;
        for (list_id, indexes) in &item.selected_extras {
            let Some(list) = extra_lists_by_id.get(list_id) else {
                warn!("extra list {} referenced by dish={} is gone", list_id, item.dish_id);
                continue;
            };
            for idx in indexes {
                match list.options.get(*idx) {
                    Some(option) => extras += price::normalize(&option.price),
                    None => warn!("option index {} out of range for extra list {}", idx, list_id),
                }
            }
        }

        let line_total = (unit_price + extras) * f64::from(item.quantity);
        subtotal += sanitize(line_total);
    }

    let delivery_fee = sanitize(delivery_fee.unwrap_or(DEFAULT_DELIVERY_FEE));
    let points_reduction = sanitize(points_reduction.unwrap_or(0.0));

    Totals {
        subtotal,
        delivery_fee,
        points_reduction,
        total: subtotal + delivery_fee - points_reduction,
    }
}

fn sanitize(n: f64) -> f64 {
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::model::extras::ExtraOption;

    fn line(dish_id: &str, price: RawPrice, quantity: u32) -> LineItem {
        LineItem {
            dish_id: dish_id.to_string(),
            quantity,
            price,
            selected_extras: HashMap::new(),
        }
    }

    fn extra_list(id: &str, prices: &[f64]) -> ExtraList {
        ExtraList {
            id: id.to_string(),
            name: id.to_string(),
            options: prices
                .iter()
                .map(|p| ExtraOption {
                    name: format!("option {p}"),
                    price: RawPrice::Number(*p),
                    required: false,
                    multiple: false,
                })
                .collect(),
        }
    }

    #[test]
    fn empty_order_is_fees_minus_reduction() {
        let totals = compute_totals(&[], &HashMap::new(), &HashMap::new(), Some(500.0), Some(200.0));
        assert_eq!(totals.subtotal, 0.0);
        assert_eq!(totals.total, 300.0);
    }

    #[test]
    fn two_dishes_with_delivery_fee() {
        // {items:[{dishId:"x", price:1000, quantity:2}], deliveryFee:500}
        let items = vec![line("x", RawPrice::Number(1000.0), 2)];
        let totals = compute_totals(&items, &HashMap::new(), &HashMap::new(), Some(500.0), None);
        assert_eq!(totals.subtotal, 2000.0);
        assert_eq!(totals.total, 2500.0);
    }

    #[test]
    fn extras_are_added_per_unit() {
        let mut item = line("x", RawPrice::Number(1000.0), 2);
        item.selected_extras
            .insert("sides".to_string(), vec![0, 2]);
        let lists = HashMap::from([("sides".to_string(), extra_list("sides", &[100.0, 50.0, 25.0]))]);
        let totals = compute_totals(&[item], &lists, &HashMap::new(), Some(0.0), None);
        // (1000 + 100 + 25) * 2
        assert_eq!(totals.subtotal, 2250.0);
    }

    #[test]
    fn missing_extra_list_and_bad_index_contribute_zero() {
        let mut item = line("x", RawPrice::Number(1000.0), 1);
        item.selected_extras.insert("gone".to_string(), vec![0]);
        item.selected_extras.insert("sides".to_string(), vec![9]);
        let lists = HashMap::from([("sides".to_string(), extra_list("sides", &[100.0]))]);
        let totals = compute_totals(&[item], &lists, &HashMap::new(), Some(0.0), None);
        assert_eq!(totals.subtotal, 1000.0);
    }

    #[test]
    fn catalog_price_is_fallback_only() {
        let catalog = HashMap::from([(
            "x".to_string(),
            CatalogItem {
                id: "x".to_string(),
                name: "dish".to_string(),
                price: RawPrice::Number(700.0),
            },
        )]);
        // captured price wins over catalog
        let captured = vec![line("x", RawPrice::Number(1000.0), 1)];
        assert_eq!(
            compute_totals(&captured, &HashMap::new(), &catalog, Some(0.0), None).subtotal,
            1000.0
        );
        // no captured price falls back to catalog
        let legacy = vec![line("x", RawPrice::Missing, 1)];
        assert_eq!(
            compute_totals(&legacy, &HashMap::new(), &catalog, Some(0.0), None).subtotal,
            700.0
        );
        // neither present degrades to zero
        let orphan = vec![line("y", RawPrice::Missing, 1)];
        assert_eq!(
            compute_totals(&orphan, &HashMap::new(), &catalog, Some(0.0), None).subtotal,
            0.0
        );
    }

    #[test]
    fn locale_formatted_captured_price() {
        let items = vec![line("x", RawPrice::Text("1.500".to_string()), 2)];
        let totals = compute_totals(&items, &HashMap::new(), &HashMap::new(), Some(0.0), None);
        assert_eq!(totals.subtotal, 3000.0);
    }

    #[test]
    fn default_delivery_fee_applies_when_unset() {
        let totals = compute_totals(&[], &HashMap::new(), &HashMap::new(), None, None);
        assert_eq!(totals.delivery_fee, DEFAULT_DELIVERY_FEE);
        assert_eq!(totals.total, DEFAULT_DELIVERY_FEE);
    }

    #[test]
    fn non_finite_inputs_never_leak() {
        let items = vec![line("x", RawPrice::Number(f64::INFINITY), 1)];
        let totals = compute_totals(
            &items,
            &HashMap::new(),
            &HashMap::new(),
            Some(f64::NAN),
            None,
        );
        assert!(totals.subtotal.is_finite());
        assert!(totals.total.is_finite());
        assert_eq!(totals.delivery_fee, 0.0);
    }

    #[test]
    fn idempotent_over_same_inputs() {
        let items = vec![line("x", RawPrice::Number(1000.0), 3)];
        let a = compute_totals(&items, &HashMap::new(), &HashMap::new(), Some(500.0), Some(100.0));
        let b = compute_totals(&items, &HashMap::new(), &HashMap::new(), Some(500.0), Some(100.0));
        assert_eq!(a, b);
    }
}
