//! Order pricing engine.
//!
//! A price is computed in four steps:
//!
//! 1. base: `Σ count × unit_cost` over primary lines (the cost field and the
//!    line filter depend on the [`PriceView`]),
//! 2. every absolute discount of the referenced services is added,
//! 3. every relative discount of the referenced services multiplies the
//!    running total, in ascending order of the owning service id,
//! 4. `0.001` is subtracted and the result rounded to two places.
//!
//! Steps 2–4 do not depend on the view. Arithmetic is done in `f64`; the
//! final rounding works on the exact binary value (ties to even).

use std::collections::BTreeSet;

use rust_decimal::Decimal;

use terminal_catalog::{DiscountKind, ServiceDiscount};
use terminal_core::rounding::decimal_to_f64;
use terminal_core::{ContractorId, ServiceId, round_half_even};

use crate::OrderInvoice;

/// Subtracted before rounding so that totals sitting on a half cent round
/// down.
pub const ROUND_DOWN_BIAS: f64 = 0.001;

/// Whose price is being computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceView {
    /// Customer price: `cost` of every primary line.
    Customer,
    /// Price charged by the marketplace aggregator.
    ///
    /// When the first line already has a contractor the marketplace cost
    /// (`cost_signedup`) of primary lines carrying one is used; otherwise the
    /// customer cost is used.
    Platform,
    /// Contractor price: `cost_contractor` of primary lines that carry one,
    /// excluding lines executed by the aggregator itself.
    Contractor { aggregator_id: Option<ContractorId> },
}

/// Step 1: base sum for the given view. No primary lines ⇒ `0.0`.
pub fn base_sum(lines: &[OrderInvoice], view: PriceView) -> f64 {
    match view {
        PriceView::Customer => sum_lines(lines, |l| l.cost),
        PriceView::Platform => {
            let contracted = lines.first().and_then(|l| l.contractor_id).is_some();
            if contracted {
                sum_lines(lines, |l| l.cost_signedup)
            } else {
                sum_lines(lines, |l| l.cost)
            }
        }
        PriceView::Contractor { aggregator_id } => sum_lines(lines, |l| {
            match (aggregator_id, l.contractor_id) {
                (Some(agg), Some(c)) if agg == c => None,
                _ => l.cost_contractor,
            }
        }),
    }
}

fn sum_lines(lines: &[OrderInvoice], unit_cost: impl Fn(&OrderInvoice) -> Option<Decimal>) -> f64 {
    lines
        .iter()
        .filter(|l| l.is_primary())
        .filter_map(|l| unit_cost(l).map(|c| l.count * decimal_to_f64(c)))
        .sum()
}

/// Distinct services referenced by the lines (primary and discount ones).
pub fn referenced_services(lines: &[OrderInvoice]) -> BTreeSet<ServiceId> {
    lines.iter().map(|l| l.service_id).collect()
}

/// Steps 2–4: apply the discounts owned by `services` to `total`.
///
/// `discounts` may contain rules of unrelated services; they are ignored.
pub fn apply_discounts(
    total: f64,
    services: &BTreeSet<ServiceId>,
    discounts: &[ServiceDiscount],
) -> f64 {
    let mut applicable: Vec<&ServiceDiscount> = discounts
        .iter()
        .filter(|d| services.contains(&d.service_id))
        .collect();
    // Relative rules multiply in owning-service order; the rule id breaks
    // ties between rules of one service.
    applicable.sort_by_key(|d| (d.service_id, d.id));

    let mut total = total;
    for d in applicable.iter().filter(|d| d.kind == DiscountKind::Absolute) {
        total += decimal_to_f64(d.value);
    }
    for d in applicable.iter().filter(|d| d.kind == DiscountKind::Relative) {
        total *= decimal_to_f64(d.value);
    }
    round_half_even(total - ROUND_DOWN_BIAS, 2)
}

/// Price of a whole order from the given view.
pub fn order_price(lines: &[OrderInvoice], discounts: &[ServiceDiscount], view: PriceView) -> f64 {
    let base = base_sum(lines, view);
    apply_discounts(base, &referenced_services(lines), discounts)
}

/// Price of a single unit of one line, discounted with the rules of every
/// service on the order. `None` when the line has no such cost.
pub fn line_price(
    unit_cost: Option<Decimal>,
    lines: &[OrderInvoice],
    discounts: &[ServiceDiscount],
) -> Option<f64> {
    let cost = unit_cost?;
    Some(apply_discounts(
        decimal_to_f64(cost),
        &referenced_services(lines),
        discounts,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use terminal_catalog::ServiceType;
    use terminal_core::{DepartmentId, DiscountId};

    fn money(v: &str) -> Decimal {
        v.parse().unwrap()
    }

    fn primary(service: u64, count: f64, cost: &str) -> OrderInvoice {
        OrderInvoice {
            service_id: ServiceId(service),
            service_type: ServiceType::Primary,
            title: format!("service {service}"),
            count,
            unit_name: String::new(),
            cost: Some(money(cost)),
            cost_signedup: None,
            cost_contractor: None,
            department_id: DepartmentId(1),
            contractor_id: None,
        }
    }

    fn discount_line(service: u64) -> OrderInvoice {
        OrderInvoice {
            service_type: ServiceType::Discount,
            cost: None,
            ..primary(service, 1.0, "0")
        }
    }

    fn rule(id: u64, service: u64, kind: DiscountKind, value: &str) -> ServiceDiscount {
        ServiceDiscount {
            id: DiscountId(id),
            service_id: ServiceId(service),
            kind,
            value: money(value),
        }
    }

    #[test]
    fn discount_free_price_is_biased_sum() {
        let lines = vec![primary(1, 2.0, "100.00"), primary(2, 1.5, "10.00")];
        assert_eq!(order_price(&lines, &[], PriceView::Customer), 215.0);
    }

    #[test]
    fn no_primary_lines_means_zero_base() {
        let lines = vec![discount_line(3)];
        assert_eq!(base_sum(&lines, PriceView::Customer), 0.0);
        assert_eq!(order_price(&lines, &[], PriceView::Customer), 0.0);
    }

    #[test]
    fn discount_services_do_not_add_to_base() {
        let mut d = discount_line(3);
        d.cost = Some(money("999"));
        let lines = vec![primary(1, 1.0, "50"), d];
        assert_eq!(base_sum(&lines, PriceView::Customer), 50.0);
    }

    #[test]
    fn single_absolute_discount_is_added() {
        let lines = vec![primary(1, 1.0, "100.00"), discount_line(3)];
        let rules = vec![rule(1, 3, DiscountKind::Absolute, "-15.50")];
        assert_eq!(order_price(&lines, &rules, PriceView::Customer), 84.5);
    }

    #[test]
    fn relative_discount_of_ninety_percent() {
        let lines = vec![primary(1, 1.0, "100.00"), discount_line(5)];
        let rules = vec![rule(1, 5, DiscountKind::Relative, "0.9")];
        assert_eq!(order_price(&lines, &rules, PriceView::Customer), 90.0);
    }

    #[test]
    fn absolute_discounts_apply_before_relative_ones() {
        let lines = vec![primary(1, 1.0, "100"), discount_line(2), discount_line(3)];
        let rules = vec![
            rule(1, 2, DiscountKind::Relative, "0.5"),
            rule(2, 3, DiscountKind::Absolute, "20"),
        ];
        // (100 + 20) * 0.5, not 100 * 0.5 + 20
        assert_eq!(order_price(&lines, &rules, PriceView::Customer), 60.0);
    }

    #[test]
    fn relative_discounts_follow_service_order_regardless_of_input_order() {
        let lines = vec![primary(1, 3.0, "33.33"), discount_line(5), discount_line(9)];
        let forward = vec![
            rule(1, 5, DiscountKind::Relative, "0.93"),
            rule(2, 9, DiscountKind::Relative, "0.87"),
        ];
        let reversed: Vec<_> = forward.iter().cloned().rev().collect();
        let expected = round_half_even(99.99 * 0.93 * 0.87 - ROUND_DOWN_BIAS, 2);
        assert_eq!(order_price(&lines, &forward, PriceView::Customer), expected);
        assert_eq!(order_price(&lines, &reversed, PriceView::Customer), expected);
    }

    #[test]
    fn rules_of_unreferenced_services_are_ignored() {
        let lines = vec![primary(1, 1.0, "10")];
        let rules = vec![rule(1, 42, DiscountKind::Relative, "0.1")];
        assert_eq!(order_price(&lines, &rules, PriceView::Customer), 10.0);
    }

    #[test]
    fn repeated_service_applies_its_rule_once() {
        let mut second = primary(1, 1.0, "10");
        second.department_id = DepartmentId(2);
        let lines = vec![primary(1, 1.0, "10"), second];
        let rules = vec![rule(1, 1, DiscountKind::Relative, "0.5")];
        assert_eq!(order_price(&lines, &rules, PriceView::Customer), 10.0);
    }

    #[test]
    fn platform_view_uses_marketplace_cost_once_contracted() {
        let mut a = primary(1, 2.0, "100");
        a.cost_signedup = Some(money("80"));
        a.contractor_id = Some(ContractorId(7));
        let mut b = primary(2, 1.0, "50");
        b.cost_signedup = None;
        let lines = vec![a.clone(), b.clone()];
        assert_eq!(base_sum(&lines, PriceView::Platform), 160.0);

        // First line without contractor: falls back to customer costs.
        a.contractor_id = None;
        b.contractor_id = Some(ContractorId(7));
        let lines = vec![a, b];
        assert_eq!(base_sum(&lines, PriceView::Platform), 250.0);
    }

    #[test]
    fn contractor_view_skips_aggregator_lines() {
        let aggregator = ContractorId(1);
        let mut own = primary(1, 1.0, "100");
        own.cost_contractor = Some(money("70"));
        own.contractor_id = Some(aggregator);
        let mut external = primary(2, 2.0, "100");
        external.cost_contractor = Some(money("60"));
        external.contractor_id = Some(ContractorId(2));
        let mut unassigned = primary(3, 1.0, "100");
        unassigned.cost_contractor = Some(money("5"));
        let no_cost = primary(4, 1.0, "100");
        let lines = vec![own, external, unassigned, no_cost];
        let view = PriceView::Contractor { aggregator_id: Some(aggregator) };
        assert_eq!(base_sum(&lines, view), 125.0);
    }

    #[test]
    fn line_price_discounts_a_single_unit_cost() {
        let lines = vec![primary(1, 4.0, "100"), discount_line(5)];
        let rules = vec![rule(1, 5, DiscountKind::Relative, "0.8")];
        assert_eq!(line_price(Some(money("100")), &lines, &rules), Some(80.0));
        assert_eq!(line_price(None, &lines, &rules), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: without discounts the price is the biased, rounded sum.
        #[test]
        fn discount_free_price_matches_formula(
            items in prop::collection::vec((1u32..20u32, 0i64..1_000_000i64), 1..8)
        ) {
            let lines: Vec<OrderInvoice> = items
                .iter()
                .enumerate()
                .map(|(i, (count, cents))| {
                    let mut l = primary(i as u64 + 1, *count as f64, "0");
                    l.cost = Some(Decimal::new(*cents, 2));
                    l
                })
                .collect();
            let expected: f64 = lines
                .iter()
                .map(|l| l.count * decimal_to_f64(l.cost.unwrap()))
                .sum();
            prop_assert_eq!(
                order_price(&lines, &[], PriceView::Customer),
                round_half_even(expected - ROUND_DOWN_BIAS, 2)
            );
        }

        /// Property: the order of discount records never changes the price.
        #[test]
        fn discount_record_order_is_irrelevant(
            values in prop::collection::vec(50u32..150u32, 1..6),
            rotate in 0usize..6,
            cents in 1i64..10_000_000i64,
        ) {
            let mut lines = vec![primary(1, 1.0, "0")];
            lines[0].cost = Some(Decimal::new(cents, 2));
            let mut rules = Vec::new();
            for (i, v) in values.iter().enumerate() {
                let service = 100 - i as u64;
                lines.push(discount_line(service));
                let kind = if i % 2 == 0 { DiscountKind::Relative } else { DiscountKind::Absolute };
                rules.push(ServiceDiscount {
                    id: DiscountId(i as u64 + 1),
                    service_id: ServiceId(service),
                    kind,
                    value: Decimal::new(*v as i64, 2),
                });
            }
            let baseline = order_price(&lines, &rules, PriceView::Customer);
            let mut shuffled = rules.clone();
            let by = rotate % shuffled.len();
            shuffled.rotate_left(by);
            shuffled.reverse();
            prop_assert_eq!(order_price(&lines, &shuffled, PriceView::Customer), baseline);
        }
    }
}
