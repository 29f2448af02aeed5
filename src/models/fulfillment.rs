//! Quantity and payment rules shared by the order, dispatch and procurement workflows.
//!
//! Everything here is pure: callers load rows, hand plain values in, and
//! persist whatever comes back. That keeps the invariants testable without a
//! database and lets the commands wrap the results in one transaction.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::status::{CancellationType, OrderStatus, PaymentStatus};
use crate::errors::ServiceError;

#[derive(Debug, Error, PartialEq)]
pub enum FulfillmentError {
    #[error("dispatch item references product {product_id} which is not on the order")]
    ProductNotOnOrder { product_id: Uuid },

    #[error("dispatch item references order item {0} which is not on the order")]
    ItemNotOnOrder(Uuid),

    #[error("order item {item_id} has {remaining} outstanding but {requested} was dispatched")]
    OverDispatch {
        item_id: Uuid,
        requested: i32,
        remaining: i32,
    },

    #[error("order item {0} has nothing left to dispatch")]
    NothingToDispatch(Uuid),

    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,

    #[error("PI amount is zero; payment cannot be reconciled")]
    ZeroPiAmount,

    #[error("payment amount must be greater than zero")]
    NonPositivePayment,

    #[error("item {item_id}: received {received} exceeds PI quantity {limit}")]
    ReceiptExceedsPi {
        item_id: Uuid,
        received: i32,
        limit: i32,
    },

    #[error("item {0}: received quantities cannot be negative")]
    NegativeReceipt(Uuid),
}

impl From<FulfillmentError> for ServiceError {
    fn from(err: FulfillmentError) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

/// Dispatch progress of a single order item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemProgress {
    pub quantity: i32,
    pub dispatched_quantity: i32,
}

impl ItemProgress {
    pub fn is_fully_dispatched(&self) -> bool {
        self.quantity > 0 && self.dispatched_quantity >= self.quantity
    }

    pub fn is_partially_dispatched(&self) -> bool {
        self.dispatched_quantity > 0 && self.dispatched_quantity < self.quantity
    }
}

/// Recomputes the order status from item dispatch coverage.
///
/// Only ever returns `current` or a status further along the fulfillment
/// path; an order without items never becomes `dispatching`.
pub fn derive_order_status(current: OrderStatus, items: &[ItemProgress]) -> OrderStatus {
    if current == OrderStatus::Cancelled {
        return current;
    }

    let derived = if !items.is_empty() && items.iter().all(ItemProgress::is_fully_dispatched) {
        Some(OrderStatus::Dispatching)
    } else if items.iter().any(ItemProgress::is_partially_dispatched) {
        Some(OrderStatus::PartiallyDispatched)
    } else {
        None
    };

    match derived {
        Some(next) if next.fulfillment_rank() > current.fulfillment_rank() => next,
        _ => current,
    }
}

/// An order item as seen by dispatch matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub id: Uuid,
    pub group_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub dispatched_quantity: i32,
}

impl OrderLine {
    pub fn remaining(&self) -> i32 {
        (self.quantity - self.dispatched_quantity).max(0)
    }
}

/// One requested line of a dispatch note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequestLine {
    pub order_item_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverDispatchPolicy {
    Reject,
    Clamp,
}

/// How one requested line lands on the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchAllocation {
    /// Index into the `lines` slice passed to [`plan_dispatch`]
    pub line_index: usize,
    pub order_item_id: Uuid,
    pub quantity: i32,
    /// Set when the request was cut down to the outstanding balance
    pub clamped_from: Option<i32>,
    /// Set when the product occurs in more than one group and no group was given
    pub ambiguous: bool,
}

fn resolve_line(
    lines: &[OrderLine],
    request: &DispatchRequestLine,
) -> Result<(usize, bool), FulfillmentError> {
    if let Some(item_id) = request.order_item_id {
        return lines
            .iter()
            .position(|l| l.id == item_id)
            .map(|idx| (idx, false))
            .ok_or(FulfillmentError::ItemNotOnOrder(item_id));
    }

    let mut candidates = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.product_id == request.product_id)
        .filter(|(_, l)| request.group_id.map_or(true, |g| l.group_id == g));

    let (first, _) = candidates
        .next()
        .ok_or(FulfillmentError::ProductNotOnOrder {
            product_id: request.product_id,
        })?;
    let ambiguous = candidates.next().is_some();
    Ok((first, ambiguous))
}

/// Matches requested lines to order items and checks them against the
/// outstanding balance, including earlier lines of the same note.
pub fn plan_dispatch(
    lines: &[OrderLine],
    requests: &[DispatchRequestLine],
    policy: OverDispatchPolicy,
) -> Result<Vec<DispatchAllocation>, FulfillmentError> {
    let mut pending: Vec<i32> = vec![0; lines.len()];
    let mut allocations = Vec::with_capacity(requests.len());

    for request in requests {
        if request.quantity <= 0 {
            return Err(FulfillmentError::NonPositiveQuantity);
        }

        let (idx, ambiguous) = resolve_line(lines, request)?;
        let line = &lines[idx];
        let remaining = line.remaining() - pending[idx];

        let (quantity, clamped_from) = if request.quantity <= remaining {
            (request.quantity, None)
        } else {
            match policy {
                OverDispatchPolicy::Reject => {
                    return Err(FulfillmentError::OverDispatch {
                        item_id: line.id,
                        requested: request.quantity,
                        remaining: remaining.max(0),
                    })
                }
                OverDispatchPolicy::Clamp if remaining <= 0 => {
                    return Err(FulfillmentError::NothingToDispatch(line.id))
                }
                OverDispatchPolicy::Clamp => (remaining, Some(request.quantity)),
            }
        };

        pending[idx] += quantity;
        allocations.push(DispatchAllocation {
            line_index: idx,
            order_item_id: line.id,
            quantity,
            clamped_from,
            ambiguous,
        });
    }

    Ok(allocations)
}

/// Financial state of an order item before cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelLine {
    pub id: Uuid,
    pub group_id: Uuid,
    pub quantity: i32,
    pub dispatched_quantity: i32,
    pub net_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledLine {
    pub id: Uuid,
    pub quantity: i32,
    pub balance_quantity: i32,
    pub cancelled_quantity: i32,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationPlan {
    pub cancellation_type: CancellationType,
    pub lines: Vec<CancelledLine>,
    /// Retained value per group, in first-seen order
    pub group_totals: Vec<(Uuid, Decimal)>,
    pub grand_total: Decimal,
    pub gst_amount: Decimal,
    pub net_amount_payable: Decimal,
}

/// Shrinks an order to what has physically left the warehouse.
///
/// With no dispatch at all every value drops to zero; otherwise each item
/// keeps exactly its dispatched quantity and the totals are re-summed from
/// those retained values.
pub fn plan_cancellation(lines: &[CancelLine], gst_rate: Decimal) -> CancellationPlan {
    let total_dispatched: i64 = lines.iter().map(|l| l.dispatched_quantity as i64).sum();
    let cancellation_type = if total_dispatched > 0 {
        CancellationType::Partial
    } else {
        CancellationType::Full
    };

    let mut group_totals: Vec<(Uuid, Decimal)> = Vec::new();
    let mut cancelled = Vec::with_capacity(lines.len());

    for line in lines {
        let kept = line.dispatched_quantity.max(0);
        let total_amount = match cancellation_type {
            CancellationType::Partial if kept > 0 => Decimal::from(kept) * line.net_rate,
            _ => Decimal::ZERO,
        };

        match group_totals.iter_mut().find(|(g, _)| *g == line.group_id) {
            Some((_, sum)) => *sum += total_amount,
            None => group_totals.push((line.group_id, total_amount)),
        }

        cancelled.push(CancelledLine {
            id: line.id,
            quantity: kept,
            balance_quantity: 0,
            cancelled_quantity: (line.quantity - kept).max(0),
            total_amount,
        });
    }

    let grand_total: Decimal = cancelled.iter().map(|l| l.total_amount).sum();
    let gst_amount = gst_for(grand_total, gst_rate);

    CancellationPlan {
        cancellation_type,
        lines: cancelled,
        group_totals,
        grand_total,
        gst_amount,
        net_amount_payable: grand_total + gst_amount,
    }
}

/// Tax on a taxable value, rounded to paise.
pub fn gst_for(taxable: Decimal, rate: Decimal) -> Decimal {
    (taxable * rate).round_dp(2)
}

pub fn line_total(quantity: i32, net_rate: Decimal) -> Decimal {
    Decimal::from(quantity) * net_rate
}

/// Payment status of an order from its payable total and what has been received.
pub fn payment_status_for(net_amount_payable: Decimal, amount_paid: Decimal) -> PaymentStatus {
    if amount_paid <= Decimal::ZERO {
        PaymentStatus::Pending
    } else if net_amount_payable - amount_paid <= Decimal::ZERO {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Full,
    Partial,
}

/// Compares a vendor payment with the PI amount.
pub fn reconcile_pr_payment(
    pi_amount: Decimal,
    payment_amount: Decimal,
) -> Result<PaymentOutcome, FulfillmentError> {
    if pi_amount <= Decimal::ZERO {
        return Err(FulfillmentError::ZeroPiAmount);
    }
    if payment_amount <= Decimal::ZERO {
        return Err(FulfillmentError::NonPositivePayment);
    }
    if payment_amount >= pi_amount {
        Ok(PaymentOutcome::Full)
    } else {
        Ok(PaymentOutcome::Partial)
    }
}

/// Quantity a PR item contributes to ordered and in-transit counters.
pub fn procured_quantity(quantity: i32, pi_received_quantity: Option<i32>) -> i32 {
    pi_received_quantity.unwrap_or(quantity)
}

/// Per-item breakdown of a material receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLine {
    pub item_id: Uuid,
    pub quantity: i32,
    pub pi_received_quantity: Option<i32>,
    pub fresh: i32,
    pub damaged: i32,
    pub short: i32,
}

impl ReceiptLine {
    pub fn accounted(&self) -> i32 {
        self.fresh + self.damaged + self.short
    }
}

/// Rejects the whole receipt if any line accounts for more than its PI quantity.
pub fn validate_material_receipt(lines: &[ReceiptLine]) -> Result<(), FulfillmentError> {
    for line in lines {
        if line.fresh < 0 || line.damaged < 0 || line.short < 0 {
            return Err(FulfillmentError::NegativeReceipt(line.item_id));
        }
        let limit = procured_quantity(line.quantity, line.pi_received_quantity);
        if line.accounted() > limit {
            return Err(FulfillmentError::ReceiptExceedsPi {
                item_id: line.item_id,
                received: line.accounted(),
                limit,
            });
        }
    }
    Ok(())
}

pub fn in_transit_after_receipt(in_transit: i32, accounted: i32) -> i32 {
    (in_transit - accounted).max(0)
}

/// Stock a product can promise to new orders.
pub fn available_for_order(fresh_stock: i32, opening_stock: i32, damaged_stock: i32) -> i32 {
    fresh_stock + opening_stock - damaged_stock
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn progress(quantity: i32, dispatched_quantity: i32) -> ItemProgress {
        ItemProgress {
            quantity,
            dispatched_quantity,
        }
    }

    fn line(product_id: Uuid, group_id: Uuid, quantity: i32, dispatched: i32) -> OrderLine {
        OrderLine {
            id: Uuid::new_v4(),
            group_id,
            product_id,
            quantity,
            dispatched_quantity: dispatched,
        }
    }

    fn request(product_id: Uuid, quantity: i32) -> DispatchRequestLine {
        DispatchRequestLine {
            order_item_id: None,
            group_id: None,
            product_id,
            quantity,
        }
    }

    #[test]
    fn fully_dispatched_order_becomes_dispatching() {
        let status = derive_order_status(OrderStatus::Pending, &[progress(10, 10)]);
        assert_eq!(status, OrderStatus::Dispatching);
    }

    #[test]
    fn partial_dispatch_becomes_partially_dispatched() {
        let status = derive_order_status(OrderStatus::Pending, &[progress(10, 4)]);
        assert_eq!(status, OrderStatus::PartiallyDispatched);

        let status = derive_order_status(
            OrderStatus::AwaitingDispatch,
            &[progress(10, 10), progress(5, 0)],
        );
        assert_eq!(status, OrderStatus::AwaitingDispatch);
    }

    #[test]
    fn derivation_never_downgrades() {
        assert_eq!(
            derive_order_status(OrderStatus::Dispatching, &[progress(10, 4)]),
            OrderStatus::Dispatching
        );
        assert_eq!(
            derive_order_status(OrderStatus::Delivered, &[progress(10, 4)]),
            OrderStatus::Delivered
        );
        assert_eq!(
            derive_order_status(OrderStatus::Cancelled, &[progress(10, 10)]),
            OrderStatus::Cancelled
        );
    }

    #[test]
    fn order_without_items_never_reaches_dispatching() {
        assert_eq!(
            derive_order_status(OrderStatus::Pending, &[]),
            OrderStatus::Pending
        );
    }

    #[test]
    fn zero_quantity_item_blocks_dispatching() {
        assert_eq!(
            derive_order_status(OrderStatus::Pending, &[progress(10, 10), progress(0, 0)]),
            OrderStatus::Pending
        );
    }

    #[test]
    fn dispatch_matches_first_product_and_flags_ambiguity() {
        let product = Uuid::new_v4();
        let lines = vec![
            line(product, Uuid::new_v4(), 5, 0),
            line(product, Uuid::new_v4(), 5, 0),
        ];
        let plan = plan_dispatch(&lines, &[request(product, 3)], OverDispatchPolicy::Reject)
            .unwrap();
        assert_eq!(plan[0].line_index, 0);
        assert!(plan[0].ambiguous);
    }

    #[test]
    fn group_reference_disambiguates() {
        let product = Uuid::new_v4();
        let second_group = Uuid::new_v4();
        let lines = vec![
            line(product, Uuid::new_v4(), 5, 0),
            line(product, second_group, 5, 0),
        ];
        let mut req = request(product, 2);
        req.group_id = Some(second_group);
        let plan = plan_dispatch(&lines, &[req], OverDispatchPolicy::Reject).unwrap();
        assert_eq!(plan[0].line_index, 1);
        assert!(!plan[0].ambiguous);
    }

    #[test]
    fn over_dispatch_is_rejected_across_lines_of_one_note() {
        let product = Uuid::new_v4();
        let lines = vec![line(product, Uuid::new_v4(), 10, 4)];
        let err = plan_dispatch(
            &lines,
            &[request(product, 5), request(product, 2)],
            OverDispatchPolicy::Reject,
        )
        .unwrap_err();
        assert_matches!(
            err,
            FulfillmentError::OverDispatch {
                requested: 2,
                remaining: 1,
                ..
            }
        );
    }

    #[test]
    fn clamp_policy_cuts_to_balance() {
        let product = Uuid::new_v4();
        let lines = vec![line(product, Uuid::new_v4(), 10, 8)];
        let plan = plan_dispatch(&lines, &[request(product, 5)], OverDispatchPolicy::Clamp)
            .unwrap();
        assert_eq!(plan[0].quantity, 2);
        assert_eq!(plan[0].clamped_from, Some(5));

        let done = vec![line(product, Uuid::new_v4(), 10, 10)];
        assert_matches!(
            plan_dispatch(&done, &[request(product, 1)], OverDispatchPolicy::Clamp),
            Err(FulfillmentError::NothingToDispatch(_))
        );
    }

    #[test]
    fn unknown_product_and_bad_quantity_are_rejected() {
        let lines = vec![line(Uuid::new_v4(), Uuid::new_v4(), 10, 0)];
        assert_matches!(
            plan_dispatch(&lines, &[request(Uuid::new_v4(), 1)], OverDispatchPolicy::Reject),
            Err(FulfillmentError::ProductNotOnOrder { .. })
        );
        assert_matches!(
            plan_dispatch(
                &lines,
                &[request(lines[0].product_id, 0)],
                OverDispatchPolicy::Reject
            ),
            Err(FulfillmentError::NonPositiveQuantity)
        );
    }

    #[test]
    fn partial_cancellation_keeps_dispatched_value() {
        let group = Uuid::new_v4();
        let lines = vec![
            CancelLine {
                id: Uuid::new_v4(),
                group_id: group,
                quantity: 10,
                dispatched_quantity: 3,
                net_rate: dec!(50),
            },
            CancelLine {
                id: Uuid::new_v4(),
                group_id: group,
                quantity: 4,
                dispatched_quantity: 0,
                net_rate: dec!(25),
            },
        ];
        let plan = plan_cancellation(&lines, dec!(0.18));
        assert_eq!(plan.cancellation_type, CancellationType::Partial);
        assert_eq!(plan.lines[0].quantity, 3);
        assert_eq!(plan.lines[0].total_amount, dec!(150));
        assert_eq!(plan.lines[0].balance_quantity, 0);
        assert_eq!(plan.lines[0].cancelled_quantity, 7);
        assert_eq!(plan.lines[1].total_amount, Decimal::ZERO);
        assert_eq!(plan.lines[1].quantity, 0);
        assert_eq!(plan.grand_total, dec!(150));
        assert_eq!(plan.gst_amount, dec!(27.00));
        assert_eq!(plan.net_amount_payable, dec!(177.00));
        assert_eq!(plan.group_totals, vec![(group, dec!(150))]);
    }

    #[test]
    fn full_cancellation_zeroes_everything() {
        let lines = vec![CancelLine {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            quantity: 10,
            dispatched_quantity: 0,
            net_rate: dec!(100),
        }];
        let plan = plan_cancellation(&lines, dec!(0.18));
        assert_eq!(plan.cancellation_type, CancellationType::Full);
        assert_eq!(plan.grand_total, Decimal::ZERO);
        assert_eq!(plan.gst_amount, Decimal::ZERO);
        assert_eq!(plan.net_amount_payable, Decimal::ZERO);
        assert_eq!(plan.lines[0].balance_quantity, 0);
        assert_eq!(plan.lines[0].cancelled_quantity, 10);
    }

    #[test]
    fn payment_reconciliation_thresholds() {
        assert_eq!(
            reconcile_pr_payment(dec!(1000), dec!(1000)),
            Ok(PaymentOutcome::Full)
        );
        assert_eq!(
            reconcile_pr_payment(dec!(1000), dec!(1200)),
            Ok(PaymentOutcome::Full)
        );
        assert_eq!(
            reconcile_pr_payment(dec!(1000), dec!(400)),
            Ok(PaymentOutcome::Partial)
        );
        assert_eq!(
            reconcile_pr_payment(Decimal::ZERO, dec!(400)),
            Err(FulfillmentError::ZeroPiAmount)
        );
        assert_eq!(
            reconcile_pr_payment(dec!(1000), Decimal::ZERO),
            Err(FulfillmentError::NonPositivePayment)
        );
    }

    #[test]
    fn payment_status_follows_balance() {
        assert_eq!(
            payment_status_for(dec!(1180), Decimal::ZERO),
            PaymentStatus::Pending
        );
        assert_eq!(payment_status_for(dec!(1180), dec!(500)), PaymentStatus::Partial);
        assert_eq!(payment_status_for(dec!(1180), dec!(1180)), PaymentStatus::Paid);
        assert_eq!(payment_status_for(dec!(1180), dec!(2000)), PaymentStatus::Paid);
    }

    #[test]
    fn material_receipt_is_all_or_nothing() {
        let ok = ReceiptLine {
            item_id: Uuid::new_v4(),
            quantity: 10,
            pi_received_quantity: Some(8),
            fresh: 6,
            damaged: 1,
            short: 1,
        };
        let bad = ReceiptLine {
            fresh: 9,
            ..ok.clone()
        };
        assert!(validate_material_receipt(&[ok.clone()]).is_ok());
        assert_matches!(
            validate_material_receipt(&[ok, bad]),
            Err(FulfillmentError::ReceiptExceedsPi {
                received: 11,
                limit: 8,
                ..
            })
        );
    }

    #[test]
    fn receipt_falls_back_to_ordered_quantity_without_pi_quantity() {
        let line = ReceiptLine {
            item_id: Uuid::new_v4(),
            quantity: 5,
            pi_received_quantity: None,
            fresh: 5,
            damaged: 0,
            short: 0,
        };
        assert!(validate_material_receipt(&[line]).is_ok());
    }

    #[test]
    fn in_transit_never_goes_negative() {
        assert_eq!(in_transit_after_receipt(5, 8), 0);
        assert_eq!(in_transit_after_receipt(10, 8), 2);
    }

    #[test]
    fn availability_formula() {
        assert_eq!(available_for_order(20, 5, 3), 22);
    }
}
