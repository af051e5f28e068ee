//! Property Tests
//!
//! Random sequences of sales and purchases against one batch, checked
//! against a plain counter model.

use crate::*;
use proptest::collection::vec;
use proptest::prelude::{prop_assert, prop_assert_eq, prop_oneof, proptest, Just, ProptestConfig};
use proptest::strategy::Strategy as _;

#[derive(Debug, Clone)]
enum Op {
    Sell(u64, Strategy),
    Buy(u64, Strategy),
}

fn strategy() -> impl proptest::strategy::Strategy<Value = Strategy> {
    prop_oneof![Just(Strategy::Optimistic), Just(Strategy::Pessimistic)]
}

fn op() -> impl proptest::strategy::Strategy<Value = Op> {
    prop_oneof![
        3 => (0u64..40, strategy()).prop_map(|(q, s)| Op::Sell(q, s)),
        1 => (0u64..40, strategy()).prop_map(|(q, s)| Op::Buy(q, s)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_counter_matches_model(initial in 0u64..100, ops in vec(op(), 1..40)) {
        let db = create_db();
        let batch = seed_batch(&db, initial);
        let mut model = initial;
        let mut accepted = 0u64;

        for op in ops {
            let request = match &op {
                Op::Sell(q, s) => StockMutation::sale(batch, ACTOR, *q).with_strategy(*s),
                Op::Buy(q, s) => StockMutation::purchase(batch, ACTOR, *q).with_strategy(*s),
            };
            let before = db.batches.get(batch).unwrap().version;
            let outcome = db.sales.execute(&request);

            let expected = match op {
                Op::Sell(0, _) | Op::Buy(0, _) => None,
                Op::Sell(q, _) if q > model => None,
                Op::Sell(q, _) => Some(model - q),
                Op::Buy(q, _) => Some(model + q),
            };

            let after = db.batches.get(batch).unwrap();
            match expected {
                Some(next) => {
                    prop_assert!(outcome.is_accepted(), "{}", outcome);
                    model = next;
                    accepted += 1;
                    prop_assert_eq!(after.version, before + 1);
                }
                None => {
                    prop_assert!(!outcome.is_accepted());
                    prop_assert_eq!(after.version, before);
                }
            }
            prop_assert_eq!(after.quantity_current, model);
        }

        let record = db.batches.get(batch).unwrap();
        prop_assert_eq!(record.version, accepted);
        prop_assert_eq!(db.ledger.for_batch(batch).unwrap().len() as u64, accepted);
        assert_ledger_consistent(&db, batch);
    }

    #[test]
    fn prop_sale_totals_use_unit_price(cents in 1i64..100_000, quantity in 1u64..1_000) {
        let db = create_db();
        let mut batch = intake(quantity);
        batch.unit_price = Decimal::new(cents, 2);
        let batch = db.batches.register(batch).unwrap().batch_id;

        db.sales.sell(batch, ACTOR, quantity, Strategy::Optimistic).unwrap();

        let entry = &db.ledger.for_batch(batch).unwrap()[0];
        prop_assert_eq!(entry.total_amount, Decimal::new(cents, 2) * Decimal::from(quantity));
        prop_assert_eq!(db.batches.get(batch).unwrap().quantity_current, 0);
    }
}
