//! Property-based tests for phase ordering and short-circuiting

use std::sync::{Arc, Mutex};

use formcheck::prelude::*;
use proptest::prelude::*;

fn phase() -> impl Strategy<Value = Phase> {
    prop::sample::select(Phase::ALL.to_vec())
}

fn subject() -> Field {
    let control = Control::new("text", "subject")
        .with_attribute(attr::VALIDATE, "")
        .with_value("value");
    Field::from_control(control).unwrap()
}

proptest! {
    #[test]
    fn prop_phases_run_in_order_and_stop_at_first_failure(
        specs in prop::collection::vec((phase(), any::<bool>()), 0..12)
    ) {
        let field = subject();
        let ran = Arc::new(Mutex::new(Vec::new()));

        for (index, (phase, fails)) in specs.iter().copied().enumerate() {
            let ran = ran.clone();
            field.add_invalidator(
                move |_value: String, invalidate: Invalidate| {
                    let ran = ran.clone();
                    async move {
                        ran.lock().unwrap().push(index);
                        if fails {
                            invalidate.invalidate(format!("failure {index}"));
                        }
                    }
                },
                InvalidatorOptions::new().with_phase(phase),
            );
        }

        let valid = tokio_test::block_on(field.check_validity());

        let first_failing = specs.iter().filter(|(_, fails)| *fails).map(|(p, _)| *p).min();
        prop_assert_eq!(valid, first_failing.is_none());

        let mut expected_ran = Vec::new();
        let mut expected_errors = Vec::new();
        for phase in Phase::ALL {
            if first_failing.is_some_and(|failing| phase > failing) {
                break;
            }
            for (index, (p, fails)) in specs.iter().enumerate() {
                if *p != phase {
                    continue;
                }
                expected_ran.push(index);
                if *fails {
                    expected_errors.push(format!("failure {index}"));
                }
            }
        }

        prop_assert_eq!(ran.lock().unwrap().clone(), expected_ran);
        prop_assert_eq!(field.errors(), expected_errors);
    }

    #[test]
    fn prop_repeated_checks_agree(
        specs in prop::collection::vec((phase(), any::<bool>()), 0..8),
        repeats in 2usize..5
    ) {
        let field = subject();
        for (phase, fails) in specs {
            field.add_invalidator(
                move |_value: String, invalidate: Invalidate| async move {
                    if fails {
                        invalidate.invalidate("nope");
                    }
                },
                InvalidatorOptions::new().with_phase(phase),
            );
        }

        let first = tokio_test::block_on(field.check_validity());
        let first_errors = field.errors();
        for _ in 1..repeats {
            prop_assert_eq!(tokio_test::block_on(field.check_validity()), first);
            prop_assert_eq!(field.errors(), first_errors.clone());
        }
    }
}
