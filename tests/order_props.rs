use promises::{all, all_settled, Error, Promise};
use proptest::prelude::*;
use std::{thread, time::Duration};

fn delayed(value: u8, delay: u8, fail: bool) -> Promise<u8> {
    Promise::new(move || {
        thread::sleep(Duration::from_millis(u64::from(delay % 8)));
        if fail {
            Err(Error::msg(value))
        } else {
            Ok(value)
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn all_keeps_input_order(delays in prop::collection::vec(any::<u8>(), 1..12)) {
        let inputs = delays.iter().enumerate().map(|(i, d)| delayed(i as u8, *d, false));
        let expected: Vec<u8> = (0..delays.len() as u8).collect();
        prop_assert_eq!(all(inputs).wait(), Ok(expected));
    }

    #[test]
    fn all_settled_keeps_input_order(
        inputs in prop::collection::vec((any::<u8>(), any::<bool>()), 1..12),
    ) {
        let promises = inputs.iter().enumerate().map(|(i, (d, fail))| delayed(i as u8, *d, *fail));
        let results = all_settled(promises).wait().expect("all_settled never rejects");
        prop_assert_eq!(results.len(), inputs.len());
        for (i, (result, (_, fail))) in results.iter().zip(&inputs).enumerate() {
            match result {
                Ok(value) => prop_assert!(!fail && usize::from(*value) == i),
                Err(err) => prop_assert!(*fail && err.to_string() == i.to_string()),
            }
        }
    }

    #[test]
    fn any_aggregate_keeps_input_order(delays in prop::collection::vec(any::<u8>(), 1..12)) {
        let inputs = delays.iter().enumerate().map(|(i, d)| delayed(i as u8, *d, true));
        let err = promises::any(inputs).wait().expect_err("every input rejects");
        let agg = err.as_aggregate().expect("aggregate error");
        prop_assert_eq!(agg.len(), delays.len());
        for (i, slot) in agg.errors().iter().enumerate() {
            let reason = slot.as_ref().map(ToString::to_string);
            prop_assert_eq!(reason, Some(i.to_string()));
        }
    }
}
