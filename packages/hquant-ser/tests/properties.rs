use chrono::Weekday;
use hquant_ser::frequency::Unit;
use hquant_ser::nn::{LearnerConfig, Network, NetworkConfig, Neuron};
use hquant_ser::{
    Calendar, Frequency, IndicatorDescriptor, IndicatorKind, Quote, Ser, SerContext, SerKey,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn same(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| (x.is_nan() && y.is_nan()) || x == y)
}

fn quotes(closes: &[f64]) -> Vec<Quote> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Quote::new((i as i64 + 1) * 60_000, c, c + 0.5, c - 0.5, c, 100.0))
        .collect()
}

proptest! {
    #[test]
    fn ingestion_keeps_rows_dense_and_ordered(times in prop::collection::vec(0i64..10_000, 0..200)) {
        let mut ser = Ser::quote("P", Frequency::ONE_SEC);
        let mut accepted: Vec<i64> = Vec::new();
        for t in times {
            let q = Quote::new(t, 1.0, 1.0, 1.0, 1.0, 1.0);
            match ser.put_quote(&q) {
                // an existing time is cleared and rewritten in place
                Ok(row) => match accepted.iter().position(|a| *a == t) {
                    Some(existing) => prop_assert_eq!(row, existing),
                    None => {
                        accepted.push(t);
                        prop_assert_eq!(row, accepted.len() - 1);
                    }
                },
                Err(_) => prop_assert!(accepted.last().is_some_and(|last| t < *last) && !accepted.contains(&t)),
            }
        }
        prop_assert_eq!(ser.len(), accepted.len());
        prop_assert!(ser.timestamps().as_slice().windows(2).all(|w| w[0] < w[1]));
        for (row, t) in accepted.iter().enumerate() {
            prop_assert_eq!(ser.index_of_occurred_time(*t), Ok(row));
        }
    }

    #[test]
    fn frequency_buckets_are_consistent(
        t in 946_684_800_000i64..1_893_456_000_000,
        n in 0i64..40,
        pick in 0usize..7,
        new_york in any::<bool>(),
    ) {
        let freq = [
            Frequency::FIFTEEN_MIN,
            Frequency::ONE_HOUR,
            Frequency::DAILY,
            Frequency::WEEKLY,
            Frequency::MONTHLY,
            Frequency::new(Unit::Month, 3).unwrap(),
            Frequency::YEARLY,
        ][pick];
        let cal = if new_york {
            Calendar::new(chrono_tz::America::New_York, Weekday::Sun)
        } else {
            Calendar::utc()
        };
        let begin = freq.begin_time_of_freq_that_include(t, &cal);
        prop_assert!(begin <= t);
        prop_assert!(t < freq.next_time(begin, &cal));
        prop_assert_eq!(freq.begin_time_of_freq_that_include(begin, &cal), begin);

        let later = freq.time_after_n_freqs(begin, n, &cal);
        prop_assert_eq!(freq.n_freqs_between(begin, later, &cal), n);
        prop_assert_eq!(freq.begin_time_of_freq_that_include(later, &cal), later);
    }

    #[test]
    fn ema_of_a_constant_is_the_constant(c in -1e6f64..1e6, period in 1u32..50, len in 1usize..100) {
        let mut ctx = SerContext::new(SerKey::new("C", Frequency::ONE_MIN), Calendar::utc());
        let ema = ctx
            .add_indicator(&IndicatorDescriptor::new(IndicatorKind::Ema).with_opt("period", period as f64).unwrap())
            .unwrap();
        ctx.ingest(&quotes(&vec![c; len])).unwrap();
        prop_assert!(ctx.indicator_values(ema, "ema").unwrap().iter().all(|v| *v == c));
    }

    #[test]
    fn incremental_ingestion_matches_full_recompute(
        closes in prop::collection::vec(1.0f64..100.0, 2..120),
        split in 1usize..119,
    ) {
        let split = split.min(closes.len() - 1);
        let all = quotes(&closes);
        let kinds = [IndicatorKind::Macd, IndicatorKind::Rsi, IndicatorKind::Kd, IndicatorKind::Sar, IndicatorKind::Boll];

        let key = SerKey::new("I", Frequency::ONE_MIN);
        let mut full = SerContext::new(key.clone(), Calendar::utc());
        let mut step = SerContext::new(key, Calendar::utc());
        let mut ids = Vec::new();
        for kind in kinds {
            let desc = IndicatorDescriptor::new(kind);
            ids.push((full.add_indicator(&desc).unwrap(), step.add_indicator(&desc).unwrap()));
        }
        full.ingest(&all).unwrap();
        step.ingest(&all[..split]).unwrap();
        step.ingest(&all[split..]).unwrap();

        for (kind, (a, b)) in kinds.iter().zip(ids) {
            let ka = full.indicator(a).unwrap();
            for name in ka.var_names() {
                let va = full.indicator_ser(a).unwrap().values(name).unwrap();
                let vb = step.indicator_ser(b).unwrap().values(name).unwrap();
                prop_assert!(same(va, vb), "{} {} differs", kind, name);
            }
        }
    }

    #[test]
    fn initial_weights_respect_the_bound(upstream in 1usize..64, seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = Neuron::new(upstream, Default::default(), &mut rng);
        let bound = 1.0 / ((upstream + 1) as f64).sqrt();
        prop_assert!(n.weights().iter().all(|w| w.abs() <= bound));
    }

    #[test]
    fn batch_gradient_is_the_sum_of_point_gradients(
        points in prop::collection::vec((prop::collection::vec(-1.0f64..1.0, 3), 0.0f64..1.0), 1..10),
        seed in any::<u64>(),
    ) {
        let mut net = Network::new(&NetworkConfig { inputs: 3, hidden: vec![4], outputs: 1, seed, ..NetworkConfig::default() }).unwrap();
        let mut expected: Vec<Vec<Vec<f64>>> = net
            .layers()
            .iter()
            .map(|l| l.neurons().iter().map(|n| vec![0.0; n.input_dimension()]).collect())
            .collect();

        for (input, target) in &points {
            net.predict(input).unwrap();
            net.backpropagate(&[*target]).unwrap();
            for (layer, acc) in net.layers().iter().zip(expected.iter_mut()) {
                for (n, acc) in layer.neurons().iter().zip(acc.iter_mut()) {
                    for (a, x) in acc.iter_mut().zip(n.input().iter()) {
                        *a += x * n.delta();
                    }
                }
            }
        }
        for (layer, acc) in net.layers().iter().zip(&expected) {
            for (n, acc) in layer.neurons().iter().zip(acc) {
                prop_assert_eq!(n.gradient().as_slice(), acc.as_slice());
            }
        }

        LearnerConfig::default().build().adapt(net.layers_mut());
        prop_assert!(net
            .layers()
            .iter()
            .all(|l| l.neurons().iter().all(|n| n.gradient().iter().all(|g| *g == 0.0))));
    }
}
