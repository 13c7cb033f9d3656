use par_scan::{sequential_scan, CarryStrategy, ScanConfig, Scanner};
use proptest::{collection::vec, prelude::*};

/// `x -> a * x + b`. Composition is associative but not commutative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Affine {
    a: u64,
    b: u64,
}

/// Apply `f` then `g`.
fn then(f: &Affine, g: &Affine) -> Affine {
    Affine {
        a: f.a.wrapping_mul(g.a),
        b: f.b.wrapping_mul(g.a).wrapping_add(g.b),
    }
}

fn arb_affine() -> impl Strategy<Value = Affine> {
    (any::<u64>(), any::<u64>()).prop_map(|(a, b)| Affine { a, b })
}

fn arb_carry() -> impl Strategy<Value = CarryStrategy> {
    prop_oneof![Just(CarryStrategy::Sequential), Just(CarryStrategy::LogDepth)]
}

fn scanner(workers: usize, carry: CarryStrategy) -> Scanner {
    Scanner::new(ScanConfig::default().with_workers(workers).with_carry(carry))
}

proptest! {
    #[test]
    fn sums_match_sequential(
        xs in vec(any::<u64>(), 0..700),
        workers in 0usize..10,
        carry in arb_carry(),
    ) {
        let add = |a: &u64, b: &u64| a.wrapping_add(*b);
        let mut expected = vec![0; xs.len()];
        sequential_scan(&xs, &mut expected, add);

        let mut ys = vec![0; xs.len()];
        scanner(workers, carry).scan(xs.len(), &xs, &mut ys, add).unwrap();
        prop_assert_eq!(ys, expected);
    }

    #[test]
    fn composition_order_is_preserved(
        xs in vec(arb_affine(), 0..400),
        workers in 0usize..9,
        carry in arb_carry(),
    ) {
        let mut expected = vec![Affine::default(); xs.len()];
        sequential_scan(&xs, &mut expected, then);

        let mut ys = vec![Affine::default(); xs.len()];
        scanner(workers, carry).scan(xs.len(), &xs, &mut ys, then).unwrap();
        prop_assert_eq!(ys, expected);
    }

    #[test]
    fn prefix_of_longer_buffers(
        xs in vec(any::<u32>(), 1..300),
        extra in 0usize..20,
        workers in 1usize..6,
        cut in any::<prop::sample::Index>(),
    ) {
        let n = cut.index(xs.len() + 1);
        let min = |a: &u32, b: &u32| *a.min(b);
        let mut expected = vec![0; n];
        sequential_scan(&xs[..n], &mut expected, min);

        let mut ys = vec![u32::MAX; xs.len() + extra];
        par_scan::scan(n, &xs, &mut ys, min, workers).unwrap();
        prop_assert_eq!(&ys[..n], &expected[..]);
        prop_assert!(ys[n..].iter().all(|&y| y == u32::MAX));
    }

    #[test]
    fn strings_concatenate_left_to_right(
        words in vec("[a-z]{0,3}", 0..120),
        workers in 0usize..7,
    ) {
        let concat = |a: &String, b: &String| format!("{a}{b}");
        let mut ys = vec![String::new(); words.len()];
        par_scan::scan(words.len(), &words, &mut ys, concat, workers).unwrap();

        let mut running = String::new();
        for (word, y) in words.iter().zip(&ys) {
            running.push_str(word);
            prop_assert_eq!(y, &running);
        }
    }
}
