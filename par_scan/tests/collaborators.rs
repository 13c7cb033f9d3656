use par_scan::{
    density::DensityError,
    shuffle::{is_partitioned, local_group},
    redistribute, CpuEstimator, DensityEstimator,
};
use rand::{Rng, SeedableRng};
use rand_hc::Hc128Rng;
use std::thread;

fn hash(x: &i32) -> u64 {
    *x as u64
}

fn rank_data(rank: usize, per_rank: usize) -> Vec<i32> {
    let mut seed = [0u8; 32];
    seed[0] = 113 + rank as u8;
    let mut rng = Hc128Rng::from_seed(seed);
    (0..(rank + 1) * per_rank).map(|_| rng.gen_range(0..=256)).collect()
}

#[test]
fn shuffle_partitions_by_hash_and_loses_nothing() {
    let size = 4;
    let per_rank = 2_000;
    let group = local_group::<i32>(size);

    let received: Vec<Vec<i32>> = thread::scope(|scope| {
        let handles: Vec<_> = group
            .iter()
            .enumerate()
            .map(|(rank, comm)| {
                scope.spawn(move || redistribute(rank_data(rank, per_rank), hash, comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    for (rank, data) in received.iter().enumerate() {
        assert!(is_partitioned(data, hash, rank, size), "rank {rank}");
    }

    let mut sent: Vec<i32> = (0..size).flat_map(|r| rank_data(r, per_rank)).collect();
    let mut got: Vec<i32> = received.into_iter().flatten().collect();
    sent.sort_unstable();
    got.sort_unstable();
    assert_eq!(sent, got);
}

#[test]
fn shuffle_twice_in_a_row() {
    let size = 3;
    let group = local_group::<i32>(size);

    thread::scope(|scope| {
        for (rank, comm) in group.iter().enumerate() {
            scope.spawn(move || {
                let once = redistribute(rank_data(rank, 100), hash, comm).unwrap();
                let twice = redistribute(once.clone(), hash, comm).unwrap();
                let (mut once, mut twice) = (once, twice);
                once.sort_unstable();
                twice.sort_unstable();
                assert_eq!(once, twice);
            });
        }
    });
}

#[test]
fn density_through_the_trait_object() {
    let estimator: Box<dyn DensityEstimator> = Box::new(CpuEstimator);
    let mut rng = Hc128Rng::from_seed([7; 32]);
    let xs: Vec<f32> = (0..2_000).map(|_| rng.gen_range(-3.0..3.0)).collect();

    let ys = estimator.estimate_density(xs.len(), 0.25, &xs).unwrap();
    assert_eq!(ys.len(), xs.len());
    assert!(ys.iter().all(|&y| y.is_finite() && y > 0.0));

    // Uniform samples on [-3, 3] have density close to 1/6 away from the edges.
    let interior: Vec<f32> = xs
        .iter()
        .zip(&ys)
        .filter(|(x, _)| x.abs() < 2.0)
        .map(|(_, &y)| y)
        .collect();
    let mean = interior.iter().sum::<f32>() / interior.len() as f32;
    assert!((mean - 1.0 / 6.0).abs() < 0.02, "mean density {mean}");

    assert_eq!(
        estimator.estimate_density(1, -1.0, &xs),
        Err(DensityError::InvalidBandwidth(-1.0))
    );
}
