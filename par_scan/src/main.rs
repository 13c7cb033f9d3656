use par_scan::{sequential_scan, ScanConfig, Scanner};
use rand::{Rng, SeedableRng};
use rand_hc::Hc128Rng;
use std::{error::Error, time::Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SEED: &[u8; 32] = b"Ps7dVq2LmX9cRt4WbN0yKe6HjA1uZf8G";

const LEN: usize = 10_000_000;

pub fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ScanConfig::from_env()?;
    let scanner = Scanner::new(config);
    let plan = scanner.plan(LEN);
    info!(?plan, carry = ?scanner.config().carry, "scan plan");

    let mut rng = Hc128Rng::from_seed(*SEED);
    let xs: Vec<u64> = (0..LEN).map(|_| rng.gen_range(0..=256)).collect();

    let mut expected = vec![0u64; LEN];
    let now = Instant::now();
    sequential_scan(&xs, &mut expected, |a, b| a.wrapping_add(*b));
    println!("sequential:\t{:.2?}", now.elapsed());

    let mut ys = vec![0u64; LEN];
    let now = Instant::now();
    scanner.scan(LEN, &xs, &mut ys, |a, b| a.wrapping_add(*b))?;
    println!("two-phase:\t{:.2?} ({} workers)", now.elapsed(), plan.workers);

    println!("xs: {:?}...", &xs[..8]);
    println!("ys: {:?}...", &ys[..8]);
    let verdict = verify(&ys, &expected);
    println!("{}", if verdict.is_ok() { "pass" } else { "fail" });

    verdict
}

/// `Err` naming the first index where `ys` departs from `expected`.
fn verify(ys: &[u64], expected: &[u64]) -> Result<(), Box<dyn Error>> {
    if ys.len() != expected.len() {
        return Err(format!("got {} values, expected {}", ys.len(), expected.len()).into());
    }
    match ys.iter().zip(expected).position(|(y, e)| y != e) {
        Some(i) => Err(format!("value {i} is {}, expected {}", ys[i], expected[i]).into()),
        None => Ok(()),
    }
}
