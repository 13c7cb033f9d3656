//! Sequential primitives run by a single worker over its own section.
//!
//! Every operator is fallible and takes its operands by reference: the left
//! operand is always the accumulated prefix, the right operand the next
//! input element. Nothing here assumes the operator commutes.

/// Inclusive scan of `xs` into `ys`.
///
/// Writes `min(xs.len(), ys.len())` elements. On error the written prefix
/// is left as is and the error is returned.
pub fn inclusive_scan<T, E, F>(xs: &[T], ys: &mut [T], op: F) -> Result<(), E>
where
    T: Clone,
    F: Fn(&T, &T) -> Result<T, E>,
{
    let len = xs.len().min(ys.len());
    if len == 0 {
        return Ok(());
    }

    ys[0] = xs[0].clone();
    for i in 1..len {
        ys[i] = op(&ys[i - 1], &xs[i])?;
    }

    Ok(())
}

/// Inclusive scan of `xs` into `ys` where everything is prefixed by `carry`:
/// `ys[0] = carry op xs[0]`, `ys[i] = ys[i-1] op xs[i]`.
pub fn seeded_inclusive_scan<T, E, F>(carry: &T, xs: &[T], ys: &mut [T], op: F) -> Result<(), E>
where
    F: Fn(&T, &T) -> Result<T, E>,
{
    let len = xs.len().min(ys.len());
    if len == 0 {
        return Ok(());
    }

    ys[0] = op(carry, &xs[0])?;
    for i in 1..len {
        ys[i] = op(&ys[i - 1], &xs[i])?;
    }

    Ok(())
}

/// Left fold of `xs`, i.e. the last element its inclusive scan would have.
/// `None` for an empty slice.
pub fn fold<T, E, F>(xs: &[T], op: F) -> Result<Option<T>, E>
where
    T: Clone,
    F: Fn(&T, &T) -> Result<T, E>,
{
    let Some((first, rest)) = xs.split_first() else {
        return Ok(None);
    };

    let mut accumulator = first.clone();
    for x in rest {
        accumulator = op(&accumulator, x)?;
    }

    Ok(Some(accumulator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn add(a: &u64, b: &u64) -> Result<u64, Infallible> {
        Ok(a + b)
    }

    fn concat(a: &u64, b: &u64) -> Result<u64, Infallible> {
        Ok(a * 10 + b)
    }

    #[test]
    fn scan_sums() {
        let xs = [1, 2, 3, 4, 5];
        let mut ys = [0u64; 5];
        inclusive_scan(&xs, &mut ys, add).unwrap();
        assert_eq!(ys, [1, 3, 6, 10, 15]);
    }

    #[test]
    fn scan_stops_at_shorter_slice() {
        let xs = [1, 2, 3, 4, 5];
        let mut ys = [0u64; 3];
        inclusive_scan(&xs, &mut ys, add).unwrap();
        assert_eq!(ys, [1, 3, 6]);
    }

    #[test]
    fn seeded_keeps_carry_on_the_left() {
        let xs = [3, 4];
        let mut ys = [0u64; 2];
        seeded_inclusive_scan(&12, &xs, &mut ys, concat).unwrap();
        assert_eq!(ys, [123, 1234]);
    }

    #[test]
    fn fold_matches_last_scan_value() {
        let xs = [1, 2, 3, 4];
        let mut ys = [0u64; 4];
        inclusive_scan(&xs, &mut ys, concat).unwrap();
        assert_eq!(fold(&xs, concat).unwrap(), Some(ys[3]));
        assert_eq!(fold(&[] as &[u64], concat).unwrap(), None);
    }

    #[test]
    fn error_stops_the_scan() {
        let xs = [1u64, 2, 3, 4];
        let mut ys = [0u64; 4];
        let result = inclusive_scan(&xs, &mut ys, |a: &u64, b: &u64| {
            if *b == 3 {
                Err("three")
            } else {
                Ok(a + b)
            }
        });
        assert_eq!(result, Err("three"));
        assert_eq!(ys[..2], [1, 3]);
    }
}
