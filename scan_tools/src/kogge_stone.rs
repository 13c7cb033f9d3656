use crate::step::mult_step;

/// Strides of a Kogge-Stone scan over `lanes` values: 1, 2, 4, ... while
/// smaller than `lanes`.
///
/// The algorithm is step-efficient but not work-efficient, so it only pays
/// off over a handful of values, such as one total per worker.
pub fn strides(lanes: usize) -> impl Iterator<Item = usize> {
    mult_step(1, 2).take_while(move |&s| s < lanes)
}

/// The lane that `lane` combines with at `stride`, if it has one. The
/// partner's value is always the left operand.
pub fn partner(lane: usize, stride: usize) -> Option<usize> {
    lane.checked_sub(stride)
}

/// In-place inclusive Kogge-Stone scan, stepping every lane in lockstep the
/// way a team of workers separated by barriers would.
pub fn inclusive_kogge_stone_scan<T, E, F>(xys: &mut [T], op: F) -> Result<(), E>
where
    T: Clone,
    F: Fn(&T, &T) -> Result<T, E>,
{
    for stride in strides(xys.len()) {
        // Every lane reads the previous step before any lane writes.
        let previous = xys.to_vec();
        for lane in stride..xys.len() {
            xys[lane] = op(&previous[lane - stride], &previous[lane])?;
        }
    }

    Ok(())
}
