use crate::{
    error::{OperatorError, ScanError},
    team::{Failures, Member},
};
use parking_lot::Mutex;
use scan_tools::kogge_stone::{partner, strides};

/// Per-section totals, turned in place into running prefixes.
///
/// Slot `k` starts as the total of section `k` and, once propagated, holds
/// the fold of sections `0..=k`. That value is the carry worker `k` applies
/// to section `k + 1`. A slot is empty only if its worker failed, which the
/// engine reports on its own.
pub struct CarryTable<T> {
    slots: Vec<Mutex<Option<T>>>,
}

impl<T: Clone> CarryTable<T> {
    pub fn try_new(workers: usize) -> Result<Self, ScanError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(workers)
            .map_err(|_| ScanError::CarryAllocation { workers })?;
        slots.extend((0..workers).map(|_| Mutex::new(None)));
        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn publish(&self, k: usize, value: T) {
        *self.slots[k].lock() = Some(value);
    }

    pub fn get(&self, k: usize) -> Option<T> {
        self.slots[k].lock().clone()
    }

    /// Left-to-right fold of the totals on the calling thread.
    pub fn propagate_sequential<O>(&self, op: &O) -> Result<(), OperatorError>
    where
        O: Fn(&T, &T) -> Result<T, OperatorError>,
    {
        let Some((first, rest)) = self.slots.split_first() else {
            return Ok(());
        };
        let Some(mut partial) = first.lock().clone() else {
            return Ok(());
        };

        for slot in rest {
            let mut total = slot.lock();
            let Some(section_total) = total.as_ref() else {
                return Ok(());
            };
            partial = op(&partial, section_total)?;
            *total = Some(partial.clone());
        }

        Ok(())
    }

    /// Kogge-Stone scan of the totals with `member` owning lane
    /// `member.id()`. Every member must call this; each step is
    /// compute, barrier, publish, barrier.
    pub fn propagate_log_depth<O>(&self, member: &Member<'_>, op: &O, failures: &Failures)
    where
        O: Fn(&T, &T) -> Result<T, OperatorError>,
    {
        debug_assert_eq!(member.size(), self.len());
        let lane = member.id();

        for stride in strides(self.len()) {
            let combined = partner(lane, stride).and_then(|left| {
                failures
                    .guard(Some(lane), || match (self.get(left), self.get(lane)) {
                        (Some(prefix), Some(own)) => op(&prefix, &own).map(Some),
                        _ => Ok(None),
                    })
                    .flatten()
            });

            member.barrier();
            if let Some(value) = combined {
                self.publish(lane, value);
            }
            member.barrier();
        }
    }
}
