//! Hash redistribution of elements across a group of ranks.
//!
//! Every rank sends each of its elements to rank `hash(x) % size`. Counts
//! are exchanged first so each rank knows how much it will receive, then
//! the elements themselves, mirroring an all-to-all / all-to-all-v pair.
//! [`local_group`] provides ranks that live in one process and talk over
//! shared memory.

use crate::scan::sequential_scan;
use itertools::Itertools;
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShuffleError {
    #[error("communicator group has no ranks")]
    EmptyGroup,

    #[error("expected {expected} counts, one per rank, got {actual}")]
    WrongGroupSize { expected: usize, actual: usize },

    #[error("rank {rank} expected {expected} elements, got {actual}")]
    CountMismatch {
        rank: usize,
        expected: usize,
        actual: usize,
    },
}

/// Collective exchange between the ranks of a group. Every rank must make
/// the same sequence of calls.
pub trait Communicator<T> {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Sends `counts[r]` to rank `r`. Returns the count each rank sent here,
    /// indexed by source rank.
    fn all_to_all_counts(&self, counts: &[usize]) -> Result<Vec<usize>, ShuffleError>;

    /// Sends the `send_counts[r]` elements of `send` starting at the
    /// exclusive prefix of `send_counts` to rank `r`. Returns everything
    /// received, ordered by source rank.
    fn all_to_all_v(
        &self,
        send: Vec<T>,
        send_counts: &[usize],
        recv_counts: &[usize],
    ) -> Result<Vec<T>, ShuffleError>;
}

/// Redistributes `data` so that this rank ends up with exactly the elements
/// of the whole group for which `hash(x) % size == rank`.
pub fn redistribute<T, H, C>(mut data: Vec<T>, hash: H, comm: &C) -> Result<Vec<T>, ShuffleError>
where
    H: Fn(&T) -> u64,
    C: Communicator<T> + ?Sized,
{
    let size = comm.size();
    if size == 0 {
        return Err(ShuffleError::EmptyGroup);
    }
    let destination = |x: &T| (hash(x) % size as u64) as usize;

    let mut send_counts = vec![0usize; size];
    for x in &data {
        send_counts[destination(x)] += 1;
    }
    data.sort_by_cached_key(|x| destination(x));

    let recv_counts = comm.all_to_all_counts(&send_counts)?;
    let received = comm.all_to_all_v(data, &send_counts, &recv_counts)?;
    debug!(
        rank = comm.rank(),
        sent = send_counts.iter().sum::<usize>(),
        received = received.len(),
        "redistributed"
    );
    Ok(received)
}

/// True if every element of `data` belongs on `rank`.
pub fn is_partitioned<T, H>(data: &[T], hash: H, rank: usize, size: usize) -> bool
where
    H: Fn(&T) -> u64,
{
    size > 0 && data.iter().all(|x| (hash(x) % size as u64) as usize == rank)
}

/// Start index of each run of `counts` laid end to end.
pub fn exclusive_offsets(counts: &[usize]) -> Vec<usize> {
    let mut ends = vec![0; counts.len()];
    sequential_scan(counts, &mut ends, |a, b| a + b);
    let mut offsets = Vec::with_capacity(counts.len());
    offsets.push(0);
    offsets.extend(ends.iter().copied().dropping_back(1));
    offsets.truncate(counts.len());
    offsets
}

struct Exchange<T> {
    size: usize,
    barrier: Barrier,
    /// `counts[source][destination]`.
    counts: Mutex<Vec<Vec<usize>>>,
    /// `mailbox[destination][source]`.
    mailbox: Mutex<Vec<Vec<Option<Vec<T>>>>>,
}

/// One rank of an in-process group. Each rank is meant to be driven from
/// its own thread.
pub struct LocalCommunicator<T> {
    rank: usize,
    exchange: Arc<Exchange<T>>,
}

/// `size` connected ranks, index `r` being rank `r`.
pub fn local_group<T>(size: usize) -> Vec<LocalCommunicator<T>> {
    let exchange = Arc::new(Exchange {
        size,
        barrier: Barrier::new(size.max(1)),
        counts: Mutex::new(vec![vec![0; size]; size]),
        mailbox: Mutex::new((0..size).map(|_| (0..size).map(|_| None).collect()).collect()),
    });

    (0..size)
        .map(|rank| LocalCommunicator {
            rank,
            exchange: Arc::clone(&exchange),
        })
        .collect()
}

impl<T> LocalCommunicator<T> {
    fn check_group_size(&self, counts: &[usize]) -> Result<(), ShuffleError> {
        if counts.len() == self.exchange.size {
            Ok(())
        } else {
            Err(ShuffleError::WrongGroupSize {
                expected: self.exchange.size,
                actual: counts.len(),
            })
        }
    }
}

// Every method reaches every barrier even when its own arguments are bad,
// otherwise the other ranks would block forever.
impl<T: Send> Communicator<T> for LocalCommunicator<T> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.exchange.size
    }

    fn all_to_all_counts(&self, counts: &[usize]) -> Result<Vec<usize>, ShuffleError> {
        let checked = self.check_group_size(counts);
        if checked.is_ok() {
            self.exchange.counts.lock()[self.rank].copy_from_slice(counts);
        }
        self.exchange.barrier.wait();

        let received: Vec<usize> = self
            .exchange
            .counts
            .lock()
            .iter()
            .map(|row| row[self.rank])
            .collect();
        self.exchange.barrier.wait();

        checked.map(|()| received)
    }

    fn all_to_all_v(
        &self,
        mut send: Vec<T>,
        send_counts: &[usize],
        recv_counts: &[usize],
    ) -> Result<Vec<T>, ShuffleError> {
        let size = self.exchange.size;
        let mut checked = self
            .check_group_size(send_counts)
            .and_then(|()| self.check_group_size(recv_counts));

        let sent: usize = send_counts.iter().sum();
        if checked.is_ok() && sent != send.len() {
            checked = Err(ShuffleError::CountMismatch {
                rank: self.rank,
                expected: sent,
                actual: send.len(),
            });
        }

        if checked.is_ok() {
            let offsets = exclusive_offsets(send_counts);
            let mut mailbox = self.exchange.mailbox.lock();
            for destination in (0..size).rev() {
                mailbox[destination][self.rank] = Some(send.split_off(offsets[destination]));
            }
        }
        self.exchange.barrier.wait();

        let pieces: Vec<Option<Vec<T>>> = {
            let mut mailbox = self.exchange.mailbox.lock();
            mailbox[self.rank].iter_mut().map(Option::take).collect()
        };
        self.exchange.barrier.wait();
        checked?;

        let offsets = exclusive_offsets(recv_counts);
        let total = offsets.last().copied().unwrap_or(0) + recv_counts.last().copied().unwrap_or(0);
        let mut received = Vec::with_capacity(total);
        for (source, piece) in pieces.into_iter().enumerate() {
            let piece = piece.unwrap_or_default();
            if piece.len() != recv_counts[source] {
                return Err(ShuffleError::CountMismatch {
                    rank: source,
                    expected: recv_counts[source],
                    actual: piece.len(),
                });
            }
            debug_assert_eq!(received.len(), offsets[source]);
            received.extend(piece);
        }

        Ok(received)
    }
}
