use std::ops::Range;

use crate::error::{DfsError, Result};

/// Number of the record that holds byte `offset`. Records are numbered from 1.
pub fn record_number(offset: u64, record_size: u32) -> u64 {
    offset / record_size as u64 + 1
}

/// Index of the peer that owns `record`.
pub fn owner_index(record: u64, peer_count: usize) -> usize {
    (record % peer_count as u64) as usize
}

/// One record of a striped request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSlice {
    pub record: u64,
    pub peer: usize,
    /// Absolute offset of the record inside the logical file.
    pub offset: u64,
    /// Bytes of the caller's buffer that belong to this record.
    pub range: Range<usize>,
}

/// Largest number of bytes a single read or write may span.
pub const MAX_REQUEST_BYTES: u64 = 64 * 1024 * 1024;

/// The records of one request, yielded in file order.
///
/// Slices are produced on demand, so a plan costs the same no matter how many
/// records it covers.
#[derive(Debug, Clone)]
pub struct RecordPlan {
    first: u64,
    offset: u64,
    record_size: u32,
    peer_count: usize,
    next: u64,
    records: u64,
}

impl RecordPlan {
    /// Records not yet yielded.
    pub fn remaining(&self) -> u64 {
        self.records - self.next
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Each distinct owner of the plan with the first record it holds, in record
    /// order. At most `peer_count` entries.
    pub fn owners(&self) -> Vec<(usize, u64)> {
        let owned = self.records.min(self.peer_count as u64);
        (0..owned)
            .map(|i| {
                let record = self.first + i;
                (owner_index(record, self.peer_count), record)
            })
            .collect()
    }
}

impl Iterator for RecordPlan {
    type Item = RecordSlice;

    fn next(&mut self) -> Option<RecordSlice> {
        if self.next >= self.records {
            return None;
        }

        let i = self.next;
        self.next += 1;

        let size = self.record_size as u64;
        let record = self.first + i;
        let start = (i * size) as usize;
        Some(RecordSlice {
            record,
            peer: owner_index(record, self.peer_count),
            offset: self.offset + i * size,
            range: start..start + self.record_size as usize,
        })
    }
}

/// Splits `length` bytes starting at `offset` into per-record slices.
///
/// `length` must be a whole number of records and at most `MAX_REQUEST_BYTES`.
/// An empty request yields no slices.
pub fn plan(offset: u64, length: u64, record_size: u32, peer_count: usize) -> Result<RecordPlan> {
    if record_size == 0 {
        return Err(DfsError::misaligned("record size is zero"));
    }
    if peer_count == 0 {
        return Err(DfsError::NotReady);
    }
    if length > MAX_REQUEST_BYTES {
        return Err(DfsError::RequestTooLarge {
            size: length,
            limit: MAX_REQUEST_BYTES,
        });
    }

    let size = record_size as u64;
    if length % size != 0 {
        return Err(DfsError::misaligned(format!(
            "length {} is not a multiple of the record size {}",
            length, record_size
        )));
    }

    Ok(RecordPlan {
        first: record_number(offset, record_size),
        offset,
        record_size,
        peer_count,
        next: 0,
        records: length / size,
    })
}
