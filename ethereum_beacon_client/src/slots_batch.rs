use ethereum_common::Slot;

/// Iterator produces right open intervals of the specific size in forward direction.
pub struct Iter {
    slot_start: Slot,
    slot_end: Slot,
    batch_size: Slot,
}

impl Iter {
    pub fn new(slot_start: Slot, slot_end: Slot, batch_size: Slot) -> Option<Self> {
        if batch_size == 0 || slot_start >= slot_end {
            return None;
        }

        Some(Self {
            slot_start,
            slot_end,
            batch_size,
        })
    }
}

impl Iterator for Iter {
    // [slot_start; slot_end)
    type Item = (Slot, Slot);

    fn next(&mut self) -> Option<Self::Item> {
        if self.slot_start >= self.slot_end {
            return None;
        }

        let slot_start = self.slot_start;
        let slot_end = self
            .slot_start
            .saturating_add(self.batch_size)
            .min(self.slot_end);

        self.slot_start = slot_end;

        Some((slot_start, slot_end))
    }
}

#[test]
fn test_slots_batch_iterator() {
    assert!(Iter::new(3, 10, 0).is_none());
    assert!(Iter::new(3, 3, 2).is_none());
    assert!(Iter::new(10, 3, 2).is_none());

    let batches = Iter::new(3, 10, 1).unwrap().collect::<Vec<_>>();
    assert_eq!(batches.len(), 7);
    assert_eq!(batches.first(), Some(&(3, 4)));
    assert_eq!(batches.last(), Some(&(9, 10)));

    let mut iter = Iter::new(3, 10, 3).unwrap();

    // [3; 6), [6; 9), [9; 10)
    assert_eq!(iter.next(), Some((3, 6)));
    assert_eq!(iter.next(), Some((6, 9)));
    assert_eq!(iter.next(), Some((9, 10)));
    assert!(iter.next().is_none());

    let mut iter = Iter::new(92, 100, 8).unwrap();
    assert_eq!(iter.next(), Some((92, 100)));
    assert!(iter.next().is_none());
}
