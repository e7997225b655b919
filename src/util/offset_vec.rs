use std::fmt::{Debug, Formatter};
use std::slice::Iter;

/// Elements with a logical "width" (eg. when stored in an [`OffsetVec`])
pub trait Width {
    fn width(&self) -> usize;
}

/// A vector addressed by the running sum of element widths instead of by
/// element count.
///
/// The JVM constant pool is the motivating case: entries are referenced by a
/// 1-based index where `Long` and `Double` entries consume two slots, so the
/// index of an entry is the total width of everything before it, not its
/// position.
#[derive(Clone)]
pub struct OffsetVec<T> {
    entries: Vec<(Offset, T)>,

    /// Offset at which the next element will land
    offset_len: Offset,

    /// Offset of the first element (0 for code arrays, 1 for constant pools)
    initial_offset: Offset,
}

/// Offset into an [`OffsetVec`]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl<T: Width> OffsetVec<T> {
    pub fn new() -> OffsetVec<T> {
        OffsetVec::new_starting_at(Offset(0))
    }

    pub fn new_starting_at(initial_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: initial_offset,
            initial_offset,
        }
    }

    /// Number of entries (not the summed width)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset the next pushed element would receive
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    pub fn initial_offset(&self) -> Offset {
        self.initial_offset
    }

    /// Add an entry to the back, returning the offset it was assigned
    pub fn push(&mut self, elem: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += elem.width();
        self.entries.push((offset, elem));
        offset
    }

    /// Look up an entry by its offset
    ///
    /// Returns `None` if the offset is past the end or falls in the middle of
    /// a wide element. Uses binary search.
    pub fn get_offset(&self, offset: Offset) -> Option<&T> {
        match self.entries.binary_search_by_key(&offset, |(off, _)| *off) {
            Ok(idx) => Some(&self.entries[idx].1),
            Err(_) => None,
        }
    }

    pub fn iter(&self) -> OffsetVecIter<'_, T> {
        OffsetVecIter(self.entries.iter())
    }
}

impl<T: Width> Default for OffsetVec<T> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

impl<T: PartialEq> PartialEq for OffsetVec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<T: Eq> Eq for OffsetVec<T> {}

impl<T: Width> FromIterator<T> for OffsetVec<T> {
    fn from_iter<A: IntoIterator<Item = T>>(elems: A) -> Self {
        let mut offset_vec = OffsetVec::new();
        for elem in elems {
            offset_vec.push(elem);
        }
        offset_vec
    }
}

pub struct OffsetVecIter<'a, T>(Iter<'a, (Offset, T)>);

impl<'a, T> Iterator for OffsetVecIter<'a, T> {
    type Item = (Offset, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(off, elem)| (*off, elem))
    }
}

impl<'a, T> IntoIterator for &'a OffsetVec<T> {
    type Item = (Offset, &'a T);
    type IntoIter = OffsetVecIter<'a, T>;

    fn into_iter(self) -> OffsetVecIter<'a, T> {
        OffsetVecIter(self.entries.iter())
    }
}

impl<T: Debug> Debug for OffsetVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for (off, elem) in &self.entries {
            list.entry(&format_args!("#{} = {:?}", off.0, elem));
        }
        list.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Slot {
        Narrow(u8),
        Wide(u8),
    }

    impl Width for Slot {
        fn width(&self) -> usize {
            match self {
                Slot::Narrow(_) => 1,
                Slot::Wide(_) => 2,
            }
        }
    }

    #[test]
    fn offsets_accumulate_widths() {
        let slots: OffsetVec<Slot> = vec![
            Slot::Narrow(1),
            Slot::Wide(2),
            Slot::Narrow(3),
            Slot::Wide(4),
        ]
        .into_iter()
        .collect();

        let collected: Vec<(Offset, Slot)> = slots.iter().map(|(off, s)| (off, *s)).collect();
        assert_eq!(
            collected,
            vec![
                (Offset(0), Slot::Narrow(1)),
                (Offset(1), Slot::Wide(2)),
                (Offset(3), Slot::Narrow(3)),
                (Offset(4), Slot::Wide(4)),
            ]
        );
        assert_eq!(slots.offset_len(), Offset(6));
    }

    #[test]
    fn one_based_start_and_mid_element_lookups() {
        let mut slots: OffsetVec<Slot> = OffsetVec::new_starting_at(Offset(1));
        slots.push(Slot::Wide(9));
        slots.push(Slot::Narrow(7));

        assert_eq!(slots.get_offset(Offset(1)), Some(&Slot::Wide(9)));
        assert_eq!(slots.get_offset(Offset(2)), None);
        assert_eq!(slots.get_offset(Offset(3)), Some(&Slot::Narrow(7)));
        assert_eq!(slots.get_offset(Offset(4)), None);
    }
}
