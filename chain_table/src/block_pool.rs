/// Position of a slot inside a [`BlockPool`].
///
/// Slots never move once allocated, so a reference stays valid until the pool is cleared.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SlotRef {
    block: u32,
    index: u32,
}

/// Intrusive link used both for bucket chains and for the free list.
pub type Link = Option<SlotRef>;

#[derive(Clone, Debug)]
pub struct Slot<T> {
    item: Option<T>,
    pub next: Link,
}

impl<T> Slot<T> {
    /// Returns the item stored in a slot that is linked into a bucket chain.
    #[inline(always)]
    pub fn occupied(&self) -> &T {
        match &self.item {
            Some(item) => item,
            None => unreachable!("chained slot without an item"),
        }
    }

    #[inline(always)]
    pub fn occupied_mut(&mut self) -> &mut T {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("chained slot without an item"),
        }
    }
}

/// Storage for container entries, allocated in blocks and recycled through a free list.
#[derive(Clone, Debug)]
pub struct BlockPool<T> {
    blocks: Vec<Box<[Slot<T>]>>,
    free: Link,
    capacity: usize,
}

impl<T> Default for BlockPool<T> {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            free: None,
            capacity: 0,
        }
    }
}

impl<T> BlockPool<T> {
    /// Adds a block of `size` vacant slots in front of the free list.
    pub fn allocate_block(&mut self, size: usize) {
        assert!(size > 0, "blocks must contain at least one slot");
        let block = u32::try_from(self.blocks.len()).expect("too many blocks");
        let size_u32 = u32::try_from(size).expect("block too large");

        let slots = (0..size_u32)
            .map(|index| Slot {
                item: None,
                next: if index + 1 < size_u32 {
                    Some(SlotRef {
                        block,
                        index: index + 1,
                    })
                } else {
                    self.free
                },
            })
            .collect();

        self.blocks.push(slots);
        self.free = Some(SlotRef { block, index: 0 });
        self.capacity += size;
    }

    #[inline(always)]
    pub fn is_exhausted(&self) -> bool {
        self.free.is_none()
    }

    /// Takes a slot off the free list and stores `item` in it.
    ///
    /// The returned slot's `next` link is left for the caller to set.
    #[inline]
    pub fn acquire(&mut self, item: T) -> Option<SlotRef> {
        let slot_ref = self.free?;
        let slot = self.slot_mut(slot_ref);
        let next_free = slot.next;
        slot.item = Some(item);
        self.free = next_free;
        Some(slot_ref)
    }

    /// Moves the item out of a slot and pushes the slot onto the free list.
    ///
    /// The slot must already be unlinked from its bucket chain.
    #[inline]
    pub fn release(&mut self, slot_ref: SlotRef) -> T {
        let free = self.free;
        let slot = self.slot_mut(slot_ref);
        let item = match slot.item.take() {
            Some(item) => item,
            None => unreachable!("released a vacant slot"),
        };
        slot.next = free;
        self.free = Some(slot_ref);
        item
    }

    #[inline(always)]
    pub fn slot(&self, slot_ref: SlotRef) -> &Slot<T> {
        &self.blocks[slot_ref.block as usize][slot_ref.index as usize]
    }

    #[inline(always)]
    pub fn slot_mut(&mut self, slot_ref: SlotRef) -> &mut Slot<T> {
        &mut self.blocks[slot_ref.block as usize][slot_ref.index as usize]
    }

    /// Returns all occupied items in storage order.
    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.blocks
            .iter_mut()
            .flat_map(|block| block.iter_mut())
            .filter_map(|slot| slot.item.as_mut())
    }

    /// Total number of slots over all blocks, occupied or not.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    #[cfg(test)]
    pub fn count_free(&self) -> usize {
        let mut count = 0;
        let mut link = self.free;
        while let Some(slot_ref) = link {
            let slot = self.slot(slot_ref);
            assert!(slot.item.is_none(), "occupied slot on the free list");
            count += 1;
            link = slot.next;
        }
        count
    }

    /// Releases every block at once.
    pub fn free_all(&mut self) {
        self.blocks.clear();
        self.free = None;
        self.capacity = 0;
    }
}
