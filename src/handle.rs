//! Stable integer handles into slot-recycling resource pools.

/// Sentinel index that never names a live slot.
pub const INVALID_HANDLE: usize = usize::MAX;

macro_rules! define_handle {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
		pub struct $name(pub usize);

		impl $name {
			pub const INVALID: Self = Self(INVALID_HANDLE);

			pub fn index(self) -> usize {
				self.0
			}

			pub fn is_invalid(self) -> bool {
				self.0 == INVALID_HANDLE
			}
		}

		impl Default for $name {
			fn default() -> Self {
				Self::INVALID
			}
		}
	};
}

define_handle!(
	/// Handle to an uploaded mesh.
	MeshHandle
);
define_handle!(
	/// Handle to a linked shader program.
	ShaderHandle
);
define_handle!(
	/// Handle to a texture, including font atlases.
	TextureHandle
);
define_handle!(
	/// Handle to a virtual font (glyph table + atlas).
	FontHandle
);

/// A growable array of slots plus a stack of dead indices.
///
/// A slot keeps its index for its whole lifetime. Released indices are pushed on
/// the dead stack and handed out again before the array grows. An index is on the
/// dead stack exactly when its slot is empty.
#[derive(Debug)]
pub struct SlotPool<T> {
	slots: Vec<Option<T>>,
	dead: Vec<usize>,
}

impl<T> Default for SlotPool<T> {
	fn default() -> Self {
		Self {
			slots: Vec::new(),
			dead: Vec::new(),
		}
	}
}

impl<T> SlotPool<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores `value` in a recycled slot if one is dead, otherwise in a new slot.
	pub fn insert(&mut self, value: T) -> usize {
		match self.dead.pop() {
			Some(index) => {
				debug_assert!(self.slots[index].is_none(), "dead slot {} is populated", index);
				self.slots[index] = Some(value);
				index
			}
			None => {
				self.slots.push(Some(value));
				self.slots.len() - 1
			}
		}
	}

	/// Empties the slot and returns its value so the caller can tear it down.
	///
	/// Out-of-range and already dead indices are ignored.
	pub fn release(&mut self, index: usize) -> Option<T> {
		let value = self.slots.get_mut(index)?.take()?;
		self.dead.push(index);
		Some(value)
	}

	pub fn get(&self, index: usize) -> Option<&T> {
		self.slots.get(index)?.as_ref()
	}

	pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
		self.slots.get_mut(index)?.as_mut()
	}

	pub fn is_dead(&self, index: usize) -> bool {
		self.dead.contains(&index)
	}

	/// Total number of slots, live or dead.
	pub fn slot_count(&self) -> usize {
		self.slots.len()
	}

	pub fn live_count(&self) -> usize {
		self.slots.len() - self.dead.len()
	}

	pub fn dead_indices(&self) -> &[usize] {
		&self.dead
	}

	pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
		self.slots
			.iter()
			.enumerate()
			.filter_map(|(index, slot)| slot.as_ref().map(|value| (index, value)))
	}

	/// Empties every slot, yielding the live values.
	pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
		self.dead.clear();
		self.slots.drain(..).flatten()
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use super::*;

	fn assert_partition(pool: &SlotPool<u32>) {
		let live: BTreeSet<usize> = pool.iter().map(|(index, _)| index).collect();
		let dead: BTreeSet<usize> = pool.dead_indices().iter().copied().collect();

		assert_eq!(dead.len(), pool.dead_indices().len(), "duplicate index on dead stack");
		assert!(live.is_disjoint(&dead));
		let all: BTreeSet<usize> = live.union(&dead).copied().collect();
		assert_eq!(all, (0..pool.slot_count()).collect());
	}

	#[test]
	fn insert_appends_when_nothing_is_dead() {
		let mut pool = SlotPool::new();
		assert_eq!(pool.insert(10), 0);
		assert_eq!(pool.insert(11), 1);
		assert_eq!(pool.slot_count(), 2);
		assert_eq!(pool.get(1), Some(&11));
	}

	#[test]
	fn released_index_is_reused_first() {
		let mut pool = SlotPool::new();
		pool.insert(1);
		pool.insert(2);
		pool.insert(3);

		assert_eq!(pool.release(1), Some(2));
		assert!(pool.is_dead(1));
		assert_eq!(pool.get(1), None);

		assert_eq!(pool.insert(4), 1);
		assert!(!pool.is_dead(1));
		assert_eq!(pool.slot_count(), 3);
	}

	#[test]
	fn release_is_idempotent() {
		let mut pool = SlotPool::new();
		pool.insert(1);
		pool.insert(2);

		assert!(pool.release(0).is_some());
		assert!(pool.release(0).is_none());
		assert!(pool.release(7).is_none());
		assert!(pool.release(INVALID_HANDLE).is_none());

		assert_eq!(pool.dead_indices(), &[0]);
		assert_eq!(pool.live_count(), 1);
		assert_partition(&pool);
	}

	#[test]
	fn out_of_range_is_not_dead() {
		let pool = SlotPool::<u32>::new();
		assert!(!pool.is_dead(0));
		assert!(!pool.is_dead(INVALID_HANDLE));
	}

	#[test]
	fn live_and_dead_partition_holds_under_churn() {
		let mut pool = SlotPool::new();
		// Deterministic pseudo-random sequence of inserts and releases.
		let mut state = 0x2545_f491_u32;
		for step in 0..500 {
			state ^= state << 13;
			state ^= state >> 17;
			state ^= state << 5;

			if state % 3 == 0 && pool.slot_count() > 0 {
				let index = (state as usize / 3) % (pool.slot_count() + 2);
				pool.release(index);
			} else {
				pool.insert(step);
			}
			assert_partition(&pool);
		}
	}

	#[test]
	fn invalid_handles_are_sentinels() {
		assert!(MeshHandle::INVALID.is_invalid());
		assert!(!ShaderHandle(0).is_invalid());
		assert_eq!(TextureHandle::default(), TextureHandle::INVALID);
		assert_eq!(FontHandle::INVALID.index(), usize::MAX);
	}
}
