//! Generation-checked handle registry
//!
//! Predictors live in slots addressed by an integer handle that fits the
//! boundary. A handle packs the slot index (low 32 bits) with the slot
//! generation (high 32 bits). Releasing a slot bumps its generation, so a
//! released handle can never reach the predictor that later reuses the slot.

use crate::error::OcrError;

/// Opaque predictor handle. Zero is the null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Handle(u64);

impl Handle {
    pub const NULL: Handle = Handle(0);

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn into_raw(self) -> u64 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | index as u64)
    }

    fn index(&self) -> usize {
        (self.0 & 0xFFFF_FFFF) as usize
    }

    fn generation(&self) -> u32 {
        (self.0 >> 32) as u32
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena of values addressed by [`Handle`]
pub struct HandleRegistry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store a value and return its handle. Never returns [`Handle::NULL`].
    pub fn insert(&mut self, value: T) -> Result<Handle, OcrError> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).map_err(|_| {
                    OcrError::Internal("handle registry is full".to_string())
                })?;
                self.slots.push(Slot {
                    generation: 1,
                    value: None,
                });
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        self.live += 1;
        Ok(Handle::new(index, slot.generation))
    }

    pub fn get(&self, handle: Handle) -> Result<&T, OcrError> {
        if handle.is_null() {
            return Err(OcrError::NullHandle);
        }
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_ref())
            .ok_or(OcrError::StaleHandle(handle.into_raw()))
    }

    /// Take the value out; the handle becomes stale
    pub fn remove(&mut self, handle: Handle) -> Result<T, OcrError> {
        if handle.is_null() {
            return Err(OcrError::NullHandle);
        }
        let slot = self
            .slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .ok_or(OcrError::StaleHandle(handle.into_raw()))?;
        let value = slot
            .value
            .take()
            .ok_or(OcrError::StaleHandle(handle.into_raw()))?;

        // Generation 0 is skipped so a live handle is never zero
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(handle.index() as u32);
        self.live -= 1;
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
