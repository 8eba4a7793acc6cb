use super::TextureResource;

/// Stable reference to a texture in a [`TextureStore`].
///
/// A handle stays valid until its texture is deleted; the slot may then be
/// reused, but the bumped generation makes stale handles resolve to nothing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    index: u32,
    generation: u32,
}

impl TextureHandle {
    pub fn index(&self) -> u32 {
        self.index
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    value: Option<TextureResource>,
}

/// Arena of texture resources.
#[derive(Debug, Default)]
pub struct TextureStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, res: TextureResource) -> TextureHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(res);
            return TextureHandle { index, generation: slot.generation };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, value: Some(res) });
        TextureHandle { index, generation: 0 }
    }

    pub fn get(&self, h: TextureHandle) -> Option<&TextureResource> {
        self.slots
            .get(h.index as usize)
            .filter(|s| s.generation == h.generation)
            .and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, h: TextureHandle) -> Option<&mut TextureResource> {
        self.slots
            .get_mut(h.index as usize)
            .filter(|s| s.generation == h.generation)
            .and_then(|s| s.value.as_mut())
    }

    /// Removes the resource; the handle (and any copy of it) becomes stale.
    pub fn remove(&mut self, h: TextureHandle) -> Option<TextureResource> {
        let slot = self.slots.get_mut(h.index as usize)?;
        if slot.generation != h.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(h.index);
        self.len -= 1;
        Some(value)
    }

    pub fn contains(&self, h: TextureHandle) -> bool {
        self.get(h).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureHandle, &TextureResource)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            let h = TextureHandle { index: i as u32, generation: s.generation };
            s.value.as_ref().map(|v| (h, v))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TextureHandle, &mut TextureResource)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| {
            let h = TextureHandle { index: i as u32, generation: s.generation };
            s.value.as_mut().map(|v| (h, v))
        })
    }

    pub fn handles(&self) -> Vec<TextureHandle> {
        self.iter().map(|(h, _)| h).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_does_not_resolve_after_reuse() {
        let mut store = TextureStore::new();
        let a = store.insert(TextureResource::uninit("a"));
        assert!(store.remove(a).is_some());

        let b = store.insert(TextureResource::uninit("b"));
        assert_eq!(a.index(), b.index());
        assert!(store.get(a).is_none());
        assert_eq!(store.get(b).map(|r| r.path.clone()), Some("b".into()));
        assert!(store.remove(a).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn iter_skips_empty_slots() {
        let mut store = TextureStore::new();
        let a = store.insert(TextureResource::uninit("a"));
        let _b = store.insert(TextureResource::uninit("b"));
        store.remove(a);
        let paths: Vec<_> = store.iter().map(|(_, r)| r.path.clone()).collect();
        assert_eq!(paths, vec![std::path::PathBuf::from("b")]);
    }
}
