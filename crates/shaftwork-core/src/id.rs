use slotmap::new_key_type;

new_key_type! {
    /// Handle to a rotating assembly in the shaft module's arena.
    ///
    /// Segments hold this handle instead of a reference; once the owning
    /// structure is disassembled the handle no longer resolves.
    pub struct AssemblyId;

    /// Identifies a formed shaft structure.
    pub struct StructureId;
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn removed_handle_does_not_resolve() {
        let mut arena: SlotMap<AssemblyId, u32> = SlotMap::with_key();
        let a = arena.insert(1);
        let b = arena.insert(2);
        arena.remove(a);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b), Some(&2));

        // A reused slot gets a new version, so the stale handle stays dead.
        let c = arena.insert(3);
        assert_ne!(a, c);
        assert!(arena.get(a).is_none());
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut arena: SlotMap<StructureId, ()> = SlotMap::with_key();
        let id = arena.insert(());
        let mut map = HashMap::new();
        map.insert(id, "shaft");
        assert_eq!(map[&id], "shaft");
    }
}
