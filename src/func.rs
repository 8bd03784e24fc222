//! Per-function access analysis and call graph closure.
use nohash_hasher::{IntMap, IntSet};

use crate::error::{Error, Result};
use crate::instr::{FunctionId, VariableId};

/// Access footprint of one function definition.
#[derive(Default, Debug, Clone)]
pub struct Function {
    pub name: Option<String>,
    /// Ids of functions this function calls, sorted and deduplicated.
    pub callees: Vec<FunctionId>,
    /// Ids of pointers this function loads, stores or derives access chains
    /// from, sorted and deduplicated.
    pub accessed_ids: Vec<VariableId>,
}
impl Function {
    pub(crate) fn seal(&mut self) {
        self.callees.sort_unstable();
        self.callees.dedup();
        self.accessed_ids.sort_unstable();
        self.accessed_ids.dedup();
    }
}

#[derive(Default)]
pub struct FunctionRegistry {
    func_map: IntMap<FunctionId, Function>,
}
impl FunctionRegistry {
    pub fn set(&mut self, id: FunctionId, func: Function) -> Result<()> {
        use std::collections::hash_map::Entry;
        match self.func_map.entry(id) {
            Entry::Vacant(entry) => {
                entry.insert(func);
                Ok(())
            }
            _ => Err(Error::DuplicateId(id)),
        }
    }

    pub fn get(&self, id: FunctionId) -> Option<&Function> {
        self.func_map.get(&id)
    }

    pub fn len(&self) -> usize {
        self.func_map.len()
    }

    /// Collect the ids of every function reachable from `entry`, `entry`
    /// included. The static call graph of a valid module is acyclic; a cycle
    /// (or a chain deeper than the function count) is rejected.
    pub fn collect_reachable(&self, entry: FunctionId) -> Result<Vec<FunctionId>> {
        let mut reachable = IntSet::default();
        let mut on_stack = IntSet::default();
        self.visit(entry, &mut reachable, &mut on_stack, 0)?;
        let mut out: Vec<_> = reachable.into_iter().collect();
        out.sort_unstable();
        Ok(out)
    }

    fn visit(
        &self,
        id: FunctionId,
        reachable: &mut IntSet<FunctionId>,
        on_stack: &mut IntSet<FunctionId>,
        depth: usize,
    ) -> Result<()> {
        if depth > self.func_map.len() {
            return Err(Error::Recursion(id));
        }
        // Calls to body-less declarations contribute nothing.
        let func = match self.func_map.get(&id) {
            Some(x) => x,
            None => return Ok(()),
        };
        if !on_stack.insert(id) {
            return Err(Error::Recursion(id));
        }
        if reachable.insert(id) {
            for callee in func.callees.iter() {
                self.visit(*callee, reachable, on_stack, depth + 1)?;
            }
        }
        on_stack.remove(&id);
        Ok(())
    }

    /// Union of the accessed-pointer sets of every function reachable from
    /// `entry`, sorted and deduplicated.
    pub fn collect_accessed(&self, entry: FunctionId) -> Result<Vec<VariableId>> {
        let mut out = Vec::new();
        for func_id in self.collect_reachable(entry)? {
            if let Some(func) = self.func_map.get(&func_id) {
                out.extend_from_slice(&func.accessed_ids);
            }
        }
        out.sort_unstable();
        out.dedup();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(callees: &[u32], accessed: &[u32]) -> Function {
        let mut f = Function {
            name: None,
            callees: callees.to_vec(),
            accessed_ids: accessed.to_vec(),
        };
        f.seal();
        f
    }

    #[test]
    fn transitive_access_union() {
        let mut reg = FunctionRegistry::default();
        reg.set(1, func(&[2, 3], &[10])).unwrap();
        reg.set(2, func(&[], &[11, 10])).unwrap();
        reg.set(3, func(&[2], &[12])).unwrap();
        reg.set(4, func(&[], &[99])).unwrap();
        assert_eq!(reg.collect_accessed(1).unwrap(), vec![10, 11, 12]);
    }

    #[test]
    fn cycle_is_rejected() {
        let mut reg = FunctionRegistry::default();
        reg.set(1, func(&[2], &[])).unwrap();
        reg.set(2, func(&[1], &[])).unwrap();
        assert!(matches!(reg.collect_reachable(1), Err(Error::Recursion(_))));
    }

    #[test]
    fn self_call_is_rejected() {
        let mut reg = FunctionRegistry::default();
        reg.set(1, func(&[1], &[])).unwrap();
        assert!(matches!(reg.collect_reachable(1), Err(Error::Recursion(1))));
    }
}
