//! Dependency resolution over deployment units.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{
    error::{DeployError, Result},
    unit::Unit,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

struct Walk<'u> {
    units: &'u [Unit],
    index: HashMap<&'static str, usize>,
    marks: Vec<Mark>,
    edges: Vec<Vec<usize>>,
    path: Vec<usize>,
    closure: Vec<usize>,
}

impl<'u> Walk<'u> {
    fn new(units: &'u [Unit]) -> Self {
        Self {
            units,
            index: units.iter().enumerate().map(|(i, u)| (u.name, i)).collect(),
            marks: vec![Mark::Unvisited; units.len()],
            edges: vec![Vec::new(); units.len()],
            path: Vec::new(),
            closure: Vec::new(),
        }
    }

    /// Depth-first visit collecting `i` and everything it depends on. Fails on a cycle.
    fn visit(&mut self, i: usize) -> Result<()> {
        match self.marks[i] {
            Mark::Done => return Ok(()),
            Mark::Visiting => {
                let start = self.path.iter().position(|&p| p == i).unwrap_or(0);
                let mut cycle: Vec<String> = self.path[start..]
                    .iter()
                    .map(|&p| self.units[p].name.to_string())
                    .collect();
                cycle.push(self.units[i].name.to_string());
                return Err(DeployError::CyclicDependency { cycle });
            }
            Mark::Unvisited => {}
        }

        let unit = &self.units[i];
        let mut dependencies = unit
            .dependencies
            .iter()
            .map(|dep| {
                self.index
                    .get(dep)
                    .copied()
                    .ok_or_else(|| DeployError::UnknownDependency {
                        unit: unit.name.to_string(),
                        dependency: dep.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        dependencies.sort_unstable();
        dependencies.dedup();

        self.marks[i] = Mark::Visiting;
        self.path.push(i);
        for &dep in &dependencies {
            self.visit(dep)?;
        }
        self.path.pop();
        self.marks[i] = Mark::Done;
        self.edges[i] = dependencies;
        self.closure.push(i);

        Ok(())
    }

    /// Order the collected units so each follows its dependencies. Whenever several units are
    /// ready, the earliest declared goes first.
    fn finish(self) -> Vec<&'u Unit> {
        let units = self.units;
        let mut pending: BTreeSet<usize> = self.closure.into_iter().collect();
        let mut emitted = vec![false; units.len()];
        let mut order = Vec::with_capacity(pending.len());

        // The visit already rejected cycles, so some pending unit is always ready.
        while let Some(next) = pending
            .iter()
            .copied()
            .find(|&i| self.edges[i].iter().all(|&dep| emitted[dep]))
        {
            pending.remove(&next);
            emitted[next] = true;
            order.push(&units[next]);
        }
        order
    }
}

/// Resolve the units selected by `requested_tags`, plus everything they depend on, into an
/// execution order where each unit follows all of its dependencies.
///
/// Among units whose dependencies are all placed, declaration order decides. Fails without a
/// partial order on an unknown tag, an unknown dependency or a cycle.
pub fn resolve<'u, T: AsRef<str>>(requested_tags: &[T], units: &'u [Unit]) -> Result<Vec<&'u Unit>> {
    for tag in requested_tags {
        let tag = tag.as_ref();
        if !units.iter().any(|unit| unit.has_tag(tag)) {
            return Err(DeployError::UnknownTag(tag.to_string()));
        }
    }

    let mut walk = Walk::new(units);
    for (i, unit) in units.iter().enumerate() {
        if requested_tags.iter().any(|tag| unit.has_tag(tag.as_ref())) {
            walk.visit(i)?;
        }
    }
    Ok(walk.finish())
}

/// The validated set of units a process can run.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    units: Vec<Unit>,
}

impl UnitRegistry {
    /// Validate `units`: unique names, known dependencies, no cycles.
    pub fn new(units: Vec<Unit>) -> Result<Self> {
        let mut seen = HashSet::new();
        for unit in &units {
            if !seen.insert(unit.name) {
                return Err(DeployError::DuplicateUnit(unit.name.to_string()));
            }
        }

        {
            let mut walk = Walk::new(&units);
            for i in 0..units.len() {
                walk.visit(i)?;
            }
        }

        Ok(Self { units })
    }

    /// The built-in unit table.
    pub fn builtin() -> Result<Self> {
        Self::new(crate::units::all())
    }

    pub fn resolve<T: AsRef<str>>(&self, requested_tags: &[T]) -> Result<Vec<&Unit>> {
        resolve(requested_tags, &self.units)
    }

    pub fn get(&self, name: &str) -> Option<&Unit> {
        self.units.iter().find(|unit| unit.name == name)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Every tag a run can be invoked with.
    pub fn tags(&self) -> BTreeSet<&'static str> {
        self.units
            .iter()
            .flat_map(|unit| unit.tags.iter().copied())
            .collect()
    }
}
