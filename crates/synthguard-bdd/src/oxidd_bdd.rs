//! [OxiDD](https://github.com/OxiDD/oxidd) backend

use std::{cell::Cell, fmt, rc::Rc};

use oxidd::{
    BooleanFunction, BooleanFunctionQuant, FunctionSubst, Manager, ManagerRef, Subst,
    bdd::{BDDFunction, BDDManagerRef},
};

#[cfg(feature = "config_deserialize")]
use serde::Deserialize;

use crate::{Bdd, BddManager};

/// OxiDD only fails on allocation. Running out of nodes is not recoverable.
const OUT_OF_MEMORY: &str = "OxiDD manager is out of nodes, increase `inner_node_capacity`";

/// Handle to an OxiDD function
///
/// Handles of variables remember the variable index, which is needed for
/// substitution.
#[derive(Clone)]
pub struct OxiddBdd {
    func: BDDFunction,
    var: Option<u32>,
}

impl OxiddBdd {
    fn function(func: BDDFunction) -> Self {
        OxiddBdd { func, var: None }
    }

    fn var_index(&self) -> u32 {
        self.var
            .expect("only variables obtained from the manager can be swapped")
    }
}

impl fmt::Debug for OxiddBdd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.var {
            Some(index) => write!(f, "OxiddBdd(x{index})"),
            None => f.write_str("OxiddBdd(..)"),
        }
    }
}

impl PartialEq for OxiddBdd {
    fn eq(&self, other: &Self) -> bool {
        self.equiv(other).is_valid()
    }
}

impl Bdd for OxiddBdd {
    fn not(&self) -> Self {
        Self::function(self.func.not().expect(OUT_OF_MEMORY))
    }

    fn and(&self, rhs: &Self) -> Self {
        Self::function(self.func.and(&rhs.func).expect(OUT_OF_MEMORY))
    }

    fn or(&self, rhs: &Self) -> Self {
        Self::function(self.func.or(&rhs.func).expect(OUT_OF_MEMORY))
    }

    fn implies(&self, rhs: &Self) -> Self {
        Self::function(self.func.imp(&rhs.func).expect(OUT_OF_MEMORY))
    }

    fn equiv(&self, rhs: &Self) -> Self {
        Self::function(self.func.equiv(&rhs.func).expect(OUT_OF_MEMORY))
    }

    fn exists<'a, I: IntoIterator<Item = &'a Self>>(&self, vars: I) -> Self
    where
        Self: 'a,
    {
        // OxiDD quantifies over the conjunction of the variables
        let cube = vars.into_iter().fold(None, |cube: Option<BDDFunction>, v| {
            Some(match cube {
                Some(c) => c.and(&v.func).expect(OUT_OF_MEMORY),
                None => v.func.clone(),
            })
        });

        match cube {
            Some(cube) => Self::function(self.func.exists(&cube).expect(OUT_OF_MEMORY)),
            None => self.clone(),
        }
    }

    fn swap<'a, I: IntoIterator<Item = &'a Self>>(&self, from: I, to: I) -> Self
    where
        Self: 'a,
    {
        let (indices, replacements): (Vec<u32>, Vec<BDDFunction>) = from
            .into_iter()
            .zip(to)
            .flat_map(|(a, b)| {
                [
                    (a.var_index(), b.func.clone()),
                    (b.var_index(), a.func.clone()),
                ]
            })
            .unzip();

        if indices.is_empty() {
            return self.clone();
        }

        let subst = Subst::new(indices, replacements);
        Self::function(self.func.substitute(&subst).expect(OUT_OF_MEMORY))
    }

    fn satisfiable(&self) -> bool {
        self.func.satisfiable()
    }
}

/// Knobs of the OxiDD manager
///
/// See <https://docs.rs/oxidd/latest/oxidd/bdd/fn.new_manager.html>. Missing
/// fields take their default when deserialized.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config_deserialize", derive(Deserialize))]
#[cfg_attr(feature = "config_deserialize", serde(default))]
pub struct OxiddManagerConfig {
    /// Maximum number of inner nodes, `2^20` by default
    pub inner_node_capacity: usize,
    /// Capacity of the apply cache, 1024 by default
    pub apply_cache_capacity: usize,
    /// Worker threads, 1 by default
    pub threads: u32,
}

impl Default for OxiddManagerConfig {
    fn default() -> Self {
        OxiddManagerConfig {
            inner_node_capacity: 1 << 20,
            apply_cache_capacity: 1024,
            threads: 1,
        }
    }
}

/// Shared OxiDD manager
///
/// Clones refer to the same manager and draw variables from the same
/// counter. Two managers are equal iff they are the same manager.
#[derive(Clone)]
pub struct OxiddManager {
    mgr: BDDManagerRef,
    vars: Rc<Cell<u32>>,
}

impl OxiddManager {
    /// Manager with configuration `cfg`
    pub fn new_with_config(cfg: &OxiddManagerConfig) -> Self {
        OxiddManager {
            mgr: oxidd::bdd::new_manager(
                cfg.inner_node_capacity,
                cfg.apply_cache_capacity,
                cfg.threads,
            ),
            vars: Rc::new(Cell::new(0)),
        }
    }
}

impl Default for OxiddManager {
    fn default() -> Self {
        Self::new_with_config(&OxiddManagerConfig::default())
    }
}

impl PartialEq for OxiddManager {
    fn eq(&self, other: &Self) -> bool {
        self.mgr == other.mgr
    }
}

impl fmt::Debug for OxiddManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OxiddManager")
            .field("vars", &self.vars.get())
            .finish()
    }
}

impl BddManager for OxiddManager {
    type DD = OxiddBdd;

    fn new_var(&mut self) -> Self::DD {
        let index = self.vars.get();
        self.vars.set(index + 1);

        let func = self.mgr.with_manager_exclusive(|mgr| {
            mgr.add_named_vars([format!("x{index}")])
                .expect("variable names come from a fresh counter");
            BDDFunction::var(mgr, index).expect(OUT_OF_MEMORY)
        });

        OxiddBdd {
            func,
            var: Some(index),
        }
    }

    fn get_bdd_false(&self) -> Self::DD {
        OxiddBdd::function(self.mgr.with_manager_exclusive(|mgr| BDDFunction::f(mgr)))
    }

    fn get_bdd_true(&self) -> Self::DD {
        OxiddBdd::function(self.mgr.with_manager_exclusive(|mgr| BDDFunction::t(mgr)))
    }
}
