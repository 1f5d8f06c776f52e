//! Predicates as binary decision diagrams (BDDs)
//!
//! Every predicate of the guard synthesis engine is a BDD handed out by a BDD
//! manager. Decision diagrams are not implemented here: this crate puts an
//! existing library behind the [`Bdd`] and [`BddManager`] traits. The only
//! backend is [OxiDD](https://github.com/OxiDD/oxidd).
//!
//! Downstream crates use the [`BDD`] and [`BDDManager`] types, and
//! [`BDDManagerConfig`] to tune the manager.
//!
//! Handles are reference counted by the backend. They implement `Clone` but
//! not `Copy`, so every duplication of a predicate is an explicit `.clone()`
//! and every release is a drop. Two handles are equal iff they represent the
//! same boolean function.
//!
//! A further backend is added by implementing both traits for it and adding a
//! variant to [`BDD`], [`BDDManager`] and [`BDDManagerConfig`].

use std::fmt::Debug;

#[cfg(feature = "config_deserialize")]
use serde::Deserialize;

use oxidd_bdd::{OxiddBdd, OxiddManager};

mod oxidd_bdd;

pub use oxidd_bdd::OxiddManagerConfig;

/// Boolean function represented as a binary decision diagram
///
/// No operation consumes its operands: a predicate that is still needed
/// after an operation is simply kept.
pub trait Bdd: Sized + Debug + PartialEq + Clone {
    /// `¬self`
    fn not(&self) -> Self;

    /// `self ∧ rhs`
    fn and(&self, rhs: &Self) -> Self;

    /// `self ∨ rhs`
    fn or(&self, rhs: &Self) -> Self;

    /// `self ⇒ rhs`
    fn implies(&self, rhs: &Self) -> Self;

    /// `self ⇔ rhs`
    fn equiv(&self, rhs: &Self) -> Self;

    /// `∃ vars. self`
    ///
    /// An empty `vars` leaves the function unchanged.
    fn exists<'a, I: IntoIterator<Item = &'a Self>>(&self, vars: I) -> Self
    where
        Self: 'a;

    /// Exchange every variable of `from` with the variable at the same
    /// position in `to`
    fn swap<'a, I: IntoIterator<Item = &'a Self>>(&self, from: I, to: I) -> Self
    where
        Self: 'a;

    /// Whether some assignment satisfies the function
    fn satisfiable(&self) -> bool;

    /// `∀ vars. self`
    fn forall<'a, I: IntoIterator<Item = &'a Self>>(&self, vars: I) -> Self
    where
        Self: 'a,
    {
        self.not().exists(vars).not()
    }

    /// Whether the function is constant true
    fn is_valid(&self) -> bool {
        !self.not().satisfiable()
    }

    /// Simplify the function relative to the care set `care`
    ///
    /// The result `r` satisfies `care ∧ r == care ∧ self`. Outside of `care`
    /// it is chosen to depend on as few variables as possible: the variables
    /// of `vars` are visited in order, and each is quantified out if the
    /// interval `[self ∧ care, self ∨ ¬care]` still contains a function
    /// independent of it.
    ///
    /// With `care` constant true the result is `self`.
    fn restrict<'a, I: IntoIterator<Item = &'a Self>>(&self, care: &Self, vars: I) -> Self
    where
        Self: 'a,
    {
        let mut lower = self.and(care);
        let mut upper = self.or(&care.not());

        for var in vars {
            let lower_without = lower.exists(std::iter::once(var));
            let upper_without = upper.forall(std::iter::once(var));

            // interval still non-empty
            if !lower_without.and(&upper_without.not()).satisfiable() {
                lower = lower_without;
                upper = upper_without;
            }
        }

        lower
    }
}

/// Source of the variables and constants of one family of BDDs
pub trait BddManager: Debug + PartialEq + Clone + Default {
    /// BDDs created by the manager
    type DD: Bdd;

    /// Allocate a fresh variable, ordered after all existing ones
    fn new_var(&mut self) -> Self::DD;

    /// Constant false
    fn get_bdd_false(&self) -> Self::DD;

    /// Constant true
    fn get_bdd_true(&self) -> Self::DD;
}

/// BDD of one of the supported backends
///
/// Combining BDDs of different managers panics in the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BDD {
    /// OxiDD backend
    OxiDD(OxiddBdd),
}

impl BDD {
    fn oxidd(&self) -> &OxiddBdd {
        match self {
            BDD::OxiDD(dd) => dd,
        }
    }
}

impl Bdd for BDD {
    fn not(&self) -> Self {
        BDD::OxiDD(self.oxidd().not())
    }

    fn and(&self, rhs: &Self) -> Self {
        BDD::OxiDD(self.oxidd().and(rhs.oxidd()))
    }

    fn or(&self, rhs: &Self) -> Self {
        BDD::OxiDD(self.oxidd().or(rhs.oxidd()))
    }

    fn implies(&self, rhs: &Self) -> Self {
        BDD::OxiDD(self.oxidd().implies(rhs.oxidd()))
    }

    fn equiv(&self, rhs: &Self) -> Self {
        BDD::OxiDD(self.oxidd().equiv(rhs.oxidd()))
    }

    fn exists<'a, I: IntoIterator<Item = &'a Self>>(&self, vars: I) -> Self
    where
        Self: 'a,
    {
        BDD::OxiDD(self.oxidd().exists(vars.into_iter().map(BDD::oxidd)))
    }

    fn swap<'a, I: IntoIterator<Item = &'a Self>>(&self, from: I, to: I) -> Self
    where
        Self: 'a,
    {
        BDD::OxiDD(self.oxidd().swap(
            from.into_iter().map(BDD::oxidd),
            to.into_iter().map(BDD::oxidd),
        ))
    }

    fn satisfiable(&self) -> bool {
        self.oxidd().satisfiable()
    }
}

/// Configuration of the BDD manager of one of the supported backends
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config_deserialize", derive(Deserialize))]
pub enum BDDManagerConfig {
    /// OxiDD manager configuration
    Oxidd(OxiddManagerConfig),
}

impl BDDManagerConfig {
    /// Create a manager with this configuration
    pub fn mgr_from_config(&self) -> BDDManager {
        match self {
            BDDManagerConfig::Oxidd(cfg) => BDDManager::new_oxidd_with_config(cfg),
        }
    }

    /// Default OxiDD configuration
    pub fn new_oxidd() -> Self {
        BDDManagerConfig::Oxidd(OxiddManagerConfig::default())
    }
}

impl Default for BDDManagerConfig {
    fn default() -> Self {
        Self::new_oxidd()
    }
}

/// BDD manager of one of the supported backends
///
/// Clones share the underlying manager and its variables.
#[derive(Debug, Clone, PartialEq)]
pub enum BDDManager {
    /// OxiDD backend
    OxiDD(OxiddManager),
}

impl BDDManager {
    /// Create a manager as configured by `cfg`
    pub fn new(cfg: &BDDManagerConfig) -> Self {
        cfg.mgr_from_config()
    }

    /// OxiDD manager with the default configuration
    pub fn new_oxidd() -> Self {
        BDDManager::OxiDD(OxiddManager::default())
    }

    /// OxiDD manager with configuration `cfg`
    pub fn new_oxidd_with_config(cfg: &OxiddManagerConfig) -> Self {
        BDDManager::OxiDD(OxiddManager::new_with_config(cfg))
    }
}

impl Default for BDDManager {
    fn default() -> Self {
        BDDManager::new_oxidd()
    }
}

impl BddManager for BDDManager {
    type DD = BDD;

    fn new_var(&mut self) -> Self::DD {
        match self {
            BDDManager::OxiDD(mgr) => BDD::OxiDD(mgr.new_var()),
        }
    }

    fn get_bdd_false(&self) -> Self::DD {
        match self {
            BDDManager::OxiDD(mgr) => BDD::OxiDD(mgr.get_bdd_false()),
        }
    }

    fn get_bdd_true(&self) -> Self::DD {
        match self {
            BDDManager::OxiDD(mgr) => BDD::OxiDD(mgr.get_bdd_true()),
        }
    }
}
