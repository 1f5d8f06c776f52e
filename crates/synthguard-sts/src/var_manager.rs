//! This module contains the BDD variable manager of a symbolic transition
//! system. It allocates the current and next state bits of every system
//! variable and provides the encodings used by guards, updates and images.

use std::fmt::Display;

use synthguard_bdd::{BDD, BDDManager, Bdd, BddManager};

use crate::{Value, Variable, VariableId};

/// Current and next state BDD variables of a single system variable
#[derive(Debug, Clone)]
struct VariableBits {
    /// Bits encoding the current value, most significant bit first
    unprimed: Vec<BDD>,
    /// Bits encoding the next value, most significant bit first
    primed: Vec<BDD>,
    /// Number of valid values of the variable
    domain_size: u64,
}

/// Manager for the BDD variables of a symbolic transition system
///
/// Every system variable is binary encoded: its value index is stored in
/// `bits_for(domain_size)` BDD variables. Current and next state bits are
/// allocated interleaved, which keeps update relations small.
#[derive(Debug, Clone)]
pub struct BddVarManager {
    /// The BDD manager
    manager: BDDManager,
    /// Bits of each variable, indexed by [`VariableId`]
    bits: Vec<VariableBits>,
    /// All unprimed bdd variables, in allocation order
    unprimed_vars_vec: Vec<BDD>,
    /// All primed bdd variables, in allocation order
    primed_vars_vec: Vec<BDD>,
    /// Predicate over the current state bits excluding unused codes
    domain: BDD,
}

impl BddVarManager {
    /// Creates a new manager and allocates the bits for `variables`
    pub fn new(mgr: BDDManager, variables: &[Variable]) -> Self {
        let mut var_mgr = BddVarManager {
            domain: mgr.get_bdd_true(),
            manager: mgr,
            bits: Vec::with_capacity(variables.len()),
            unprimed_vars_vec: Vec::new(),
            primed_vars_vec: Vec::new(),
        };

        for var in variables {
            var_mgr.new_variable_bits(var);
        }
        var_mgr.domain = var_mgr.build_domain();

        var_mgr
    }

    /// Number of bits needed to encode `domain_size` values
    fn bits_for(domain_size: u64) -> u32 {
        (domain_size - 1).checked_ilog2().map_or(1, |n| n + 1)
    }

    /// creates the unprimed and primed bits for `var`
    fn new_variable_bits(&mut self, var: &Variable) {
        let domain_size = var.domain_size();
        let mut unprimed = Vec::new();
        let mut primed = Vec::new();

        for _ in 0..Self::bits_for(domain_size) {
            let cur = self.manager.new_var();
            let next = self.manager.new_var();

            self.unprimed_vars_vec.push(cur.clone());
            self.primed_vars_vec.push(next.clone());
            unprimed.push(cur);
            primed.push(next);
        }

        self.bits.push(VariableBits {
            unprimed,
            primed,
            domain_size,
        });
    }

    /// Builds the conjunction over all variables of `index < domain_size`
    fn build_domain(&self) -> BDD {
        self.bits
            .iter()
            .filter(|bits| bits.domain_size < 1 << bits.unprimed.len())
            .fold(self.get_bdd_true(), |acc, bits| {
                let valid = (0..bits.domain_size).fold(self.get_bdd_false(), |acc, index| {
                    acc.or(&self.encode_bitwise_bdd(index, &bits.unprimed))
                });
                acc.and(&valid)
            })
    }

    /// Given `index` and a slice of bdd variables,
    /// returns the bitwise encoded bdd for `index`
    fn encode_bitwise_bdd(&self, index: u64, bdd_vars: &[BDD]) -> BDD {
        let mut index_binary = index;
        let mut bitwise_bdd = self.manager.get_bdd_true();
        for bdd in bdd_vars.iter().rev() {
            if index_binary % 2 == 1 {
                bitwise_bdd = bitwise_bdd.and(bdd);
            } else {
                bitwise_bdd = bitwise_bdd.and(&bdd.not());
            }
            index_binary >>= 1;
        }
        bitwise_bdd
    }

    fn get_bits(&self, var: VariableId) -> Result<&VariableBits, VarManagerError> {
        self.bits
            .get(var.0)
            .ok_or(VarManagerError::UnknownVariable(var))
    }

    /// get the constant true BDD
    pub fn get_bdd_true(&self) -> BDD {
        self.manager.get_bdd_true()
    }

    /// get the constant false BDD
    pub fn get_bdd_false(&self) -> BDD {
        self.manager.get_bdd_false()
    }

    /// Predicate over the current state stating that every variable holds a
    /// value of its domain
    pub fn domain(&self) -> &BDD {
        &self.domain
    }

    /// Predicate over the current state stating that `var` holds the value
    /// with index `index`
    pub fn get_value_bdd(&self, var: VariableId, index: u64) -> Result<BDD, VarManagerError> {
        let bits = self.get_bits(var)?;
        if index >= bits.domain_size {
            return Err(VarManagerError::IndexOutOfDomain(var, index));
        }
        Ok(self.encode_bitwise_bdd(index, &bits.unprimed))
    }

    /// Predicate over the next state stating that `var` holds the value with
    /// index `index`
    pub fn get_primed_value_bdd(
        &self,
        var: VariableId,
        index: u64,
    ) -> Result<BDD, VarManagerError> {
        let bits = self.get_bits(var)?;
        if index >= bits.domain_size {
            return Err(VarManagerError::IndexOutOfDomain(var, index));
        }
        Ok(self.encode_bitwise_bdd(index, &bits.primed))
    }

    /// Constructs a constraint which checks that the current and next bits of
    /// `var` are equal
    pub fn get_unchanged_bdd(&self, var: VariableId) -> Result<BDD, VarManagerError> {
        let bits = self.get_bits(var)?;

        Ok(bits
            .unprimed
            .iter()
            .zip(bits.primed.iter())
            .fold(self.get_bdd_true(), |acc, (unprimed_var, primed_var)| {
                acc.and(&unprimed_var.equiv(primed_var))
            }))
    }

    /// Current state bits of `var`
    pub fn unprimed_bits(&self, var: VariableId) -> Result<&[BDD], VarManagerError> {
        Ok(&self.get_bits(var)?.unprimed)
    }

    /// All current state bits, in allocation order
    pub fn unprimed_vars(&self) -> &[BDD] {
        &self.unprimed_vars_vec
    }

    /// Swaps all unprimed and primed bdd variables for `cur`
    pub fn swap_unprimed_primed_bdd_vars(&self, cur: &BDD) -> BDD {
        cur.swap(&self.unprimed_vars_vec, &self.primed_vars_vec)
    }

    /// abstracts all unprimed bdd variables of `cur`
    pub fn exists_unprimed(&self, cur: &BDD) -> BDD {
        cur.exists(&self.unprimed_vars_vec)
    }

    /// abstracts all primed bdd variables of `cur`
    pub fn exists_primed(&self, cur: &BDD) -> BDD {
        cur.exists(&self.primed_vars_vec)
    }

    /// abstracts the unprimed bits of the variables `vars` in `cur`
    pub fn exists_variables<'a, I>(&self, cur: &BDD, vars: I) -> Result<BDD, VarManagerError>
    where
        I: IntoIterator<Item = &'a VariableId>,
    {
        let mut quantified = Vec::new();
        for var in vars {
            quantified.extend(self.get_bits(*var)?.unprimed.iter());
        }
        Ok(cur.exists(quantified))
    }
}

/// Error raised when encoding a predicate over variables of the system
#[derive(Debug, Clone, PartialEq)]
pub enum VarManagerError {
    /// No bits were allocated for this variable
    UnknownVariable(VariableId),
    /// Value index is not part of the domain of the variable
    IndexOutOfDomain(VariableId, u64),
    /// The value cannot be held by the variable
    ValueOutOfDomain(String, Value),
}

impl std::error::Error for VarManagerError {}

impl Display for VarManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarManagerError::UnknownVariable(var) => {
                write!(f, "There exist no bdd variables for variable {var}")
            }
            VarManagerError::IndexOutOfDomain(var, index) => {
                write!(
                    f,
                    "Value index {index} exceeds the domain of variable {var}"
                )
            }
            VarManagerError::ValueOutOfDomain(var, value) => {
                write!(f, "Variable '{var}' can not hold value {value}")
            }
        }
    }
}
