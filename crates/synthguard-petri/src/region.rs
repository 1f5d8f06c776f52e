//! Mapping from places to the system states they represent

use std::collections::BTreeMap;

use synthguard_bdd::{BDD, Bdd};

use crate::PlaceId;

/// State region of every annotated place of a net
///
/// A region is a predicate over the system state describing exactly the
/// states corresponding to a token in the place. Places without a region
/// contribute nothing to disjunctions.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRegionMap {
    regions: BTreeMap<PlaceId, BDD>,
    /// Constant false predicate of the manager the regions belong to
    empty: BDD,
}

impl StateRegionMap {
    /// Create an empty map; `empty` is the constant false predicate of the
    /// manager the regions are created in
    pub fn new(empty: BDD) -> Self {
        StateRegionMap {
            regions: BTreeMap::new(),
            empty,
        }
    }

    /// Set the region of `place`, returning the previous one
    pub fn insert(&mut self, place: PlaceId, region: BDD) -> Option<BDD> {
        self.regions.insert(place, region)
    }

    /// Region of `place`
    pub fn get(&self, place: PlaceId) -> Option<&BDD> {
        self.regions.get(&place)
    }

    /// Whether `place` has a region
    pub fn contains(&self, place: PlaceId) -> bool {
        self.regions.contains_key(&place)
    }

    /// Iterator over all annotated places and their regions, ordered by id
    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, &BDD)> {
        self.regions.iter().map(|(p, r)| (*p, r))
    }

    /// Number of annotated places
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether no place is annotated
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Disjunction of the regions of `places`
    ///
    /// Places without a region are skipped; the disjunction over no region is
    /// false.
    pub fn disjunction<'a, I>(&self, places: I) -> BDD
    where
        I: IntoIterator<Item = &'a PlaceId>,
    {
        places
            .into_iter()
            .filter_map(|p| self.regions.get(p))
            .fold(self.empty.clone(), |acc, r| acc.or(r))
    }
}
