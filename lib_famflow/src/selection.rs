use log::{debug, info};

use crate::catalog::FamilyCatalog;


pub const DEFAULT_MIN_FAMILY_SIZE: usize = 8;

/// The families that pass the size threshold, in ascending lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedFamilySet {
    families: Vec<String>,
}

/// Selects all families with at least `min_size` members.
pub fn select_families(catalog: &FamilyCatalog, min_size: usize) -> SelectedFamilySet {
    let families: Vec<_> = catalog
        .sizes()
        .filter(|(family, size)| {
            let selected = *size >= min_size;
            if !selected {
                debug!("Skipping family {family} with {size} members");
            }
            selected
        })
        .map(|(family, _)| family.to_string())
        .collect();

    info!(
        "Selected {} of {} families with at least {min_size} members",
        families.len(),
        catalog.len()
    );
    SelectedFamilySet::from_sorted(families)
}

impl SelectedFamilySet {
    fn from_sorted(families: Vec<String>) -> Self {
        debug_assert!(families.is_sorted());
        Self { families }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.families.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.families
    }

    pub fn contains(&self, family: &str) -> bool {
        self.families
            .binary_search_by(|candidate| candidate.as_str().cmp(family))
            .is_ok()
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

impl FromIterator<String> for SelectedFamilySet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        let mut families: Vec<_> = iter.into_iter().collect();
        families.sort();
        families.dedup();
        Self { families }
    }
}
