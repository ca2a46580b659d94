use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use log::{debug, info};

use crate::{
    compression::open_decompressed,
    error::{Error, Result},
    fasta::{FastaRecord, read_fasta},
};


pub const FAMILY_DELIMITER: &str = " | ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub accession: String,
    pub sequence: String,
    pub family: String,
}

/// Family identifiers mapped to the accessions of their members, in archive order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyCatalog {
    families: BTreeMap<String, Vec<String>>,
}

/// All records of a sequence archive, keyed by accession.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceCatalog {
    records: Vec<SequenceRecord>,
    accessions: HashMap<String, usize>,
    families: FamilyCatalog,
}

impl FamilyCatalog {
    pub fn from_records<'record>(
        records: impl IntoIterator<Item = &'record SequenceRecord>,
    ) -> Self {
        let mut families = BTreeMap::<String, Vec<String>>::new();
        for record in records {
            families
                .entry(record.family.clone())
                .or_default()
                .push(record.accession.clone());
        }
        Self { families }
    }

    pub fn members(&self, family: &str) -> Option<&[String]> {
        self.families.get(family).map(Vec::as_slice)
    }

    /// Families with their member counts, ordered by family identifier.
    pub fn sizes(&self) -> impl Iterator<Item = (&str, usize)> {
        self.families
            .iter()
            .map(|(family, members)| (family.as_str(), members.len()))
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

impl SequenceCatalog {
    /// Loads the catalog from a (possibly compressed) FASTA archive.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let records = read_fasta(open_decompressed(path)?, path)?;
        let catalog = Self::from_fasta_records(records, path)?;
        info!(
            "Loaded {} sequences in {} families from {path:?}",
            catalog.len(),
            catalog.families.len()
        );
        Ok(catalog)
    }

    /// Builds the catalog from parsed records.
    ///
    /// `path` is only used for error messages.
    pub fn from_fasta_records(
        fasta_records: impl IntoIterator<Item = FastaRecord>,
        path: &Path,
    ) -> Result<Self> {
        let mut records = Vec::new();
        let mut accessions = HashMap::new();

        for fasta_record in fasta_records {
            let parse_error = |reason: String| Error::Parse {
                path: path.to_path_buf(),
                line: fasta_record.line,
                reason,
            };

            let accession = fasta_record.id().to_string();
            if accession.is_empty() {
                return Err(parse_error("the header has no accession".to_string()));
            }
            let family = parse_family(&fasta_record.header)
                .ok_or_else(|| {
                    parse_error(format!(
                        "the header {:?} names no family after a ' | ' delimiter",
                        fasta_record.header
                    ))
                })?
                .to_string();
            if family.contains(['/', '\\']) {
                return Err(parse_error(format!(
                    "the family {family:?} contains a path separator"
                )));
            }
            if accessions.insert(accession.clone(), records.len()).is_some() {
                return Err(parse_error(format!(
                    "the accession {accession:?} appears twice"
                )));
            }

            debug!("Loaded {accession} of family {family}");
            records.push(SequenceRecord {
                accession,
                family,
                sequence: fasta_record.sequence,
            });
        }

        let families = FamilyCatalog::from_records(&records);
        Ok(Self {
            records,
            accessions,
            families,
        })
    }

    pub fn get(&self, accession: &str) -> Option<&SequenceRecord> {
        self.accessions
            .get(accession)
            .map(|index| &self.records[*index])
    }

    pub fn records(&self) -> &[SequenceRecord] {
        &self.records
    }

    pub fn families(&self) -> &FamilyCatalog {
        &self.families
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Extracts the family identifier from a header of the form `<accession> <free text> | <family>`.
///
/// The family is the field after the first ` | `, so a bare `|` inside the free text is not a delimiter.
/// Returns `None` if there is no ` | ` or the family is empty.
pub fn parse_family(header: &str) -> Option<&str> {
    header
        .split(FAMILY_DELIMITER)
        .nth(1)
        .map(str::trim)
        .filter(|family| !family.is_empty())
}
