use std::{
    fmt::Display,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
    catalog::SequenceCatalog,
    error::{Error, Result},
    fasta::write_record,
    selection::SelectedFamilySet,
};


pub const FAMILIES_DIRECTORY: &str = "families";
pub const STAGING_SUFFIX: &str = "partial";

/// The kinds of per-family artifacts, in production order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    Fasta,
    Alignment,
    TreeNewick,
    TreeAscii,
    HmmProfile,
    HmmLogo,
}

/// Owns the on-disk layout below `{root}/families`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactKind {
    pub const ALL: [Self; 6] = [
        Self::Fasta,
        Self::Alignment,
        Self::TreeNewick,
        Self::TreeAscii,
        Self::HmmProfile,
        Self::HmmLogo,
    ];

    pub fn directory(&self) -> &'static str {
        match self {
            Self::Fasta => "fastas",
            Self::Alignment => "aln",
            Self::TreeNewick => "tree_nwk",
            Self::TreeAscii => "tree_fig",
            Self::HmmProfile => "hmm",
            Self::HmmLogo => "hmm_logo",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Fasta => "faa",
            Self::Alignment => "aln",
            Self::TreeNewick => "nwk",
            Self::TreeAscii => "ascii",
            Self::HmmProfile => "hmm",
            Self::HmmLogo => "svg",
        }
    }

    /// The artifact kind produced directly before this one.
    pub fn predecessor(&self) -> Option<Self> {
        match self {
            Self::Fasta => None,
            Self::Alignment => Some(Self::Fasta),
            Self::TreeNewick => Some(Self::Alignment),
            Self::TreeAscii => Some(Self::TreeNewick),
            Self::HmmProfile => Some(Self::TreeAscii),
            Self::HmmLogo => Some(Self::HmmProfile),
        }
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Fasta => "fasta",
                Self::Alignment => "alignment",
                Self::TreeNewick => "tree_newick",
                Self::TreeAscii => "tree_ascii",
                Self::HmmProfile => "hmm_profile",
                Self::HmmLogo => "hmm_logo",
            }
        )
    }
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn families_directory(&self) -> PathBuf {
        self.root.join(FAMILIES_DIRECTORY)
    }

    pub fn directory(&self, kind: ArtifactKind) -> PathBuf {
        self.families_directory().join(kind.directory())
    }

    pub fn path(&self, family: &str, kind: ArtifactKind) -> PathBuf {
        self.directory(kind)
            .join(format!("{family}.{}", kind.extension()))
    }

    pub fn staging_path(&self, family: &str, kind: ArtifactKind) -> PathBuf {
        self.directory(kind)
            .join(format!("{family}.{}.{STAGING_SUFFIX}", kind.extension()))
    }

    /// True if the artifact exists and is non-empty.
    pub fn is_complete(&self, family: &str, kind: ArtifactKind) -> bool {
        std::fs::metadata(self.path(family, kind))
            .map(|metadata| metadata.is_file() && metadata.len() > 0)
            .unwrap_or(false)
    }

    /// Returns the path of a complete artifact, or [`Error::InputMissing`].
    pub fn require(&self, family: &str, kind: ArtifactKind) -> Result<PathBuf> {
        let path = self.path(family, kind);
        if self.is_complete(family, kind) {
            Ok(path)
        } else {
            Err(Error::InputMissing {
                family: family.to_string(),
                kind,
                path,
            })
        }
    }

    /// Creates the families directory and one subdirectory per artifact kind.
    pub fn ensure_layout(&self) -> Result<()> {
        for kind in ArtifactKind::ALL {
            let directory = self.directory(kind);
            std::fs::create_dir_all(&directory).map_err(Error::io(&directory))?;
        }
        debug!("Artifact layout ready below {:?}", self.families_directory());
        Ok(())
    }

    /// Writes an artifact through its staging file.
    ///
    /// The final path is only replaced if `write` succeeds.
    pub fn write_artifact(
        &self,
        family: &str,
        kind: ArtifactKind,
        write: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
    ) -> Result<PathBuf> {
        let staging = self.staging_path(family, kind);
        let target = self.path(family, kind);

        let written = File::create(&staging).and_then(|file| {
            let mut writer = BufWriter::new(file);
            write(&mut writer)?;
            writer.flush()?;
            writer.get_ref().sync_all()
        });

        match written {
            Ok(()) => {
                commit(&staging, &target)?;
                Ok(target)
            }
            Err(error) => {
                discard(&staging);
                Err(Error::Io {
                    path: staging,
                    source: error,
                })
            }
        }
    }

    /// Writes one fasta artifact per selected family, members in catalog order.
    ///
    /// Returns the outcome of every family.
    pub fn write_fasta_files(
        &self,
        catalog: &SequenceCatalog,
        selected: &SelectedFamilySet,
    ) -> Vec<(String, Result<PathBuf>)> {
        let outcomes: Vec<_> = selected
            .iter()
            .map(|family| (family.to_string(), self.write_fasta_file(catalog, family)))
            .collect();

        let written = outcomes.iter().filter(|(_, outcome)| outcome.is_ok()).count();
        info!("Wrote {written} of {} family fasta files", outcomes.len());
        outcomes
    }

    fn write_fasta_file(&self, catalog: &SequenceCatalog, family: &str) -> Result<PathBuf> {
        let Some(members) = catalog.families().members(family) else {
            return Err(Error::InputMissing {
                family: family.to_string(),
                kind: ArtifactKind::Fasta,
                path: self.path(family, ArtifactKind::Fasta),
            });
        };
        let path = self.write_artifact(family, ArtifactKind::Fasta, |writer| {
            for accession in members {
                if let Some(record) = catalog.get(accession) {
                    write_record(&mut *writer, &record.accession, &record.sequence)?;
                }
            }
            Ok(())
        })?;
        debug!("Wrote {} sequences of family {family}", members.len());
        Ok(path)
    }
}

/// Publishes a finished staging file at its final path.
pub fn commit(staging: &Path, target: &Path) -> Result<()> {
    std::fs::rename(staging, target).map_err(|source| Error::Io {
        path: target.to_path_buf(),
        source,
    })
}

/// Removes a staging file, ignoring files that do not exist.
pub fn discard(staging: &Path) {
    match std::fs::remove_file(staging) {
        Ok(()) => debug!("Removed staging file {staging:?}"),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => warn!("Unable to remove staging file {staging:?}: {error}"),
    }
}
