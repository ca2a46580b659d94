use std::{
    io::{BufRead, Write},
    path::Path,
};

use crate::error::{Error, Result};


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// The header line without the leading `>`.
    pub header: String,
    pub sequence: String,
    /// The line number of the header, counting from one.
    pub line: usize,
}

impl FastaRecord {
    /// The first whitespace-separated token of the header.
    pub fn id(&self) -> &str {
        self.header.split_whitespace().next().unwrap_or("")
    }
}

/// Reads all records of a FASTA file.
///
/// Sequences may span multiple lines, which are concatenated.
/// Blank lines are ignored.
pub fn read_fasta(reader: impl BufRead, path: &Path) -> Result<Vec<FastaRecord>> {
    let mut records = Vec::new();
    let mut current: Option<FastaRecord> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(Error::io(path))?;
        let line = line.trim();

        if let Some(header) = line.strip_prefix('>') {
            records.extend(current.take());
            current = Some(FastaRecord {
                header: header.trim().to_string(),
                sequence: String::new(),
                line: index + 1,
            });
        } else if line.is_empty() {
            continue;
        } else if let Some(record) = current.as_mut() {
            record.sequence.push_str(line);
        } else {
            return Err(Error::Parse {
                path: path.to_path_buf(),
                line: index + 1,
                reason: "sequence data before the first header".to_string(),
            });
        }
    }

    records.extend(current);
    Ok(records)
}

/// Writes a record as a header line followed by the unwrapped sequence.
pub fn write_record(mut writer: impl Write, id: &str, sequence: &str) -> std::io::Result<()> {
    writeln!(writer, ">{id}")?;
    writeln!(writer, "{sequence}")
}
