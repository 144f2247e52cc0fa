//! Generation persistence.
//!
//! A snapshot holds the generation number and every chromosome's action
//! script, so an interrupted run can resume where it stopped. Trial outcomes
//! are deliberately left out; a restored population is re-evaluated from
//! scratch.

use crate::action::Action;
use crate::evolution::ActionSequence;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read or write snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Serialized form of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSnapshot {
    pub generation: u32,
    pub tests: Vec<SerializedTest>,
}

/// Serialized form of one chromosome: its `(position, action code)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedTest {
    pub actions: Vec<(u32, Action)>,
}

impl GenerationSnapshot {
    pub fn new(generation: u32, tests: &[ActionSequence]) -> Self {
        Self {
            generation,
            tests: tests
                .iter()
                .map(|test| SerializedTest {
                    actions: test.actions().collect(),
                })
                .collect(),
        }
    }

    /// Checks that the snapshot describes a usable population.
    pub fn validate(&self) -> Result<(), PersistenceError> {
        if self.generation < 1 {
            return Err(PersistenceError::InvalidSnapshot(
                "generation must be at least 1".to_string(),
            ));
        }
        if self.tests.is_empty() {
            return Err(PersistenceError::InvalidSnapshot(
                "snapshot holds no tests".to_string(),
            ));
        }
        for (i, test) in self.tests.iter().enumerate() {
            let mut seen = HashSet::with_capacity(test.actions.len());
            for (pos, _) in &test.actions {
                if !seen.insert(*pos) {
                    return Err(PersistenceError::InvalidSnapshot(format!(
                        "test {} has more than one action at position {}",
                        i, pos
                    )));
                }
            }
        }
        Ok(())
    }

    /// Rebuilds chromosomes with zeroed outcome fields.
    ///
    /// # Returns
    /// * `(u32, Vec<ActionSequence>)` - The generation number and the rebuilt population
    pub fn into_tests(self) -> (u32, Vec<ActionSequence>) {
        let tests = self
            .tests
            .into_iter()
            .map(|test| ActionSequence::from_actions(test.actions))
            .collect();
        (self.generation, tests)
    }
}

/// Writes a snapshot as JSON to any sink.
pub fn write_snapshot<W: Write>(
    snapshot: &GenerationSnapshot,
    writer: W,
) -> Result<(), PersistenceError> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer(&mut writer, snapshot)?;
    writer.flush()?;
    Ok(())
}

/// Reads and validates a snapshot from any source.
pub fn read_snapshot<R: Read>(reader: R) -> Result<GenerationSnapshot, PersistenceError> {
    let snapshot: GenerationSnapshot = serde_json::from_reader(BufReader::new(reader))?;
    snapshot.validate()?;
    Ok(snapshot)
}

/// Writes a snapshot to a JSON file, replacing whatever was there.
pub fn write_snapshot_to_json(
    snapshot: &GenerationSnapshot,
    output_path: &Path,
) -> Result<(), PersistenceError> {
    write_snapshot(snapshot, File::create(output_path)?)
}

/// Reads a snapshot from a JSON file.
pub fn read_snapshot_from_json(input_path: &Path) -> Result<GenerationSnapshot, PersistenceError> {
    read_snapshot(File::open(input_path)?)
}
