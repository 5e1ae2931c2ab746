use std::{fs, path::Path, sync::Arc};

use genome::{ContigOrder, Position};
use located_error::LocatedError;
use anyhow::Result;

mod error;
pub use error::ShardTableError;

/// The external, user-supplied description of where shard boundaries go: a
/// tab-separated `CONTIG  START  END` triple per line (only the first triple on a
/// line is taken as that row's tentative cut position). Lines are permitted to carry
/// extra, repeated triples; only the first is meaningful here.
pub struct ShardTable {
    positions: Vec<Position>,
    order: Arc<ContigOrder>,
}

impl ShardTable {
    /// Parse `path`, building a fresh [`ContigOrder`] from the contigs named in
    /// first-appearance order, then one [`Position`] per non-comment line.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let loc_msg = || format!("While loading shards table '{}'", path.display());

        let contents = fs::read_to_string(path)
            .map_err(|e| ShardTableError::Read(path.display().to_string(), e))
            .with_loc(loc_msg)?;

        let rows: Vec<(usize, &str, &str)> = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .map(|(idx, line)| {
                let fields: Vec<&str> = line.split('\t').collect();
                if fields.is_empty() || fields.len() % 3 != 0 {
                    return Err(ShardTableError::FieldCountNotMultipleOfThree {
                        path: path.display().to_string(),
                        line_no: idx + 1,
                        field_count: fields.len(),
                    });
                }
                Ok((idx + 1, fields[0], fields[1]))
            })
            .collect::<Result<Vec<_>, _>>()
            .with_loc(loc_msg)?;

        let order = Arc::new(ContigOrder::from_first_appearance(rows.iter().map(|(_, contig, _)| *contig)));

        let positions = rows
            .into_iter()
            .map(|(line_no, contig, start)| {
                let start: u32 = start.parse().map_err(|_| ShardTableError::InvalidStart {
                    path: path.display().to_string(),
                    line_no,
                    field: start.to_owned(),
                })?;
                Ok(Position::new(contig, start, Arc::clone(&order))?)
            })
            .collect::<Result<Vec<_>, ShardTableError>>()
            .with_loc(loc_msg)?;

        Ok(Self { positions, order })
    }

    /// Number of shard-table rows, i.e. `numShardsInFile`.
    #[must_use]
    pub fn num_shards(&self) -> usize {
        self.positions.len()
    }

    /// The tentative cut `Position` for shard-table row `shard_no`.
    #[must_use]
    pub fn position(&self, shard_no: usize) -> &Position {
        &self.positions[shard_no]
    }

    /// The [`ContigOrder`] shared by every `Position` this table produced.
    #[must_use]
    pub fn order(&self) -> &Arc<ContigOrder> {
        &self.order
    }
}
