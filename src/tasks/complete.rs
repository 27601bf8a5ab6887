use std::collections::BTreeSet;

use clap::ValueEnum;

use crate::app::App;
use crate::domain::{FormatSelector, TileFormat};
use crate::error::MapsError;
use crate::fetch::Fetcher;
use crate::process::ProcessRunner;

/// Dynamic shell-completion sources, read from the data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompletionProvider {
    /// Downloaded region names.
    Pbf,
    /// `schema/name` of generated MBTiles.
    Mbtiles,
    /// `schema/name` of tiles of a given type, or of every type.
    Tiles,
}

impl<F: Fetcher, R: ProcessRunner> App<F, R> {
    pub fn completion_candidates(
        &self,
        provider: CompletionProvider,
        kind: Option<&str>,
    ) -> Result<Vec<String>, MapsError> {
        let formats = match provider {
            CompletionProvider::Pbf => {
                return Ok(self
                    .store
                    .list_pbf()?
                    .into_iter()
                    .map(|entry| entry.name)
                    .collect());
            }
            CompletionProvider::Mbtiles => vec![TileFormat::Mbtiles],
            CompletionProvider::Tiles => match kind {
                Some(kind) => kind.parse::<FormatSelector>()?.formats(),
                None => TileFormat::ALL.to_vec(),
            },
        };

        let mut names = BTreeSet::new();
        for format in formats {
            for entry in self.store.list_tiles(format)? {
                names.insert(format!(
                    "{}/{}",
                    entry.schema.unwrap_or_default(),
                    entry.name
                ));
            }
        }
        Ok(names.into_iter().collect())
    }
}
