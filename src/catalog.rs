use std::{collections::HashSet, fs::File, io::BufReader, ops::Deref, path::Path};

use miette::{miette, Context, IntoDiagnostic};
use serde::Deserialize;

use crate::{
    result::{Error, Result},
    types::{ClipId, SourceUri},
};

/// Textual data displayed alongside a clip
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClipMetadata {
    pub username: String,
    pub avatar: String,
    pub verified: bool,
    pub description: String,
    pub likes: String,
    pub comments: String,
    pub shares: String,
    pub audio: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClipDescriptor {
    pub id: ClipId,
    pub source: SourceUri,
    pub poster: String,
    #[serde(default)]
    pub metadata: ClipMetadata,
}

/// The ordered, read-only list of clips making up the feed
#[derive(Debug, Default)]
pub struct ClipCatalog(Vec<ClipDescriptor>);

impl ClipCatalog {
    pub fn new(clips: Vec<ClipDescriptor>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(clips.len());
        if let Some(dup) = clips.iter().find(|clip| !seen.insert(&clip.id)) {
            return Err(miette!("Clip id {} appears more than once in the catalog", dup.id).into());
        }

        Ok(Self(clips))
    }

    /// Read a catalog from a JSON file containing an array of clips
    pub fn read_from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not open catalog file {}", path.display()))?;

        let clips: Vec<ClipDescriptor> = serde_json::from_reader(BufReader::new(file))
            .into_diagnostic()
            .wrap_err("Could not parse catalog JSON")?;

        Self::new(clips)
    }

    pub fn get(&self, index: usize) -> Result<&ClipDescriptor> {
        self.0.get(index).ok_or(Error::InvalidIndex {
            index,
            len: self.0.len(),
        })
    }

    pub fn shuffle(&mut self) {
        fastrand::shuffle(&mut self.0);
    }
}

impl Deref for ClipCatalog {
    type Target = [ClipDescriptor];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
pub(crate) fn sample_catalog(len: usize) -> ClipCatalog {
    let clips = (0..len)
        .map(|i| ClipDescriptor {
            id: ClipId::new(format!("{}", i + 1)),
            source: SourceUri::new(format!("https://cdn.example/clip{i}.mp4")),
            poster: format!("/posters/clip{i}.jpg"),
            metadata: ClipMetadata::default(),
        })
        .collect();

    ClipCatalog::new(clips).unwrap()
}
