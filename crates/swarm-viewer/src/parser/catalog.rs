use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

/// A piece of content a viewer can watch, as listed by `GET /videos`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentDescriptor {
    pub name: String,
}

impl ContentDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Parses a catalog listing: a JSON array of objects carrying at least `name`.
/// Extra fields are ignored.
pub fn parse_catalog(body: &[u8]) -> Result<Vec<ContentDescriptor>, serde_json::Error> {
    serde_json::from_slice(body)
}

/// Uniformly picks one entry, or `None` for an empty catalog.
pub fn choose<'a, R>(catalog: &'a [ContentDescriptor], rng: &mut R) -> Option<&'a ContentDescriptor>
where
    R: Rng + ?Sized,
{
    catalog.choose(rng)
}
