pub mod client;
pub mod error;
pub mod source;
pub mod types;

pub use client::{CollectionClient, CollectionService};
pub use error::{CollectionError, SourceError};
pub use source::{ArtistSource, HttpArtistSource, parse_artist_list};
pub use types::{CollectionItem, CollectionWrite, WorkItem};
