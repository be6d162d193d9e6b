pub mod declarative;
pub mod extract;

pub use declarative::{load_configs_dir, related_images, DeclarativeConfig, RelatedImage};
pub use extract::FbcExtractor;
