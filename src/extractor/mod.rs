pub mod descriptor;
pub mod models;
pub mod resolver;
pub mod traits;
pub mod ytdlp;

pub use descriptor::{MediaDescriptor, Variant, VariantKind};
pub use models::{Format, VideoInfo};
pub use resolver::{MetadataCache, SourceResolver};
pub use traits::{ExtractOptions, Extractor};
pub use ytdlp::YtDlpExtractor;
