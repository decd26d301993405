mod block;
mod metadata;
mod result;

pub use self::block::{ContentBlock, Link};
pub use self::metadata::{ContentZones, ExtractionHints, Metadata, SelectorList};
pub use self::result::ExtractionResult;
