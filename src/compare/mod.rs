pub mod differ;
pub mod normalizer;
pub mod result;
pub mod session;

pub use differ::{diff, DiffOptions, DiffOutput};
pub use normalizer::{normalize, NormalizedImagePair};
pub use result::{build, format_percentage, ComparisonResult};
pub use session::{ComparisonOutcome, ComparisonSession};
