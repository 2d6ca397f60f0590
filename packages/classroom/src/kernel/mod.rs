//! Infrastructure seam: collaborator traits, the deps bundle, test doubles.

pub mod deps;
pub mod test_dependencies;
pub mod traits;

pub use deps::ClassroomDeps;
pub use traits::{
    BaseMultimedia, BaseStorage, ConvertRequest, ConvertedMedia, SignedUrl, StorageLocation,
    UploadRequest,
};
