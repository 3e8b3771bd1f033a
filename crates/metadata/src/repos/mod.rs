//! Repository trait definitions.

pub mod assets;
pub mod multipart;
pub mod sessions;

pub use assets::AssetRepo;
pub use multipart::MultipartRepo;
pub use sessions::SessionRepo;
