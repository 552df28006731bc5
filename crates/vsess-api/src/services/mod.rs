//! Business logic services.

pub mod error;
pub mod session;

pub use error::{SessionError, SessionResult};
pub use session::{
    ArtifactDownload, AssetDetails, DeletedAsset, FrameImage, ReadinessReport, RestoreSummary,
    SessionService,
};
