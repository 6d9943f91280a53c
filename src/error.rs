//! Error types
//!
//! Only precondition violations are errors. Truncated walks and placement
//! exhaustion are reported as regular results so a failed spawn attempt
//! simply means nothing appears this time.

use std::path::PathBuf;

use thiserror::Error;

use crate::track::{JunctionId, SegmentId};

/// Walk-ahead precondition failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalkError {
    /// Direction had to be inferred from a velocity that is (nearly) zero
    #[error("cannot infer walking direction from a zero velocity without an explicit fallback")]
    ZeroVelocity,

    /// Walk started on a segment the graph does not contain
    #[error("unknown start segment {0:?}")]
    UnknownSegment(SegmentId),
}

/// Rail network construction and switching failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown segment {0:?}")]
    UnknownSegment(SegmentId),

    #[error("unknown junction {0:?}")]
    UnknownJunction(JunctionId),

    /// Junction switched to a branch it does not have
    #[error("junction {junction:?} has {branches} out branches, cannot select {requested}")]
    BranchOutOfRange {
        junction: JunctionId,
        branches: usize,
        requested: usize,
    },

    /// Junction built without any out branch
    #[error("junction needs at least one out branch")]
    NoOutBranches,
}

/// Configuration load/save failures
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Why an obstacle event did not start
///
/// None of these are fatal: the event is skipped and nothing appears.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("a placement search is already running")]
    Busy,

    #[error("no train to spawn ahead of")]
    NoTrain,

    #[error("no track near the train")]
    NoTrack,

    #[error(transparent)]
    Walk(#[from] WalkError),

    #[error("an obstacle already exists within {threshold}m of the event position")]
    TooClose { threshold: f32 },

    #[error("unknown obstacle type '{0}'")]
    UnknownObstacle(String),

    #[error("no obstacle is eligible here")]
    NoEligibleObstacle,

    #[error("no variants available for obstacle '{0}'")]
    NoVariants(String),
}
