//! Failure policy for every error site in the pipeline.
//!
//! Each place where the pipeline can observe a failure is named by a
//! [`FailureSite`]. [`policy_for`] maps every site to either [`Policy::Continue`]
//! (log a warning, skip or pass through the item, keep going) or
//! [`Policy::Abort`] (stop the whole run). Stages look the decision up here
//! instead of hard-coding it at the call site.
//!
//! | Site              | Policy   |
//! |-------------------|----------|
//! | `ResolvePath`     | Abort    |
//! | `WalkEntry`       | Continue |
//! | `HashSource`      | Continue |
//! | `CopySource`      | Continue |
//! | `CopyDestination` | Continue |
//! | `CreateBucket`    | Abort    |

use std::fmt;

/// A place in the pipeline where a failure can be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureSite {
    /// Resolving the absolute path of a walked entry.
    ResolvePath,
    /// Reading a directory entry during traversal.
    WalkEntry,
    /// Opening or reading a file while hashing it.
    HashSource,
    /// Opening or reading the source file while copying it.
    CopySource,
    /// Creating, writing or closing the destination file.
    CopyDestination,
    /// Creating an output bucket directory.
    CreateBucket,
}

/// What a stage does after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Log a warning and keep processing the remaining items.
    Continue,
    /// Stop the run and report the error.
    Abort,
}

/// Every failure site with its policy.
pub const POLICY_TABLE: [(FailureSite, Policy); 6] = [
    (FailureSite::ResolvePath, Policy::Abort),
    (FailureSite::WalkEntry, Policy::Continue),
    (FailureSite::HashSource, Policy::Continue),
    (FailureSite::CopySource, Policy::Continue),
    (FailureSite::CopyDestination, Policy::Continue),
    (FailureSite::CreateBucket, Policy::Abort),
];

/// Look up the policy for a failure site.
#[must_use]
pub const fn policy_for(site: FailureSite) -> Policy {
    match site {
        FailureSite::ResolvePath | FailureSite::CreateBucket => Policy::Abort,
        FailureSite::WalkEntry
        | FailureSite::HashSource
        | FailureSite::CopySource
        | FailureSite::CopyDestination => Policy::Continue,
    }
}

impl FailureSite {
    /// Policy for this site.
    #[must_use]
    pub const fn policy(self) -> Policy {
        policy_for(self)
    }

    /// Whether a failure at this site stops the run.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self.policy(), Policy::Abort)
    }
}

impl fmt::Display for FailureSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ResolvePath => "resolve-path",
            Self::WalkEntry => "walk-entry",
            Self::HashSource => "hash-source",
            Self::CopySource => "copy-source",
            Self::CopyDestination => "copy-destination",
            Self::CreateBucket => "create-bucket",
        };
        f.write_str(name)
    }
}
