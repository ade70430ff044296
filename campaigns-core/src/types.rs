//! Domain types for campaigns and their changesets.
//!
//! Identifiers are newtypes over the integer keys the store hands out.
//! All types are serializable/deserializable via serde + serde_yaml.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<$inner> for $name {
            fn from(v: $inner) -> Self {
                Self(v)
            }
        }
    };
}

id_newtype!(
    /// Primary key of a repository known to the code host directory.
    RepoId(i32)
);
id_newtype!(
    /// Primary key of a campaign.
    CampaignId(i64)
);
id_newtype!(
    /// Primary key of a desired spec set (one per campaign application).
    CampaignSpecId(i64)
);
id_newtype!(
    /// Primary key of a changeset row. `ChangesetId(0)` marks an unsaved row.
    ChangesetId(i64)
);
id_newtype!(
    /// Primary key of an immutable changeset spec.
    ChangesetSpecId(i64)
);

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The kind of code host a repository lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExternalServiceKind {
    #[default]
    GitHub,
    GitLab,
    BitbucketServer,
    AwsCodeCommit,
    Gitolite,
    Phabricator,
    Other,
}

impl ExternalServiceKind {
    /// Code hosts that campaigns can open changesets on.
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            ExternalServiceKind::GitHub
                | ExternalServiceKind::GitLab
                | ExternalServiceKind::BitbucketServer
        )
    }

    pub fn all() -> &'static [ExternalServiceKind] {
        &[
            ExternalServiceKind::GitHub,
            ExternalServiceKind::GitLab,
            ExternalServiceKind::BitbucketServer,
            ExternalServiceKind::AwsCodeCommit,
            ExternalServiceKind::Gitolite,
            ExternalServiceKind::Phabricator,
            ExternalServiceKind::Other,
        ]
    }
}

impl fmt::Display for ExternalServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalServiceKind::GitHub => write!(f, "github"),
            ExternalServiceKind::GitLab => write!(f, "gitlab"),
            ExternalServiceKind::BitbucketServer => write!(f, "bitbucketserver"),
            ExternalServiceKind::AwsCodeCommit => write!(f, "awscodecommit"),
            ExternalServiceKind::Gitolite => write!(f, "gitolite"),
            ExternalServiceKind::Phabricator => write!(f, "phabricator"),
            ExternalServiceKind::Other => write!(f, "other"),
        }
    }
}

/// Whether the changeset exists on the code host yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    #[default]
    Unpublished,
    Published,
}

impl fmt::Display for PublicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicationState::Unpublished => write!(f, "unpublished"),
            PublicationState::Published => write!(f, "published"),
        }
    }
}

/// Progress of the asynchronous reconciler on a changeset.
///
/// The rewirer only ever moves a changeset *into* `Queued`; the reconciler
/// owns every transition out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReconcilerState {
    #[default]
    Queued,
    Processing,
    Completed,
    Errored,
}

impl fmt::Display for ReconcilerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcilerState::Queued => write!(f, "queued"),
            ReconcilerState::Processing => write!(f, "processing"),
            ReconcilerState::Completed => write!(f, "completed"),
            ReconcilerState::Errored => write!(f, "errored"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A repository as seen through the viewer's permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub id: RepoId,
    pub name: String,
    #[serde(default)]
    pub external_service_kind: ExternalServiceKind,
}

/// Line statistics of a changeset diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffStat {
    pub added: i32,
    pub changed: i32,
    pub deleted: i32,
}

/// A branch-managed changeset: the campaign pushes `head_ref` and opens a
/// pull request from it when `published` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSpec {
    pub head_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_ref: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub commit_message: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub diff_stat: DiffStat,
}

/// What a changeset spec asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangesetSpecDescription {
    /// Import a changeset that already exists on the code host.
    TrackExisting { external_id: String },
    /// Create or update a changeset from a branch.
    Branch(BranchSpec),
}

/// An immutable, declarative description of one desired changeset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesetSpec {
    pub id: ChangesetSpecId,
    pub campaign_spec_id: CampaignSpecId,
    pub repo_id: RepoId,
    pub description: ChangesetSpecDescription,
    pub created_at: DateTime<Utc>,
}

impl ChangesetSpec {
    /// The external id when this spec imports an existing changeset.
    pub fn importing_external_id(&self) -> Option<&str> {
        match &self.description {
            ChangesetSpecDescription::TrackExisting { external_id } => Some(external_id),
            ChangesetSpecDescription::Branch(_) => None,
        }
    }

    pub fn head_ref(&self) -> Option<&str> {
        match &self.description {
            ChangesetSpecDescription::Branch(branch) => Some(&branch.head_ref),
            ChangesetSpecDescription::TrackExisting { .. } => None,
        }
    }

    /// Diff statistics carried by branch specs; tracked imports have none.
    pub fn diff_stat(&self) -> Option<DiffStat> {
        match &self.description {
            ChangesetSpecDescription::Branch(branch) => Some(branch.diff_stat),
            ChangesetSpecDescription::TrackExisting { .. } => None,
        }
    }
}

/// The mutable record tracking one pull/merge request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Changeset {
    pub id: ChangesetId,
    pub repo_id: RepoId,
    #[serde(default)]
    pub external_service_kind: ExternalServiceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_spec_id: Option<ChangesetSpecId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_spec_id: Option<ChangesetSpecId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by_campaign_id: Option<CampaignId>,
    #[serde(default)]
    pub campaign_ids: BTreeSet<CampaignId>,
    #[serde(default)]
    pub publication_state: PublicationState,
    #[serde(default)]
    pub reconciler_state: ReconcilerState,
    #[serde(default)]
    pub closing: bool,
    #[serde(default)]
    pub unsynced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_stat: Option<DiffStat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    #[serde(default)]
    pub num_resets: u32,
    #[serde(default)]
    pub num_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Changeset {
    pub fn is_published(&self) -> bool {
        self.publication_state == PublicationState::Published
    }

    /// An external id without a current spec: imported by reference, never
    /// authored through a branch.
    pub fn is_tracked_import(&self) -> bool {
        self.external_id.is_some() && self.current_spec_id.is_none()
    }

    pub fn is_attached_to(&self, campaign: CampaignId) -> bool {
        self.campaign_ids.contains(&campaign)
    }

    pub fn is_owned_by(&self, campaign: CampaignId) -> bool {
        self.owned_by_campaign_id == Some(campaign)
    }

    pub fn attach_to(&mut self, campaign: CampaignId) {
        self.campaign_ids.insert(campaign);
    }

    pub fn detach_from(&mut self, campaign: CampaignId) {
        self.campaign_ids.remove(&campaign);
    }

    /// Hand the changeset back to the reconciler: clear failure and progress
    /// markers and set the state to `Queued`.
    pub fn reset_queued(&mut self) {
        self.reconciler_state = ReconcilerState::Queued;
        self.failure_message = None;
        self.num_resets = 0;
        self.num_failures = 0;
        self.started_at = None;
        self.finished_at = None;
        self.process_after = None;
    }
}

/// A named desired set of changes applied across repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_spec_id: Option<CampaignSpecId>,
    #[serde(default)]
    pub changeset_ids: BTreeSet<ChangesetId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(RepoId::from(7).to_string(), "7");
        assert_eq!(ChangesetId::from(42).to_string(), "42");
        assert_eq!(CampaignId::from(1).to_string(), "1");
    }

    #[test]
    fn reset_queued_clears_progress_markers() {
        let now = Utc::now();
        let mut cs = Changeset {
            reconciler_state: ReconcilerState::Errored,
            failure_message: Some("push rejected".to_string()),
            num_resets: 2,
            num_failures: 5,
            started_at: Some(now),
            finished_at: Some(now),
            process_after: Some(now),
            ..Default::default()
        };
        cs.reset_queued();
        assert_eq!(cs.reconciler_state, ReconcilerState::Queued);
        assert_eq!(cs.failure_message, None);
        assert_eq!(cs.num_resets, 0);
        assert_eq!(cs.num_failures, 0);
        assert!(cs.started_at.is_none() && cs.finished_at.is_none() && cs.process_after.is_none());
    }

    #[test]
    fn tracked_import_requires_external_id_without_spec() {
        let mut cs = Changeset {
            external_id: Some("111".to_string()),
            ..Default::default()
        };
        assert!(cs.is_tracked_import());
        cs.current_spec_id = Some(ChangesetSpecId(3));
        assert!(!cs.is_tracked_import());
    }

    #[test]
    fn membership_is_a_set() {
        let mut cs = Changeset::default();
        cs.attach_to(CampaignId(1));
        cs.attach_to(CampaignId(1));
        cs.attach_to(CampaignId(2));
        assert_eq!(cs.campaign_ids.len(), 2);
        cs.detach_from(CampaignId(1));
        assert!(!cs.is_attached_to(CampaignId(1)));
        assert!(cs.is_attached_to(CampaignId(2)));
    }

    #[test]
    fn supported_service_kinds() {
        assert!(ExternalServiceKind::GitHub.is_supported());
        assert!(ExternalServiceKind::BitbucketServer.is_supported());
        assert!(!ExternalServiceKind::Gitolite.is_supported());
        assert!(!ExternalServiceKind::Other.is_supported());
    }

    #[test]
    fn spec_description_serde_is_tagged() {
        let yaml = "kind: track_existing\nexternal_id: '333'\n";
        let desc: ChangesetSpecDescription = serde_yaml::from_str(yaml).expect("deserialize");
        assert_eq!(
            desc,
            ChangesetSpecDescription::TrackExisting {
                external_id: "333".to_string()
            }
        );

        let yaml = "kind: branch\nhead_ref: run-gofmt\npublished: true\n";
        let desc: ChangesetSpecDescription = serde_yaml::from_str(yaml).expect("deserialize");
        match desc {
            ChangesetSpecDescription::Branch(branch) => {
                assert_eq!(branch.head_ref, "run-gofmt");
                assert!(branch.published);
                assert_eq!(branch.diff_stat, DiffStat::default());
            }
            other => panic!("expected branch spec, got {other:?}"),
        }
    }

    #[test]
    fn service_kind_display_matches_serde() {
        for kind in ExternalServiceKind::all() {
            let yaml = serde_yaml::to_string(kind).expect("serialize");
            assert_eq!(yaml.trim(), kind.to_string());
        }
    }
}
