//! Conversation forking.
//!
//! Forking copies a conversation prefix (inclusive of the fork point) into a
//! brand-new conversation so the student can explore an alternate line of
//! discussion without disturbing the original.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StorageError;
use crate::store::{Conversation, ConversationMetadata};

/// Marker prepended to fork titles.
pub const FORK_TITLE_PREFIX: &str = "F: ";

/// Maximum title length in characters, fork marker included.
pub const TITLE_MAX_LEN: usize = 100;

/// What a fork does with the scaffolding stage of the source conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkStagePolicy {
    /// Carry the source conversation's stage into the fork.
    Inherit,
    /// Restart the fork at the first stage.
    Reset,
}

impl ForkStagePolicy {
    /// Get the policy name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ForkStagePolicy::Inherit => "inherit",
            ForkStagePolicy::Reset => "reset",
        }
    }
}

impl std::fmt::Display for ForkStagePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ForkStagePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inherit" => Ok(ForkStagePolicy::Inherit),
            "reset" => Ok(ForkStagePolicy::Reset),
            _ => Err(format!("Unknown fork stage policy: {}", s)),
        }
    }
}

/// Derive the title of a fork from its source title.
///
/// Any existing fork marker is stripped first so chained forks read
/// "F: <title>" rather than "F: F: <title>". When the combined title would
/// exceed [`TITLE_MAX_LEN`] characters the base is truncated and suffixed
/// with "..." so the result is exactly [`TITLE_MAX_LEN`] characters long.
pub fn derive_fork_title(source_title: &str) -> String {
    let base = source_title
        .strip_prefix(FORK_TITLE_PREFIX)
        .unwrap_or(source_title);

    let budget = TITLE_MAX_LEN - FORK_TITLE_PREFIX.chars().count();
    if base.chars().count() > budget {
        let truncated: String = base.chars().take(budget - 3).collect();
        format!("{}{}...", FORK_TITLE_PREFIX, truncated)
    } else {
        format!("{}{}", FORK_TITLE_PREFIX, base)
    }
}

/// Copy `source` up to and including `at_index` into a new conversation.
///
/// The fork gets a fresh id and timestamps, a deep copy of the message
/// prefix (edit flags and frozen originals included), the source context,
/// and a cloned metadata object so later mutation of either conversation
/// cannot leak into the other. The stage either carries over or restarts
/// per `policy`.
pub fn fork_conversation(
    source: &Conversation,
    at_index: usize,
    policy: ForkStagePolicy,
) -> Result<Conversation, StorageError> {
    if at_index >= source.messages.len() {
        return Err(StorageError::InvalidIndex {
            index: at_index,
            len: source.messages.len(),
        });
    }

    let metadata = ConversationMetadata {
        stage_index: match policy {
            ForkStagePolicy::Inherit => source.metadata.stage_index,
            ForkStagePolicy::Reset => 0,
        },
        ..source.metadata.clone()
    };

    let mut fork = Conversation::new(derive_fork_title(&source.title), metadata);
    fork.context = source.context.clone();
    fork.messages = source.messages[..=at_index].to_vec();

    debug!(
        source_id = %source.id,
        fork_id = %fork.id,
        at_index,
        policy = %policy,
        "Forked conversation"
    );
    Ok(fork)
}
