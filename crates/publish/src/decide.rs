//! The publish decision.
//!
//! Pure functions: given the local fingerprint, what the cache remembers,
//! what the remote reports and the policy, decide what to do with a file.
//! Precedence, first match wins:
//!
//! 1. The cache holds the local hash (and not forced): nothing to do, and no
//!    need to ask the backend.
//! 2. Create-only and the remote exists: skip, remembering whatever hash the
//!    remote reported.
//! 3. The remote holds the local hash (and not forced): skip, remembering it.
//! 4. Otherwise upload: an update if the remote exists, a create if not.

use crate::probe::RemoteState;
use crate::record::Disposition;
use shipr_storage::ContentHash;

/// Policy flags that change the decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Policy {
    /// Bypass the cache and remote-hash shortcuts.
    pub force: bool,
    /// Never overwrite an existing remote object.
    pub create_only: bool,
}

/// What to do with a file once the remote has been probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Leave the remote alone; remember this hash for the key (if any).
    Skip(Option<ContentHash>),
    /// Upload, overwriting the remote object.
    Update,
    /// Upload a new remote object.
    Create,
}
impl Decision {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Skip(_) => Disposition::Skip,
            Self::Update => Disposition::Update,
            Self::Create => Disposition::Create,
        }
    }
}

/// Whether the cache already vouches for `local`. When it does, the file is
/// done without a probe.
pub fn is_cached(local: &ContentHash, cached: Option<&str>, policy: Policy) -> bool {
    !policy.force && cached.is_some_and(|cached| local == cached)
}

/// Decide based on the probed remote state.
pub fn decide(local: &ContentHash, remote: &RemoteState, policy: Policy) -> Decision {
    if policy.create_only && remote.exists {
        return Decision::Skip(remote.content_hash.clone());
    }
    if !policy.force && remote.exists && remote.content_hash.as_ref() == Some(local) {
        return Decision::Skip(Some(local.clone()));
    }
    match remote.exists {
        true => Decision::Update,
        false => Decision::Create,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const FORCE: Policy = Policy {
        force: true,
        create_only: false,
    };
    const CREATE_ONLY: Policy = Policy {
        force: false,
        create_only: true,
    };
    const BOTH: Policy = Policy {
        force: true,
        create_only: true,
    };

    fn hash(value: &str) -> ContentHash {
        ContentHash::from(value)
    }

    #[rstest]
    #[case::hit(Some("h1"), Policy::default(), true)]
    #[case::miss(Some("h2"), Policy::default(), false)]
    #[case::empty(None, Policy::default(), false)]
    #[case::forced(Some("h1"), FORCE, false)]
    #[case::create_only_hit(Some("h1"), CREATE_ONLY, true)]
    fn cache_check(#[case] cached: Option<&str>, #[case] policy: Policy, #[case] expected: bool) {
        assert_eq!(is_cached(&hash("h1"), cached, policy), expected);
    }

    #[test]
    fn cache_comparison_is_exact() {
        assert!(!is_cached(&hash("abc"), Some("ABC"), Policy::default()));
        assert!(!is_cached(&hash("abc"), Some("abc "), Policy::default()));
    }

    #[rstest]
    #[case::absent(RemoteState::absent(), Policy::default(), Decision::Create)]
    #[case::same(RemoteState::existing(Some(hash("h1"))), Policy::default(), Decision::Skip(Some(hash("h1"))))]
    #[case::different(RemoteState::existing(Some(hash("h0"))), Policy::default(), Decision::Update)]
    #[case::unhashed(RemoteState::existing(None), Policy::default(), Decision::Update)]
    #[case::forced_same(RemoteState::existing(Some(hash("h1"))), FORCE, Decision::Update)]
    #[case::forced_absent(RemoteState::absent(), FORCE, Decision::Create)]
    #[case::create_only_different(RemoteState::existing(Some(hash("h0"))), CREATE_ONLY, Decision::Skip(Some(hash("h0"))))]
    #[case::create_only_unhashed(RemoteState::existing(None), CREATE_ONLY, Decision::Skip(None))]
    #[case::create_only_absent(RemoteState::absent(), CREATE_ONLY, Decision::Create)]
    #[case::create_only_beats_force(RemoteState::existing(Some(hash("h0"))), BOTH, Decision::Skip(Some(hash("h0"))))]
    fn remote_decision(#[case] remote: RemoteState, #[case] policy: Policy, #[case] expected: Decision) {
        assert_eq!(decide(&hash("h1"), &remote, policy), expected);
    }

    #[test]
    fn dispositions() {
        assert_eq!(Decision::Skip(None).disposition(), Disposition::Skip);
        assert_eq!(Decision::Update.disposition(), Disposition::Update);
        assert_eq!(Decision::Create.disposition(), Disposition::Create);
    }
}
