use crate::credentials::{probe_root, Credentials};
use crate::errors::*;
use log::{debug, warn};
use nix::unistd::Gid;
use std::fmt;
use std::iter::FromIterator;

/// On FreeBSD the first entry of the list given to `setgroups(2)` becomes the
/// effective gid, so the current one has to be put there explicitly.
const EGID_LEADS_GROUP_LIST: bool = cfg!(target_os = "freebsd");

/// A list of supplementary group ids
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupSet {
    gids: Vec<Gid>,
}

impl GroupSet {
    pub fn single(gid: Gid) -> Self {
        GroupSet { gids: vec![gid] }
    }

    pub fn as_slice(&self) -> &[Gid] {
        &self.gids
    }

    pub fn len(&self) -> usize {
        self.gids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gids.is_empty()
    }

    /// Whether `self`, as reported by the kernel, already amounts to `desired`.
    ///
    /// Some kernels keep the effective gid in the supplementary list no matter
    /// what was asked for, so `self` may hold a single extra `egid` entry at
    /// any position. Any other difference makes the lists non-equivalent.
    pub fn equivalent(&self, desired: &GroupSet, egid: Gid) -> bool {
        let current = &self.gids;
        match current.len().checked_sub(desired.len()) {
            Some(0) | Some(1) => {}
            _ => return false,
        }
        let mut j = 0;
        for want in &desired.gids {
            loop {
                match current.get(j) {
                    Some(have) if have == want => {
                        j += 1;
                        break;
                    }
                    Some(&have) if have == egid => j += 1,
                    _ => return false,
                }
            }
        }
        match &current[j..] {
            [] => true,
            [last] => *last == egid,
            _ => false,
        }
    }

    fn with_leading(&self, gid: Gid) -> GroupSet {
        let mut gids = Vec::with_capacity(self.gids.len() + 1);
        gids.push(gid);
        gids.extend_from_slice(&self.gids);
        GroupSet { gids }
    }
}

impl From<Vec<Gid>> for GroupSet {
    fn from(gids: Vec<Gid>) -> Self {
        GroupSet { gids }
    }
}

impl FromIterator<Gid> for GroupSet {
    fn from_iter<I: IntoIterator<Item = Gid>>(iter: I) -> Self {
        GroupSet {
            gids: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for GroupSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, gid) in self.gids.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", gid)?;
        }
        f.write_str("}")
    }
}

/// What `ensure_groups` did to the supplementary groups
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupUpdate {
    /// The current list was already equivalent
    Unchanged,
    /// The list was replaced
    Replaced,
}

/// The list to hand to the OS for `desired`
fn os_group_list(desired: &GroupSet, egid: Gid, egid_leads: bool) -> GroupSet {
    if egid_leads {
        desired.with_leading(egid)
    } else {
        desired.clone()
    }
}

/// Make the supplementary groups equivalent to `desired`.
///
/// When running as root the list is always replaced and a refusal is a
/// `CredentialChangeFailed`. Otherwise it is only replaced when it differs,
/// and a refusal is a `SupplementaryGroupChangeFailed`: an unprivileged process
/// is usually not allowed to change its own groups.
pub fn ensure_groups<C: Credentials + ?Sized>(
    credentials: &mut C,
    desired: &GroupSet,
) -> Result<GroupUpdate, PrivDropError> {
    let privileged = probe_root(credentials);
    let egid = credentials.effective_gid();
    let target = os_group_list(desired, egid, EGID_LEADS_GROUP_LIST);
    let current = credentials.groups().map(GroupSet::from);

    if privileged {
        match current {
            Ok(ref current) => debug!(
                "Supplementary groups {} (equivalent to {}: {})",
                current,
                target,
                current.equivalent(&target, egid)
            ),
            Err(ref e) => warn!("Unable to read the supplementary groups: {}", e),
        }
        credentials.set_groups(target.as_slice()).map_err(|e| {
            PrivDropError::from(e)
                .with_kind(ErrorKind::CredentialChangeFailed)
                .at(Step::DropSupplementaryGroups)
                .about(&target)
        })?;
        return Ok(GroupUpdate::Replaced);
    }

    let current = current.map_err(|e| {
        PrivDropError::from(e)
            .with_kind(ErrorKind::SupplementaryGroupChangeFailed)
            .at(Step::DropSupplementaryGroups)
    })?;
    if current.equivalent(&target, egid) {
        debug!("Supplementary groups {} already match {}", current, target);
        return Ok(GroupUpdate::Unchanged);
    }
    credentials.set_groups(target.as_slice()).map_err(|e| {
        PrivDropError::from(e)
            .with_kind(ErrorKind::SupplementaryGroupChangeFailed)
            .at(Step::DropSupplementaryGroups)
            .about(&target)
    })?;
    Ok(GroupUpdate::Replaced)
}
