use crate::credentials::{probe_root, Credentials, SystemCredentials};
use crate::errors::*;
use crate::groups::{ensure_groups, GroupSet};
use crate::identity::{resolve_group, resolve_user, Identity, IdentityDatabase, SystemDatabase};
use log::{debug, error, info, warn};

/// PrivDrop structure
///
/// # Example
/// ```no_run
/// use verified_privdrop::PrivDrop;
///
/// PrivDrop::default().user("nobody").group("nogroup").apply().unwrap();
/// ```
#[derive(Default, Clone, Debug)]
pub struct PrivDrop {
    user: Option<String>,
    group: Option<String>,
}

/// Result of a successful `apply()`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dropped {
    /// The process could not act as root to begin with; nothing was changed
    AlreadyUnprivileged,
    /// The process now runs as this identity and cannot get root back
    To(Identity),
}

/// Progress of a drop. There is no way back to an earlier stage.
#[derive(Debug)]
enum Stage {
    Unknown,
    CheckedRoot,
    IdentityResolved(Identity),
    GroupDropped(Identity),
    SupplementaryDropped(Identity),
    UserDropped(Identity),
    Verified(Identity),
}

impl PrivDrop {
    /// Set the user to switch to, by name or by numeric uid
    pub fn user<T: AsRef<str>>(mut self, user: T) -> Self {
        self.user = Some(user.as_ref().to_owned());
        self
    }

    /// Set a group to switch to, if different from the primary group of the user
    pub fn group<T: AsRef<str>>(mut self, group: T) -> Self {
        self.group = Some(group.as_ref().to_owned());
        self
    }

    /// Apply the changes to the running process
    pub fn apply(self) -> Result<Dropped, PrivDropError> {
        self.apply_with(&mut SystemCredentials, &SystemDatabase)
    }

    /// Apply the changes through the given credentials and identity database.
    ///
    /// If root can still be assumed once the drop is complete, this does not
    /// return: `Credentials::abort` is called instead.
    pub fn apply_with<C, D>(self, credentials: &mut C, database: &D) -> Result<Dropped, PrivDropError>
    where
        C: Credentials + ?Sized,
        D: IdentityDatabase + ?Sized,
    {
        let mut stage = Stage::Unknown;
        loop {
            stage = match stage {
                Stage::Unknown => {
                    if !probe_root(credentials) {
                        info!("Not running as root, keeping the current credentials");
                        return Ok(Dropped::AlreadyUnprivileged);
                    }
                    Stage::CheckedRoot
                }
                Stage::CheckedRoot => Stage::IdentityResolved(self.do_resolve(database)?),
                Stage::IdentityResolved(identity) => {
                    do_drop_group(credentials, &identity)?;
                    Stage::GroupDropped(identity)
                }
                Stage::GroupDropped(identity) => {
                    do_drop_supplementary_groups(credentials, &identity)?;
                    Stage::SupplementaryDropped(identity)
                }
                Stage::SupplementaryDropped(identity) => {
                    do_drop_user(credentials, &identity)?;
                    Stage::UserDropped(identity)
                }
                Stage::UserDropped(identity) => {
                    do_verify(credentials, &identity)?;
                    Stage::Verified(identity)
                }
                Stage::Verified(identity) => {
                    info!("Dropped privileges to {}", identity);
                    return Ok(Dropped::To(identity));
                }
            };
            debug!("Privilege drop: {:?}", stage);
        }
    }

    fn do_resolve<D: IdentityDatabase + ?Sized>(&self, database: &D) -> Result<Identity, PrivDropError> {
        let user = self.user.as_deref().ok_or_else(|| {
            PrivDropError::from((ErrorKind::InvalidConfig, "No user to drop privileges to"))
                .at(Step::ResolveIdentity)
        })?;
        let identity = resolve_user(database, user)?;
        match self.group.as_deref() {
            None => Ok(identity),
            Some(group) => Ok(identity.with_gid(resolve_group(database, group)?)),
        }
    }
}

/// Must happen while still root: once the uid is gone, so is the right to change the gid.
fn do_drop_group<C: Credentials + ?Sized>(
    credentials: &mut C,
    identity: &Identity,
) -> Result<(), PrivDropError> {
    credentials.set_gid(identity.gid()).map_err(|e| {
        PrivDropError::from(e)
            .with_kind(ErrorKind::CredentialChangeFailed)
            .at(Step::DropGroup)
            .about(identity.gid())
    })
}

fn do_drop_supplementary_groups<C: Credentials + ?Sized>(
    credentials: &mut C,
    identity: &Identity,
) -> Result<(), PrivDropError> {
    match ensure_groups(credentials, &GroupSet::single(identity.gid())) {
        Ok(update) => {
            debug!("Supplementary groups: {:?}", update);
            Ok(())
        }
        Err(e) if !e.is_fatal() => {
            warn!("{}", e);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn do_drop_user<C: Credentials + ?Sized>(
    credentials: &mut C,
    identity: &Identity,
) -> Result<(), PrivDropError> {
    credentials.set_uid(identity.uid()).map_err(|e| {
        PrivDropError::from(e)
            .with_kind(ErrorKind::CredentialChangeFailed)
            .at(Step::DropUser)
            .about(identity.uid())
    })
}

fn do_verify<C: Credentials + ?Sized>(
    credentials: &mut C,
    identity: &Identity,
) -> Result<(), PrivDropError> {
    // Root must never be handed back as an ordinary error, whatever the ids say.
    if probe_root(credentials) {
        let e = PrivDropError::from((ErrorKind::PrivilegeReacquired, "Able to regain root, aborting"))
            .at(Step::Verify)
            .about(identity);
        error!("{}", e);
        credentials.abort(&e.to_string());
    }
    let (ruid, euid) = credentials.uids();
    if ruid != identity.uid() || euid != identity.uid() {
        return Err(
            PrivDropError::from((ErrorKind::CredentialChangeFailed, "User id was not changed"))
                .at(Step::Verify)
                .about(format!(
                    "expected {}, real {}, effective {}",
                    identity.uid(),
                    ruid,
                    euid
                )),
        );
    }
    let (rgid, egid) = credentials.gids();
    if rgid != identity.gid() || egid != identity.gid() {
        return Err(
            PrivDropError::from((ErrorKind::CredentialChangeFailed, "Group id was not changed"))
                .at(Step::Verify)
                .about(format!(
                    "expected {}, real {}, effective {}",
                    identity.gid(),
                    rgid,
                    egid
                )),
        );
    }
    Ok(())
}

/// Drop privileges to `user` and `group` (names or numeric ids)
pub fn drop_privileges(user: &str, group: &str) -> Result<Dropped, PrivDropError> {
    PrivDrop::default().user(user).group(group).apply()
}
