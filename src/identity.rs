use crate::errors::*;
use nix::errno::Errno;
use nix::unistd::{Gid, Group, Uid, User};
use std::fmt;

/// The user and group to drop privileges to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    name: String,
    uid: Uid,
    gid: Gid,
}

impl Identity {
    /// An identity as found in the user database
    pub fn new<T: Into<String>>(name: T, uid: Uid, gid: Gid) -> Self {
        Identity {
            name: name.into(),
            uid,
            gid,
        }
    }

    /// User name, for lookups and messages
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The user to switch to
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// The group to switch to; the user's primary group unless overridden
    pub fn gid(&self) -> Gid {
        self.gid
    }

    /// Same user, with a different group
    pub fn with_gid(self, gid: Gid) -> Self {
        Identity { gid, ..self }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (uid {}, gid {})", self.name, self.uid, self.gid)
    }
}

/// A source of user and group entries
///
/// `Ok(None)` means the entry does not exist; `Err` means the database could
/// not be queried.
pub trait IdentityDatabase {
    fn user_by_name(&self, name: &str) -> nix::Result<Option<Identity>>;

    fn user_by_uid(&self, uid: Uid) -> nix::Result<Option<Identity>>;

    fn group_by_name(&self, name: &str) -> nix::Result<Option<Gid>>;

    fn group_by_gid(&self, gid: Gid) -> nix::Result<Option<Gid>>;
}

/// The system user and group databases (`getpwnam(3)` and friends)
#[derive(Default, Clone, Copy, Debug)]
pub struct SystemDatabase;

impl IdentityDatabase for SystemDatabase {
    fn user_by_name(&self, name: &str) -> nix::Result<Option<Identity>> {
        if name.contains('\0') {
            return Err(Errno::EINVAL);
        }
        Ok(User::from_name(name)?.map(|user| Identity::new(user.name, user.uid, user.gid)))
    }

    fn user_by_uid(&self, uid: Uid) -> nix::Result<Option<Identity>> {
        Ok(User::from_uid(uid)?.map(|user| Identity::new(user.name, user.uid, user.gid)))
    }

    fn group_by_name(&self, name: &str) -> nix::Result<Option<Gid>> {
        if name.contains('\0') {
            return Err(Errno::EINVAL);
        }
        Ok(Group::from_name(name)?.map(|group| group.gid))
    }

    fn group_by_gid(&self, gid: Gid) -> nix::Result<Option<Gid>> {
        Ok(Group::from_gid(gid)?.map(|group| group.gid))
    }
}

/// Interpret `identifier` as a numeric id, if it is one.
///
/// Zero is never taken as a number, so that nothing falls through to root by
/// accident; "0" is looked up as a name instead.
fn numeric_id(identifier: &str) -> Option<u32> {
    if identifier.is_empty() || !identifier.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }
    identifier.parse::<u32>().ok().filter(|&id| id != 0)
}

/// Look up a user by uid if `identifier` is a nonzero number, by name otherwise
pub fn resolve_user<D: IdentityDatabase + ?Sized>(
    database: &D,
    identifier: &str,
) -> Result<Identity, PrivDropError> {
    let found = match numeric_id(identifier) {
        Some(uid) => database.user_by_uid(Uid::from_raw(uid)),
        None => database.user_by_name(identifier),
    };
    found
        .map_err(|e| {
            PrivDropError::from(e)
                .at(Step::ResolveIdentity)
                .about(identifier)
        })?
        .ok_or_else(|| {
            PrivDropError::from((ErrorKind::IdentityNotFound, "User not found"))
                .at(Step::ResolveIdentity)
                .about(identifier)
        })
}

/// Look up a group by gid if `identifier` is a nonzero number, by name otherwise
pub fn resolve_group<D: IdentityDatabase + ?Sized>(
    database: &D,
    identifier: &str,
) -> Result<Gid, PrivDropError> {
    let found = match numeric_id(identifier) {
        Some(gid) => database.group_by_gid(Gid::from_raw(gid)),
        None => database.group_by_name(identifier),
    };
    found
        .map_err(|e| {
            PrivDropError::from(e)
                .at(Step::ResolveIdentity)
                .about(identifier)
        })?
        .ok_or_else(|| {
            PrivDropError::from((ErrorKind::IdentityNotFound, "Group not found"))
                .at(Step::ResolveIdentity)
                .about(identifier)
        })
}

/// Look up a user in the system database
pub fn resolve(identifier: &str) -> Result<Identity, PrivDropError> {
    resolve_user(&SystemDatabase, identifier)
}
