//! In-memory stand-ins for the process credentials and the identity database.

use crate::credentials::Credentials;
use crate::identity::{Identity, IdentityDatabase};
use nix::errno::Errno;
use nix::unistd::{Gid, Uid};
use std::cell::RefCell;

/// A credential-changing call, in the order it was made
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    SetEffectiveUid(u32),
    SetGid(u32),
    SetUid(u32),
    GetGroups,
    SetGroups(Vec<u32>),
}

/// A process whose credentials follow the usual Unix rules
#[derive(Clone, Debug, Default)]
pub struct FakeSystem {
    pub ruid: u32,
    pub euid: u32,
    pub suid: u32,
    pub rgid: u32,
    pub egid: u32,
    pub sgid: u32,
    pub groups: Vec<u32>,
    pub calls: Vec<Call>,
    /// Let `seteuid(0)` succeed whatever the current ids are
    pub back_door: bool,
    pub refuse_set_gid: bool,
    pub refuse_set_uid: bool,
    pub refuse_set_groups: bool,
    /// Report a different uid than the one that was set
    pub misreport_uid: Option<u32>,
    /// Number of `seteuid(0)` calls allowed to succeed; later ones are refused
    pub root_probe_limit: Option<usize>,
    root_probes: usize,
}

impl FakeSystem {
    pub fn root() -> Self {
        FakeSystem {
            groups: vec![0],
            ..FakeSystem::default()
        }
    }

    pub fn user(uid: u32, gid: u32) -> Self {
        FakeSystem {
            ruid: uid,
            euid: uid,
            suid: uid,
            rgid: gid,
            egid: gid,
            sgid: gid,
            groups: vec![gid],
            ..FakeSystem::default()
        }
    }
}

impl Credentials for FakeSystem {
    fn set_effective_uid(&mut self, uid: Uid) -> nix::Result<()> {
        let uid = uid.as_raw();
        self.calls.push(Call::SetEffectiveUid(uid));
        if uid == 0 {
            self.root_probes += 1;
            if self.root_probe_limit.map_or(false, |limit| self.root_probes > limit) {
                return Err(Errno::EPERM);
            }
        }
        if self.euid == 0 || uid == self.ruid || uid == self.suid || self.back_door {
            self.euid = uid;
            Ok(())
        } else {
            Err(Errno::EPERM)
        }
    }

    fn set_gid(&mut self, gid: Gid) -> nix::Result<()> {
        let gid = gid.as_raw();
        self.calls.push(Call::SetGid(gid));
        if self.refuse_set_gid {
            return Err(Errno::EPERM);
        }
        if self.euid == 0 {
            self.rgid = gid;
            self.egid = gid;
            self.sgid = gid;
            Ok(())
        } else if gid == self.rgid || gid == self.sgid {
            self.egid = gid;
            Ok(())
        } else {
            Err(Errno::EPERM)
        }
    }

    fn set_uid(&mut self, uid: Uid) -> nix::Result<()> {
        let uid = uid.as_raw();
        self.calls.push(Call::SetUid(uid));
        if self.refuse_set_uid {
            return Err(Errno::EPERM);
        }
        if self.euid == 0 {
            self.ruid = uid;
            self.euid = uid;
            self.suid = uid;
            Ok(())
        } else if uid == self.ruid || uid == self.suid {
            self.euid = uid;
            Ok(())
        } else {
            Err(Errno::EPERM)
        }
    }

    fn effective_gid(&self) -> Gid {
        Gid::from_raw(self.egid)
    }

    fn groups(&mut self) -> nix::Result<Vec<Gid>> {
        self.calls.push(Call::GetGroups);
        Ok(self.groups.iter().copied().map(Gid::from_raw).collect())
    }

    fn set_groups(&mut self, groups: &[Gid]) -> nix::Result<()> {
        let groups: Vec<u32> = groups.iter().map(|gid| gid.as_raw()).collect();
        self.calls.push(Call::SetGroups(groups.clone()));
        if self.refuse_set_groups || self.euid != 0 {
            return Err(Errno::EPERM);
        }
        self.groups = groups;
        Ok(())
    }

    fn uids(&self) -> (Uid, Uid) {
        let reported = self.misreport_uid.unwrap_or(self.ruid);
        (Uid::from_raw(reported), Uid::from_raw(self.euid))
    }

    fn gids(&self) -> (Gid, Gid) {
        (Gid::from_raw(self.rgid), Gid::from_raw(self.egid))
    }

    fn abort(&mut self, reason: &str) -> ! {
        panic!("process aborted: {}", reason)
    }
}

/// A lookup made against a `FakeDatabase`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    UserByName(String),
    UserByUid(u32),
    GroupByName(String),
    GroupByGid(u32),
}

#[derive(Debug, Default)]
pub struct FakeDatabase {
    users: Vec<Identity>,
    groups: Vec<(String, Gid)>,
    lookups: RefCell<Vec<Lookup>>,
}

impl FakeDatabase {
    pub fn with_user(mut self, name: &str, uid: u32, gid: u32) -> Self {
        self.users
            .push(Identity::new(name, Uid::from_raw(uid), Gid::from_raw(gid)));
        self
    }

    pub fn with_group(mut self, name: &str, gid: u32) -> Self {
        self.groups.push((name.to_string(), Gid::from_raw(gid)));
        self
    }

    pub fn lookups(&self) -> Vec<Lookup> {
        self.lookups.borrow().clone()
    }
}

impl IdentityDatabase for FakeDatabase {
    fn user_by_name(&self, name: &str) -> nix::Result<Option<Identity>> {
        self.lookups
            .borrow_mut()
            .push(Lookup::UserByName(name.to_string()));
        Ok(self.users.iter().find(|user| user.name() == name).cloned())
    }

    fn user_by_uid(&self, uid: Uid) -> nix::Result<Option<Identity>> {
        self.lookups
            .borrow_mut()
            .push(Lookup::UserByUid(uid.as_raw()));
        Ok(self.users.iter().find(|user| user.uid() == uid).cloned())
    }

    fn group_by_name(&self, name: &str) -> nix::Result<Option<Gid>> {
        self.lookups
            .borrow_mut()
            .push(Lookup::GroupByName(name.to_string()));
        Ok(self
            .groups
            .iter()
            .find(|(group, _)| group == name)
            .map(|&(_, gid)| gid))
    }

    fn group_by_gid(&self, gid: Gid) -> nix::Result<Option<Gid>> {
        self.lookups
            .borrow_mut()
            .push(Lookup::GroupByGid(gid.as_raw()));
        Ok(self
            .groups
            .iter()
            .find(|&&(_, known)| known == gid)
            .map(|&(_, gid)| gid))
    }
}
