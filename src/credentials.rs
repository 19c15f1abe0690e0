use nix::errno::Errno;
use nix::unistd::{self, Gid, Uid};
use std::process;
use std::ptr;

/// Access to the credentials of the current process
///
/// Every privilege change goes through this trait, so that the order of the
/// calls can be checked without touching the credentials of the test process.
pub trait Credentials {
    /// Set the effective user id only
    fn set_effective_uid(&mut self, uid: Uid) -> nix::Result<()>;

    /// Set the group id (real, effective and saved when privileged)
    fn set_gid(&mut self, gid: Gid) -> nix::Result<()>;

    /// Set the user id (real, effective and saved when privileged)
    fn set_uid(&mut self, uid: Uid) -> nix::Result<()>;

    /// Current effective group id
    fn effective_gid(&self) -> Gid;

    /// Current supplementary groups, in the order the kernel reports them
    fn groups(&mut self) -> nix::Result<Vec<Gid>>;

    /// Replace the supplementary groups
    fn set_groups(&mut self, groups: &[Gid]) -> nix::Result<()>;

    /// Real and effective user ids
    fn uids(&self) -> (Uid, Uid);

    /// Real and effective group ids
    fn gids(&self) -> (Gid, Gid);

    /// Terminate the process without unwinding back to the caller
    fn abort(&mut self, reason: &str) -> ! {
        eprintln!("{}", reason);
        process::abort()
    }
}

/// Whether the process can act as root, found by trying to become it.
///
/// The reported ids cannot be trusted for this: a set-user-id binary can
/// report ids that do not match what it is actually allowed to do.
pub fn probe_root<C: Credentials + ?Sized>(credentials: &mut C) -> bool {
    credentials.set_effective_uid(Uid::from_raw(0)).is_ok()
}

/// The credentials of the running process
#[derive(Default, Clone, Copy, Debug)]
pub struct SystemCredentials;

impl Credentials for SystemCredentials {
    fn set_effective_uid(&mut self, uid: Uid) -> nix::Result<()> {
        unistd::seteuid(uid)
    }

    fn set_gid(&mut self, gid: Gid) -> nix::Result<()> {
        unistd::setgid(gid)
    }

    fn set_uid(&mut self, uid: Uid) -> nix::Result<()> {
        unistd::setuid(uid)
    }

    fn effective_gid(&self) -> Gid {
        unistd::getegid()
    }

    fn groups(&mut self) -> nix::Result<Vec<Gid>> {
        let count = Errno::result(unsafe { libc::getgroups(0, ptr::null_mut()) })?;
        let mut raw: Vec<libc::gid_t> = vec![0; count as usize];
        let count = Errno::result(unsafe { libc::getgroups(count, raw.as_mut_ptr()) })?;
        raw.truncate(count as usize);
        Ok(raw.into_iter().map(Gid::from_raw).collect())
    }

    fn set_groups(&mut self, groups: &[Gid]) -> nix::Result<()> {
        let raw: Vec<libc::gid_t> = groups.iter().map(|gid| gid.as_raw()).collect();
        Errno::result(unsafe { libc::setgroups(raw.len() as _, raw.as_ptr()) }).map(drop)
    }

    fn uids(&self) -> (Uid, Uid) {
        (unistd::getuid(), unistd::geteuid())
    }

    fn gids(&self) -> (Gid, Gid) {
        (unistd::getgid(), unistd::getegid())
    }
}
