use std::error::Error;
use std::fmt;
use std::io;

/// Types of errors that can occur while dropping privileges
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The target user or group does not exist in the identity database
    IdentityNotFound,
    /// The OS refused a group or user change that the process had the authority to make
    CredentialChangeFailed,
    /// The supplementary groups could not be changed by an unprivileged process
    SupplementaryGroupChangeFailed,
    /// Root could be assumed again after the drop
    PrivilegeReacquired,
    /// System-level error when interacting with the identity database
    SysError,
    /// The configuration could not be read or is malformed
    InvalidConfig,
}

/// The step of a privilege drop during which an error occurred
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum Step {
    ResolveIdentity,
    DropGroup,
    DropSupplementaryGroups,
    DropUser,
    Verify,
    LoadConfig,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::ResolveIdentity => "resolving the target identity",
            Step::DropGroup => "dropping the group id",
            Step::DropSupplementaryGroups => "dropping supplementary groups",
            Step::DropUser => "dropping the user id",
            Step::Verify => "verifying the drop",
            Step::LoadConfig => "loading the configuration",
        };
        f.write_str(s)
    }
}

/// Internal representation of privilege dropping errors
#[derive(Debug)]
enum ErrorRepr {
    /// Error from the nix crate
    FromNix(nix::Error),
    /// Error from an I/O operation
    FromIo(io::Error),
    /// Error with a static description
    WithDescription(&'static str),
}

/// Error type for privilege dropping operations
#[derive(Debug)]
pub struct PrivDropError {
    kind: ErrorKind,
    step: Option<Step>,
    subject: Option<String>,
    repr: ErrorRepr,
}

impl PrivDropError {
    /// What went wrong
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Which step of the drop failed, if the error came from one
    pub fn step(&self) -> Option<Step> {
        self.step
    }

    /// The user, group or identifier the failing step was working on
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Whether the caller must stop instead of carrying on with partial privileges
    pub fn is_fatal(&self) -> bool {
        self.kind != ErrorKind::SupplementaryGroupChangeFailed
    }

    pub(crate) fn at(mut self, step: Step) -> Self {
        self.step = Some(step);
        self
    }

    pub(crate) fn about<T: fmt::Display>(mut self, subject: T) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub(crate) fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }
}

impl Error for PrivDropError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self.repr {
            ErrorRepr::FromNix(ref e) => Some(e),
            ErrorRepr::FromIo(ref e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for PrivDropError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::FromNix(ref e) => write!(f, "Privilege drop error: {}", e)?,
            ErrorRepr::FromIo(ref e) => write!(f, "Privilege drop error: {}", e)?,
            ErrorRepr::WithDescription(description) => {
                write!(f, "Privilege drop error: {}", description)?
            }
        }
        if let Some(step) = self.step {
            write!(f, " while {}", step)?;
        }
        if let Some(ref subject) = self.subject {
            write!(f, " ({})", subject)?;
        }
        Ok(())
    }
}

impl From<nix::Error> for PrivDropError {
    fn from(e: nix::Error) -> PrivDropError {
        PrivDropError {
            kind: ErrorKind::SysError,
            step: None,
            subject: None,
            repr: ErrorRepr::FromNix(e),
        }
    }
}

impl From<io::Error> for PrivDropError {
    fn from(e: io::Error) -> PrivDropError {
        PrivDropError {
            kind: ErrorKind::InvalidConfig,
            step: None,
            subject: None,
            repr: ErrorRepr::FromIo(e),
        }
    }
}

impl From<(ErrorKind, &'static str)> for PrivDropError {
    fn from((kind, description): (ErrorKind, &'static str)) -> PrivDropError {
        PrivDropError {
            kind,
            step: None,
            subject: None,
            repr: ErrorRepr::WithDescription(description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_step_and_subject() {
        let e = PrivDropError::from((ErrorKind::IdentityNotFound, "User not found"))
            .at(Step::ResolveIdentity)
            .about("doesnotexist");
        assert_eq!(
            e.to_string(),
            "Privilege drop error: User not found while resolving the target identity (doesnotexist)"
        );
        assert_eq!(e.kind(), ErrorKind::IdentityNotFound);
        assert_eq!(e.subject(), Some("doesnotexist"));
        assert!(e.is_fatal());
    }

    #[test]
    fn nix_errors_are_chained() {
        let e = PrivDropError::from(nix::Error::EPERM)
            .with_kind(ErrorKind::CredentialChangeFailed)
            .at(Step::DropUser)
            .about(900);
        assert_eq!(e.kind(), ErrorKind::CredentialChangeFailed);
        assert_eq!(e.step(), Some(Step::DropUser));
        assert!(e.source().is_some());
        assert!(e.to_string().ends_with("while dropping the user id (900)"));
    }

    #[test]
    fn supplementary_failures_are_not_fatal() {
        let e = PrivDropError::from(nix::Error::EPERM)
            .with_kind(ErrorKind::SupplementaryGroupChangeFailed);
        assert!(!e.is_fatal());
    }
}
