/*!
# verified-privdrop

Permanently drop root privileges, in the right order, and prove it.

## Overview

A process that starts as root (or as a set-user-id root binary) and then
talks to the network should give up root before it reads a single byte of
untrusted input. Doing so is easy to get subtly wrong: changing the user id
first removes the right to change the group id, supplementary groups are
easy to forget, and reading the ids back does not prove that root cannot be
assumed again.

This crate drops privileges in the order required by CERT POS36-C:

1. Probe for root by trying to become it. A process that cannot is left alone.
2. Look up the target user, and optionally a group, by name or numeric id.
3. Switch the group id.
4. Reduce the supplementary groups to the target group.
5. Switch the user id.
6. Check the new ids, then try to become root again. If that works, the
   process is aborted on the spot instead of returning an error that could be
   ignored.

## Basic Example

```no_run
use verified_privdrop::PrivDrop;

fn main() {
    PrivDrop::default()
        .user("nobody")
        .apply()
        .unwrap_or_else(|e| panic!("Failed to drop privileges: {}", e));

    // Continue running with dropped privileges...
}
```

## Using nslcd.conf

```no_run
use verified_privdrop::{Config, DEFAULT_CONFIG_PATH};

fn main() {
    let config = Config::from_path(DEFAULT_CONFIG_PATH)
        .unwrap_or_else(|e| panic!("Unable to load the configuration: {}", e));
    config
        .privdrop()
        .apply()
        .unwrap_or_else(|e| panic!("Failed to drop privileges: {}", e));
}
```

User and group names can also be numeric ids. `"0"` is never taken as a uid
and is looked up as a name.

## Testing

The process credentials and the identity database are reached through the
`Credentials` and `IdentityDatabase` traits, so `PrivDrop::apply_with` can be
exercised against stand-ins without being root.
*/

pub use self::config::*;
pub use self::credentials::*;
pub use self::errors::*;
pub use self::groups::*;
pub use self::identity::*;
pub use self::privdrop::*;

mod config;
mod credentials;
mod errors;
mod groups;
mod identity;
mod privdrop;

#[cfg(test)]
mod testing;

/// Reexported dependencies for use in consuming crates.
///
/// ## Available Reexports
///
/// - `libc`: Low-level bindings to the C standard library
/// - `nix`: Rust friendly bindings to *nix APIs, for `Uid` and `Gid`
pub mod reexports {
    pub use {libc, nix};
}
