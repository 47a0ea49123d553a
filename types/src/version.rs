use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub static VERSION: Lazy<Version> = Lazy::new(|| {
    let version_string: &str = env!("CARGO_PKG_VERSION");
    match version_string.split('.').collect::<Vec<_>>()[..] {
        [major, minor, patch] => Some(Version {
            major: major
                .parse()
                .expect("Could not parse major portion of version"),
            minor: minor
                .parse()
                .expect("Could not parse minor portion of version"),
            patch: patch
                .parse()
                .expect("Could not parse patch portion of version"),
        }),
        _ => None,
    }
    .unwrap_or_else(|| panic!("Could not parse CARGO_PKG_VERSION into Version"))
});

#[derive(Debug, Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct Version {
    pub major: u8,
    pub minor: u16,
    pub patch: u16,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
