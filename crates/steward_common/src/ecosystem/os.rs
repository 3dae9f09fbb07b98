//! pacman failure signatures.

use super::{CacheDir, ErrorSignature, Pattern, RemedialStep};
use once_cell::sync::Lazy;
use regex::Regex;

static SIGNATURES: Lazy<Vec<ErrorSignature>> = Lazy::new(|| {
    vec![
        ErrorSignature {
            id: "db-lock",
            summary: "stale pacman database lock",
            pattern: Pattern::Substring("unable to lock database"),
            remediation: vec![RemedialStep::Run {
                label: "remove stale database lock",
                command: "rm -f /var/lib/pacman/db.lck",
            }],
            terminal: false,
        },
        ErrorSignature {
            id: "keyring",
            summary: "package signatures are untrusted or invalid",
            pattern: Pattern::Regex(
                Regex::new(r"signature from .+ is (unknown trust|invalid|marginal trust)")
                    .expect("keyring pattern"),
            ),
            // refresh the keyring, but do not blind-retry a full
            // upgrade over a trust failure
            remediation: vec![
                RemedialStep::Run {
                    label: "reinstall the distribution keyring",
                    command: "pacman -S --noconfirm archlinux-keyring",
                },
                RemedialStep::Run {
                    label: "refresh pacman keys",
                    command: "pacman-key --refresh-keys",
                },
            ],
            terminal: true,
        },
        ErrorSignature {
            id: "mirror-retrieval",
            summary: "mirror could not serve a database or package file",
            pattern: Pattern::Substring("failed retrieving file"),
            remediation: vec![RemedialStep::Run {
                label: "force database refresh",
                command: "pacman -Syy",
            }],
            terminal: false,
        },
        ErrorSignature {
            id: "cache-permission",
            summary: "package cache is not writable",
            pattern: Pattern::Regex(
                Regex::new(r"(?i)/var/cache/pacman.*permission denied").expect("cache pattern"),
            ),
            remediation: vec![RemedialStep::TakeOwnership {
                dir: CacheDir::PacmanCache,
            }],
            terminal: false,
        },
    ]
});

pub(super) fn signatures() -> &'static [ErrorSignature] {
    &SIGNATURES
}
