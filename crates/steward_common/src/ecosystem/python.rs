//! pip failure signatures.

use super::{ErrorSignature, Pattern, RemedialStep};
use once_cell::sync::Lazy;
use regex::Regex;

static SIGNATURES: Lazy<Vec<ErrorSignature>> = Lazy::new(|| {
    vec![
        ErrorSignature {
            id: "externally-managed",
            summary: "interpreter environment is externally managed",
            pattern: Pattern::Substring("externally-managed-environment"),
            remediation: vec![RemedialStep::IsolatedEnvRetry],
            terminal: false,
        },
        ErrorSignature {
            id: "site-permission",
            summary: "site-packages is not writable",
            pattern: Pattern::Regex(
                Regex::new(r"(?s)Could not install packages due to an OSError.*Permission denied|Permission denied.*site-packages")
                    .expect("site permission pattern"),
            ),
            // a private environment sidesteps the system site entirely
            remediation: vec![RemedialStep::IsolatedEnvRetry],
            terminal: false,
        },
        ErrorSignature {
            id: "dist-not-found",
            summary: "a required distribution no longer exists on the index",
            pattern: Pattern::Regex(
                Regex::new(r"No matching distribution found for (?P<pkg>[A-Za-z0-9][A-Za-z0-9._-]*)")
                    .expect("distribution pattern"),
            ),
            remediation: vec![
                RemedialStep::Run {
                    label: "uninstall the missing requirement",
                    command: "python -m pip uninstall -y {pkg}",
                },
                RemedialStep::ReinstallFromManifest,
            ],
            terminal: false,
        },
    ]
});

pub(super) fn signatures() -> &'static [ErrorSignature] {
    &SIGNATURES
}
