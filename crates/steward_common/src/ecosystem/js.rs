//! npm failure signatures.

use super::{CacheDir, ErrorSignature, Pattern, RemedialStep};
use crate::runtime::RuntimeKind;
use once_cell::sync::Lazy;
use regex::Regex;

static SIGNATURES: Lazy<Vec<ErrorSignature>> = Lazy::new(|| {
    vec![
        ErrorSignature {
            id: "cache-permission",
            summary: "npm cache contains files the user cannot write",
            pattern: Pattern::Regex(
                Regex::new(r"EACCES|cache folder contains root-owned files")
                    .expect("cache pattern"),
            ),
            remediation: vec![RemedialStep::TakeOwnership {
                dir: CacheDir::NpmCache,
            }],
            terminal: false,
        },
        ErrorSignature {
            id: "package-not-found",
            summary: "a referenced package no longer exists in the registry",
            pattern: Pattern::Regex(
                Regex::new(r"404.*'(?P<pkg>[^'@\s]+)[^']*' is not in this registry")
                    .expect("404 pattern"),
            ),
            remediation: vec![
                RemedialStep::Run {
                    label: "uninstall the missing package",
                    command: "npm uninstall -g {pkg}",
                },
                RemedialStep::ReinstallFromManifest,
            ],
            terminal: false,
        },
        ErrorSignature {
            id: "engine-unsupported",
            summary: "installed node does not satisfy the package's engine range",
            pattern: Pattern::Regex(
                Regex::new(r#"(?s)(EBADENGINE|Unsupported engine).*?"node"\s*:\s*"(?P<req>[^"]+)""#)
                    .expect("engine pattern"),
            ),
            remediation: vec![RemedialStep::EnsureRuntime(RuntimeKind::Node)],
            terminal: false,
        },
        ErrorSignature {
            id: "native-build",
            summary: "a native module failed to build",
            pattern: Pattern::Regex(Regex::new(r"gyp ERR!|node-gyp").expect("gyp pattern")),
            remediation: vec![RemedialStep::Run {
                label: "rebuild native modules",
                command: "npm rebuild",
            }],
            terminal: false,
        },
    ]
});

pub(super) fn signatures() -> &'static [ErrorSignature] {
    &SIGNATURES
}

#[cfg(test)]
mod tests {
    use super::super::{classify, Ecosystem};

    #[test]
    fn test_cache_permission_signature() {
        let text = "npm error code EACCES\n\
                    npm error Your cache folder contains root-owned files, this is likely\n\
                    npm error the result of running a previous install with sudo.";
        let m = classify(Ecosystem::Js, text).unwrap();
        assert_eq!(m.signature.id, "cache-permission");
    }

    #[test]
    fn test_package_not_found_captures_the_package() {
        let text = "npm error code E404\n\
                    npm error 404 Not Found - GET https://registry.npmjs.org/left-padx\n\
                    npm error 404  'left-padx@^1.0.0' is not in this registry.";
        let m = classify(Ecosystem::Js, text).unwrap();
        assert_eq!(m.signature.id, "package-not-found");
        assert_eq!(m.package.as_deref(), Some("left-padx"));
    }

    #[test]
    fn test_engine_signature_captures_the_requirement() {
        let text = "npm warn EBADENGINE Unsupported engine {\n\
                    npm warn EBADENGINE   package: 'modern-tool@3.0.0',\n\
                    npm warn EBADENGINE   required: { \"node\": \">=20.0.0\" },\n\
                    npm warn EBADENGINE   current: { node: 'v18.19.0' }\n\
                    npm warn EBADENGINE }";
        let m = classify(Ecosystem::Js, text).unwrap();
        assert_eq!(m.signature.id, "engine-unsupported");
        assert_eq!(m.requirement.as_deref(), Some(">=20.0.0"));
    }

    #[test]
    fn test_native_build_signature() {
        let text = "gyp ERR! build error\ngyp ERR! stack Error: `make` failed with exit code: 2";
        let m = classify(Ecosystem::Js, text).unwrap();
        assert_eq!(m.signature.id, "native-build");
    }

    #[test]
    fn test_eacces_wins_over_later_signatures_when_both_appear() {
        // EACCES while node-gyp output is also present: the earlier
        // declaration decides
        let text = "gyp ERR! stack Error: EACCES: permission denied";
        let m = classify(Ecosystem::Js, text).unwrap();
        assert_eq!(m.signature.id, "cache-permission");
    }
}
