//! gem failure signatures.

use super::{CacheDir, ErrorSignature, Pattern, RemedialStep};
use crate::runtime::RuntimeKind;
use once_cell::sync::Lazy;
use regex::Regex;

static SIGNATURES: Lazy<Vec<ErrorSignature>> = Lazy::new(|| {
    vec![
        ErrorSignature {
            id: "gem-permission",
            summary: "gem installation directory is not writable",
            pattern: Pattern::Substring("Gem::FilePermissionError"),
            remediation: vec![RemedialStep::TakeOwnership {
                dir: CacheDir::GemHome,
            }],
            terminal: false,
        },
        ErrorSignature {
            id: "ruby-version",
            summary: "installed ruby does not satisfy a gem's requirement",
            pattern: Pattern::Regex(
                Regex::new(r"requires Ruby version (?P<req>[^\n.]+(?:\.[0-9]+)*)")
                    .expect("ruby version pattern"),
            ),
            remediation: vec![RemedialStep::EnsureRuntime(RuntimeKind::Ruby)],
            terminal: false,
        },
        ErrorSignature {
            id: "native-extension",
            summary: "a gem's native extension failed to build",
            pattern: Pattern::Substring("Failed to build gem native extension"),
            remediation: vec![RemedialStep::Run {
                label: "rebuild extensions for the installed ruby",
                command: "gem pristine --all",
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
    fn test_gem_permission_signature() {
        let text = "ERROR:  While executing gem ... (Gem::FilePermissionError)\n\
                    You don't have write permissions for the /usr/lib/ruby/gems/3.0.0 directory.";
        let m = classify(Ecosystem::Ruby, text).unwrap();
        assert_eq!(m.signature.id, "gem-permission");
    }

    #[test]
    fn test_ruby_version_signature_captures_requirement() {
        let text = "ERROR:  Error installing rails:\n\
                    rails-8.0.0 requires Ruby version >= 3.2.0. The current ruby version is 3.0.4.";
        let m = classify(Ecosystem::Ruby, text).unwrap();
        assert_eq!(m.signature.id, "ruby-version");
        assert_eq!(m.requirement.as_deref(), Some(">= 3.2.0"));
    }

    #[test]
    fn test_native_extension_signature() {
        let text = "Building native extensions. This could take a while...\n\
                    ERROR:  Error installing nokogiri:\n\
                    ERROR: Failed to build gem native extension.";
        let m = classify(Ecosystem::Ruby, text).unwrap();
        assert_eq!(m.signature.id, "native-extension");
    }
}
