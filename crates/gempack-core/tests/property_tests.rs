//! Property-based tests for path resolution, the tar codec, and policies.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use gempack_core::ErrorKind;
use gempack_core::SecurityPolicy;
use gempack_core::security::Check;
use gempack_core::security::install_location;
use gempack_core::tar::TarReader;
use gempack_core::tar::TarWriter;
use proptest::prelude::*;
use std::path::Path;

const ROOT: &str = "/srv/gems/a-2";

proptest! {
    /// Plain relative names always land inside the destination.
    #[test]
    fn prop_relative_names_stay_inside(
        components in prop::collection::vec("[a-zA-Z0-9_.-]{1,12}", 1..6)
    ) {
        prop_assume!(components.iter().all(|c| c != "." && c != ".."));
        let name = components.join("/");
        let resolved = install_location(&name, ROOT).unwrap();
        prop_assert!(resolved.starts_with(ROOT));
        prop_assert!(resolved.ends_with(&name));
    }

    /// Climbing above the root is rejected no matter how the climb is mixed
    /// with descents.
    #[test]
    fn prop_net_climb_rejected(
        down in prop::collection::vec("[a-z]{1,8}", 0..4),
        extra in 1usize..4,
        tail in "[a-z]{1,8}\\.rb",
    ) {
        let ups = vec![".."; down.len() + extra];
        let mut parts: Vec<&str> = down.iter().map(String::as_str).collect();
        parts.extend(ups);
        parts.push(tail.as_str());
        let name = parts.join("/");

        let err = install_location(&name, ROOT).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Path);
        let expected_suffix = format!(" of {ROOT} is not allowed");
        prop_assert!(err.to_string().ends_with(&expected_suffix));
    }

    /// Descending and climbing back out to the same level is harmless.
    #[test]
    fn prop_balanced_climb_accepted(
        down in prop::collection::vec("[a-z]{1,8}", 1..4),
        tail in "[a-z]{1,8}\\.rb",
    ) {
        let ups = vec![".."; down.len()];
        let name = format!("{}/{}/{}", down.join("/"), ups.join("/"), tail);
        let resolved = install_location(&name, ROOT).unwrap();
        prop_assert_eq!(resolved, Path::new(ROOT).join(&tail));
    }

    /// Absolute names are rejected unless they already point inside.
    #[test]
    fn prop_absolute_names_outside_rejected(name in "/(tmp|etc|usr)/[a-z]{1,8}") {
        prop_assert!(install_location(&name, ROOT).is_err());
    }

    /// Whatever the writer produces, the reader returns unchanged.
    #[test]
    fn prop_tar_preserves_entries(
        entries in prop::collection::vec(
            ("[a-z]{1,20}(/[a-z]{1,20}){0,3}", 0u32..0o7777, prop::collection::vec(any::<u8>(), 0..2048)),
            0..6,
        )
    ) {
        let mut writer = TarWriter::new(Vec::new());
        for (name, mode, data) in &entries {
            writer.add_bytes(name, *mode, data).unwrap();
        }
        let bytes = writer.finish().unwrap();
        prop_assert_eq!(bytes.len() % 512, 0);

        let mut reader = TarReader::new(bytes.as_slice());
        for (name, mode, data) in &entries {
            let mut entry = reader.next_entry().unwrap().expect("entry");
            prop_assert_eq!(entry.name(), name.as_str());
            prop_assert_eq!(entry.header().mode(), *mode);
            prop_assert_eq!(&entry.read_all().unwrap(), data);
        }
        prop_assert!(reader.next_entry().unwrap().is_none());
    }

    /// A cut anywhere inside an archive never yields wrong data: reading
    /// either stops early or fails.
    #[test]
    fn prop_truncation_never_corrupts(
        data in prop::collection::vec(any::<u8>(), 1..3000),
        cut_ratio in 0.0f64..1.0,
    ) {
        let mut writer = TarWriter::new(Vec::new());
        writer.add_bytes("payload", 0o644, &data).unwrap();
        let bytes = writer.finish().unwrap();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let cut = (bytes.len() as f64 * cut_ratio) as usize;

        let mut reader = TarReader::new(&bytes[..cut]);
        match reader.next_entry() {
            Ok(Some(mut entry)) => {
                if let Ok(read) = entry.read_all() {
                    prop_assert_eq!(&read, &data);
                }
            }
            Ok(None) | Err(_) => {}
        }
    }
}

#[test]
fn test_policy_levels_are_supersets() {
    for pair in SecurityPolicy::ALL.windows(2) {
        let (weaker, stronger) = (pair[0], pair[1]);
        assert!(weaker < stronger);
        assert!(
            weaker.required_checks().is_subset(&stronger.required_checks()),
            "{weaker} should require a subset of {stronger}"
        );
    }
    assert!(SecurityPolicy::High.requires(Check::RequireAllSigned));
    assert!(!SecurityPolicy::Medium.requires(Check::RequireAllSigned));
}
