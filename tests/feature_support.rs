//! Tests for the optional `serde` and `proptest` features

#[cfg(feature = "serde")]
mod serde_support {
    use formcheck::{Phase, Severity};

    #[test]
    fn phase_uses_kebab_case() {
        assert_eq!(serde_json::to_string(&Phase::AfterOthers).unwrap(), "\"after-others\"");
        let phase: Phase = serde_json::from_str("\"with-initial\"").unwrap();
        assert_eq!(phase, Phase::WithInitial);
    }

    #[test]
    fn phase_names_match_display() {
        for phase in Phase::ALL {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{phase}\""));
        }
    }

    #[test]
    fn severity_uses_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"warning\"");
        let severity: Severity = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(severity, Severity::Error);
    }

    #[test]
    fn unknown_phase_is_rejected() {
        assert!(serde_json::from_str::<Phase>("\"eventually\"").is_err());
    }
}

#[cfg(feature = "proptest")]
mod proptest_support {
    use formcheck::Phase;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn arbitrary_phase_is_one_of_all(phase in any::<Phase>()) {
            prop_assert!(Phase::ALL.contains(&phase));
        }
    }
}
