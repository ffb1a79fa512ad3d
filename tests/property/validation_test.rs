// tests/property/validation_test.rs

//! Property-based tests for command-line validation
//! Tests that the shape checks hold for arbitrary input

use proptest::prelude::*;
use smtplane::connection::{LineRejection, UpgradeTrigger, upgrade_trigger, validate_line};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_short_lines_never_validate(line in ".{0,3}") {
        prop_assert_eq!(validate_line(&line), Err(LineRejection::Malformed));
    }

    #[test]
    fn test_fifth_character_must_be_space(
        token in ".{4}",
        fifth in "[^ ]",
        rest in ".{0,50}",
    ) {
        let line = format!("{token}{fifth}{rest}");
        prop_assert_eq!(validate_line(&line), Err(LineRejection::Malformed));
    }

    #[test]
    fn test_well_formed_lines_yield_uppercase_token(
        token in "[a-zA-Z]{4}",
        argument in prop::option::of(".{0,995}"),
    ) {
        let line = match &argument {
            Some(argument) => format!("{token} {argument}"),
            None => token.clone(),
        };
        prop_assume!(line.chars().count() <= 1000);
        prop_assert_eq!(validate_line(&line), Ok(token.to_ascii_uppercase()));
    }

    #[test]
    fn test_lookup_token_ignores_case(token in "[a-zA-Z]{4}", argument in "[ -~]{0,20}") {
        let lower = format!("{} {argument}", token.to_ascii_lowercase());
        let upper = format!("{} {argument}", token.to_ascii_uppercase());
        prop_assert_eq!(validate_line(&lower), validate_line(&upper));
    }

    #[test]
    fn test_long_lines_are_rejected(token in "[A-Z]{4}", extra in 1usize..500) {
        let line = format!("{token} {}", "a".repeat(995 + extra));
        prop_assert!(line.chars().count() > 1000);
        prop_assert_eq!(validate_line(&line), Err(LineRejection::TooLong));
    }

    #[test]
    fn test_trigger_with_any_suffix_has_parameters(suffix in ".{1,40}") {
        let line = format!("STARTTLS{suffix}");
        prop_assert_eq!(upgrade_trigger(&line), Some(UpgradeTrigger::WithParameters));
    }

    #[test]
    fn test_non_trigger_lines_are_not_upgrades(line in "[^S].{0,40}") {
        prop_assert_eq!(upgrade_trigger(&line), None);
    }
}
