//! Property tests for merging, overrides and range checks

#[cfg(test)]
mod tests {
    use crate::config::merge::{deep_merge, get_path, missing_keys, set_path, MISSING};
    use crate::config::overrides::{parse_override, OverrideKind};
    use crate::config::schema::*;
    use crate::config::validate::{validate_config, ValidationError};
    use proptest::prelude::*;
    use serde_yaml::{Mapping, Value};

    // ============================================================
    // Arbitrary Generators
    // ============================================================

    fn arb_key() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-z][a-z0-9_]{0,8}").unwrap()
    }

    fn arb_dotted_key() -> impl Strategy<Value = String> {
        proptest::collection::vec(arb_key(), 1..4).prop_map(|parts| parts.join("."))
    }

    fn arb_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            (-1000i64..1000).prop_map(Value::from),
            "[a-z]{1,8}".prop_map(Value::from),
        ]
    }

    fn arb_tree() -> impl Strategy<Value = Value> {
        arb_leaf().prop_recursive(3, 24, 4, |inner| {
            proptest::collection::btree_map(arb_key(), inner, 0..4).prop_map(|entries| {
                let mut map = Mapping::new();
                for (k, v) in entries {
                    map.insert(Value::from(k), v);
                }
                Value::Mapping(map)
            })
        })
    }

    fn arb_non_finite() -> impl Strategy<Value = f64> {
        prop_oneof![Just(f64::NAN), Just(f64::INFINITY), Just(f64::NEG_INFINITY)]
    }

    fn base_config() -> SolverConfig {
        serde_yaml::from_str(
            r#"
sample_rate: 16000
channels: 1
compression_model_checkpoint: //pretrained/audiogen_encodec_16khz
dataset:
  batch_size: 128
  segment_duration: 10
  min_segment_ratio: 1.0
  train:
    batch_size: 256
    aug_p: 0.5
    mix_p: 0.5
    mix_snr_low: -5
    mix_snr_high: 5
    mix_min_overlap: 0.5
optim:
  epochs: 100
  lr: 0.0005
  optimizer: adamw
"#,
        )
        .unwrap()
    }

    // ============================================================
    // Merge
    // ============================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_merge_into_empty_is_identity(tree in arb_tree()) {
            let mut base = Value::Mapping(Mapping::new());
            deep_merge(&mut base, tree.clone());
            prop_assert_eq!(base, tree);
        }

        #[test]
        fn prop_merge_is_idempotent(a in arb_tree(), b in arb_tree()) {
            let mut once = a.clone();
            deep_merge(&mut once, b.clone());
            let mut twice = once.clone();
            deep_merge(&mut twice, b);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_overlay_leaf_wins(key in arb_dotted_key(), base in arb_tree(), leaf in arb_leaf()) {
            let mut overlay = Value::Mapping(Mapping::new());
            set_path(&mut overlay, &key, leaf.clone()).unwrap();
            let mut merged = if base.is_mapping() { base } else { Value::Mapping(Mapping::new()) };
            deep_merge(&mut merged, overlay);
            prop_assert_eq!(get_path(&merged, &key), Some(&leaf));
        }

        #[test]
        fn prop_set_missing_is_reported(key in arb_dotted_key()) {
            let mut tree = Value::Mapping(Mapping::new());
            set_path(&mut tree, &key, Value::from(MISSING)).unwrap();
            prop_assert_eq!(missing_keys(&tree), vec![key]);
        }
    }

    // ============================================================
    // Overrides
    // ============================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_override_prefixes(key in arb_dotted_key(), value in -1000i64..1000) {
            let set = parse_override(&format!("{key}={value}")).unwrap();
            prop_assert_eq!(set.kind, OverrideKind::Set);
            prop_assert_eq!(&set.key, &key);
            prop_assert_eq!(set.value, Some(Value::from(value)));

            let add = parse_override(&format!("+{key}={value}")).unwrap();
            prop_assert_eq!(add.kind, OverrideKind::Add);

            let force = parse_override(&format!("++{key}={value}")).unwrap();
            prop_assert_eq!(force.kind, OverrideKind::ForceAdd);

            let delete = parse_override(&format!("~{key}")).unwrap();
            prop_assert_eq!(delete.kind, OverrideKind::Delete);
            prop_assert_eq!(delete.value, None);
        }

        #[test]
        fn prop_set_requires_value(key in arb_dotted_key()) {
            prop_assert!(parse_override(&key).is_err());
        }
    }

    // ============================================================
    // Range checks
    // ============================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn prop_probabilities_in_range_pass(
            aug_p in 0.0f64..=1.0,
            mix_p in 0.01f64..=1.0,
            min_segment_ratio in 0.0f64..=1.0,
            overlap in 0.0f64..=1.0,
        ) {
            let mut config = base_config();
            config.dataset.train.aug_p = aug_p;
            config.dataset.train.mix_p = mix_p;
            config.dataset.train.mix_min_overlap = overlap;
            config.dataset.min_segment_ratio = min_segment_ratio;
            prop_assert!(validate_config(&config).is_ok());
        }

        #[test]
        fn prop_probability_above_one_fails(excess in 1e-6f64..10.0, field in 0usize..3) {
            let mut config = base_config();
            let value = 1.0 + excess;
            match field {
                0 => config.dataset.train.aug_p = value,
                1 => config.dataset.train.mix_p = value,
                _ => config.dataset.min_segment_ratio = value,
            }
            let is_probability_error = matches!(
                validate_config(&config),
                Err(ValidationError::InvalidProbability { .. })
            );
            prop_assert!(is_probability_error);
        }

        #[test]
        fn prop_negative_probability_fails(value in -10.0f64..-1e-6) {
            let mut config = base_config();
            config.dataset.train.aug_p = value;
            prop_assert!(validate_config(&config).is_err());
        }

        #[test]
        fn prop_snr_ordering(low in -40.0f64..40.0, high in -40.0f64..40.0) {
            let mut config = base_config();
            config.dataset.train.mix_snr_low = low;
            config.dataset.train.mix_snr_high = high;
            let result = validate_config(&config);
            if low <= high {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(result, Err(ValidationError::InvalidSnrRange { low, high }));
            }
        }

        #[test]
        fn prop_snr_with_non_finite_bound_fails(finite in -40.0f64..40.0, bad in arb_non_finite(), low_side in any::<bool>()) {
            let mut config = base_config();
            if low_side {
                config.dataset.train.mix_snr_low = bad;
                config.dataset.train.mix_snr_high = finite;
            } else {
                config.dataset.train.mix_snr_low = finite;
                config.dataset.train.mix_snr_high = bad;
            }
            let is_snr_error = matches!(
                validate_config(&config),
                Err(ValidationError::InvalidSnrRange { .. })
            );
            prop_assert!(is_snr_error);
        }

        #[test]
        fn prop_non_finite_float_fields_fail(bad in arb_non_finite(), field in 0usize..8) {
            let mut config = base_config();
            match field {
                0 => config.dataset.train.aug_p = bad,
                1 => config.dataset.train.mix_p = bad,
                2 => config.dataset.min_segment_ratio = bad,
                3 => config.dataset.segment_duration = Some(bad),
                4 => config.optim.lr = bad,
                5 => config.optim.max_norm = bad,
                6 => config.generate.lm.temp = bad,
                _ => {
                    config.optim.ema.enabled = true;
                    config.optim.ema.updates = Some(10);
                    config.optim.ema.decay = bad;
                }
            }
            prop_assert!(validate_config(&config).is_err());
        }

        #[test]
        fn prop_effective_batch_never_exceeds_loaded(batch in 1usize..1024, mix_p in 0.0f64..=1.0) {
            let mut config = base_config();
            config.dataset.train.batch_size = Some(batch);
            config.dataset.train.mix_p = mix_p;
            prop_assert!(config.dataset.effective_train_batch_size() <= batch);
        }
    }
}
