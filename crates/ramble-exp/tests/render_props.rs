use proptest::prelude::*;
use ramble_core::{variable_env, VarValue};
use ramble_exp::{CrossProductRenderer, RenderSpec, Renderer, Scope, ScopeLevel, ScopeStack};

proptest! {
    #[test]
    fn binding_count_is_zip_length_times_matrix_sizes(
        zip_len in 1usize..5,
        a_len in 1usize..4,
        b_len in 1usize..4,
    ) {
        let list = |len: usize| VarValue::from((0..len as i64).collect::<Vec<_>>());
        let env = variable_env([
            ("z1", list(zip_len)),
            ("z2", list(zip_len)),
            ("a", list(a_len)),
            ("b", list(b_len)),
            ("scalar", VarValue::from("s")),
        ]);
        let spec = RenderSpec {
            matrices: vec![vec!["a".to_string(), "b".to_string()]],
            n_repeats: 0,
        };
        let bindings = CrossProductRenderer.render(&env, &spec).unwrap();
        prop_assert_eq!(bindings.len(), zip_len * a_len * b_len);
        for binding in &bindings {
            prop_assert!(binding.variables.values().all(|value| !value.is_list()));
            prop_assert_eq!(&binding.variables["z1"], &binding.variables["z2"]);
            prop_assert_eq!(&binding.variables["scalar"], &VarValue::from("s"));
        }
    }

    #[test]
    fn highest_scope_defining_a_key_wins(mask in 1u8..128) {
        let mut stack = ScopeStack::new();
        let mut expected = None;
        for (bit, level) in ScopeLevel::ALL.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                stack.set(Scope::new(*level).with_variable("key", level.as_str()));
                expected = Some(level.as_str());
            }
        }
        let merged = stack.merge();
        let expected = expected.map(VarValue::from);
        prop_assert_eq!(merged.get("key"), expected.as_ref());
    }
}
