#[cfg(test)]
pub mod test {
    use serde::{Deserialize, Serialize};
    use serde_json::{Value, json};

    use crate::types::Mapping;

    /// Five levels deep on one branch, flat on the other.
    pub fn nested_sample() -> Value {
        json!({
            "a": {
                "a": {
                    "a": {
                        "a": {
                            "a": 1,
                            "b": 2
                        }
                    }
                },
                "b": 10
            },
            "b": 2
        })
    }

    pub fn mapping(value: Value) -> Mapping {
        match value {
            Value::Object(map) => map,
            other => panic!("fixture is not a mapping: {other}"),
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct TestConfig {
        pub host: String,
        pub port: u16,
        pub debug: bool,
        pub database: TestDbConfig,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct TestDbConfig {
        pub url: Option<String>,
        pub pool_size: usize,
    }

    impl Default for TestConfig {
        fn default() -> Self {
            Self {
                host: "localhost".into(),
                port: 8080,
                debug: false,
                database: TestDbConfig {
                    url: None,
                    pool_size: 5,
                },
            }
        }
    }

    pub mod strategies {
        use proptest::prelude::*;
        use serde_json::Value;

        use crate::types::Mapping;

        fn segment() -> impl Strategy<Value = String> {
            "[a-z_][a-z0-9_-]{0,6}"
        }

        fn terminal() -> impl Strategy<Value = Value> {
            prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(Value::from),
                "[ -~]{0,12}".prop_map(Value::String),
                prop::collection::vec(any::<i32>().prop_map(Value::from), 0..4)
                    .prop_map(Value::Array),
            ]
        }

        /// Nested mappings with well-formed keys and no empty sub-mappings
        /// (those have no flattened form).
        pub fn nested_mapping() -> impl Strategy<Value = Mapping> {
            let leaf = terminal();
            let tree = leaf.prop_recursive(4, 48, 5, |inner| {
                prop::collection::btree_map(segment(), inner, 1..5)
                    .prop_map(|m| Value::Object(m.into_iter().collect()))
            });
            prop::collection::btree_map(segment(), tree, 0..6)
                .prop_map(|m| m.into_iter().collect())
        }
    }
}
