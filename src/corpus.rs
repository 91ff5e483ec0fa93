//! Function corpus: source text plus the argument tuples used to verify
//! and time rewrites of each function.
//!
//! Arguments are kept as JSON so corpus entries stay `Send`; every run
//! converts them into fresh interpreter values.

use std::path::Path;

use refactory_ast::{FunctionDef, SyntaxTree, parse_function};
use refactory_eval::Value;
use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};

use crate::error::{CorpusError, EngineError, EngineErrorKind, Result};

/// Upper bound for `{"range": n}` arguments, which are materialized on the
/// host before a run starts.
pub const MAX_RANGE_ARGUMENT: i64 = 10_000_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    pub functions: Vec<CorpusEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub tests: Vec<TestCase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perf: Option<PerfCase>,
}

/// One argument tuple. The expected outcome is whatever the reference
/// implementation does with it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestCase {
    pub args: Vec<Json>,
}

/// The heavy input used for timing. Written in a corpus file either as a
/// bare argument array or as `{"args": [...], "repeats": n}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "PerfSpec")]
pub struct PerfCase {
    pub args: Vec<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeats: Option<usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PerfSpec {
    Args(Vec<Json>),
    Full {
        args: Vec<Json>,
        #[serde(default)]
        repeats: Option<usize>,
    },
}

impl From<PerfSpec> for PerfCase {
    fn from(spec: PerfSpec) -> Self {
        match spec {
            PerfSpec::Args(args) => PerfCase {
                args,
                repeats: None,
            },
            PerfSpec::Full { args, repeats } => PerfCase { args, repeats },
        }
    }
}

impl TestCase {
    pub fn new(args: Vec<Json>) -> Self {
        Self { args }
    }

    /// Fresh interpreter values for one run.
    pub fn values(&self) -> Result<Vec<Value>> {
        to_values(&self.args)
    }

    pub fn describe(&self) -> String {
        describe(&self.args)
    }
}

impl PerfCase {
    pub fn new(args: Vec<Json>) -> Self {
        Self {
            args,
            repeats: None,
        }
    }

    pub fn values(&self) -> Result<Vec<Value>> {
        to_values(&self.args)
    }

    pub fn describe(&self) -> String {
        describe(&self.args)
    }
}

fn describe(args: &[Json]) -> String {
    let parts: Vec<String> = args.iter().map(Json::to_string).collect();
    format!("({})", parts.join(", "))
}

fn to_values(args: &[Json]) -> Result<Vec<Value>> {
    args.iter()
        .map(|arg| to_value(arg).map_err(EngineError::corpus))
        .collect()
}

/// Converts one JSON argument. Objects are reserved for the two shorthands
/// `{"range": n}` (a list of `0..n`) and `{"tuple": [...]}`.
pub fn to_value(json: &Json) -> Result<Value, String> {
    Ok(match json {
        Json::Null => Value::None,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if n.is_u64() {
                return Err(format!("integer {n} does not fit in 64 bits"));
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::str(s),
        Json::Array(items) => {
            Value::list(items.iter().map(to_value).collect::<Result<_, _>>()?)
        }
        Json::Object(map) => match (map.len(), map.get("range"), map.get("tuple")) {
            (1, Some(n), _) => {
                let n = n
                    .as_i64()
                    .ok_or_else(|| format!("`range` expects an integer, got {n}"))?;
                if n > MAX_RANGE_ARGUMENT {
                    return Err(format!(
                        "`range` argument {n} exceeds {MAX_RANGE_ARGUMENT}"
                    ));
                }
                Value::list((0..n.max(0)).map(Value::Int).collect())
            }
            (1, _, Some(Json::Array(items))) => {
                Value::tuple(items.iter().map(to_value).collect::<Result<_, _>>()?)
            }
            _ => return Err(format!("unsupported argument {json}")),
        },
    })
}

impl Corpus {
    /// Reads and validates a corpus file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let corpus: Corpus = serde_json::from_str(text)?;
        corpus.validate()?;
        Ok(corpus)
    }

    /// Checks that every entry parses, defines the function it is named
    /// after, and supplies argument tuples of the right arity.
    pub fn validate(&self) -> Result<()> {
        for entry in &self.functions {
            entry.validate()?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&CorpusEntry> {
        self.functions
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| EngineError::unknown_function(name))
    }

    /// The five reference functions with their verification and timing
    /// inputs.
    pub fn canonical() -> Self {
        let lists = || {
            vec![
                TestCase::new(vec![json!([1, 2, 3])]),
                TestCase::new(vec![json!([])]),
            ]
        };
        let heavy_list = || Some(PerfCase::new(vec![json!({ "range": 10_000 })]));

        Corpus {
            functions: vec![
                CorpusEntry {
                    name: "sum_list".into(),
                    source: SUM_LIST.into(),
                    tests: lists(),
                    perf: heavy_list(),
                },
                CorpusEntry {
                    name: "max_list".into(),
                    source: MAX_LIST.into(),
                    // `max_list([])` raises IndexError, while `max([])`
                    // raises ValueError.
                    tests: vec![
                        TestCase::new(vec![json!([1, 2, 3])]),
                        TestCase::new(vec![json!([3, 1, 2])]),
                        TestCase::new(vec![json!([42])]),
                    ],
                    perf: heavy_list(),
                },
                CorpusEntry {
                    name: "check_positive".into(),
                    source: CHECK_POSITIVE.into(),
                    tests: vec![
                        TestCase::new(vec![json!(-1)]),
                        TestCase::new(vec![json!(0)]),
                        TestCase::new(vec![json!(5)]),
                    ],
                    perf: Some(PerfCase::new(vec![json!(9_999_999)])),
                },
                CorpusEntry {
                    name: "greet".into(),
                    source: GREET.into(),
                    tests: vec![TestCase::new(vec![json!("Bob")])],
                    perf: Some(PerfCase::new(vec![json!("X".repeat(16))])),
                },
                CorpusEntry {
                    name: "double_list".into(),
                    source: DOUBLE_LIST.into(),
                    tests: lists(),
                    perf: heavy_list(),
                },
            ],
        }
    }
}

impl CorpusEntry {
    pub fn parse(&self) -> Result<SyntaxTree> {
        Ok(parse_function(&self.source)?)
    }

    pub fn validate(&self) -> Result<()> {
        let tree = self.parse()?;
        let function = &tree.function;
        if function.name != self.name {
            return Err(EngineError::corpus(format!(
                "entry `{}` defines function `{}`",
                self.name, function.name
            )));
        }

        for (i, case) in self.tests.iter().enumerate() {
            check_arity(function, &format!("test case {i}"), &case.args)?;
        }
        if let Some(perf) = &self.perf {
            check_arity(function, "the perf case", &perf.args)?;
            perf.values()?;
        }
        for case in &self.tests {
            case.values()?;
        }
        Ok(())
    }
}

fn check_arity(function: &FunctionDef, which: &str, args: &[Json]) -> Result<()> {
    if args.len() != function.params.len() {
        return Err(EngineErrorKind::ArityMismatch {
            function: function.name.clone(),
            which: which.to_string(),
            expected: function.params.len(),
            given: args.len(),
        }
        .into());
    }
    Ok(())
}

pub const SUM_LIST: &str = "\
def sum_list(lst):
    total = 0
    for x in lst:
        total += x
    return total
";

pub const MAX_LIST: &str = "\
def max_list(lst):
    current_max = lst[0]
    for x in lst:
        if x > current_max:
            current_max = x
    return current_max
";

pub const CHECK_POSITIVE: &str = "\
def check_positive(x):
    if x > 0:
        return True
    else:
        return False
";

pub const GREET: &str = "\
def greet(name):
    \"\"\"greet\"\"\"
    message = \"Hello \" + name
    print(message)
    return message
";

pub const DOUBLE_LIST: &str = "\
def double_list(lst):
    res = []
    for x in lst:
        res.append(x * 2)
    return res
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_corpus_is_valid() {
        let corpus = Corpus::canonical();
        corpus.validate().unwrap();
        assert_eq!(corpus.functions.len(), 5);
        assert!(corpus.get("greet").is_ok());
    }

    #[test]
    fn test_unknown_function() {
        let err = Corpus::canonical().get("nope").unwrap_err();
        assert!(matches!(err.kind(), EngineErrorKind::UnknownFunction(name) if name == "nope"));
    }

    #[test]
    fn test_range_shorthand() {
        let value = to_value(&json!({ "range": 4 })).unwrap();
        assert_eq!(value.repr(), "[0, 1, 2, 3]");
        assert_eq!(to_value(&json!({ "range": -3 })).unwrap().repr(), "[]");
        assert!(to_value(&json!({ "range": MAX_RANGE_ARGUMENT + 1 })).is_err());
    }

    #[test]
    fn test_scalar_and_tuple_arguments() {
        assert_eq!(to_value(&json!(null)).unwrap().repr(), "None");
        assert_eq!(to_value(&json!(1.5)).unwrap().repr(), "1.5");
        assert_eq!(to_value(&json!("hi")).unwrap().repr(), "'hi'");
        assert_eq!(
            to_value(&json!({ "tuple": [1, true] })).unwrap().repr(),
            "(1, True)"
        );
        assert!(to_value(&json!({ "dict": 1 })).is_err());
        assert!(to_value(&json!(u64::MAX)).is_err());
    }

    #[test]
    fn test_values_are_fresh_per_call() {
        let case = TestCase::new(vec![json!([1, 2])]);
        let first = case.values().unwrap();
        let second = case.values().unwrap();
        if let Value::List(items) = &first[0] {
            items.borrow_mut().push(Value::Int(3));
        }
        assert_eq!(first[0].repr(), "[1, 2, 3]");
        assert_eq!(second[0].repr(), "[1, 2]");
    }

    #[test]
    fn test_arity_is_checked() {
        let json = r#"{"functions": [{"name": "f", "source": "def f(a, b):\n    return a\n", "tests": [[1]]}]}"#;
        let err = Corpus::from_json(json).unwrap_err();
        assert!(matches!(
            err.kind(),
            EngineErrorKind::ArityMismatch {
                expected: 2,
                given: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_name_mismatch_is_rejected() {
        let json = r#"{"functions": [{"name": "g", "source": "def f():\n    pass\n"}]}"#;
        let err = Corpus::from_json(json).unwrap_err();
        assert!(matches!(err.kind(), EngineErrorKind::Corpus(_)));
    }

    #[test]
    fn test_perf_case_forms() {
        let bare: PerfCase = serde_json::from_str("[1]").unwrap();
        assert_eq!(bare.repeats, None);
        let full: PerfCase = serde_json::from_str(r#"{"args": [1], "repeats": 3}"#).unwrap();
        assert_eq!(full.repeats, Some(3));
        assert_eq!(full.describe(), "(1)");
    }
}
