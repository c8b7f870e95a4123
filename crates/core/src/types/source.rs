use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a descriptor came from
///
/// The launcher treats sources as opaque hints; the only thing it reads is
/// the declared class name, for class-name filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TestSource {
    Class {
        class_name: String,
    },
    Method {
        class_name: String,
        method_name: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        parameter_types: String,
    },
    Package {
        package_name: String,
    },
    File {
        path: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
    },
    Uri {
        uri: String,
    },
}

impl TestSource {
    pub fn class(class_name: impl Into<String>) -> Self {
        TestSource::Class {
            class_name: class_name.into(),
        }
    }

    pub fn method(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        parameter_types: impl Into<String>,
    ) -> Self {
        TestSource::Method {
            class_name: class_name.into(),
            method_name: method_name.into(),
            parameter_types: parameter_types.into(),
        }
    }

    pub fn file(path: impl Into<PathBuf>, line: Option<u32>) -> Self {
        TestSource::File {
            path: path.into(),
            line,
        }
    }

    /// The declaring class, for class and method sources
    pub fn class_name(&self) -> Option<&str> {
        match self {
            TestSource::Class { class_name } | TestSource::Method { class_name, .. } => {
                Some(class_name)
            }
            _ => None,
        }
    }
}
