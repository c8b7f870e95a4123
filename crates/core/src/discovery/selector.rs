//! Discovery selectors
//!
//! Selectors describe *what* to discover. They are plain data: engines look
//! at the kinds they understand and silently ignore the rest.

use std::fmt;
use std::path::PathBuf;

use super::TagExpression;
use crate::error::{Error, Result};
use crate::types::UniqueId;

/// A query fragment handed to every engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoverySelector {
    UniqueId(UniqueId),
    Class {
        class_name: String,
    },
    Method {
        class_name: String,
        method_name: String,
        parameter_types: String,
    },
    Package {
        package_name: String,
    },
    ClasspathRoot {
        path: PathBuf,
    },
    Tags(TagExpression),
}

impl DiscoverySelector {
    /// Short name of the selector kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            DiscoverySelector::UniqueId(_) => "unique-id",
            DiscoverySelector::Class { .. } => "class",
            DiscoverySelector::Method { .. } => "method",
            DiscoverySelector::Package { .. } => "package",
            DiscoverySelector::ClasspathRoot { .. } => "classpath-root",
            DiscoverySelector::Tags(_) => "tags",
        }
    }
}

impl fmt::Display for DiscoverySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoverySelector::UniqueId(id) => write!(f, "unique-id:{id}"),
            DiscoverySelector::Class { class_name } => write!(f, "class:{class_name}"),
            DiscoverySelector::Method {
                class_name,
                method_name,
                parameter_types,
            } => write!(f, "method:{class_name}#{method_name}({parameter_types})"),
            DiscoverySelector::Package { package_name } => write!(f, "package:{package_name}"),
            DiscoverySelector::ClasspathRoot { path } => {
                write!(f, "classpath-root:{}", path.display())
            }
            DiscoverySelector::Tags(expression) => write!(f, "tags:{}", expression.source()),
        }
    }
}

pub fn select_unique_id(unique_id: UniqueId) -> DiscoverySelector {
    DiscoverySelector::UniqueId(unique_id)
}

/// Select by the canonical string form of a unique id
pub fn select_unique_id_str(unique_id: &str) -> Result<DiscoverySelector> {
    Ok(DiscoverySelector::UniqueId(UniqueId::parse(unique_id)?))
}

pub fn select_class(class_name: &str) -> Result<DiscoverySelector> {
    let class_name = non_blank(class_name, "class name")?;
    Ok(DiscoverySelector::Class { class_name })
}

/// Select a method from `pkg.Class#method(paramTypes)`.
///
/// The parameter list is optional: `pkg.Class#method` selects the method
/// with no parameter types given. Parameter types are kept as written,
/// minus surrounding whitespace.
pub fn select_method(signature: &str) -> Result<DiscoverySelector> {
    let signature = signature.trim();
    let (class_name, rest) = signature.split_once('#').ok_or_else(|| {
        Error::InvalidSelector(format!(
            "method signature '{signature}' must be of the form 'Class#method(paramTypes)'"
        ))
    })?;
    let class_name = non_blank(class_name, "class name")?;

    let (method_name, parameter_types) = match rest.find('(') {
        Some(open) => {
            let params = rest[open + 1..].strip_suffix(')').ok_or_else(|| {
                Error::InvalidSelector(format!(
                    "method signature '{signature}' has an unterminated parameter list"
                ))
            })?;
            if params.contains('(') || params.contains(')') {
                return Err(Error::InvalidSelector(format!(
                    "method signature '{signature}' has unbalanced parentheses"
                )));
            }
            (&rest[..open], normalize_parameter_types(params))
        }
        None if rest.contains(')') => {
            return Err(Error::InvalidSelector(format!(
                "method signature '{signature}' has unbalanced parentheses"
            )));
        }
        None => (rest, String::new()),
    };
    let method_name = non_blank(method_name, "method name")?;

    Ok(DiscoverySelector::Method {
        class_name,
        method_name,
        parameter_types,
    })
}

/// Select a method from its parts
pub fn select_method_parts(
    class_name: &str,
    method_name: &str,
    parameter_types: &str,
) -> Result<DiscoverySelector> {
    Ok(DiscoverySelector::Method {
        class_name: non_blank(class_name, "class name")?,
        method_name: non_blank(method_name, "method name")?,
        parameter_types: normalize_parameter_types(parameter_types),
    })
}

/// Select a package. The empty string selects the default package.
pub fn select_package(package_name: &str) -> Result<DiscoverySelector> {
    let package_name = package_name.trim();
    if package_name.contains(char::is_whitespace) {
        return Err(Error::InvalidSelector(format!(
            "package name '{package_name}' contains whitespace"
        )));
    }
    Ok(DiscoverySelector::Package {
        package_name: package_name.to_string(),
    })
}

pub fn select_classpath_root(path: impl Into<PathBuf>) -> Result<DiscoverySelector> {
    let path = path.into();
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidSelector(
            "classpath root must not be empty".to_string(),
        ));
    }
    Ok(DiscoverySelector::ClasspathRoot { path })
}

pub fn select_tag_expression(expression: &str) -> Result<DiscoverySelector> {
    Ok(DiscoverySelector::Tags(TagExpression::parse(expression)?))
}

fn non_blank(value: &str, what: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidSelector(format!("{what} must not be blank")));
    }
    Ok(value.to_string())
}

fn normalize_parameter_types(params: &str) -> String {
    params
        .split(',')
        .map(str::trim)
        .filter(|param| !param.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
