//! Input validation limits for tool arguments and resource protection

/// Maximum resources accepted into one graph (5000)
pub const MAX_GRAPH_RESOURCES: usize = 5000;

/// Maximum layout passes per request (10000)
pub const MAX_LAYOUT_ITERATIONS: usize = 10_000;

/// Maximum neighborhood exploration depth (16)
pub const MAX_NEIGHBORHOOD_DEPTH: u32 = 16;

/// Maximum namespace length, an RFC 1123 label (63 chars)
pub const MAX_NAMESPACE_LEN: usize = 63;

/// Maximum resource name length, an RFC 1123 subdomain (253 chars)
pub const MAX_RESOURCE_NAME_LEN: usize = 253;

/// Validation error type
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    TooManyResources { count: usize, max: usize },
    TooManyIterations { count: usize, max: usize },
    DepthTooLarge { depth: u32, max: u32 },
    NamespaceTooLong { len: usize, max: usize },
    InvalidNamespace(String),
    EmptyNamespace,
    EmptyResourceName,
    ResourceNameTooLong { len: usize, max: usize },
    InvalidResourceName(String),
    InvalidLayout { field: &'static str, reason: &'static str },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooManyResources { count, max } => {
                write!(f, "Too many resources for one graph: {} (max {})", count, max)
            }
            Self::TooManyIterations { count, max } => {
                write!(f, "Too many layout iterations: {} (max {})", count, max)
            }
            Self::DepthTooLarge { depth, max } => {
                write!(f, "Neighborhood depth too large: {} (max {})", depth, max)
            }
            Self::NamespaceTooLong { len, max } => {
                write!(f, "Namespace too long: {} chars (max {})", len, max)
            }
            Self::InvalidNamespace(ns) => write!(
                f,
                "Invalid namespace '{}': must be lowercase alphanumerics or '-', starting and ending with an alphanumeric",
                ns
            ),
            Self::EmptyNamespace => write!(f, "Namespace cannot be empty"),
            Self::InvalidLayout { field, reason } => write!(f, "Invalid layout.{}: {}", field, reason),
            Self::EmptyResourceName => write!(f, "Resource name cannot be empty"),
            Self::ResourceNameTooLong { len, max } => {
                write!(f, "Resource name too long: {} chars (max {})", len, max)
            }
            Self::InvalidResourceName(name) => write!(
                f,
                "Invalid resource name '{}': must be lowercase alphanumerics, '-' or '.', starting and ending with an alphanumeric",
                name
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for crate::Error {
    fn from(err: ValidationError) -> Self {
        crate::Error::Validation(err.to_string())
    }
}

/// Validate a namespace as an RFC 1123 label
pub fn validate_namespace(namespace: &str) -> Result<(), ValidationError> {
    if namespace.is_empty() {
        return Err(ValidationError::EmptyNamespace);
    }
    if namespace.len() > MAX_NAMESPACE_LEN {
        return Err(ValidationError::NamespaceTooLong {
            len: namespace.len(),
            max: MAX_NAMESPACE_LEN,
        });
    }
    let bytes = namespace.as_bytes();
    let valid_chars = bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-');
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !valid_chars || !alnum(bytes[0]) || !alnum(bytes[bytes.len() - 1]) {
        return Err(ValidationError::InvalidNamespace(namespace.to_string()));
    }
    Ok(())
}

/// Validate a resource name as an RFC 1123 subdomain
pub fn validate_resource_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyResourceName);
    }
    if name.len() > MAX_RESOURCE_NAME_LEN {
        return Err(ValidationError::ResourceNameTooLong {
            len: name.len(),
            max: MAX_RESOURCE_NAME_LEN,
        });
    }
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let valid = name.split('.').all(|label| {
        let bytes = label.as_bytes();
        !bytes.is_empty()
            && bytes.iter().all(|b| alnum(*b) || *b == b'-')
            && alnum(bytes[0])
            && alnum(bytes[bytes.len() - 1])
    });
    if !valid {
        return Err(ValidationError::InvalidResourceName(name.to_string()));
    }
    Ok(())
}

/// Validate graph size
pub fn validate_resource_count(count: usize) -> Result<(), ValidationError> {
    if count > MAX_GRAPH_RESOURCES {
        return Err(ValidationError::TooManyResources {
            count,
            max: MAX_GRAPH_RESOURCES,
        });
    }
    Ok(())
}

/// Validate layout pass budget
pub fn validate_iterations(count: usize) -> Result<(), ValidationError> {
    if count > MAX_LAYOUT_ITERATIONS {
        return Err(ValidationError::TooManyIterations {
            count,
            max: MAX_LAYOUT_ITERATIONS,
        });
    }
    Ok(())
}

/// Validate neighborhood depth
pub fn validate_depth(depth: u32) -> Result<(), ValidationError> {
    if depth > MAX_NEIGHBORHOOD_DEPTH {
        return Err(ValidationError::DepthTooLarge {
            depth,
            max: MAX_NEIGHBORHOOD_DEPTH,
        });
    }
    Ok(())
}
