//! Topic (Zenoh key expression) helpers.
//!
//! The bridge publishes under a single data prefix:
//!
//! ```text
//! <data_prefix>/<register_name>     decoded register values
//! <data_prefix>/@/status            bridge status documents
//! ```

use crate::error::{Error, Result};

/// Characters with wildcard or reserved meaning in a key expression.
const RESERVED: &[char] = &['*', '$', '?', '#'];

/// Build the data topic for a register.
///
/// # Example
/// ```
/// use regbridge_common::topic::data_topic;
///
/// assert_eq!(data_topic("wattnode/data", "power_sum"), "wattnode/data/power_sum");
/// ```
pub fn data_topic(prefix: &str, name: &str) -> String {
    format!("{}/{}", prefix, name)
}

/// Build the status topic under a data prefix.
///
/// # Example
/// ```
/// use regbridge_common::topic::status_topic;
///
/// assert_eq!(status_topic("wattnode/data"), "wattnode/data/@/status");
/// ```
pub fn status_topic(prefix: &str) -> String {
    format!("{}/@/status", prefix)
}

/// Check that a topic is a concrete key expression we can publish or subscribe on.
pub fn validate_topic(topic: &str) -> Result<()> {
    let invalid = |reason: &str| Error::Topic {
        topic: topic.to_string(),
        reason: reason.to_string(),
    };

    if topic.is_empty() {
        return Err(invalid("topic is empty"));
    }
    if topic.split('/').any(str::is_empty) {
        return Err(invalid("empty path segment"));
    }
    if let Some(c) = topic.chars().find(|c| RESERVED.contains(c)) {
        return Err(invalid(&format!("reserved character '{}'", c)));
    }

    Ok(())
}

/// Check that a name can be used as a single topic segment.
pub fn validate_segment(segment: &str) -> Result<()> {
    if segment.contains('/') {
        return Err(Error::Topic {
            topic: segment.to_string(),
            reason: "must be a single segment (no '/')".to_string(),
        });
    }
    if segment.starts_with('@') {
        return Err(Error::Topic {
            topic: segment.to_string(),
            reason: "segments starting with '@' are reserved".to_string(),
        });
    }
    validate_topic(segment)
}
