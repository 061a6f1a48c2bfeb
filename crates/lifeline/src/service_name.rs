// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::Display;

/// Names an external service that is protected by its own circuit breaker and health prober.
///
/// Each service keeps fully independent breaker state, so names should be **long-lived and
/// low-cardinality**, one per dependency (for example `elevenlabs_tts` or `llm`), never per
/// request or per contact.
///
/// Service names are included in logs, metrics and events. Do not build them from sensitive data.
///
/// # Examples
///
/// ```rust
/// use lifeline::ServiceName;
///
/// let name = ServiceName::from("elevenlabs_tts");
/// assert_eq!(name.to_string(), "elevenlabs_tts");
/// assert_eq!(name, ServiceName::from(String::from("elevenlabs_tts")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceName(Cow<'static, str>);

impl ServiceName {
    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for ServiceName {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for ServiceName {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl From<Cow<'static, str>> for ServiceName {
    fn from(value: Cow<'static, str>) -> Self {
        Self(value)
    }
}

impl From<ServiceName> for Cow<'static, str> {
    fn from(value: ServiceName) -> Self {
        value.0
    }
}
