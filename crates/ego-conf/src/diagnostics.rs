use std::collections::HashMap;

use ego_source::Severity;
use serde::Deserialize;

/// Severity a template error code is reported at by `ego check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Off,
    Error,
    Warning,
}

impl DiagnosticSeverity {
    /// Returns None for Off (diagnostic should not be shown).
    #[must_use]
    pub fn to_render_severity(self) -> Option<Severity> {
        match self {
            DiagnosticSeverity::Off => None,
            DiagnosticSeverity::Error => Some(Severity::Error),
            DiagnosticSeverity::Warning => Some(Severity::Warning),
        }
    }
}

/// Per-code severity overrides.
///
/// Every code is an error unless configured otherwise. Keys are either a
/// full code or a prefix of one; the longest matching key wins. Matching
/// ignores ASCII case.
///
/// ```toml
/// [diagnostics.severity]
/// E0 = "warning"   # all scanner and parser errors
/// E003 = "off"     # but ignore templates without a declaration
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub severity: HashMap<String, DiagnosticSeverity>,
}

impl DiagnosticsConfig {
    /// Resolution order (most specific wins):
    /// 1. Exact match (e.g., "E002")
    /// 2. Longest prefix match (e.g., "E00" over "E")
    /// 3. Default: Error
    ///
    /// # Examples
    /// ```
    /// # use ego_conf::diagnostics::{DiagnosticsConfig, DiagnosticSeverity};
    /// # use std::collections::HashMap;
    /// let mut severity = HashMap::new();
    /// severity.insert("E".to_string(), DiagnosticSeverity::Warning);
    /// severity.insert("E00".to_string(), DiagnosticSeverity::Off);
    /// severity.insert("E002".to_string(), DiagnosticSeverity::Error);
    ///
    /// let config = DiagnosticsConfig { severity };
    ///
    /// assert_eq!(config.get_severity("E002"), DiagnosticSeverity::Error);
    /// assert_eq!(config.get_severity("E001"), DiagnosticSeverity::Off);
    /// assert_eq!(config.get_severity("E900"), DiagnosticSeverity::Warning);
    /// assert_eq!(config.get_severity("W001"), DiagnosticSeverity::Error);
    /// ```
    #[must_use]
    pub fn get_severity(&self, code: &str) -> DiagnosticSeverity {
        if let Some((_, &severity)) = self
            .severity
            .iter()
            .find(|(pattern, _)| pattern.eq_ignore_ascii_case(code))
        {
            return severity;
        }

        self.severity
            .iter()
            .filter(|(pattern, _)| {
                code.get(..pattern.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(pattern))
            })
            .max_by_key(|(pattern, _)| pattern.len())
            .map_or(DiagnosticSeverity::Error, |(_, &severity)| severity)
    }

    /// Override one code or prefix, replacing any entry that differs only
    /// in case.
    pub fn set_severity(&mut self, code: &str, severity: DiagnosticSeverity) {
        self.severity
            .retain(|pattern, _| !pattern.eq_ignore_ascii_case(code));
        self.severity.insert(code.to_string(), severity);
    }

    #[must_use]
    pub fn is_enabled(&self, code: &str) -> bool {
        self.get_severity(code) != DiagnosticSeverity::Off
    }
}
