/// Labels identifying the radio or network port a metric belongs to.
///
/// ```rust
/// use drats_metrics::PortLabels;
///
/// let labels = PortLabels::new("radio1").to_labels();
/// assert_eq!(labels, vec![("port", "radio1".to_string())]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortLabels {
    /// Configured port name.
    pub port: String,
}

impl PortLabels {
    /// Labels for `port`.
    pub fn new(port: impl Into<String>) -> Self {
        PortLabels { port: port.into() }
    }

    /// Key/value pairs for the `metrics` macros.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("port", self.port.clone())]
    }

    /// Port labels plus extra pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}
