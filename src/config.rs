/// How the store derives new knowledge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ChainingMode {
    /// Every assertion is forward chained to a fixed point; `ask` returns all
    /// matching bindings.
    #[default]
    Forward,
    /// Assertions are only stored; `ask` searches for the first proof.
    Backward,
}

/// Knowledge base configuration, passed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct KbConfig {
    /// Chaining strategy
    pub mode: ChainingMode,
    /// Maximum nesting of rule applications in a backward search before a
    /// branch is cut
    pub max_depth: usize,
    /// Log every forward and backward inference attempt at `trace` level
    pub trace_inference: bool,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            mode: ChainingMode::Forward,
            max_depth: 64,
            trace_inference: false,
        }
    }
}

impl KbConfig {
    /// Default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chaining mode
    #[must_use]
    pub fn with_mode(mut self, mode: ChainingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the backward search depth limit
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Enables or disables per-attempt inference tracing
    #[must_use]
    pub fn with_trace_inference(mut self, trace_inference: bool) -> Self {
        self.trace_inference = trace_inference;
        self
    }

    /// Loads a configuration from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`crate::KbError::Config`] if the JSON is malformed.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
