use globset::{GlobBuilder, GlobMatcher};
use tracing::warn;

use rootseek_config::{LayerConfig, LayerRule};

use crate::models::{normalize_node_id, CodeNode, Layer};

/// Rank of a file's architectural role; higher sorts first.
pub type LayerPriority = u32;

enum Matcher {
    Substring(String),
    Glob(GlobMatcher),
}

impl Matcher {
    fn compile(pattern: &str) -> Self {
        if pattern.contains(['*', '?', '[']) {
            match GlobBuilder::new(pattern).case_insensitive(true).build() {
                Ok(glob) => return Matcher::Glob(glob.compile_matcher()),
                Err(e) => warn!("layer pattern {:?} is not a valid glob ({}), matching as text", pattern, e),
            }
        }
        Matcher::Substring(pattern.to_lowercase())
    }

    fn matches(&self, normalized: &str, lowered: &str) -> bool {
        match self {
            Matcher::Substring(needle) => lowered.contains(needle.as_str()),
            Matcher::Glob(glob) => glob.is_match(normalized),
        }
    }
}

struct CompiledRule {
    matcher: Matcher,
    layer: Layer,
    priority: LayerPriority,
}

impl CompiledRule {
    fn from_rule(rule: &LayerRule) -> Self {
        Self {
            matcher: Matcher::compile(rule.pattern.trim()),
            layer: rule.layer.as_deref().map(Layer::from_tag).unwrap_or_default(),
            priority: rule.priority,
        }
    }
}

/// Ordered path rules mapping files to layers and priorities.
///
/// The first matching rule wins. Classification never fails: unmatched
/// paths get the fallback priority and `Layer::Other`.
pub struct LayerClassifier {
    rules: Vec<CompiledRule>,
    fallback: LayerPriority,
}

impl LayerClassifier {
    pub fn new(config: &LayerConfig) -> Self {
        Self {
            rules: config.rules.iter().map(CompiledRule::from_rule).collect(),
            fallback: config.fallback_priority,
        }
    }

    fn first_match(&self, path: &str) -> Option<&CompiledRule> {
        let normalized = normalize_node_id(path);
        let lowered = normalized.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(&normalized, &lowered))
    }

    pub fn classify(&self, path: &str) -> LayerPriority {
        self.first_match(path)
            .map(|rule| rule.priority)
            .unwrap_or(self.fallback)
    }

    pub fn layer_of(&self, path: &str) -> Layer {
        self.first_match(path)
            .map(|rule| rule.layer)
            .unwrap_or_default()
    }

    /// Layer of a node: its own tag when set, otherwise derived from the path.
    pub fn node_layer(&self, node: &CodeNode) -> Layer {
        match node.layer {
            Layer::Other => self.layer_of(&node.id),
            tagged => tagged,
        }
    }

    /// Priority of a node. A tagged node takes the first rule for its layer.
    pub fn priority_of(&self, node: &CodeNode) -> LayerPriority {
        if node.layer != Layer::Other {
            if let Some(rule) = self.rules.iter().find(|r| r.layer == node.layer) {
                return rule.priority;
            }
        }
        self.classify(&node.id)
    }

    pub fn max_priority(&self) -> LayerPriority {
        self.rules
            .iter()
            .map(|r| r.priority)
            .max()
            .unwrap_or(self.fallback)
            .max(self.fallback)
    }

    pub fn fallback_priority(&self) -> LayerPriority {
        self.fallback
    }
}

impl Default for LayerClassifier {
    fn default() -> Self {
        Self::new(&LayerConfig::default())
    }
}
