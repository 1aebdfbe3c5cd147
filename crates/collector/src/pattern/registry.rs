//! 패턴 레지스트리 -- 이름으로 추출 패턴을 보관하고 조회합니다.
//!
//! 시작 시 한 번 구성된 뒤 `Arc`로 공유되며 이후에는 읽기 전용입니다.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::CollectorError;
use crate::pattern::Pattern;
use crate::pattern::catalog::BUILTIN_PATTERNS;

/// 이름 -> 컴파일된 패턴
#[derive(Debug, Default, Clone)]
pub struct PatternRegistry {
    patterns: HashMap<String, Arc<Pattern>>,
}

impl PatternRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 내장 펌웨어 패턴이 등록된 레지스트리를 생성합니다.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, text) in BUILTIN_PATTERNS {
            // 내장 패턴은 항상 유효함 (catalog 테스트로 보장)
            let _ = registry.register(name, text);
        }
        registry
    }

    /// 패턴을 컴파일하여 등록합니다.
    ///
    /// 거부된 패턴은 경고를 남기고 레지스트리를 변경하지 않습니다.
    /// 같은 이름으로 다시 등록하면 덮어씁니다.
    pub fn register(&mut self, name: &str, text: &str) -> Result<(), CollectorError> {
        match Pattern::compile(name, text) {
            Ok(pattern) => {
                if self
                    .patterns
                    .insert(name.to_owned(), Arc::new(pattern))
                    .is_some()
                {
                    debug!(pattern = name, "pattern re-registered");
                } else {
                    debug!(pattern = name, "pattern registered");
                }
                Ok(())
            }
            Err(e) => {
                warn!(pattern = name, error = %e, "pattern not registered");
                Err(e)
            }
        }
    }

    /// 여러 패턴을 등록하고 성공한 개수를 반환합니다.
    pub fn register_all<'a>(
        &mut self,
        patterns: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> usize {
        patterns
            .into_iter()
            .filter(|(name, text)| self.register(name, text).is_ok())
            .count()
    }

    /// JSON 파일(`{ "<name>": "<pattern>" }`)의 패턴을 등록합니다.
    ///
    /// 파일을 읽거나 해석할 수 없으면 에러를 반환합니다.
    /// 개별 패턴 거부는 경고만 남깁니다.
    pub fn load_json_file(&mut self, path: impl AsRef<Path>) -> Result<usize, CollectorError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CollectorError::config("routers_file", format!("{}: {e}", path.display()))
        })?;
        let patterns: BTreeMap<String, String> = serde_json::from_str(&content).map_err(|e| {
            CollectorError::config("routers_file", format!("{}: {e}", path.display()))
        })?;

        let registered = self.register_all(&patterns);
        info!(
            path = %path.display(),
            registered,
            total = patterns.len(),
            "loaded patterns from file"
        );
        Ok(registered)
    }

    /// 이름으로 패턴을 조회합니다.
    pub fn find(&self, name: &str) -> Option<Arc<Pattern>> {
        self.patterns.get(name).cloned()
    }

    /// 등록 여부를 확인합니다.
    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    /// 등록된 패턴 수
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// 등록된 이름을 정렬하여 `", "`로 연결합니다.
    pub fn registered(&self) -> String {
        let mut names: Vec<&str> = self.patterns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SIMPLE: &str = "(?P<origin>.*)--(?P<destination>.*)";

    #[test]
    fn register_and_find() {
        let mut registry = PatternRegistry::new();
        registry.register("test", SIMPLE).unwrap();

        let pattern = registry.find("test").unwrap();
        let event = pattern.extract("192.168.0.1--example.com").unwrap();
        assert_eq!(event.destination.address, "example.com");
        assert!(registry.find("missing").is_none());
    }

    #[test]
    fn rejected_pattern_leaves_registry_unchanged() {
        let mut registry = PatternRegistry::new();
        registry.register("test", SIMPLE).unwrap();

        assert!(registry.register("test", "(?P<origin>.*)").is_err());
        assert!(registry.register("other", "no groups").is_err());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("test").unwrap().as_str(), SIMPLE);
    }

    #[test]
    fn reregistration_overwrites() {
        let mut registry = PatternRegistry::new();
        registry.register("test", SIMPLE).unwrap();
        registry
            .register("test", "(?P<destination>\\S+) by (?P<origin>\\S+)")
            .unwrap();

        assert_eq!(registry.len(), 1);
        let event = registry
            .find("test")
            .unwrap()
            .extract("example.com by 10.0.0.1")
            .unwrap();
        assert_eq!(event.origin.address.to_string(), "10.0.0.1");
    }

    #[test]
    fn registered_is_sorted_and_joined() {
        let mut registry = PatternRegistry::new();
        registry.register("zeta", SIMPLE).unwrap();
        registry.register("alpha", SIMPLE).unwrap();
        assert_eq!(registry.registered(), "alpha, zeta");
    }

    #[test]
    fn builtins_are_registered() {
        let registry = PatternRegistry::with_builtins();
        assert_eq!(
            registry.registered(),
            "test, thomson-dwg850-4b, thomson-dwg850-8b"
        );
    }

    #[test]
    fn load_json_file_registers_valid_entries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "custom": "(?P<origin>\\S+) -> (?P<destination>\\S+)", "broken": "(?P<origin>x)" }}"#
        )
        .unwrap();

        let mut registry = PatternRegistry::new();
        let registered = registry.load_json_file(file.path()).unwrap();
        assert_eq!(registered, 1);
        assert!(registry.contains("custom"));
        assert!(!registry.contains("broken"));
    }

    #[test]
    fn load_json_file_missing_is_config_error() {
        let mut registry = PatternRegistry::new();
        let err = registry
            .load_json_file("/nonexistent/routers.json")
            .unwrap_err();
        assert!(matches!(err, CollectorError::Config { .. }));
    }
}
