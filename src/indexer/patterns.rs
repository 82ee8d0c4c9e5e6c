// Design pattern, idiom and anti-pattern detection over extracted symbols

use std::collections::HashMap;

use crate::index::{Language, Pattern, PatternDetails, PatternType, Symbol, SymbolKind};
use crate::indexer::complexity::MAX_COMPLEXITY;

const SINGLETON_ACCESSORS: &[&str] = &[
    "getInstance",
    "get_instance",
    "instance",
    "Instance",
    "shared",
    "sharedInstance",
    "global",
];

const OBSERVER_METHODS: &[&str] = &[
    "subscribe",
    "unsubscribe",
    "addListener",
    "removeListener",
    "addEventListener",
    "removeEventListener",
    "add_listener",
    "remove_listener",
    "addObserver",
    "removeObserver",
    "register_observer",
    "notify",
    "notifyObservers",
    "notify_observers",
    "notifyAll",
    "emit",
    "on",
    "off",
    "attach",
    "detach",
];

const FACTORY_PREFIXES: &[&str] = &["create", "make", "new_", "build_"];

/// Functions taking more parameters than this are flagged.
pub const MAX_PARAMETERS: usize = 5;

/// Run every detector over one file's symbols.
pub fn detect(symbols: &[Symbol], language: Language) -> Vec<Pattern> {
    let mut members: HashMap<&str, Vec<&Symbol>> = HashMap::new();
    for symbol in symbols.iter().filter(|s| s.kind.is_function_like()) {
        if let Some(parent) = symbol.parent_scope.as_deref() {
            members.entry(parent).or_default().push(symbol);
        }
    }

    let mut patterns = Vec::new();
    for class in symbols.iter().filter(|s| s.kind.is_type_like()) {
        let methods = members
            .get(class.qualified_name.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        patterns.extend(singleton(class, methods));
        patterns.extend(builder(class, methods));
        patterns.extend(observer(class, methods));
        if language == Language::Cpp {
            patterns.extend(raii(class, methods));
        }
        if class.name.ends_with("Factory") {
            patterns.push(Pattern {
                pattern_type: PatternType::DesignPattern,
                pattern_name: "factory".to_string(),
                confidence: 0.8,
                line_number: class.location.line,
                symbol: Some(class.qualified_name.clone()),
                details: PatternDetails::Factory {
                    creator: class.qualified_name.clone(),
                    product: None,
                },
            });
        }
    }

    for symbol in symbols {
        if symbol.kind.is_function_like() {
            patterns.extend(function_patterns(symbol));
        }
        if let Some(features) = &symbol.language_features {
            let parameters = features.type_parameters();
            if !parameters.is_empty() {
                patterns.push(Pattern {
                    pattern_type: PatternType::LanguageIdiom,
                    pattern_name: if language == Language::Cpp { "template" } else { "generic" }.to_string(),
                    confidence: 0.9,
                    line_number: symbol.location.line,
                    symbol: Some(symbol.qualified_name.clone()),
                    details: PatternDetails::Generic {
                        symbol: symbol.qualified_name.clone(),
                        parameters: parameters.to_vec(),
                    },
                });
            }
        }
    }

    patterns.sort_by_key(|p| p.line_number);
    patterns
}

fn singleton(class: &Symbol, methods: &[&Symbol]) -> Option<Pattern> {
    let accessor = methods
        .iter()
        .find(|m| SINGLETON_ACCESSORS.contains(&m.name.as_str()))?;
    // A private constructor makes the accessor the only way in.
    let private_ctor = methods
        .iter()
        .any(|m| m.kind == SymbolKind::Constructor && m.visibility == crate::index::Visibility::Private);
    Some(Pattern {
        pattern_type: PatternType::DesignPattern,
        pattern_name: "singleton".to_string(),
        confidence: if private_ctor { 0.9 } else { 0.75 },
        line_number: class.location.line,
        symbol: Some(class.qualified_name.clone()),
        details: PatternDetails::Singleton {
            class_name: class.qualified_name.clone(),
            accessor: Some(accessor.name.clone()),
        },
    })
}

fn builder(class: &Symbol, methods: &[&Symbol]) -> Option<Pattern> {
    if !class.name.ends_with("Builder") || !methods.iter().any(|m| m.name == "build") {
        return None;
    }
    let setters = methods
        .iter()
        .filter(|m| {
            m.name.starts_with("with")
                || m.name.starts_with("set")
                || m.return_type.as_deref().is_some_and(|r| {
                    let r = r.trim_start_matches('&').trim_start_matches("mut ").trim();
                    r == "Self" || r == class.name || r == "this"
                })
        })
        .count();
    Some(Pattern {
        pattern_type: PatternType::DesignPattern,
        pattern_name: "builder".to_string(),
        confidence: if setters > 0 { 0.9 } else { 0.75 },
        line_number: class.location.line,
        symbol: Some(class.qualified_name.clone()),
        details: PatternDetails::Builder {
            class_name: class.qualified_name.clone(),
            setters,
        },
    })
}

fn observer(class: &Symbol, methods: &[&Symbol]) -> Option<Pattern> {
    let hooks: Vec<String> = methods
        .iter()
        .filter(|m| OBSERVER_METHODS.contains(&m.name.as_str()))
        .map(|m| m.name.clone())
        .collect();
    if hooks.len() < 2 {
        return None;
    }
    Some(Pattern {
        pattern_type: PatternType::DesignPattern,
        pattern_name: "observer".to_string(),
        confidence: if hooks.len() >= 3 { 0.85 } else { 0.7 },
        line_number: class.location.line,
        symbol: Some(class.qualified_name.clone()),
        details: PatternDetails::Observer {
            class_name: class.qualified_name.clone(),
            methods: hooks,
        },
    })
}

fn raii(class: &Symbol, methods: &[&Symbol]) -> Option<Pattern> {
    let has_ctor = methods.iter().any(|m| m.kind == SymbolKind::Constructor);
    let has_dtor = methods.iter().any(|m| m.kind == SymbolKind::Destructor);
    if !(has_ctor && has_dtor) {
        return None;
    }
    Some(Pattern {
        pattern_type: PatternType::LanguageIdiom,
        pattern_name: "raii".to_string(),
        confidence: 0.8,
        line_number: class.location.line,
        symbol: Some(class.qualified_name.clone()),
        details: PatternDetails::Raii {
            class_name: class.qualified_name.clone(),
        },
    })
}

fn function_patterns(function: &Symbol) -> Vec<Pattern> {
    let mut found = Vec::new();
    let at = |pattern_type, name: &str, confidence, details| Pattern {
        pattern_type,
        pattern_name: name.to_string(),
        confidence,
        line_number: function.location.line,
        symbol: Some(function.qualified_name.clone()),
        details,
    };

    let is_factory = FACTORY_PREFIXES.iter().any(|prefix| {
        function.name.len() > prefix.len()
            && function.name.starts_with(prefix)
            && !function.name[prefix.len()..].starts_with(char::is_lowercase)
    });
    if is_factory && function.kind != SymbolKind::Constructor {
        found.push(at(
            PatternType::DesignPattern,
            "factory",
            0.7,
            PatternDetails::Factory {
                creator: function.qualified_name.clone(),
                product: function.return_type.clone(),
            },
        ));
    }

    if function.is_async {
        found.push(at(
            PatternType::LanguageIdiom,
            "async_function",
            0.95,
            PatternDetails::Async {
                function: function.qualified_name.clone(),
            },
        ));
    }

    if function.complexity >= MAX_COMPLEXITY {
        found.push(at(
            PatternType::AntiPattern,
            "high_complexity",
            0.8,
            PatternDetails::HighComplexity {
                function: function.qualified_name.clone(),
                complexity: function.complexity,
            },
        ));
    }

    let parameter_count = function.parameter_count();
    if parameter_count > MAX_PARAMETERS {
        found.push(at(
            PatternType::AntiPattern,
            "long_parameter_list",
            0.75,
            PatternDetails::LongParameterList {
                function: function.qualified_name.clone(),
                parameter_count,
            },
        ));
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{CppFeatures, LanguageFeatures, Location, Visibility};

    fn symbol(name: &str, qualified: &str, kind: SymbolKind, line: u32) -> Symbol {
        let mut symbol = Symbol::new(name, qualified, kind, Language::Cpp, Location::at_line("a.cpp", line, 1));
        if let Some((parent, _)) = qualified.rsplit_once("::") {
            symbol.parent_scope = Some(parent.to_string());
        }
        symbol
    }

    fn names(patterns: &[Pattern]) -> Vec<&str> {
        patterns.iter().map(|p| p.pattern_name.as_str()).collect()
    }

    #[test]
    fn test_singleton_with_private_constructor() {
        let mut ctor = symbol("Config", "app::Config::Config", SymbolKind::Constructor, 4);
        ctor.visibility = Visibility::Private;
        let symbols = vec![
            symbol("Config", "app::Config", SymbolKind::Class, 2),
            ctor,
            symbol("getInstance", "app::Config::getInstance", SymbolKind::Method, 6),
        ];
        let patterns = detect(&symbols, Language::Cpp);
        let singleton = patterns.iter().find(|p| p.pattern_name == "singleton").unwrap();
        assert_eq!(singleton.confidence, 0.9);
        assert_eq!(
            singleton.details,
            PatternDetails::Singleton {
                class_name: "app::Config".to_string(),
                accessor: Some("getInstance".to_string()),
            }
        );
    }

    #[test]
    fn test_raii_needs_constructor_and_destructor() {
        let symbols = vec![
            symbol("File", "File", SymbolKind::Class, 1),
            symbol("File", "File::File", SymbolKind::Constructor, 3),
            symbol("~File", "File::~File", SymbolKind::Destructor, 4),
        ];
        assert!(names(&detect(&symbols, Language::Cpp)).contains(&"raii"));
        assert!(!names(&detect(&symbols[..2], Language::Cpp)).contains(&"raii"));
    }

    #[test]
    fn test_builder_and_factory() {
        let mut with_name = symbol("withName", "RequestBuilder::withName", SymbolKind::Method, 3);
        with_name.return_type = Some("RequestBuilder&".to_string());
        let mut make = symbol("makeRequest", "makeRequest", SymbolKind::Function, 10);
        make.return_type = Some("Request".to_string());
        let symbols = vec![
            symbol("RequestBuilder", "RequestBuilder", SymbolKind::Class, 1),
            with_name,
            symbol("build", "RequestBuilder::build", SymbolKind::Method, 5),
            make,
            symbol("maker", "maker", SymbolKind::Function, 12),
        ];
        let patterns = detect(&symbols, Language::Cpp);
        let builder = patterns.iter().find(|p| p.pattern_name == "builder").unwrap();
        assert!(matches!(builder.details, PatternDetails::Builder { setters: 1, .. }));
        let factories: Vec<_> = patterns.iter().filter(|p| p.pattern_name == "factory").collect();
        assert_eq!(factories.len(), 1);
        assert_eq!(factories[0].symbol.as_deref(), Some("makeRequest"));
    }

    #[test]
    fn test_observer_needs_two_hooks() {
        let symbols = vec![
            symbol("Bus", "Bus", SymbolKind::Class, 1),
            symbol("subscribe", "Bus::subscribe", SymbolKind::Method, 2),
            symbol("emit", "Bus::emit", SymbolKind::Method, 3),
        ];
        assert!(names(&detect(&symbols, Language::Cpp)).contains(&"observer"));
        assert!(!names(&detect(&symbols[..2], Language::Cpp)).contains(&"observer"));
    }

    #[test]
    fn test_function_idioms_and_anti_patterns() {
        let mut busy = symbol("dispatch", "dispatch", SymbolKind::Function, 1);
        busy.complexity = MAX_COMPLEXITY;
        busy.signature = Some("void dispatch(int a, int b, int c, int d, int e, int f)".to_string());
        busy.is_async = true;

        let mut template = symbol("Stack", "Stack", SymbolKind::Class, 20);
        template.language_features = Some(LanguageFeatures::Cpp(CppFeatures {
            template_params: vec!["T".to_string()],
            ..Default::default()
        }));

        let patterns = detect(&[busy, template], Language::Cpp);
        assert_eq!(
            names(&patterns),
            vec!["async_function", "high_complexity", "long_parameter_list", "template"]
        );
        let long = &patterns[2];
        assert_eq!(long.pattern_type, PatternType::AntiPattern);
        assert!(matches!(long.details, PatternDetails::LongParameterList { parameter_count: 6, .. }));
    }
}
